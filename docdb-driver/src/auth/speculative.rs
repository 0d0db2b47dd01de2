use arc_swap::ArcSwapOption;
use derivative::Derivative;
use docdb_protocol::authenticators::{Credential, SaslAuthenticatorProvider};
use docdb_protocol::command::sasl::SaslStart;
use docdb_protocol::document::Document;
use docdb_protocol::error::{Error, Result};
use docdb_protocol::server_api::ServerApi;
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::*;

use crate::auth::sasl_conversation::{BoxSaslAuthenticator, SaslConversation};
use crate::auth::SpeculativeAuthenticator;
use crate::connection::ConnectionDescription;
use crate::future::BoxFuture;
use crate::transport::CommandTransport;

/// SASL authenticator for credentials with an explicit mechanism. Mechanisms which allow it send
/// their first step inside the handshake; when the server answers it there, the conversation
/// continues from that answer instead of starting over.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SpeculativeSaslAuthenticator {
    credential: Credential,
    #[derivative(Debug = "ignore")]
    provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
    server_api: Option<ServerApi>,
    #[derivative(Debug = "ignore")]
    pending: Mutex<Option<BoxSaslAuthenticator>>,
    response: ArcSwapOption<Document>,
}

impl SpeculativeSaslAuthenticator {
    pub fn new(
        credential: Credential,
        provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
        server_api: Option<ServerApi>,
    ) -> Self {
        SpeculativeSaslAuthenticator {
            credential,
            provider,
            server_api,
            pending: Mutex::new(None),
            response: ArcSwapOption::empty(),
        }
    }

    fn create_sasl_authenticator(&self) -> Result<BoxSaslAuthenticator> {
        let mechanism = self.credential.mechanism().ok_or_else(|| {
            Error::authentication(
                &self.credential,
                Error::Configuration("Speculative authentication requires a mechanism".into()),
            )
        })?;

        self.provider
            .create_authenticator(mechanism, &self.credential)
            .ok_or_else(|| {
                Error::authentication(
                    &self.credential,
                    Error::Configuration(format!("Unsupported mechanism: {mechanism}")),
                )
            })
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<BoxSaslAuthenticator>> {
        self.pending.lock().unwrap_or_else(|error| {
            warn!(credential = %self.credential, "Recovering poisoned speculative authentication state.");
            PoisonError::into_inner(error)
        })
    }

    fn take_pending(&self) -> Option<BoxSaslAuthenticator> {
        self.lock_pending().take()
    }

    /// Returns the authenticator which produced the speculative step, together with the server's
    /// answer to it, if the server answered.
    fn take_resumable(&self) -> Option<(BoxSaslAuthenticator, Arc<Document>)> {
        let response = self.response.swap(None);
        let pending = self.take_pending();
        pending.zip(response)
    }
}

impl SpeculativeAuthenticator for SpeculativeSaslAuthenticator {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn create_speculative_authenticate_command(&self) -> Result<Option<Document>> {
        let supported = self
            .credential
            .mechanism()
            .map(|mechanism| mechanism.supports_speculative_authentication())
            .unwrap_or(false);
        if !supported {
            return Ok(None);
        }

        let authenticator = self.create_sasl_authenticator()?;
        let payload = authenticator
            .initial_response()
            .map_err(|error| Error::authentication(&self.credential, error))?;
        let command = SaslStart::new(authenticator.mechanism(), payload)
            .with_database(self.credential.source())
            .into_document();

        *self.lock_pending() = Some(authenticator);

        Ok(Some(command))
    }

    fn set_speculative_authenticate_response(&self, response: Option<Document>) {
        self.response.store(response.map(Arc::new));
    }

    fn speculative_authenticate_response(&self) -> Option<Document> {
        self.response
            .load()
            .as_ref()
            .map(|response| response.as_ref().clone())
    }

    fn authenticate(
        &self,
        transport: &dyn CommandTransport,
        _description: &ConnectionDescription,
    ) -> Result<()> {
        if let Some((authenticator, response)) = self.take_resumable() {
            debug!(credential = %self.credential, "Resuming speculative authentication.");
            return SaslConversation::new(
                &self.credential,
                authenticator.as_ref(),
                self.server_api.as_ref(),
            )
            .resume(transport, &response);
        }

        let authenticator = self.create_sasl_authenticator()?;
        SaslConversation::new(
            &self.credential,
            authenticator.as_ref(),
            self.server_api.as_ref(),
        )
        .authenticate(transport)
    }

    fn authenticate_async<'a>(
        &'a self,
        transport: &'a dyn CommandTransport,
        _description: &'a ConnectionDescription,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if let Some((authenticator, response)) = self.take_resumable() {
                debug!(credential = %self.credential, "Resuming speculative authentication.");
                return SaslConversation::new(
                    &self.credential,
                    authenticator.as_ref(),
                    self.server_api.as_ref(),
                )
                .resume_async(transport, &response)
                .await;
            }

            let authenticator = self.create_sasl_authenticator()?;
            SaslConversation::new(
                &self.credential,
                authenticator.as_ref(),
                self.server_api.as_ref(),
            )
            .authenticate_async(transport)
            .await
        }
        .boxed()
    }
}
