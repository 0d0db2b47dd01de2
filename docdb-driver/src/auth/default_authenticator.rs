use derivative::Derivative;
use docdb_protocol::authenticators::{AuthMechanism, Credential, SaslAuthenticatorProvider};
use docdb_protocol::error::{Error, Result};
use docdb_protocol::server_api::ServerApi;
use std::sync::Arc;

use crate::auth::sasl_conversation::{BoxSaslAuthenticator, SaslConversation};
use crate::connection::ConnectionDescription;
use crate::transport::CommandTransport;

/// Picks the strongest SCRAM variant the server advertised for the user.
pub fn negotiate_mechanism(description: &ConnectionDescription) -> AuthMechanism {
    let scram_sha_256 = AuthMechanism::ScramSha256.as_str();

    match description.sasl_supported_mechanisms() {
        Some(mechanisms) if mechanisms.iter().any(|name| name == scram_sha_256) => {
            AuthMechanism::ScramSha256
        }
        _ => AuthMechanism::ScramSha1,
    }
}

/// Authenticator for credentials without an explicit mechanism. The handshake asks the server
/// which mechanisms the user supports and the choice is made from its answer.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct DefaultAuthenticator {
    credential: Credential,
    #[derivative(Debug = "ignore")]
    provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
    server_api: Option<ServerApi>,
}

impl DefaultAuthenticator {
    pub fn new(
        credential: Credential,
        provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
        server_api: Option<ServerApi>,
    ) -> Self {
        DefaultAuthenticator {
            credential,
            provider,
            server_api,
        }
    }

    #[inline]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn create_sasl_authenticator(
        &self,
        description: &ConnectionDescription,
    ) -> Result<BoxSaslAuthenticator> {
        let mechanism = negotiate_mechanism(description);
        self.provider
            .create_authenticator(mechanism, &self.credential)
            .ok_or_else(|| {
                Error::authentication(
                    &self.credential,
                    Error::Configuration(format!("Unsupported mechanism: {mechanism}")),
                )
            })
    }

    pub fn authenticate(
        &self,
        transport: &dyn CommandTransport,
        description: &ConnectionDescription,
    ) -> Result<()> {
        let authenticator = self.create_sasl_authenticator(description)?;
        SaslConversation::new(
            &self.credential,
            authenticator.as_ref(),
            self.server_api.as_ref(),
        )
        .authenticate(transport)
    }

    pub async fn authenticate_async(
        &self,
        transport: &dyn CommandTransport,
        description: &ConnectionDescription,
    ) -> Result<()> {
        let authenticator = self.create_sasl_authenticator(description)?;
        SaslConversation::new(
            &self.credential,
            authenticator.as_ref(),
            self.server_api.as_ref(),
        )
        .authenticate_async(transport)
        .await
    }
}
