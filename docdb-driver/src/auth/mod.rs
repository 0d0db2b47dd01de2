//! Connection authentication. Every connection gets its own [`Authenticator`], created from the
//! cluster's credential, since speculative authentication keeps per-connection state between
//! the handshake and the authentication step.
mod default_authenticator;
mod sasl_conversation;
mod speculative;
mod x509;

pub use crate::auth::default_authenticator::{negotiate_mechanism, DefaultAuthenticator};
pub use crate::auth::sasl_conversation::{authentication_error, SaslConversation};
pub use crate::auth::speculative::SpeculativeSaslAuthenticator;
pub use crate::auth::x509::X509Authenticator;

use derivative::Derivative;
use derive_more::Constructor;
use docdb_protocol::authenticators::{AuthMechanism, Credential, SaslAuthenticatorProvider};
use docdb_protocol::document::Document;
use docdb_protocol::error::Result;
use docdb_protocol::server_api::ServerApi;
use futures::FutureExt;
use std::sync::Arc;

use crate::connection::ConnectionDescription;
use crate::future::BoxFuture;
use crate::transport::CommandTransport;

/// Authenticator which can send its first step inside the handshake.
pub trait SpeculativeAuthenticator: Send + Sync {
    fn credential(&self) -> &Credential;

    /// Creates the payload for the `speculativeAuthenticate` handshake field, or `None` if the
    /// first step cannot be sent speculatively.
    fn create_speculative_authenticate_command(&self) -> Result<Option<Document>>;

    /// Receives the server's answer to the speculative step, or `None` if it gave none.
    fn set_speculative_authenticate_response(&self, response: Option<Document>);

    fn speculative_authenticate_response(&self) -> Option<Document>;

    fn authenticate(
        &self,
        transport: &dyn CommandTransport,
        description: &ConnectionDescription,
    ) -> Result<()>;

    fn authenticate_async<'a>(
        &'a self,
        transport: &'a dyn CommandTransport,
        description: &'a ConnectionDescription,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Credential together with the mechanism implementations available for it.
#[derive(Derivative, Clone, Constructor)]
#[derivative(Debug)]
pub struct CredentialConfig {
    pub credential: Credential,
    #[derivative(Debug = "ignore")]
    pub authenticator_provider: Arc<dyn SaslAuthenticatorProvider + Send + Sync>,
}

/// Closed set of authentication strategies.
#[derive(Default)]
pub enum Authenticator {
    /// Connections are not authenticated.
    #[default]
    None,
    /// Mechanism is negotiated with the server during the handshake.
    Default(DefaultAuthenticator),
    X509(X509Authenticator),
    Speculative(Box<dyn SpeculativeAuthenticator>),
}

impl Authenticator {
    /// Creates a fresh authenticator for a new connection.
    pub fn from_config(config: Option<&CredentialConfig>, server_api: Option<&ServerApi>) -> Self {
        let Some(config) = config else {
            return Authenticator::None;
        };

        let credential = config.credential.clone();
        let server_api = server_api.cloned();

        match credential.mechanism() {
            None => Authenticator::Default(DefaultAuthenticator::new(
                credential,
                config.authenticator_provider.clone(),
                server_api,
            )),
            Some(AuthMechanism::MongoX509) => {
                Authenticator::X509(X509Authenticator::new(credential, server_api))
            }
            Some(_) => Authenticator::Speculative(Box::new(SpeculativeSaslAuthenticator::new(
                credential,
                config.authenticator_provider.clone(),
                server_api,
            ))),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Authenticator::None)
    }

    /// Only the negotiating authenticator asks the server for the user's mechanisms.
    #[inline]
    pub fn needs_mechanism_negotiation(&self) -> bool {
        matches!(self, Authenticator::Default(_))
    }

    #[inline]
    pub fn as_speculative(&self) -> Option<&dyn SpeculativeAuthenticator> {
        match self {
            Authenticator::Speculative(authenticator) => Some(authenticator.as_ref()),
            _ => None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Authenticator::None => None,
            Authenticator::Default(authenticator) => Some(authenticator.credential()),
            Authenticator::X509(authenticator) => Some(authenticator.credential()),
            Authenticator::Speculative(authenticator) => Some(authenticator.credential()),
        }
    }

    pub fn authenticate(
        &self,
        transport: &dyn CommandTransport,
        description: &ConnectionDescription,
    ) -> Result<()> {
        match self {
            Authenticator::None => Ok(()),
            Authenticator::Default(authenticator) => {
                authenticator.authenticate(transport, description)
            }
            Authenticator::X509(authenticator) => authenticator.authenticate(transport),
            Authenticator::Speculative(authenticator) => {
                authenticator.authenticate(transport, description)
            }
        }
    }

    pub fn authenticate_async<'a>(
        &'a self,
        transport: &'a dyn CommandTransport,
        description: &'a ConnectionDescription,
    ) -> BoxFuture<'a, Result<()>> {
        match self {
            Authenticator::None => futures::future::ready(Ok(())).boxed(),
            Authenticator::Default(authenticator) => authenticator
                .authenticate_async(transport, description)
                .boxed(),
            Authenticator::X509(authenticator) => {
                authenticator.authenticate_async(transport).boxed()
            }
            Authenticator::Speculative(authenticator) => {
                authenticator.authenticate_async(transport, description)
            }
        }
    }
}
