use derive_more::Display;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const EXTERNAL_SOURCE: &str = "$external";

/// Authentication mechanisms known to the server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum AuthMechanism {
    #[display("SCRAM-SHA-1")]
    ScramSha1,
    #[display("SCRAM-SHA-256")]
    ScramSha256,
    #[display("PLAIN")]
    Plain,
    #[display("GSSAPI")]
    Gssapi,
    #[display("MONGODB-X509")]
    MongoX509,
}

impl AuthMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMechanism::ScramSha1 => "SCRAM-SHA-1",
            AuthMechanism::ScramSha256 => "SCRAM-SHA-256",
            AuthMechanism::Plain => "PLAIN",
            AuthMechanism::Gssapi => "GSSAPI",
            AuthMechanism::MongoX509 => "MONGODB-X509",
        }
    }

    /// Mechanisms which keep users outside of any database authenticate against `$external`.
    #[inline]
    pub fn is_external(self) -> bool {
        matches!(self, AuthMechanism::Gssapi | AuthMechanism::MongoX509)
    }

    /// Mechanisms whose first step can be sent together with the handshake.
    #[inline]
    pub fn supports_speculative_authentication(self) -> bool {
        matches!(self, AuthMechanism::ScramSha1 | AuthMechanism::ScramSha256)
    }
}

impl FromStr for AuthMechanism {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "SCRAM-SHA-1" => Ok(AuthMechanism::ScramSha1),
            "SCRAM-SHA-256" => Ok(AuthMechanism::ScramSha256),
            "PLAIN" => Ok(AuthMechanism::Plain),
            "GSSAPI" => Ok(AuthMechanism::Gssapi),
            "MONGODB-X509" => Ok(AuthMechanism::MongoX509),
            _ => Err(Error::Configuration(format!(
                "Unsupported authentication mechanism: {value}"
            ))),
        }
    }
}

/// Credential used to authenticate connections. The password is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    mechanism: Option<AuthMechanism>,
    user_name: Option<String>,
    source: String,
    password: Option<String>,
    mechanism_properties: BTreeMap<String, String>,
}

impl Credential {
    /// Creates a credential without an explicit mechanism, which will be negotiated with the
    /// server.
    pub fn new(source: &str, user_name: Option<&str>, password: Option<&str>) -> Self {
        Credential {
            mechanism: None,
            user_name: user_name.map(str::to_string),
            source: source.to_string(),
            password: password.map(str::to_string),
            mechanism_properties: Default::default(),
        }
    }

    /// Creates an X.509 credential. The user name is optional, since servers can derive it from
    /// the client certificate.
    pub fn x509(user_name: Option<&str>) -> Self {
        Credential::new(EXTERNAL_SOURCE, user_name, None).with_mechanism(AuthMechanism::MongoX509)
    }

    pub fn with_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    pub fn with_mechanism_property<K: ToString, V: ToString>(mut self, key: K, value: V) -> Self {
        self.mechanism_properties
            .insert(key.to_string(), value.to_string());
        self
    }

    #[inline]
    pub fn mechanism(&self) -> Option<AuthMechanism> {
        self.mechanism
    }

    #[inline]
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    #[inline]
    pub fn mechanism_property(&self, key: &str) -> Option<&str> {
        self.mechanism_properties.get(key).map(String::as_str)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("mechanism", &self.mechanism)
            .field("user_name", &self.user_name)
            .field("source", &self.source)
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("mechanism_properties", &self.mechanism_properties)
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Credential{{mechanism={}, userName='{}', source='{}'}}",
            self.mechanism
                .map(|mechanism| mechanism.as_str())
                .unwrap_or("negotiated"),
            self.user_name.as_deref().unwrap_or_default(),
            self.source
        )
    }
}

/// Handles a SASL conversation for a single mechanism.
///
/// The lifecycle of an authenticator consists of:
/// - The `initial_response` function will be called. The initial return value will be sent to the
///   server to initiate the conversation (`saslStart`).
/// - The server will respond to each client response by either issuing a challenge or indicating
///   that the conversation is done. If a new challenge is issued, the authenticator's
///   `evaluate_challenge` function will be called to produce a response that will be sent to the
///   server (`saslContinue`). This negotiation will continue until the server responds that
///   authentication is complete or an error is raised.
/// - When done, `handle_success` will be called with the last payload returned by the server.
pub trait SaslAuthenticator {
    fn mechanism(&self) -> AuthMechanism;

    fn initial_response(&self) -> Result<Vec<u8>>;

    fn evaluate_challenge(&self, challenge: &[u8]) -> Result<Vec<u8>>;

    fn handle_success(&self, data: &[u8]) -> Result<()>;
}

/// Provides mechanism implementations per new connection.
pub trait SaslAuthenticatorProvider {
    /// Creates an authenticator for given mechanism, or `None` if the mechanism is not supported.
    fn create_authenticator(
        &self,
        mechanism: AuthMechanism,
        credential: &Credential,
    ) -> Option<Box<dyn SaslAuthenticator + Send + Sync>>;
}

/// `PLAIN` mechanism: a single `\0user\0password` message.
#[derive(Clone)]
pub struct PlainAuthenticator {
    username: String,
    password: String,
}

impl PlainAuthenticator {
    pub fn new<S: ToString>(username: S, password: S) -> PlainAuthenticator {
        PlainAuthenticator {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl SaslAuthenticator for PlainAuthenticator {
    fn mechanism(&self) -> AuthMechanism {
        AuthMechanism::Plain
    }

    fn initial_response(&self) -> Result<Vec<u8>> {
        let mut token = vec![0];
        token.extend_from_slice(self.username.as_bytes());
        token.push(0);
        token.extend_from_slice(self.password.as_bytes());

        Ok(token)
    }

    fn evaluate_challenge(&self, _challenge: &[u8]) -> Result<Vec<u8>> {
        Err("Server challenge is not supported for PlainAuthenticator!".into())
    }

    fn handle_success(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Provider which only knows the `PLAIN` mechanism.
#[derive(Debug, Clone, Default)]
pub struct PlainAuthenticatorProvider;

impl SaslAuthenticatorProvider for PlainAuthenticatorProvider {
    fn create_authenticator(
        &self,
        mechanism: AuthMechanism,
        credential: &Credential,
    ) -> Option<Box<dyn SaslAuthenticator + Send + Sync>> {
        if mechanism != AuthMechanism::Plain {
            return None;
        }

        Some(Box::new(PlainAuthenticator::new(
            credential.user_name().unwrap_or_default(),
            credential.password().unwrap_or_default(),
        )))
    }
}
