use crate::address::ServerAddress;
use crate::authenticators::Credential;
use derive_more::Display;
use std::io;
use std::result;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Server error code reported when the user named in `saslSupportedMechs` does not exist.
pub const USER_NOT_FOUND_CODE: i32 = 11;

/// Broad classification of an [`Error`], used to make decisions without matching on every
/// variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Network-level failure: broken stream, cancelled or timed out read/write.
    Transport,
    /// Malformed or unexpected reply.
    Protocol,
    /// The server executed the command and reported a failure.
    Server,
    /// Credential was rejected or could not be used.
    Authentication,
    /// Unsupported or inconsistent configuration.
    Configuration,
    /// Anything else raised by the driver itself.
    General,
}

/// Driver error type. Errors are either raised by the server (command failures carrying a
/// numeric code) or by the driver itself while talking to it.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Internal IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Timed out waiting for an operation to complete.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Reply could not be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Binary payload was not valid base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Command failed on the server.
    #[error("Command failed on {address} with error {code} ({code_name}): {message}")]
    Command {
        code: i32,
        code_name: String,
        message: String,
        address: ServerAddress,
    },
    /// Authentication failed. Keeps the credential which was used and the low-level cause.
    #[error("{message}")]
    Authentication {
        credential: Box<Credential>,
        message: String,
        #[source]
        source: Box<Error>,
    },
    /// Unsupported configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// General error
    #[error("General error: {0}")]
    General(String),
}

impl Error {
    /// Wraps a failure which happened while authenticating with the given credential.
    pub fn authentication(credential: &Credential, source: Error) -> Self {
        Error::Authentication {
            credential: Box::new(credential.clone()),
            message: format!("Exception authenticating {}", credential),
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Timeout(_) => ErrorKind::Transport,
            Error::Protocol(_) | Error::Base64(_) => ErrorKind::Protocol,
            Error::Command { .. } => ErrorKind::Server,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::General(_) => ErrorKind::General,
        }
    }

    /// Server error code, if the error was reported by the server.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Command { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[inline]
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(error) => Error::Io(io::Error::new(
                error.kind(),
                error
                    .get_ref()
                    .map(|error| error.to_string())
                    .unwrap_or_default(),
            )),
            Error::Timeout(error) => Error::Timeout(error.clone()),
            Error::Protocol(error) => Error::Protocol(error.clone()),
            Error::Base64(error) => Error::Base64(error.clone()),
            Error::Command {
                code,
                code_name,
                message,
                address,
            } => Error::Command {
                code: *code,
                code_name: code_name.clone(),
                message: message.clone(),
                address: address.clone(),
            },
            Error::Authentication {
                credential,
                message,
                source,
            } => Error::Authentication {
                credential: credential.clone(),
                message: message.clone(),
                source: source.clone(),
            },
            Error::Configuration(error) => Error::Configuration(error.clone()),
            Error::General(error) => Error::General(error.clone()),
        }
    }
}
