use docdb_protocol::authenticators::{Credential, EXTERNAL_SOURCE};
use docdb_protocol::command::authenticate::x509_authenticate_command;
use docdb_protocol::error::Result;
use docdb_protocol::server_api::ServerApi;

use crate::auth::sasl_conversation::authentication_error;
use crate::connection::command::{execute_command, execute_command_async};
use crate::transport::CommandTransport;

/// Certificate-based authentication: a single `authenticate` command on `$external`. The
/// certificate itself is presented by the TLS transport.
#[derive(Clone, Debug)]
pub struct X509Authenticator {
    credential: Credential,
    server_api: Option<ServerApi>,
}

impl X509Authenticator {
    pub fn new(credential: Credential, server_api: Option<ServerApi>) -> Self {
        X509Authenticator {
            credential,
            server_api,
        }
    }

    #[inline]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn authenticate(&self, transport: &dyn CommandTransport) -> Result<()> {
        execute_command(
            transport,
            EXTERNAL_SOURCE,
            x509_authenticate_command(self.credential.user_name()),
            self.server_api.as_ref(),
        )
        .map(|_| ())
        .map_err(|error| authentication_error(&self.credential, error))
    }

    pub async fn authenticate_async(&self, transport: &dyn CommandTransport) -> Result<()> {
        execute_command_async(
            transport,
            EXTERNAL_SOURCE,
            x509_authenticate_command(self.credential.user_name()),
            self.server_api.as_ref(),
        )
        .await
        .map(|_| ())
        .map_err(|error| authentication_error(&self.credential, error))
    }
}
