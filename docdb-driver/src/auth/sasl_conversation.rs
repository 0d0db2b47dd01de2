//! Drives a SASL conversation over a connection: `saslStart` followed by as many `saslContinue`
//! round trips as the mechanism needs. A conversation can also be resumed from the reply to a
//! `saslStart` which was sent speculatively inside the handshake.
use docdb_protocol::authenticators::{Credential, SaslAuthenticator};
use docdb_protocol::command::sasl::{SaslContinue, SaslReply, SaslStart};
use docdb_protocol::document::Document;
use docdb_protocol::error::{Error, ErrorKind, Result};
use docdb_protocol::server_api::ServerApi;
use tracing::*;

use crate::connection::command::{execute_command, execute_command_async};
use crate::transport::CommandTransport;

pub type BoxSaslAuthenticator = Box<dyn SaslAuthenticator + Send + Sync>;

/// Wraps failures in an authentication error naming the credential. Transport failures and
/// errors which are already authentication errors pass through.
pub fn authentication_error(credential: &Credential, error: Error) -> Error {
    match error.kind() {
        ErrorKind::Transport | ErrorKind::Authentication => error,
        _ => Error::authentication(credential, error),
    }
}

pub struct SaslConversation<'a> {
    credential: &'a Credential,
    authenticator: &'a (dyn SaslAuthenticator + Send + Sync),
    server_api: Option<&'a ServerApi>,
}

impl<'a> SaslConversation<'a> {
    pub fn new(
        credential: &'a Credential,
        authenticator: &'a (dyn SaslAuthenticator + Send + Sync),
        server_api: Option<&'a ServerApi>,
    ) -> Self {
        SaslConversation {
            credential,
            authenticator,
            server_api,
        }
    }

    fn start_command(&self) -> Result<Document> {
        let payload = self.authenticator.initial_response()?;
        Ok(SaslStart::new(self.authenticator.mechanism(), payload).into_document())
    }

    fn next_command(&self, reply: &SaslReply) -> Result<Document> {
        let payload = self.authenticator.evaluate_challenge(&reply.payload)?;
        Ok(SaslContinue::new(reply.conversation_id.clone(), payload).into_document())
    }

    fn finish(&self, reply: &SaslReply) -> Result<()> {
        self.authenticator.handle_success(&reply.payload)?;
        debug!(
            mechanism = %self.authenticator.mechanism(),
            source = self.credential.source(),
            "SASL conversation completed."
        );
        Ok(())
    }

    fn run(&self, transport: &dyn CommandTransport) -> Result<()> {
        let command = self.start_command()?;
        let reply = execute_command(transport, self.credential.source(), command, self.server_api)?;
        self.resume_unwrapped(transport, SaslReply::from_document(&reply)?)
    }

    fn resume_unwrapped(&self, transport: &dyn CommandTransport, mut reply: SaslReply) -> Result<()> {
        while !reply.done {
            let command = self.next_command(&reply)?;
            let document =
                execute_command(transport, self.credential.source(), command, self.server_api)?;
            reply = SaslReply::from_document(&document)?;
        }

        self.finish(&reply)
    }

    /// Runs the whole conversation, blocking on every round trip.
    pub fn authenticate(&self, transport: &dyn CommandTransport) -> Result<()> {
        self.run(transport)
            .map_err(|error| authentication_error(self.credential, error))
    }

    /// Continues a conversation whose first step has already been answered.
    pub fn resume(&self, transport: &dyn CommandTransport, reply: &Document) -> Result<()> {
        SaslReply::from_document(reply)
            .and_then(|reply| self.resume_unwrapped(transport, reply))
            .map_err(|error| authentication_error(self.credential, error))
    }

    async fn run_async(&self, transport: &dyn CommandTransport) -> Result<()> {
        let command = self.start_command()?;
        let reply =
            execute_command_async(transport, self.credential.source(), command, self.server_api)
                .await?;
        self.resume_unwrapped_async(transport, SaslReply::from_document(&reply)?)
            .await
    }

    async fn resume_unwrapped_async(
        &self,
        transport: &dyn CommandTransport,
        mut reply: SaslReply,
    ) -> Result<()> {
        while !reply.done {
            let command = self.next_command(&reply)?;
            let document = execute_command_async(
                transport,
                self.credential.source(),
                command,
                self.server_api,
            )
            .await?;
            reply = SaslReply::from_document(&document)?;
        }

        self.finish(&reply)
    }

    pub async fn authenticate_async(&self, transport: &dyn CommandTransport) -> Result<()> {
        self.run_async(transport)
            .await
            .map_err(|error| authentication_error(self.credential, error))
    }

    pub async fn resume_async(
        &self,
        transport: &dyn CommandTransport,
        reply: &Document,
    ) -> Result<()> {
        let reply = SaslReply::from_document(reply)
            .map_err(|error| authentication_error(self.credential, error))?;

        self.resume_unwrapped_async(transport, reply)
            .await
            .map_err(|error| authentication_error(self.credential, error))
    }
}
