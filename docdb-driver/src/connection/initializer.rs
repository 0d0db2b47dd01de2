//! Connection initialization: one handshake round trip, optional authentication and, for servers
//! which do not report it in the handshake, a legacy probe for the server-assigned connection id.
//!
//! Blocking and suspending initialization walk through the same [`Phase`]s and share every
//! decision; only the way commands are sent differs.
use derivative::Derivative;
use docdb_protocol::command::handshake::{speculative_authenticate_reply, HandshakeCommand};
use docdb_protocol::command::status_probe::{connection_id_from_reply, status_probe_command};
use docdb_protocol::command::ADMIN_DATABASE;
use docdb_protocol::compression::{compressor_names, Compressor};
use docdb_protocol::document::Document;
use docdb_protocol::error::{Error, Result, USER_NOT_FOUND_CODE};
use docdb_protocol::server_api::ServerApi;
use std::time::{Duration, Instant};
use tracing::*;

use crate::auth::Authenticator;
use crate::connection::command::{execute_command, execute_command_async};
use crate::connection::description::{
    ConnectionDescription, InitializationDescription, ServerDescription, ServerType,
};
use crate::connection::internal_connection::InternalConnection;
use crate::transport::CommandTransport;

/// Initialization step. Phases after the handshake carry what has been learned so far.
#[derive(Debug)]
enum Phase {
    Handshake,
    Authenticate(InitializationDescription),
    LegacyPatch(InitializationDescription),
    Done(InitializationDescription),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Handshake => "handshake",
            Phase::Authenticate(_) => "authenticate",
            Phase::LegacyPatch(_) => "legacy-patch",
            Phase::Done(_) => "done",
        }
    }
}

/// Initializes connections to a single server. Authenticators keep per-connection state, so a
/// new initializer is created for every connection.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ConnectionInitializer {
    #[derivative(Debug = "ignore")]
    authenticator: Authenticator,
    client_metadata: Option<Document>,
    compressors: Vec<Compressor>,
    server_api: Option<ServerApi>,
}

impl ConnectionInitializer {
    pub fn new(authenticator: Authenticator) -> Self {
        ConnectionInitializer {
            authenticator,
            client_metadata: None,
            compressors: vec![],
            server_api: None,
        }
    }

    pub fn with_client_metadata(mut self, client_metadata: Option<Document>) -> Self {
        self.client_metadata = client_metadata;
        self
    }

    pub fn with_compressors(mut self, compressors: Vec<Compressor>) -> Self {
        self.compressors = compressors;
        self
    }

    pub fn with_server_api(mut self, server_api: Option<ServerApi>) -> Self {
        self.server_api = server_api;
        self
    }

    #[inline]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Builds the handshake command. Asking the speculative authenticator for its payload is the
    /// only side effect.
    pub fn handshake_command(&self) -> Result<Document> {
        let mut command = HandshakeCommand::new(self.server_api.is_some())
            .with_client_metadata(self.client_metadata.clone())
            .with_compressors(&self.compressors);

        if self.authenticator.needs_mechanism_negotiation() {
            if let Some(credential) = self.authenticator.credential() {
                if let Some(user_name) = credential.user_name() {
                    command = command.with_sasl_supported_mechs(credential.source(), user_name);
                }
            }
        }

        if let Some(speculative) = self.authenticator.as_speculative() {
            command = command
                .with_speculative_authenticate(speculative.create_speculative_authenticate_command()?);
        }

        Ok(command.into_document())
    }

    /// A missing user reported while probing mechanisms is an authentication failure.
    fn remap_handshake_error(&self, error: Error) -> Error {
        if !self.authenticator.needs_mechanism_negotiation()
            || error.code() != Some(USER_NOT_FOUND_CODE)
        {
            return error;
        }

        match self.authenticator.credential() {
            Some(credential) => Error::authentication(credential, error),
            None => error,
        }
    }

    fn parse_handshake_reply<T: CommandTransport>(
        &self,
        connection: &InternalConnection<T>,
        reply: &Document,
        round_trip_time: Duration,
    ) -> InitializationDescription {
        let connection_description =
            ConnectionDescription::from_handshake_reply(connection.description().connection_id(), reply);
        let server_description =
            ServerDescription::from_handshake_reply(connection.address(), reply, round_trip_time);

        if let Some(speculative) = self.authenticator.as_speculative() {
            speculative.set_speculative_authenticate_response(speculative_authenticate_reply(reply));
        }

        debug!(
            connection = %connection_description.connection_id(),
            server_type = %connection_description.server_type(),
            max_wire_version = connection_description.max_wire_version(),
            compressors = %compressor_names(&self.compressors),
            ?round_trip_time,
            "Handshake completed."
        );

        InitializationDescription::new(connection_description, server_description)
    }

    fn should_authenticate(&self, description: &InitializationDescription) -> bool {
        !self.authenticator.is_none()
            && description.connection_description.server_type() != ServerType::ReplicaSetArbiter
    }

    fn needs_legacy_patch(description: &InitializationDescription) -> bool {
        description
            .connection_description
            .connection_id()
            .server_value()
            .is_none()
    }

    /// Applies the result of the legacy status probe. Failures are not fatal; the description
    /// is kept as it was.
    fn apply_status_probe(
        description: InitializationDescription,
        result: Result<Document>,
    ) -> InitializationDescription {
        let reply = match result {
            Ok(reply) => reply,
            Err(error) => {
                debug!(%error, "Legacy connection id probe failed.");
                return description;
            }
        };

        match connection_id_from_reply(&reply) {
            Some(server_value) => {
                let connection_description = &description.connection_description;
                let connection_id = connection_description
                    .connection_id()
                    .with_server_value(server_value);
                description.with_connection_description(
                    connection_description.with_connection_id(connection_id),
                )
            }
            None => description,
        }
    }

    /// Initializes a connection, blocking on every round trip.
    pub fn initialize<T: CommandTransport>(
        &self,
        connection: &InternalConnection<T>,
    ) -> Result<InitializationDescription> {
        let mut phase = Phase::Handshake;

        loop {
            trace!(phase = phase.name(), address = %connection.address(), "Initializing connection.");

            phase = match phase {
                Phase::Handshake => {
                    let command = self.handshake_command()?;
                    let start = Instant::now();
                    let reply = execute_command(
                        connection,
                        ADMIN_DATABASE,
                        command,
                        self.server_api.as_ref(),
                    )
                    .map_err(|error| self.remap_handshake_error(error))?;

                    Phase::Authenticate(self.parse_handshake_reply(
                        connection,
                        &reply,
                        start.elapsed(),
                    ))
                }
                Phase::Authenticate(description) => {
                    if self.should_authenticate(&description) {
                        self.authenticator
                            .authenticate(connection, &description.connection_description)?;
                    }

                    Phase::LegacyPatch(description)
                }
                Phase::LegacyPatch(description) => {
                    if Self::needs_legacy_patch(&description) {
                        let result = execute_command(
                            connection,
                            ADMIN_DATABASE,
                            status_probe_command(),
                            self.server_api.as_ref(),
                        );
                        Phase::Done(Self::apply_status_probe(description, result))
                    } else {
                        Phase::Done(description)
                    }
                }
                Phase::Done(description) => return Ok(description),
            };
        }
    }

    /// Initializes a connection without blocking.
    pub async fn initialize_async<T: CommandTransport>(
        &self,
        connection: &InternalConnection<T>,
    ) -> Result<InitializationDescription> {
        let mut phase = Phase::Handshake;

        loop {
            trace!(phase = phase.name(), address = %connection.address(), "Initializing connection.");

            phase = match phase {
                Phase::Handshake => {
                    let command = self.handshake_command()?;
                    let start = Instant::now();
                    let reply = execute_command_async(
                        connection,
                        ADMIN_DATABASE,
                        command,
                        self.server_api.as_ref(),
                    )
                    .await
                    .map_err(|error| self.remap_handshake_error(error))?;

                    Phase::Authenticate(self.parse_handshake_reply(
                        connection,
                        &reply,
                        start.elapsed(),
                    ))
                }
                Phase::Authenticate(description) => {
                    if self.should_authenticate(&description) {
                        self.authenticator
                            .authenticate_async(connection, &description.connection_description)
                            .await?;
                    }

                    Phase::LegacyPatch(description)
                }
                Phase::LegacyPatch(description) => {
                    if Self::needs_legacy_patch(&description) {
                        let result = execute_command_async(
                            connection,
                            ADMIN_DATABASE,
                            status_probe_command(),
                            self.server_api.as_ref(),
                        )
                        .await;
                        Phase::Done(Self::apply_status_probe(description, result))
                    } else {
                        Phase::Done(description)
                    }
                }
                Phase::Done(description) => return Ok(description),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialConfig;
    use crate::cluster::ClusterId;
    use crate::connection::description::ServerId;
    use crate::test_utils::{reply, ScriptedTransport};
    use docdb_protocol::address::ServerAddress;
    use docdb_protocol::authenticators::{Credential, PlainAuthenticatorProvider};
    use docdb_protocol::server_api::ServerApiVersion;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn connection(replies: Vec<Result<Document>>) -> InternalConnection<ScriptedTransport> {
        InternalConnection::new(
            ScriptedTransport::new(replies),
            ServerId::new(ClusterId::default(), ServerAddress::default()),
            None,
        )
    }

    fn negotiating_authenticator() -> Authenticator {
        Authenticator::from_config(
            Some(&CredentialConfig::new(
                Credential::new("S", Some("U"), Some("pwd")),
                Arc::new(PlainAuthenticatorProvider),
            )),
            None,
        )
    }

    #[test]
    fn should_use_hello_with_server_api() {
        let initializer = ConnectionInitializer::new(Authenticator::None)
            .with_server_api(Some(ServerApi::new(ServerApiVersion::V1)));

        assert_eq!(
            Value::Object(initializer.handshake_command().unwrap()),
            json!({"hello": 1, "helloOk": true})
        );
    }

    #[test]
    fn should_probe_mechanisms_for_negotiating_authenticator() {
        let initializer = ConnectionInitializer::new(negotiating_authenticator())
            .with_compressors(vec![Compressor::Snappy]);

        assert_eq!(
            Value::Object(initializer.handshake_command().unwrap()),
            json!({"isMaster": 1, "compression": ["snappy"], "saslSupportedMechs": "S.U"})
        );
    }

    #[test]
    fn should_remap_user_not_found_only_when_negotiating() {
        let not_found = || Error::Command {
            code: USER_NOT_FOUND_CODE,
            code_name: "UserNotFound".into(),
            message: "no such user".into(),
            address: ServerAddress::default(),
        };

        let initializer = ConnectionInitializer::new(negotiating_authenticator());
        assert!(matches!(
            initializer.remap_handshake_error(not_found()),
            Error::Authentication { .. }
        ));

        let initializer = ConnectionInitializer::new(Authenticator::None);
        assert_eq!(initializer.remap_handshake_error(not_found()).code(), Some(11));
    }

    #[test]
    fn should_not_remap_codes_which_only_truncate_to_user_not_found() {
        for code in [json!(4294967307i64), json!(11.7)] {
            let connection = connection(vec![Ok(reply(json!({"ok": 0, "code": code})))]);
            let initializer = ConnectionInitializer::new(negotiating_authenticator());

            let error = initializer.initialize(&connection).unwrap_err();

            assert!(!matches!(error, Error::Authentication { .. }), "{error:?}");
            assert_eq!(error.code(), Some(-1));
        }
    }

    #[test]
    fn should_skip_probe_when_handshake_reports_connection_id() {
        let connection = connection(vec![Ok(reply(json!({"ok": 1, "connectionId": 9})))]);
        let initializer = ConnectionInitializer::new(Authenticator::None);

        let description = initializer.initialize(&connection).unwrap();

        assert_eq!(
            description.connection_description.connection_id().server_value(),
            Some(9)
        );
        assert_eq!(connection.transport().sent().len(), 1);
    }

    #[test]
    fn should_keep_description_when_probe_returns_no_id() {
        let connection = connection(vec![
            Ok(reply(json!({"ok": 1}))),
            Ok(reply(json!({"ok": 1, "err": null}))),
        ]);
        let initializer = ConnectionInitializer::new(Authenticator::None);

        let description = initializer.initialize(&connection).unwrap();

        assert_eq!(
            description.connection_description.connection_id().server_value(),
            None
        );
        assert_eq!(connection.transport().sent()[1]["getlasterror"], json!(1));
    }

    #[tokio::test]
    async fn should_fail_when_handshake_fails() {
        let connection = connection(vec![Err(Error::Timeout("handshake".into()))]);
        let initializer = ConnectionInitializer::new(Authenticator::None);

        let error = initializer.initialize_async(&connection).await.unwrap_err();

        assert!(error.is_transport());
        assert_eq!(connection.transport().sent().len(), 1);
    }
}
