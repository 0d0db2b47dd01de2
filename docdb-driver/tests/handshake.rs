mod common;

use common::{reply, without_db, RecordingListener, ScriptedTransport, TwoStepProvider};
use docdb_driver::address::ServerAddress;
use docdb_driver::auth::{Authenticator, CredentialConfig};
use docdb_driver::authenticators::{AuthMechanism, Credential};
use docdb_driver::cluster::ClusterId;
use docdb_driver::compression::Compressor;
use docdb_driver::connection::{
    ConnectionId, ConnectionInitializer, ConnectionState, InitializationDescription,
    InternalConnection, ServerId, ServerType,
};
use docdb_driver::document::{binary_value, Document};
use docdb_driver::error::{Error, ErrorKind, Result};
use docdb_driver::events::CommandListener;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn server_id() -> ServerId {
    ServerId::new(ClusterId::default(), ServerAddress::default())
}

fn connection(replies: Vec<Result<Document>>) -> InternalConnection<ScriptedTransport> {
    InternalConnection::new(ScriptedTransport::new(replies), server_id(), None)
}

fn credential_config(credential: Credential) -> CredentialConfig {
    CredentialConfig::new(credential, Arc::new(TwoStepProvider))
}

fn negotiating() -> Authenticator {
    Authenticator::from_config(
        Some(&credential_config(Credential::new("S", Some("U"), Some("pwd")))),
        None,
    )
}

fn speculative() -> Authenticator {
    Authenticator::from_config(
        Some(&credential_config(
            Credential::new("admin", Some("alice"), Some("pwd"))
                .with_mechanism(AuthMechanism::ScramSha256),
        )),
        None,
    )
}

#[test]
fn handshake_without_options_contains_only_probe() {
    let connection = connection(vec![Ok(reply(json!({"ok": 1, "connectionId": 1})))]);
    let initializer = ConnectionInitializer::new(Authenticator::None);

    connection.open(&initializer).unwrap();

    let sent = connection.transport().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(without_db(&sent[0]), json!({"isMaster": 1}));
    assert_eq!(sent[0]["$db"], json!("admin"));
}

#[test]
fn handshake_probes_mechanisms_of_source_and_user() {
    let connection = connection(vec![
        Ok(reply(json!({"ok": 1, "connectionId": 3, "saslSupportedMechs": ["SCRAM-SHA-256"]}))),
        Ok(reply(json!({"ok": 1, "conversationId": 1, "done": true}))),
    ]);
    let initializer = ConnectionInitializer::new(negotiating())
        .with_compressors(vec![Compressor::Zstd { level: None }]);

    connection.open(&initializer).unwrap();

    let sent = connection.transport().sent();
    assert_eq!(sent[0]["saslSupportedMechs"], json!("S.U"));
    assert_eq!(sent[0]["compression"], json!(["zstd"]));
    assert_eq!(sent[1]["saslStart"], json!(1));
    assert_eq!(sent[1]["mechanism"], json!("SCRAM-SHA-256"));
    assert_eq!(sent[1]["$db"], json!("S"));
}

/// Makes results of two connections comparable: connection ids always differ in their
/// client-assigned value and round-trip times are measured.
fn comparable(
    description: &InitializationDescription,
    connection_id: &ConnectionId,
) -> InitializationDescription {
    InitializationDescription::new(
        description
            .connection_description
            .with_connection_id(connection_id.clone()),
        description
            .server_description
            .with_round_trip_time(Duration::ZERO),
    )
}

fn equivalence_replies() -> Vec<Result<Document>> {
    vec![
        Ok(reply(json!({
            "ok": 1,
            "setName": "rs0",
            "secondary": true,
            "hosts": ["db1:27017", "db2:27017"],
            "maxWireVersion": 9,
            "compression": ["snappy"],
            "saslSupportedMechs": ["SCRAM-SHA-1"]
        }))),
        Ok(reply(json!({"ok": 1, "conversationId": 1, "done": false}))),
        Ok(reply(json!({"ok": 1, "conversationId": 1, "done": true}))),
        Ok(reply(json!({"ok": 1, "connectionId": 77}))),
    ]
}

#[tokio::test]
async fn blocking_and_suspending_modes_are_equivalent() {
    let blocking = connection(equivalence_replies());
    let suspending = connection(equivalence_replies());

    let blocking_result = blocking
        .open(&ConnectionInitializer::new(negotiating()).with_compressors(vec![Compressor::Snappy]))
        .unwrap();
    let suspending_result = suspending
        .open_async(
            &ConnectionInitializer::new(negotiating()).with_compressors(vec![Compressor::Snappy]),
        )
        .await
        .unwrap();

    let connection_id = blocking_result.connection_description.connection_id();
    assert_eq!(
        connection_id.server_value(),
        suspending_result
            .connection_description
            .connection_id()
            .server_value()
    );
    assert_eq!(
        comparable(&blocking_result, connection_id),
        comparable(&suspending_result, connection_id)
    );
    assert_eq!(blocking.transport().sent(), suspending.transport().sent());
    assert_eq!(
        blocking_result
            .connection_description
            .connection_id()
            .server_value(),
        Some(77)
    );
    assert_eq!(
        blocking_result.server_description.server_type(),
        ServerType::ReplicaSetSecondary
    );
}

#[test]
fn legacy_probe_fills_in_connection_id() {
    let connection = connection(vec![
        Ok(reply(json!({"ok": 1}))),
        Ok(reply(json!({"ok": 1, "connectionId": 42}))),
    ]);

    let description = connection
        .open(&ConnectionInitializer::new(Authenticator::None))
        .unwrap();

    assert_eq!(
        description.connection_description.connection_id().server_value(),
        Some(42)
    );
    assert_eq!(without_db(&connection.transport().sent()[1]), json!({"getlasterror": 1}));
    assert_eq!(
        connection.description().connection_id().server_value(),
        Some(42)
    );
}

#[tokio::test]
async fn legacy_probe_failure_keeps_description() {
    for probe_reply in [
        Err(Error::Timeout("probe".into())),
        Ok(reply(json!({"ok": 0, "code": 59, "errmsg": "no such command"}))),
    ] {
        let connection = connection(vec![Ok(reply(json!({"ok": 1}))), probe_reply]);
        let local_value = connection.description().connection_id().local_value();

        let description = connection
            .open_async(&ConnectionInitializer::new(Authenticator::None))
            .await
            .unwrap();

        let connection_id = description.connection_description.connection_id();
        assert_eq!(connection_id.server_value(), None);
        assert_eq!(connection_id.local_value(), local_value);
        assert_eq!(connection.state(), ConnectionState::Ready);
    }
}

#[test]
fn arbiters_are_never_authenticated() {
    let connection = connection(vec![
        Ok(reply(json!({"ok": 1, "setName": "rs0", "arbiterOnly": true, "connectionId": 5}))),
    ]);

    let description = connection.open(&ConnectionInitializer::new(negotiating())).unwrap();

    assert_eq!(
        description.connection_description.server_type(),
        ServerType::ReplicaSetArbiter
    );
    assert_eq!(connection.transport().sent().len(), 1);
}

#[test]
fn speculative_payload_is_sent_with_first_command() {
    let connection = connection(vec![
        Ok(reply(json!({"ok": 1, "connectionId": 8}))),
        Ok(reply(json!({"ok": 1, "conversationId": 1, "done": true}))),
    ]);

    connection.open(&ConnectionInitializer::new(speculative())).unwrap();

    let sent = connection.transport().sent();
    let payload = &sent[0]["speculativeAuthenticate"];
    assert!(sent[0].contains_key("isMaster"));
    assert_eq!(payload["saslStart"], json!(1));
    assert_eq!(payload["mechanism"], json!("SCRAM-SHA-256"));
    assert_eq!(payload["db"], json!("admin"));
    assert!(sent[1].contains_key("saslStart"));
}

#[tokio::test]
async fn speculative_reply_skips_sasl_start() {
    let connection = connection(vec![
        Ok(reply(json!({
            "ok": 1,
            "connectionId": 8,
            "speculativeAuthenticate": {
                "conversationId": 4,
                "done": false,
                "payload": binary_value(b"challenge")
            }
        }))),
        Ok(reply(json!({"ok": 1, "conversationId": 4, "done": true}))),
    ]);

    connection
        .open_async(&ConnectionInitializer::new(speculative()))
        .await
        .unwrap();

    let sent = connection.transport().sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1]["saslContinue"], json!(1));
    assert_eq!(sent[1]["conversationId"], json!(4));
    assert_eq!(sent[1]["payload"], binary_value(b"next"));
}

#[test]
fn user_not_found_during_negotiation_is_authentication_error() {
    let not_found = || {
        Ok(reply(json!({
            "ok": 0,
            "code": 11,
            "codeName": "UserNotFound",
            "errmsg": "Could not find user U@S"
        })))
    };

    let connection = connection(vec![not_found()]);
    let error = connection
        .open(&ConnectionInitializer::new(negotiating()))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert!(error.to_string().starts_with("Exception authenticating Credential{"));
    match error {
        Error::Authentication {
            credential, source, ..
        } => {
            assert_eq!(credential.user_name(), Some("U"));
            assert_eq!(source.code(), Some(11));
        }
        other => panic!("Unexpected error: {other}"),
    }
    assert_eq!(connection.state(), ConnectionState::Failed);

    let connection = self::connection(vec![not_found()]);
    let error = connection
        .open(&ConnectionInitializer::new(Authenticator::None))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Server);
    assert_eq!(error.code(), Some(11));
}

#[test]
fn connection_cannot_be_initialized_twice() {
    let connection = connection(vec![Ok(reply(json!({"ok": 1, "connectionId": 1})))]);
    let initializer = ConnectionInitializer::new(Authenticator::None);

    connection.open(&initializer).unwrap();
    let error = connection.open(&initializer).unwrap_err();

    assert!(matches!(error, Error::General(_)));
    assert_eq!(connection.transport().sent().len(), 1);
}

#[tokio::test]
async fn concurrent_initialization_fails() {
    let gate = Arc::new(Notify::new());
    let connection = InternalConnection::new(
        ScriptedTransport::new(vec![Ok(reply(json!({"ok": 1, "connectionId": 1})))])
            .with_gate(gate.clone()),
        server_id(),
        None,
    );
    let first = ConnectionInitializer::new(Authenticator::None);
    let second = ConnectionInitializer::new(Authenticator::None);

    let (first, second, _) = tokio::join!(
        connection.open_async(&first),
        connection.open_async(&second),
        async { gate.notify_one() }
    );

    assert!(first.is_ok() != second.is_ok());
    assert!(matches!(
        first.err().or(second.err()),
        Some(Error::General(_))
    ));
    assert_eq!(connection.transport().sent().len(), 1);
    assert_eq!(connection.state(), ConnectionState::Ready);
}

#[test]
fn listeners_never_see_secrets() {
    let listener = Arc::new(RecordingListener::default());
    let connection = InternalConnection::new(
        ScriptedTransport::new(vec![
            Ok(reply(json!({
                "ok": 1,
                "speculativeAuthenticate": {"conversationId": 1, "done": false}
            }))),
            Ok(reply(json!({"ok": 1, "conversationId": 1, "done": true, "payload": "c2VjcmV0"}))),
            Ok(reply(json!({"ok": 1, "connectionId": 12}))),
        ]),
        server_id(),
        Some(listener.clone() as Arc<dyn CommandListener>),
    );

    connection.open(&ConnectionInitializer::new(speculative())).unwrap();

    let started = listener.started.lock().unwrap();
    let names: Vec<_> = started.iter().map(|event| event.command_name.as_str()).collect();
    assert_eq!(names, ["isMaster", "saslContinue", "getlasterror"]);
    assert!(started[0].command.is_empty());
    assert!(started[1].command.is_empty());
    assert_eq!(without_db(&started[2].command), json!({"getlasterror": 1}));
    assert!(started.iter().all(|event| event.database_name == "admin"));

    let succeeded = listener.succeeded.lock().unwrap();
    assert_eq!(succeeded.len(), 3);
    assert!(succeeded[0].reply.is_empty());
    assert!(succeeded[1].reply.is_empty());
    assert_eq!(succeeded[2].reply["connectionId"], json!(12));
    assert!(started
        .iter()
        .zip(succeeded.iter())
        .all(|(started, succeeded)| started.request_id == succeeded.request_id));
}

#[test]
fn listeners_see_failed_commands() {
    let listener = Arc::new(RecordingListener::default());
    let connection = InternalConnection::new(
        ScriptedTransport::new(vec![Err(Error::Timeout("handshake".into()))]),
        server_id(),
        Some(listener.clone() as Arc<dyn CommandListener>),
    );

    let error = connection
        .open(&ConnectionInitializer::new(Authenticator::None))
        .unwrap_err();

    assert!(error.is_transport());
    let failed = listener.failed.lock().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].command_name, "isMaster");
    assert!(failed[0].error.is_transport());
}
