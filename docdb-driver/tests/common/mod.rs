#![allow(dead_code)]

use docdb_driver::address::ServerAddress;
use docdb_driver::authenticators::{
    AuthMechanism, Credential, SaslAuthenticator, SaslAuthenticatorProvider,
};
use docdb_driver::cluster::dns::DnsClient;
use docdb_driver::document::Document;
use docdb_driver::error::{Error, Result};
use docdb_driver::events::{
    CommandFailedEvent, CommandListener, CommandStartedEvent, CommandSucceededEvent,
};
use docdb_driver::future::BoxFuture;
use docdb_driver::transport::{CommandTransport, TransportFactory};
use futures::FutureExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn reply(value: Value) -> Document {
    match value {
        Value::Object(document) => document,
        other => panic!("Not a document: {other}"),
    }
}

/// Strips fields added by the command executor.
pub fn without_db(command: &Document) -> Value {
    let mut command = command.clone();
    command.remove("$db");
    Value::Object(command)
}

/// Transport answering commands with a fixed sequence of replies and recording what was sent.
pub struct ScriptedTransport {
    address: ServerAddress,
    replies: Mutex<VecDeque<Result<Document>>>,
    sent: Arc<Mutex<Vec<Document>>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new<I: IntoIterator<Item = Result<Document>>>(replies: I) -> Self {
        ScriptedTransport {
            address: ServerAddress::default(),
            replies: Mutex::new(replies.into_iter().collect()),
            sent: Default::default(),
            gate: None,
        }
    }

    pub fn with_address(mut self, address: ServerAddress) -> Self {
        self.address = address;
        self
    }

    /// Asynchronous sends wait for the gate to open before replying.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn sent(&self) -> Vec<Document> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_log(&self) -> Arc<Mutex<Vec<Document>>> {
        self.sent.clone()
    }

    fn next_reply(&self, command: &Document) -> Result<Document> {
        self.sent.lock().unwrap().push(command.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::General("No scripted reply left".into())))
    }
}

impl CommandTransport for ScriptedTransport {
    fn address(&self) -> &ServerAddress {
        &self.address
    }

    fn execute(&self, command: &Document) -> Result<Document> {
        self.next_reply(command)
    }

    fn execute_async<'a>(&'a self, command: &'a Document) -> BoxFuture<'a, Result<Document>> {
        async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            self.next_reply(command)
        }
        .boxed()
    }
}

/// Hands out scripted transports, each answering with the same replies.
pub struct ScriptedTransportFactory {
    replies: Vec<Result<Document>>,
    sent: Arc<Mutex<Vec<Document>>>,
}

impl ScriptedTransportFactory {
    pub fn new(replies: Vec<Result<Document>>) -> Self {
        ScriptedTransportFactory {
            replies,
            sent: Default::default(),
        }
    }

    pub fn sent(&self) -> Vec<Document> {
        self.sent.lock().unwrap().clone()
    }

    fn transport(&self, address: &ServerAddress) -> ScriptedTransport {
        let mut transport =
            ScriptedTransport::new(self.replies.clone()).with_address(address.clone());
        transport.sent = self.sent.clone();
        transport
    }
}

impl TransportFactory for ScriptedTransportFactory {
    fn create(&self, address: &ServerAddress) -> Result<Box<dyn CommandTransport>> {
        Ok(Box::new(self.transport(address)))
    }

    fn create_async<'a>(
        &'a self,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, Result<Box<dyn CommandTransport>>> {
        futures::future::ready(self.create(address)).boxed()
    }
}

/// Mechanism which sends `first`, answers every challenge with `next` and accepts any outcome.
pub struct TwoStepAuthenticator {
    mechanism: AuthMechanism,
}

impl SaslAuthenticator for TwoStepAuthenticator {
    fn mechanism(&self) -> AuthMechanism {
        self.mechanism
    }

    fn initial_response(&self) -> Result<Vec<u8>> {
        Ok(b"first".to_vec())
    }

    fn evaluate_challenge(&self, _challenge: &[u8]) -> Result<Vec<u8>> {
        Ok(b"next".to_vec())
    }

    fn handle_success(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct TwoStepProvider;

impl SaslAuthenticatorProvider for TwoStepProvider {
    fn create_authenticator(
        &self,
        mechanism: AuthMechanism,
        _credential: &Credential,
    ) -> Option<Box<dyn SaslAuthenticator + Send + Sync>> {
        Some(Box::new(TwoStepAuthenticator { mechanism }))
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub started: Mutex<Vec<CommandStartedEvent>>,
    pub succeeded: Mutex<Vec<CommandSucceededEvent>>,
    pub failed: Mutex<Vec<CommandFailedEvent>>,
}

impl CommandListener for RecordingListener {
    fn command_started(&self, event: &CommandStartedEvent) {
        self.started.lock().unwrap().push(event.clone());
    }

    fn command_succeeded(&self, event: &CommandSucceededEvent) {
        self.succeeded.lock().unwrap().push(event.clone());
    }

    fn command_failed(&self, event: &CommandFailedEvent) {
        self.failed.lock().unwrap().push(event.clone());
    }
}

/// DNS client returning fixed SRV targets.
pub struct StaticDnsClient {
    hosts: Vec<ServerAddress>,
    pub queried: Mutex<Vec<String>>,
}

impl StaticDnsClient {
    pub fn new(hosts: Vec<ServerAddress>) -> Self {
        StaticDnsClient {
            hosts,
            queried: Default::default(),
        }
    }
}

impl DnsClient for StaticDnsClient {
    fn resolve_srv<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<ServerAddress>>> {
        self.queried.lock().unwrap().push(name.to_string());
        futures::future::ready(Ok(self.hosts.clone())).boxed()
    }
}
