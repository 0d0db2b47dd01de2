use docdb_protocol::address::ServerAddress;
use docdb_protocol::document::Document;
use docdb_protocol::error::{Error, Result};
use futures::FutureExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::future::BoxFuture;
use crate::transport::CommandTransport;

pub fn reply(value: Value) -> Document {
    match value {
        Value::Object(document) => document,
        other => panic!("Not a document: {other}"),
    }
}

/// Transport answering commands with a fixed sequence of replies.
pub struct ScriptedTransport {
    address: ServerAddress,
    replies: Mutex<VecDeque<Result<Document>>>,
    sent: Mutex<Vec<Document>>,
}

impl ScriptedTransport {
    pub fn new<I: IntoIterator<Item = Result<Document>>>(replies: I) -> Self {
        ScriptedTransport {
            address: ServerAddress::default(),
            replies: Mutex::new(replies.into_iter().collect()),
            sent: Default::default(),
        }
    }

    pub fn sent(&self) -> Vec<Document> {
        self.sent.lock().unwrap().clone()
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
        async move { self.next_reply(command) }.boxed()
    }
}
