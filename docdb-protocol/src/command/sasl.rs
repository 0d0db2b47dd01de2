//! SASL conversation commands: `saslStart` opens a conversation, `saslContinue` carries each
//! following step until the server reports it is done.
use serde_json::{json, Value};

use crate::authenticators::AuthMechanism;
use crate::document::{binary_value, command_document, get_binary, get_bool, Document};
use crate::error::{Error, Result};

pub const SASL_START: &str = "saslStart";
pub const SASL_CONTINUE: &str = "saslContinue";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaslStart {
    mechanism: AuthMechanism,
    payload: Vec<u8>,
    database: Option<String>,
}

impl SaslStart {
    pub fn new(mechanism: AuthMechanism, payload: Vec<u8>) -> Self {
        SaslStart {
            mechanism,
            payload,
            database: None,
        }
    }

    /// Names the database explicitly. Required when the command travels inside a handshake,
    /// since it is not sent to the source database directly.
    pub fn with_database<S: ToString>(mut self, database: S) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn into_document(self) -> Document {
        let mut command = command_document(SASL_START);
        command.insert("mechanism".into(), Value::from(self.mechanism.as_str()));
        command.insert("payload".into(), binary_value(&self.payload));

        if self.mechanism.supports_speculative_authentication() {
            command.insert("options".into(), json!({ "skipEmptyExchange": true }));
        }

        if let Some(database) = self.database {
            command.insert("db".into(), Value::from(database));
        }

        command
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaslContinue {
    conversation_id: Value,
    payload: Vec<u8>,
}

impl SaslContinue {
    pub fn new(conversation_id: Value, payload: Vec<u8>) -> Self {
        SaslContinue {
            conversation_id,
            payload,
        }
    }

    pub fn into_document(self) -> Document {
        let mut command = command_document(SASL_CONTINUE);
        command.insert("conversationId".into(), self.conversation_id);
        command.insert("payload".into(), binary_value(&self.payload));
        command
    }
}

/// Server reply to either conversation command.
#[derive(Clone, Debug, PartialEq)]
pub struct SaslReply {
    pub conversation_id: Value,
    pub done: bool,
    pub payload: Vec<u8>,
}

impl SaslReply {
    pub fn from_document(reply: &Document) -> Result<Self> {
        let conversation_id = reply
            .get("conversationId")
            .cloned()
            .ok_or_else(|| Error::Protocol("SASL reply is missing 'conversationId'".into()))?;

        Ok(SaslReply {
            conversation_id,
            done: get_bool(reply, "done"),
            payload: get_binary(reply, "payload")?,
        })
    }
}
