//! Command monitoring. Listeners observe every command sent over an initialized or initializing
//! connection, including the handshake and authentication conversation. Bodies of commands which
//! may carry secrets are replaced with empty documents before listeners see them.
#[cfg(test)]
use mockall::automock;

use docdb_protocol::command::is_security_sensitive;
use docdb_protocol::document::Document;
use docdb_protocol::error::Error;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use crate::connection::ConnectionId;

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

/// Returns the next process-wide request id.
#[inline]
pub fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandStartedEvent {
    pub connection_id: ConnectionId,
    pub request_id: i32,
    pub database_name: String,
    pub command_name: String,
    pub command: Document,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandSucceededEvent {
    pub connection_id: ConnectionId,
    pub request_id: i32,
    pub command_name: String,
    pub reply: Document,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct CommandFailedEvent {
    pub connection_id: ConnectionId,
    pub request_id: i32,
    pub command_name: String,
    pub error: Error,
    pub elapsed: Duration,
}

/// Receives command events. All methods default to doing nothing.
#[cfg_attr(test, automock)]
pub trait CommandListener: Send + Sync {
    fn command_started(&self, _event: &CommandStartedEvent) {}

    fn command_succeeded(&self, _event: &CommandSucceededEvent) {}

    fn command_failed(&self, _event: &CommandFailedEvent) {}
}

/// Returns the document as listeners may see it.
pub fn redact(command: &Document, sensitive: bool) -> Document {
    if sensitive {
        Document::new()
    } else {
        command.clone()
    }
}

/// Checks if the command, or the reply to it, has to be hidden from listeners.
#[inline]
pub fn should_redact(command: &Document) -> bool {
    is_security_sensitive(command)
}
