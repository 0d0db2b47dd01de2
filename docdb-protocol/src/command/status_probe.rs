//! Legacy status probe, used to learn the server-assigned connection id from servers which do
//! not report it in the handshake reply.
use crate::document::{command_document, get_i64, Document};

pub const GET_LAST_ERROR: &str = "getlasterror";
pub const CONNECTION_ID: &str = "connectionId";

pub fn status_probe_command() -> Document {
    command_document(GET_LAST_ERROR)
}

/// Reads the server-assigned connection id from a handshake or status probe reply.
#[inline]
pub fn connection_id_from_reply(reply: &Document) -> Option<i64> {
    get_i64(reply, CONNECTION_ID)
}
