//! Documents exchanged with the server.
//!
//! Command and reply documents are modelled as ordered JSON objects; the binary codec used on the
//! wire is supplied by the transport. Ordering matters, since the first key of a command document
//! is the command name.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::address::ServerAddress;
use crate::error::{Error, Result};

pub type Document = Map<String, Value>;

/// Creates a document containing a single `{name: 1}` entry, which is how commands start.
pub fn command_document(name: &str) -> Document {
    let mut document = Document::new();
    document.insert(name.to_string(), Value::from(1));
    document
}

/// Returns the command name, i.e. the first key of the document.
#[inline]
pub fn command_name(command: &Document) -> Option<&str> {
    command.keys().next().map(String::as_str)
}

/// Reads a number, accepting both integral and floating point representations.
pub fn get_i64(document: &Document, key: &str) -> Option<i64> {
    document
        .get(key)
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|value| value as i64)))
}

/// Reads a 32-bit integer. Fractional or out of range numbers are treated as absent.
pub fn get_i32(document: &Document, key: &str) -> Option<i32> {
    let value = document.get(key)?;
    let value = match value.as_i64() {
        Some(value) => value,
        None => {
            let value = value.as_f64()?;
            if !value.is_finite() || value.fract() != 0.0 {
                return None;
            }
            value as i64
        }
    };

    i32::try_from(value).ok()
}

/// Reads a boolean flag; numbers are treated as true when non-zero.
pub fn get_bool(document: &Document, key: &str) -> bool {
    match document.get(key) {
        Some(Value::Bool(value)) => *value,
        Some(Value::Number(value)) => value.as_f64().map(|value| value != 0.0).unwrap_or(false),
        _ => false,
    }
}

#[inline]
pub fn get_str<'a>(document: &'a Document, key: &str) -> Option<&'a str> {
    document.get(key).and_then(Value::as_str)
}

#[inline]
pub fn get_document<'a>(document: &'a Document, key: &str) -> Option<&'a Document> {
    document.get(key).and_then(Value::as_object)
}

/// Reads an array of strings, skipping non-string entries.
pub fn get_strings(document: &Document, key: &str) -> Vec<String> {
    document
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Checks the `ok` field of a reply.
pub fn is_ok(reply: &Document) -> bool {
    get_bool(reply, "ok")
}

/// Converts a reply with `ok: 0` into a server error.
pub fn check_reply(reply: Document, address: &ServerAddress) -> Result<Document> {
    if is_ok(&reply) {
        return Ok(reply);
    }

    Err(Error::Command {
        code: get_i32(&reply, "code").unwrap_or(-1),
        code_name: get_str(&reply, "codeName").unwrap_or_default().to_string(),
        message: get_str(&reply, "errmsg").unwrap_or_default().to_string(),
        address: address.clone(),
    })
}

/// Encodes binary data the way the document model carries it.
#[inline]
pub fn binary_value(data: &[u8]) -> Value {
    Value::String(STANDARD.encode(data))
}

/// Decodes binary data stored under `key`. A missing field is an empty payload.
pub fn get_binary(document: &Document, key: &str) -> Result<Vec<u8>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(data)) => STANDARD.decode(data).map_err(Into::into),
        Some(other) => Err(Error::Protocol(format!(
            "Expected binary data in '{key}', got: {other}"
        ))),
    }
}
