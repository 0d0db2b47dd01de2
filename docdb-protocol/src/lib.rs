//! Protocol-level vocabulary of the document database driver: documents and the commands used to
//! establish connections, credentials and SASL mechanism seams, compressors, server API
//! declarations, client metadata and the error taxonomy shared by the whole driver.

pub mod address;
pub mod authenticators;
pub mod client_metadata;
pub mod command;
pub mod compression;
pub mod document;
pub mod error;
pub mod server_api;

pub use crate::document::Document;
pub use crate::error::{Error, ErrorKind, Result};
