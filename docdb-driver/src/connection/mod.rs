pub mod command;
mod description;
mod initializer;
mod internal_connection;

pub use crate::connection::description::{
    ConnectionDescription, ConnectionId, InitializationDescription, ServerDescription, ServerId,
    ServerType, DEFAULT_MAX_DOCUMENT_SIZE, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_WRITE_BATCH_SIZE,
};
pub use crate::connection::initializer::ConnectionInitializer;
pub use crate::connection::internal_connection::{ConnectionState, InternalConnection};
