use docdb_protocol::document::{check_reply, Document};
use docdb_protocol::error::Result;
use docdb_protocol::server_api::ServerApi;
use serde_json::Value;

use crate::transport::CommandTransport;

pub const DATABASE_FIELD: &str = "$db";

/// Adds the target database and the declared server API to a command.
pub fn prepare_command(
    mut command: Document,
    database: &str,
    server_api: Option<&ServerApi>,
) -> Document {
    command.insert(DATABASE_FIELD.into(), Value::from(database));

    if let Some(server_api) = server_api {
        server_api.append_to(&mut command);
    }

    command
}

/// Runs a command and blocks until its reply is received. Replies with `ok: 0` become
/// [`Error::Command`](docdb_protocol::error::Error::Command).
pub fn execute_command<T: CommandTransport + ?Sized>(
    transport: &T,
    database: &str,
    command: Document,
    server_api: Option<&ServerApi>,
) -> Result<Document> {
    let command = prepare_command(command, database, server_api);
    let reply = transport.execute(&command)?;
    check_reply(reply, transport.address())
}

/// Suspending counterpart of [`execute_command`].
pub async fn execute_command_async<T: CommandTransport + ?Sized>(
    transport: &T,
    database: &str,
    command: Document,
    server_api: Option<&ServerApi>,
) -> Result<Document> {
    let command = prepare_command(command, database, server_api);
    let reply = transport.execute_async(&command).await?;
    check_reply(reply, transport.address())
}
