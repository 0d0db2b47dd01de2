use arc_swap::{ArcSwap, ArcSwapOption};
use atomic::Atomic;
use bytemuck::NoUninit;
use derive_more::Display;
use docdb_protocol::address::ServerAddress;
use docdb_protocol::document::{command_name, get_str, Document};
use docdb_protocol::error::{Error, Result};
use futures::FutureExt;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::*;

use crate::connection::command::DATABASE_FIELD;
use crate::connection::description::{
    ConnectionDescription, InitializationDescription, ServerDescription, ServerId,
};
use crate::connection::initializer::ConnectionInitializer;
use crate::events::{
    next_request_id, redact, should_redact, CommandFailedEvent, CommandListener,
    CommandStartedEvent, CommandSucceededEvent,
};
use crate::future::BoxFuture;
use crate::transport::CommandTransport;

/// Lifecycle of a connection, as seen by the driver.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, NoUninit)]
#[repr(u8)]
pub enum ConnectionState {
    /// Transport is open, but the handshake has not started.
    Uninitialized,
    /// Handshake or authentication is in progress.
    Initializing,
    /// Connection can be used for application commands.
    Ready,
    /// Initialization failed. The connection should be closed.
    Failed,
}

/// Connection owning a transport and the description learned while initializing it. Commands
/// sent through the connection are reported to the command listener, if there is one.
pub struct InternalConnection<T: CommandTransport> {
    transport: T,
    description: ArcSwap<ConnectionDescription>,
    server_description: ArcSwapOption<ServerDescription>,
    state: Atomic<ConnectionState>,
    listener: Option<Arc<dyn CommandListener>>,
}

impl<T: CommandTransport> Debug for InternalConnection<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalConnection")
            .field("description", &self.description)
            .field("server_description", &self.server_description)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: CommandTransport> InternalConnection<T> {
    pub fn new(transport: T, server_id: ServerId, listener: Option<Arc<dyn CommandListener>>) -> Self {
        InternalConnection {
            transport,
            description: ArcSwap::from_pointee(ConnectionDescription::new(server_id)),
            server_description: ArcSwapOption::empty(),
            state: Atomic::new(ConnectionState::Uninitialized),
            listener,
        }
    }

    #[inline]
    pub fn description(&self) -> Arc<ConnectionDescription> {
        self.description.load_full()
    }

    /// Server description from the handshake, once initialization succeeded.
    #[inline]
    pub fn server_description(&self) -> Option<Arc<ServerDescription>> {
        self.server_description.load_full()
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.load(Ordering::Acquire)
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn begin_initialization(&self) -> Result<()> {
        self.state
            .compare_exchange(
                ConnectionState::Uninitialized,
                ConnectionState::Initializing,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|state| {
                Error::General(format!(
                    "Cannot initialize {}: connection is {state}",
                    self.description.load().connection_id()
                ))
            })
    }

    fn finish_initialization(
        &self,
        result: Result<InitializationDescription>,
    ) -> Result<InitializationDescription> {
        match &result {
            Ok(description) => {
                self.description
                    .store(Arc::new(description.connection_description.clone()));
                self.server_description
                    .store(Some(Arc::new(description.server_description.clone())));
                self.state.store(ConnectionState::Ready, Ordering::Release);
                debug!(
                    connection = %description.connection_description.connection_id(),
                    server_type = %description.connection_description.server_type(),
                    "Connection ready."
                );
            }
            Err(error) => {
                self.state.store(ConnectionState::Failed, Ordering::Release);
                error!(
                    %error,
                    address = %self.transport.address(),
                    "Connection initialization failed."
                );
            }
        }

        result
    }

    /// Runs the handshake, blocking the current thread. Only one initialization may ever run on
    /// a given connection.
    pub fn open(&self, initializer: &ConnectionInitializer) -> Result<InitializationDescription> {
        self.begin_initialization()?;
        self.finish_initialization(initializer.initialize(self))
    }

    pub async fn open_async(
        &self,
        initializer: &ConnectionInitializer,
    ) -> Result<InitializationDescription> {
        self.begin_initialization()?;
        let result = initializer.initialize_async(self).await;
        self.finish_initialization(result)
    }

    fn command_started(&self, command: &Document) -> Option<(i32, String, bool, Instant)> {
        let listener = self.listener.as_ref()?;
        let request_id = next_request_id();
        let name = command_name(command).unwrap_or_default().to_string();
        let sensitive = should_redact(command);

        listener.command_started(&CommandStartedEvent {
            connection_id: self.description.load().connection_id().clone(),
            request_id,
            database_name: get_str(command, DATABASE_FIELD)
                .unwrap_or_default()
                .to_string(),
            command_name: name.clone(),
            command: redact(command, sensitive),
        });

        Some((request_id, name, sensitive, Instant::now()))
    }

    fn command_finished(
        &self,
        started: Option<(i32, String, bool, Instant)>,
        result: &Result<Document>,
    ) {
        let (Some(listener), Some((request_id, command_name, sensitive, start))) =
            (self.listener.as_ref(), started)
        else {
            return;
        };

        let connection_id = self.description.load().connection_id().clone();
        let elapsed = start.elapsed();

        match result {
            Ok(reply) => listener.command_succeeded(&CommandSucceededEvent {
                connection_id,
                request_id,
                command_name,
                reply: redact(reply, sensitive),
                elapsed,
            }),
            Err(error) => listener.command_failed(&CommandFailedEvent {
                connection_id,
                request_id,
                command_name,
                error: error.clone(),
                elapsed,
            }),
        }
    }
}

impl<T: CommandTransport> CommandTransport for InternalConnection<T> {
    #[inline]
    fn address(&self) -> &ServerAddress {
        self.transport.address()
    }

    fn execute(&self, command: &Document) -> Result<Document> {
        trace!(command = command_name(command), address = %self.address(), "Sending command.");

        let started = self.command_started(command);
        let result = self.transport.execute(command);
        self.command_finished(started, &result);
        result
    }

    fn execute_async<'a>(&'a self, command: &'a Document) -> BoxFuture<'a, Result<Document>> {
        async move {
            trace!(command = command_name(command), address = %self.address(), "Sending command.");

            let started = self.command_started(command);
            let result = self.transport.execute_async(command).await;
            self.command_finished(started, &result);
            result
        }
        .boxed()
    }
}
