//! This module contains the declaration of the [`CommandTransport`] trait, which is the seam
//! between the connection layer and a concrete byte stream (TCP, TLS, in-process test doubles).
//!
//! A transport sends one command document and returns the raw reply document. Encoding documents
//! to the wire format and applying negotiated compression are the transport's concern. Every
//! transport must support both execution modes:
//!
//! * [`CommandTransport::execute`] blocks the calling thread until the reply arrives,
//!
//! * [`CommandTransport::execute_async`] returns a future which may be polled on any executor
//!   thread.
use derive_more::Constructor;
use docdb_protocol::address::ServerAddress;
use docdb_protocol::document::Document;
use docdb_protocol::error::Result;
use std::sync::Arc;

use crate::future::BoxFuture;

/// General command transport trait.
pub trait CommandTransport: Send + Sync {
    /// Returns associated server address.
    fn address(&self) -> &ServerAddress;

    /// Sends a command and blocks until its reply is received.
    fn execute(&self, command: &Document) -> Result<Document>;

    /// Sends a command and waits for its reply without blocking.
    fn execute_async<'a>(&'a self, command: &'a Document) -> BoxFuture<'a, Result<Document>>;
}

impl<T: CommandTransport + ?Sized> CommandTransport for Box<T> {
    #[inline]
    fn address(&self) -> &ServerAddress {
        (**self).address()
    }

    #[inline]
    fn execute(&self, command: &Document) -> Result<Document> {
        (**self).execute(command)
    }

    #[inline]
    fn execute_async<'a>(&'a self, command: &'a Document) -> BoxFuture<'a, Result<Document>> {
        (**self).execute_async(command)
    }
}

impl<T: CommandTransport + ?Sized> CommandTransport for Arc<T> {
    #[inline]
    fn address(&self) -> &ServerAddress {
        (**self).address()
    }

    #[inline]
    fn execute(&self, command: &Document) -> Result<Document> {
        (**self).execute(command)
    }

    #[inline]
    fn execute_async<'a>(&'a self, command: &'a Document) -> BoxFuture<'a, Result<Document>> {
        (**self).execute_async(command)
    }
}

/// Opens transports to servers.
pub trait TransportFactory: Send + Sync {
    fn create(&self, address: &ServerAddress) -> Result<Box<dyn CommandTransport>>;

    fn create_async<'a>(
        &'a self,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, Result<Box<dyn CommandTransport>>>;
}

/// Transport factories used by a cluster: one for application connections and one for the
/// dedicated monitoring connections.
#[derive(Clone, Constructor)]
pub struct TransportFactories {
    pub application: Arc<dyn TransportFactory>,
    pub heartbeat: Arc<dyn TransportFactory>,
}

impl TransportFactories {
    /// Uses the same factory for both kinds of connections.
    pub fn shared(factory: Arc<dyn TransportFactory>) -> Self {
        TransportFactories {
            application: factory.clone(),
            heartbeat: factory,
        }
    }
}
