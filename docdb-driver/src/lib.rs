//! **docdb-driver** establishes and initializes connections to document database servers.
//!
//! ## Getting started
//!
//! A cluster is created from settings and a transport factory, which opens byte streams to
//! servers. Connections opened through a cluster's servers are fully initialized: the handshake
//! has been exchanged and the connection authenticated, if a credential was configured.
//!
//! ```no_run
//! use docdb_driver::cluster::{ClusterOptions, ClusterSettings, DefaultClusterFactory};
//! use docdb_driver::transport::{TransportFactories, TransportFactory};
//! use std::sync::Arc;
//!
//! fn connect(factory: Arc<dyn TransportFactory>) -> docdb_driver::Result<()> {
//!     let options = ClusterOptions {
//!         cluster_settings: ClusterSettings::builder().build()?,
//!         application_name: Some("inventory".into()),
//!         ..Default::default()
//!     };
//!
//!     let cluster = DefaultClusterFactory::default()
//!         .create_cluster(options, TransportFactories::shared(factory))?;
//!
//!     for server in cluster.servers() {
//!         let (_connection, description) = server.open_connection()?;
//!         println!("{:?}", description.server_description.server_type());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Execution modes
//!
//! Every operation which talks to a server exists in a blocking and a suspending form. Both
//! forms send the same commands in the same order and produce equal results.

pub mod auth;
pub mod cluster;
pub mod connection;
pub mod events;
pub mod future;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use docdb_protocol::address;
pub use docdb_protocol::authenticators;
pub use docdb_protocol::client_metadata;
pub use docdb_protocol::command;
pub use docdb_protocol::compression;
pub use docdb_protocol::document;
pub use docdb_protocol::error;
pub use docdb_protocol::server_api;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
