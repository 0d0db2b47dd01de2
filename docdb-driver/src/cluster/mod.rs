mod cluster_id;
pub mod dns;
mod factory;
mod server_factory;
mod settings;
mod topology;

pub use crate::cluster::cluster_id::ClusterId;
pub use crate::cluster::factory::{ClusterOptions, DefaultClusterFactory};
pub use crate::cluster::server_factory::{
    ConnectionContext, DefaultServerFactory, Server, ServerConnection, ServerFactory,
};
pub use crate::cluster::settings::{
    ClusterConnectionMode, ClusterSettings, ClusterSettingsBuilder, ConnectionPoolSettings,
    ServerSettings, DEFAULT_SRV_SERVICE_NAME,
};
pub use crate::cluster::topology::{
    Cluster, DnsMultiServerCluster, MultiServerCluster, ServerSet, SingleServerCluster,
};
