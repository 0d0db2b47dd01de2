//! Cluster topology selection. A cluster is created in one of three shapes, depending on the
//! connection mode and on whether servers are discovered through DNS:
//!
//! | mode | SRV host | cluster |
//! |---|---|---|
//! | single | - | [`SingleServerCluster`] |
//! | multiple | absent | [`MultiServerCluster`] |
//! | multiple | present | [`DnsMultiServerCluster`] |
//!
//! Any other mode is rejected. Every created cluster gets a fresh [`ClusterId`], shared by its
//! servers and its SRV monitor.
use derivative::Derivative;
use docdb_protocol::client_metadata::{client_metadata_document, DriverInformation};
use docdb_protocol::compression::Compressor;
use docdb_protocol::error::{Error, Result};
use docdb_protocol::server_api::ServerApi;
use std::sync::Arc;
use tracing::*;

use crate::auth::CredentialConfig;
use crate::cluster::dns::{
    DefaultDnsSrvRecordMonitorFactory, DnsClient, DnsSrvRecordMonitorFactory, HickoryDnsClient,
};
use crate::cluster::server_factory::{ConnectionContext, DefaultServerFactory, ServerFactory};
use crate::cluster::settings::{
    ClusterConnectionMode, ClusterSettings, ConnectionPoolSettings, ServerSettings,
};
use crate::cluster::topology::{
    Cluster, DnsMultiServerCluster, MultiServerCluster, ServerSet, SingleServerCluster,
};
use crate::cluster::ClusterId;
use crate::events::CommandListener;
use crate::transport::TransportFactories;

/// Everything a cluster is created from, besides the transport factories.
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct ClusterOptions {
    pub cluster_settings: ClusterSettings,
    pub server_settings: ServerSettings,
    pub pool_settings: ConnectionPoolSettings,
    pub credential: Option<CredentialConfig>,
    #[derivative(Debug = "ignore")]
    pub command_listener: Option<Arc<dyn CommandListener>>,
    pub application_name: Option<String>,
    pub driver_information: DriverInformation,
    pub compressors: Vec<Compressor>,
    pub server_api: Option<ServerApi>,
}

/// Creates clusters. DNS lookups for SRV-based clusters go through the configured client.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct DefaultClusterFactory {
    #[derivative(Debug = "ignore")]
    dns_client: Arc<dyn DnsClient>,
}

impl Default for DefaultClusterFactory {
    fn default() -> Self {
        DefaultClusterFactory::new(Arc::new(HickoryDnsClient::default()))
    }
}

impl DefaultClusterFactory {
    pub fn new(dns_client: Arc<dyn DnsClient>) -> Self {
        DefaultClusterFactory { dns_client }
    }

    /// Creates a cluster. SRV-based clusters start their monitor immediately, which needs a
    /// running tokio runtime.
    pub fn create_cluster(
        &self,
        options: ClusterOptions,
        transport_factories: TransportFactories,
    ) -> Result<Cluster> {
        let ClusterOptions {
            cluster_settings,
            server_settings,
            pool_settings,
            credential,
            command_listener,
            application_name,
            driver_information,
            compressors,
            server_api,
        } = options;

        let cluster_id = ClusterId::new(cluster_settings.description().map(str::to_string));

        let client_metadata =
            client_metadata_document(application_name.as_deref(), &driver_information)?;
        let server_factory = Arc::new(DefaultServerFactory::new(
            cluster_id.clone(),
            server_settings,
            pool_settings,
            transport_factories,
            ConnectionContext {
                credential,
                command_listener,
                client_metadata,
                compressors,
                server_api,
            },
        ));
        let monitor_factory = DefaultDnsSrvRecordMonitorFactory::new(
            cluster_id.clone(),
            server_settings,
            self.dns_client.clone(),
        );

        Self::select_topology(cluster_id, cluster_settings, server_factory, &monitor_factory)
    }

    /// Picks the cluster shape for given settings.
    pub fn select_topology(
        cluster_id: ClusterId,
        cluster_settings: ClusterSettings,
        server_factory: Arc<dyn ServerFactory>,
        monitor_factory: &dyn DnsSrvRecordMonitorFactory,
    ) -> Result<Cluster> {
        let mode = cluster_settings.mode();

        match (mode, cluster_settings.srv_host()) {
            (ClusterConnectionMode::Single, _) => {
                debug!(%cluster_id, "Creating single server cluster.");
                Ok(Cluster::Single(SingleServerCluster::new(
                    cluster_id,
                    cluster_settings,
                    server_factory.as_ref(),
                )))
            }
            (ClusterConnectionMode::Multiple, None) => {
                debug!(%cluster_id, hosts = cluster_settings.hosts().len(), "Creating multi server cluster.");
                Ok(Cluster::Multi(MultiServerCluster::new(
                    cluster_id,
                    cluster_settings,
                    server_factory,
                )))
            }
            (ClusterConnectionMode::Multiple, Some(srv_host)) => {
                debug!(%cluster_id, %srv_host, "Creating DNS SRV based cluster.");

                let servers = Arc::new(ServerSet::new(cluster_id.clone(), server_factory, &[]));
                let monitor = monitor_factory.create(
                    srv_host,
                    cluster_settings.srv_service_name(),
                    cluster_settings.srv_max_hosts(),
                    servers.clone(),
                );
                monitor.start()?;

                Ok(Cluster::DnsMulti(DnsMultiServerCluster::new(
                    cluster_id,
                    cluster_settings,
                    servers,
                    monitor,
                )))
            }
            (mode, _) => Err(Error::Configuration(format!(
                "Unsupported cluster connection mode: {mode}"
            ))),
        }
    }
}
