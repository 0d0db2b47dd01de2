use arc_swap::{ArcSwap, ArcSwapOption};
use derivative::Derivative;
use docdb_protocol::address::ServerAddress;
use docdb_protocol::error::Error;
use itertools::Itertools;
use std::sync::Arc;
use tracing::*;

use crate::cluster::dns::{DnsSrvRecordInitializer, DnsSrvRecordMonitor};
use crate::cluster::server_factory::{Server, ServerFactory};
use crate::cluster::settings::ClusterSettings;
use crate::cluster::ClusterId;

/// Current servers of a cluster. Updates replace the whole list; servers whose address is still
/// present are kept, so their connections survive.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ServerSet {
    cluster_id: ClusterId,
    #[derivative(Debug = "ignore")]
    server_factory: Arc<dyn ServerFactory>,
    servers: ArcSwap<Vec<Arc<Server>>>,
    srv_resolution_error: ArcSwapOption<Error>,
}

impl ServerSet {
    pub fn new(
        cluster_id: ClusterId,
        server_factory: Arc<dyn ServerFactory>,
        hosts: &[ServerAddress],
    ) -> Self {
        let servers = hosts
            .iter()
            .unique()
            .map(|address| server_factory.create(address.clone()))
            .collect();

        ServerSet {
            cluster_id,
            server_factory,
            servers: ArcSwap::from_pointee(servers),
            srv_resolution_error: ArcSwapOption::empty(),
        }
    }

    #[inline]
    pub fn servers(&self) -> Arc<Vec<Arc<Server>>> {
        self.servers.load_full()
    }

    pub fn server(&self, address: &ServerAddress) -> Option<Arc<Server>> {
        self.servers
            .load()
            .iter()
            .find(|server| server.address() == address)
            .cloned()
    }

    /// Replaces the server list with servers for given hosts.
    pub fn update(&self, hosts: Vec<ServerAddress>) {
        let current = self.servers.load_full();
        let servers = hosts
            .into_iter()
            .unique()
            .map(|address| {
                current
                    .iter()
                    .find(|server| *server.address() == address)
                    .cloned()
                    .unwrap_or_else(|| self.server_factory.create(address))
            })
            .collect_vec();

        for removed in current
            .iter()
            .filter(|server| !servers.iter().any(|kept| kept.address() == server.address()))
        {
            debug!(cluster_id = %self.cluster_id, address = %removed.address(), "Removing server.");
        }

        self.servers.store(Arc::new(servers));
    }

    /// Error from resolving SRV records, if no hosts could be resolved.
    #[inline]
    pub fn srv_resolution_error(&self) -> Option<Error> {
        self.srv_resolution_error
            .load()
            .as_ref()
            .map(|error| error.as_ref().clone())
    }
}

impl DnsSrvRecordInitializer for ServerSet {
    fn initialize(&self, hosts: Vec<ServerAddress>) {
        self.srv_resolution_error.store(None);
        self.update(hosts);
    }

    fn initialize_error(&self, error: Error) {
        self.srv_resolution_error.store(Some(Arc::new(error)));
    }
}

/// Cluster connected directly to one server.
#[derive(Debug)]
pub struct SingleServerCluster {
    cluster_id: ClusterId,
    settings: ClusterSettings,
    server: Arc<Server>,
}

impl SingleServerCluster {
    pub fn new(
        cluster_id: ClusterId,
        settings: ClusterSettings,
        server_factory: &dyn ServerFactory,
    ) -> Self {
        let address = settings.hosts().first().cloned().unwrap_or_default();
        SingleServerCluster {
            cluster_id,
            server: server_factory.create(address),
            settings,
        }
    }

    #[inline]
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

/// Cluster of statically configured seed servers.
#[derive(Debug)]
pub struct MultiServerCluster {
    cluster_id: ClusterId,
    settings: ClusterSettings,
    servers: Arc<ServerSet>,
}

impl MultiServerCluster {
    pub fn new(
        cluster_id: ClusterId,
        settings: ClusterSettings,
        server_factory: Arc<dyn ServerFactory>,
    ) -> Self {
        MultiServerCluster {
            servers: Arc::new(ServerSet::new(
                cluster_id.clone(),
                server_factory,
                settings.hosts(),
            )),
            cluster_id,
            settings,
        }
    }

    #[inline]
    pub fn server_set(&self) -> &Arc<ServerSet> {
        &self.servers
    }
}

/// Cluster whose servers come from DNS SRV records. Starts empty and is filled in by the SRV
/// monitor, which stops when the cluster is dropped.
#[derive(Debug)]
pub struct DnsMultiServerCluster {
    cluster_id: ClusterId,
    settings: ClusterSettings,
    servers: Arc<ServerSet>,
    monitor: DnsSrvRecordMonitor,
}

impl DnsMultiServerCluster {
    pub fn new(
        cluster_id: ClusterId,
        settings: ClusterSettings,
        servers: Arc<ServerSet>,
        monitor: DnsSrvRecordMonitor,
    ) -> Self {
        DnsMultiServerCluster {
            cluster_id,
            settings,
            servers,
            monitor,
        }
    }

    #[inline]
    pub fn server_set(&self) -> &Arc<ServerSet> {
        &self.servers
    }

    #[inline]
    pub fn monitor(&self) -> &DnsSrvRecordMonitor {
        &self.monitor
    }
}

/// Topology variants.
#[derive(Debug)]
pub enum Cluster {
    Single(SingleServerCluster),
    Multi(MultiServerCluster),
    DnsMulti(DnsMultiServerCluster),
}

impl Cluster {
    pub fn cluster_id(&self) -> &ClusterId {
        match self {
            Cluster::Single(cluster) => &cluster.cluster_id,
            Cluster::Multi(cluster) => &cluster.cluster_id,
            Cluster::DnsMulti(cluster) => &cluster.cluster_id,
        }
    }

    pub fn settings(&self) -> &ClusterSettings {
        match self {
            Cluster::Single(cluster) => &cluster.settings,
            Cluster::Multi(cluster) => &cluster.settings,
            Cluster::DnsMulti(cluster) => &cluster.settings,
        }
    }

    /// Snapshot of the current servers.
    pub fn servers(&self) -> Vec<Arc<Server>> {
        match self {
            Cluster::Single(cluster) => vec![cluster.server.clone()],
            Cluster::Multi(cluster) => cluster.servers.servers().to_vec(),
            Cluster::DnsMulti(cluster) => cluster.servers.servers().to_vec(),
        }
    }

    pub fn server(&self, address: &ServerAddress) -> Option<Arc<Server>> {
        match self {
            Cluster::Single(cluster) => {
                (cluster.server.address() == address).then(|| cluster.server.clone())
            }
            Cluster::Multi(cluster) => cluster.servers.server(address),
            Cluster::DnsMulti(cluster) => cluster.servers.server(address),
        }
    }
}
