//! DNS SRV discovery. The cluster members are listed in the SRV records of
//! `_<service>._tcp.<srv host>`; the records are polled periodically and every change is reported
//! to the cluster, which reconciles its server set.
#[cfg(test)]
use mockall::automock;

use derivative::Derivative;
use docdb_protocol::address::ServerAddress;
use docdb_protocol::error::{Error, Result};
use futures::FutureExt;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::*;

use crate::cluster::settings::ServerSettings;
use crate::cluster::ClusterId;
use crate::future::BoxFuture;

/// Resolves SRV records.
pub trait DnsClient: Send + Sync {
    /// Returns the targets of all SRV records of `name`, without any validation.
    fn resolve_srv<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<ServerAddress>>>;
}

pub type TokioResolver = Resolver<TokioConnectionProvider>;

/// [`DnsClient`] using the system resolver configuration.
#[derive(Clone)]
pub struct HickoryDnsClient {
    resolver: Arc<TokioResolver>,
}

impl Default for HickoryDnsClient {
    fn default() -> Self {
        HickoryDnsClient::new(ResolverConfig::default())
    }
}

impl HickoryDnsClient {
    pub fn new(config: ResolverConfig) -> Self {
        let resolver =
            Resolver::builder_with_config(config, TokioConnectionProvider::default()).build();
        HickoryDnsClient {
            resolver: Arc::new(resolver),
        }
    }
}

impl DnsClient for HickoryDnsClient {
    fn resolve_srv<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<ServerAddress>>> {
        async move {
            let response = self.resolver.srv_lookup(name).await.map_err(|error| {
                Error::Configuration(format!("Failed looking up SRV record for '{name}': {error}"))
            })?;

            Ok(response
                .iter()
                .filter_map(|srv| {
                    let target = srv.target().to_utf8();
                    let host = target.trim_end_matches('.');
                    (!host.is_empty()).then(|| ServerAddress::new(host, srv.port()))
                })
                .collect())
        }
        .boxed()
    }
}

/// Name queried for the SRV records of a cluster.
#[inline]
pub fn srv_record_name(srv_host: &str, srv_service_name: &str) -> String {
    format!("_{srv_service_name}._tcp.{srv_host}")
}

/// Checks that every resolved host belongs to the parent domain of the SRV host. The SRV host
/// itself needs at least three labels, so the parent domain is never a top-level domain.
pub fn validate_srv_hosts(srv_host: &str, hosts: Vec<ServerAddress>) -> Result<Vec<ServerAddress>> {
    let srv_host = srv_host.trim_end_matches('.').to_lowercase();
    let Some((_, parent_domain)) = srv_host
        .split_once('.')
        .filter(|(_, parent)| parent.contains('.'))
    else {
        return Err(Error::Configuration(format!(
            "An SRV host name must contain at least three labels: {srv_host}"
        )));
    };

    if hosts.is_empty() {
        return Err(Error::Configuration(format!(
            "No SRV records available for host {srv_host}"
        )));
    }

    let suffix = format!(".{parent_domain}");
    if let Some(host) = hosts.iter().find(|host| !host.host().ends_with(&suffix)) {
        return Err(Error::Configuration(format!(
            "The SRV host name '{srv_host}' resolved to a host '{host}' that is not in a sub-domain of the SRV host."
        )));
    }

    Ok(hosts)
}

/// Picks at most `srv_max_hosts` hosts at random. Zero means no limit.
pub fn select_srv_hosts(mut hosts: Vec<ServerAddress>, srv_max_hosts: usize) -> Vec<ServerAddress> {
    if srv_max_hosts == 0 || hosts.len() <= srv_max_hosts {
        return hosts;
    }

    hosts.shuffle(&mut rand::rng());
    hosts.truncate(srv_max_hosts);
    hosts
}

/// Receives the results of SRV polling.
#[cfg_attr(test, automock)]
pub trait DnsSrvRecordInitializer: Send + Sync {
    /// Called with the current hosts whenever they change.
    fn initialize(&self, hosts: Vec<ServerAddress>);

    /// Called if the records could not be resolved before any hosts were known.
    fn initialize_error(&self, error: Error);
}

/// Polls SRV records of one cluster on a background task. The task stops when the monitor is
/// closed or dropped.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DnsSrvRecordMonitor {
    cluster_id: ClusterId,
    srv_host: String,
    srv_service_name: String,
    srv_max_hosts: usize,
    rescan_frequency: Duration,
    #[derivative(Debug = "ignore")]
    dns_client: Arc<dyn DnsClient>,
    #[derivative(Debug = "ignore")]
    initializer: Arc<dyn DnsSrvRecordInitializer>,
    #[derivative(Debug = "ignore")]
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DnsSrvRecordMonitor {
    #[inline]
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    #[inline]
    pub fn srv_host(&self) -> &str {
        &self.srv_host
    }

    /// Starts polling on the current tokio runtime.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|error| {
            Error::Configuration(format!("SRV monitoring requires a tokio runtime: {error}"))
        })?;

        let mut handle = self
            .handle
            .lock()
            .map_err(|_| Error::General("SRV monitor state is poisoned".into()))?;
        if handle.is_some() {
            return Ok(());
        }

        debug!(cluster_id = %self.cluster_id, srv_host = %self.srv_host, "Starting SRV monitor.");

        *handle = Some(runtime.spawn(poll_srv_records(
            self.cluster_id.clone(),
            self.srv_host.clone(),
            srv_record_name(&self.srv_host, &self.srv_service_name),
            self.srv_max_hosts,
            self.rescan_frequency,
            self.dns_client.clone(),
            self.initializer.clone(),
        )));

        Ok(())
    }

    pub fn close(&self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for DnsSrvRecordMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

async fn resolve_hosts(
    dns_client: &dyn DnsClient,
    srv_host: &str,
    record_name: &str,
) -> Result<Vec<ServerAddress>> {
    let mut hosts = validate_srv_hosts(srv_host, dns_client.resolve_srv(record_name).await?)?;
    hosts.sort();
    hosts.dedup();
    Ok(hosts)
}

async fn poll_srv_records(
    cluster_id: ClusterId,
    srv_host: String,
    record_name: String,
    srv_max_hosts: usize,
    rescan_frequency: Duration,
    dns_client: Arc<dyn DnsClient>,
    initializer: Arc<dyn DnsSrvRecordInitializer>,
) {
    let mut current: Option<Vec<ServerAddress>> = None;

    loop {
        match resolve_hosts(dns_client.as_ref(), &srv_host, &record_name).await {
            Ok(hosts) if current.as_ref() != Some(&hosts) => {
                debug!(%cluster_id, count = hosts.len(), "SRV records changed.");
                initializer.initialize(select_srv_hosts(hosts.clone(), srv_max_hosts));
                current = Some(hosts);
            }
            Ok(_) => {}
            Err(error) if current.is_none() => {
                warn!(%cluster_id, %error, "Initial SRV lookup failed.");
                initializer.initialize_error(error);
            }
            Err(error) => {
                warn!(%cluster_id, %error, "SRV lookup failed. Keeping previous hosts.");
            }
        }

        sleep(rescan_frequency).await;
    }
}

/// Creates SRV monitors for one cluster.
pub trait DnsSrvRecordMonitorFactory: Send + Sync {
    fn create(
        &self,
        srv_host: &str,
        srv_service_name: &str,
        srv_max_hosts: usize,
        initializer: Arc<dyn DnsSrvRecordInitializer>,
    ) -> DnsSrvRecordMonitor;
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct DefaultDnsSrvRecordMonitorFactory {
    cluster_id: ClusterId,
    server_settings: ServerSettings,
    #[derivative(Debug = "ignore")]
    dns_client: Arc<dyn DnsClient>,
}

impl DefaultDnsSrvRecordMonitorFactory {
    pub fn new(
        cluster_id: ClusterId,
        server_settings: ServerSettings,
        dns_client: Arc<dyn DnsClient>,
    ) -> Self {
        DefaultDnsSrvRecordMonitorFactory {
            cluster_id,
            server_settings,
            dns_client,
        }
    }

    #[inline]
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }
}

impl DnsSrvRecordMonitorFactory for DefaultDnsSrvRecordMonitorFactory {
    fn create(
        &self,
        srv_host: &str,
        srv_service_name: &str,
        srv_max_hosts: usize,
        initializer: Arc<dyn DnsSrvRecordInitializer>,
    ) -> DnsSrvRecordMonitor {
        DnsSrvRecordMonitor {
            cluster_id: self.cluster_id.clone(),
            srv_host: srv_host.to_string(),
            srv_service_name: srv_service_name.to_string(),
            srv_max_hosts,
            rescan_frequency: self.server_settings.heartbeat_frequency(),
            dns_client: self.dns_client.clone(),
            initializer,
            handle: Mutex::new(None),
        }
    }
}
