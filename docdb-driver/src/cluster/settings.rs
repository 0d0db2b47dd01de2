use derive_more::Display;
use docdb_protocol::address::ServerAddress;
use docdb_protocol::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_SRV_SERVICE_NAME: &str = "mongodb";

/// How the driver treats the configured hosts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ClusterConnectionMode {
    /// Connect directly to one server.
    Single,
    /// Discover and monitor a replica set or a set of routers.
    Multiple,
    /// Connect through a load balancer.
    LoadBalanced,
}

/// Cluster-wide settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterSettings {
    hosts: Vec<ServerAddress>,
    mode: ClusterConnectionMode,
    srv_host: Option<String>,
    srv_service_name: String,
    srv_max_hosts: usize,
    required_replica_set_name: Option<String>,
    description: Option<String>,
}

impl ClusterSettings {
    pub fn builder() -> ClusterSettingsBuilder {
        ClusterSettingsBuilder::new()
    }

    #[inline]
    pub fn hosts(&self) -> &[ServerAddress] {
        &self.hosts
    }

    #[inline]
    pub fn mode(&self) -> ClusterConnectionMode {
        self.mode
    }

    /// Host whose SRV records list the cluster members.
    #[inline]
    pub fn srv_host(&self) -> Option<&str> {
        self.srv_host.as_deref()
    }

    #[inline]
    pub fn srv_service_name(&self) -> &str {
        &self.srv_service_name
    }

    /// Upper bound on the number of hosts taken from SRV records. Zero means no limit.
    #[inline]
    pub fn srv_max_hosts(&self) -> usize {
        self.srv_max_hosts
    }

    #[inline]
    pub fn required_replica_set_name(&self) -> Option<&str> {
        self.required_replica_set_name.as_deref()
    }

    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        ClusterSettings {
            hosts: vec![ServerAddress::default()],
            mode: ClusterConnectionMode::Single,
            srv_host: None,
            srv_service_name: DEFAULT_SRV_SERVICE_NAME.into(),
            srv_max_hosts: 0,
            required_replica_set_name: None,
            description: None,
        }
    }
}

/// Builder structure that helps to configure a cluster.
#[derive(Clone, Debug, Default)]
pub struct ClusterSettingsBuilder {
    hosts: Vec<ServerAddress>,
    mode: Option<ClusterConnectionMode>,
    srv_host: Option<String>,
    srv_service_name: Option<String>,
    srv_max_hosts: usize,
    required_replica_set_name: Option<String>,
    description: Option<String>,
}

impl ClusterSettingsBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds server address.
    pub fn with_host(mut self, host: ServerAddress) -> Self {
        self.hosts.push(host);
        self
    }

    /// Replaces all server addresses.
    pub fn with_hosts(mut self, hosts: Vec<ServerAddress>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_mode(mut self, mode: ClusterConnectionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_srv_host<S: ToString>(mut self, srv_host: S) -> Self {
        self.srv_host = Some(srv_host.to_string());
        self
    }

    pub fn with_srv_service_name<S: ToString>(mut self, srv_service_name: S) -> Self {
        self.srv_service_name = Some(srv_service_name.to_string());
        self
    }

    pub fn with_srv_max_hosts(mut self, srv_max_hosts: usize) -> Self {
        self.srv_max_hosts = srv_max_hosts;
        self
    }

    pub fn with_required_replica_set_name<S: ToString>(mut self, name: S) -> Self {
        self.required_replica_set_name = Some(name.to_string());
        self
    }

    pub fn with_description<S: ToString>(mut self, description: S) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Finalizes building process
    pub fn build(self) -> Result<ClusterSettings> {
        let hosts = if self.hosts.is_empty() {
            vec![ServerAddress::default()]
        } else {
            self.hosts
        };

        if let Some(srv_host) = &self.srv_host {
            if srv_host.contains(':') {
                return Err(Error::Configuration(format!(
                    "An SRV host must not contain a port: {srv_host}"
                )));
            }
        }

        let mode = self.mode.unwrap_or(if hosts.len() == 1 && self.srv_host.is_none() {
            ClusterConnectionMode::Single
        } else {
            ClusterConnectionMode::Multiple
        });

        if mode == ClusterConnectionMode::Single && hosts.len() > 1 {
            return Err(Error::Configuration(format!(
                "Multiple hosts cannot be specified when using {mode} connection mode"
            )));
        }

        Ok(ClusterSettings {
            hosts,
            mode,
            srv_host: self.srv_host,
            srv_service_name: self
                .srv_service_name
                .unwrap_or_else(|| DEFAULT_SRV_SERVICE_NAME.into()),
            srv_max_hosts: self.srv_max_hosts,
            required_replica_set_name: self.required_replica_set_name,
            description: self.description,
        })
    }
}

/// Settings of server monitoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    heartbeat_frequency: Duration,
    min_heartbeat_frequency: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            heartbeat_frequency: Duration::from_secs(10),
            min_heartbeat_frequency: Duration::from_millis(500),
        }
    }
}

impl ServerSettings {
    pub fn new(heartbeat_frequency: Duration, min_heartbeat_frequency: Duration) -> Self {
        assert!(!min_heartbeat_frequency.is_zero() && heartbeat_frequency >= min_heartbeat_frequency);
        ServerSettings {
            heartbeat_frequency,
            min_heartbeat_frequency,
        }
    }

    /// How often servers are checked and SRV records are polled.
    #[inline]
    pub fn heartbeat_frequency(&self) -> Duration {
        self.heartbeat_frequency
    }

    #[inline]
    pub fn min_heartbeat_frequency(&self) -> Duration {
        self.min_heartbeat_frequency
    }
}

/// Configuration for server connection pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionPoolSettings {
    max_size: usize,
    min_size: usize,
    max_wait_time: Duration,
    max_connection_idle_time: Option<Duration>,
}

impl Default for ConnectionPoolSettings {
    fn default() -> Self {
        ConnectionPoolSettings {
            max_size: 100,
            min_size: 0,
            max_wait_time: Duration::from_secs(120),
            max_connection_idle_time: None,
        }
    }
}

impl ConnectionPoolSettings {
    /// Creates a new configuration for a pool of given size bounds.
    pub fn new(
        max_size: usize,
        min_size: usize,
        max_wait_time: Duration,
        max_connection_idle_time: Option<Duration>,
    ) -> Self {
        assert!(max_size > 0 && min_size <= max_size);
        ConnectionPoolSettings {
            max_size,
            min_size,
            max_wait_time,
            max_connection_idle_time,
        }
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[inline]
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    #[inline]
    pub fn max_wait_time(&self) -> Duration {
        self.max_wait_time
    }

    #[inline]
    pub fn max_connection_idle_time(&self) -> Option<Duration> {
        self.max_connection_idle_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_single_localhost() {
        let settings = ClusterSettings::builder().build().unwrap();

        assert_eq!(settings.hosts(), [ServerAddress::default()]);
        assert_eq!(settings.mode(), ClusterConnectionMode::Single);
        assert_eq!(settings.srv_service_name(), DEFAULT_SRV_SERVICE_NAME);
        assert_eq!(settings, ClusterSettings::default());
    }

    #[test]
    fn should_infer_multiple_mode() {
        let settings = ClusterSettings::builder()
            .with_host(ServerAddress::new("db1", 27017))
            .with_host(ServerAddress::new("db2", 27017))
            .build()
            .unwrap();
        assert_eq!(settings.mode(), ClusterConnectionMode::Multiple);

        let settings = ClusterSettings::builder()
            .with_srv_host("cluster0.example.com")
            .build()
            .unwrap();
        assert_eq!(settings.mode(), ClusterConnectionMode::Multiple);
        assert_eq!(settings.srv_host(), Some("cluster0.example.com"));
    }

    #[test]
    fn should_reject_inconsistent_settings() {
        let result = ClusterSettings::builder()
            .with_mode(ClusterConnectionMode::Single)
            .with_host(ServerAddress::new("db1", 27017))
            .with_host(ServerAddress::new("db2", 27017))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = ClusterSettings::builder()
            .with_srv_host("cluster0.example.com:27017")
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn should_keep_srv_host_in_single_mode() {
        let settings = ClusterSettings::builder()
            .with_mode(ClusterConnectionMode::Single)
            .with_srv_host("cluster0.example.com")
            .build()
            .unwrap();

        assert_eq!(settings.mode(), ClusterConnectionMode::Single);
        assert_eq!(settings.srv_host(), Some("cluster0.example.com"));
    }

    #[test]
    fn should_keep_pool_defaults() {
        let settings = ConnectionPoolSettings::default();
        assert_eq!(settings.max_size(), 100);
        assert_eq!(settings.min_size(), 0);
        assert_eq!(settings.max_wait_time(), Duration::from_secs(120));

        let settings = ServerSettings::default();
        assert_eq!(settings.heartbeat_frequency(), Duration::from_secs(10));
    }

    #[test]
    #[should_panic]
    fn should_reject_min_above_max_pool_size() {
        ConnectionPoolSettings::new(1, 2, Duration::from_secs(1), None);
    }
}
