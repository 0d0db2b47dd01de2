use derivative::Derivative;
use docdb_protocol::address::ServerAddress;
use docdb_protocol::compression::Compressor;
use docdb_protocol::document::Document;
use docdb_protocol::error::Result;
use docdb_protocol::server_api::ServerApi;
use std::sync::Arc;
use tracing::*;

use crate::auth::{Authenticator, CredentialConfig};
use crate::cluster::settings::{ConnectionPoolSettings, ServerSettings};
use crate::cluster::ClusterId;
use crate::connection::{
    ConnectionInitializer, InitializationDescription, InternalConnection, ServerId,
};
use crate::events::CommandListener;
use crate::transport::{CommandTransport, TransportFactories};

pub type ServerConnection = InternalConnection<Box<dyn CommandTransport>>;

/// Everything needed to initialize connections, shared by all servers of a cluster.
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct ConnectionContext {
    pub credential: Option<CredentialConfig>,
    #[derivative(Debug = "ignore")]
    pub command_listener: Option<Arc<dyn CommandListener>>,
    pub client_metadata: Option<Document>,
    pub compressors: Vec<Compressor>,
    pub server_api: Option<ServerApi>,
}

impl ConnectionContext {
    /// Application connections authenticate and report commands to the listener.
    fn application_initializer(&self) -> ConnectionInitializer {
        ConnectionInitializer::new(Authenticator::from_config(
            self.credential.as_ref(),
            self.server_api.as_ref(),
        ))
        .with_client_metadata(self.client_metadata.clone())
        .with_compressors(self.compressors.clone())
        .with_server_api(self.server_api.clone())
    }

    /// Monitoring connections only handshake.
    fn monitoring_initializer(&self) -> ConnectionInitializer {
        ConnectionInitializer::new(Authenticator::None)
            .with_client_metadata(self.client_metadata.clone())
            .with_compressors(self.compressors.clone())
            .with_server_api(self.server_api.clone())
    }
}

/// A server of a cluster, able to open initialized connections to itself.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Server {
    server_id: ServerId,
    server_settings: ServerSettings,
    pool_settings: ConnectionPoolSettings,
    #[derivative(Debug = "ignore")]
    transport_factories: TransportFactories,
    context: Arc<ConnectionContext>,
}

impl Server {
    #[inline]
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    #[inline]
    pub fn address(&self) -> &ServerAddress {
        self.server_id.address()
    }

    #[inline]
    pub fn server_settings(&self) -> &ServerSettings {
        &self.server_settings
    }

    #[inline]
    pub fn pool_settings(&self) -> &ConnectionPoolSettings {
        &self.pool_settings
    }

    fn new_connection(
        &self,
        transport: Box<dyn CommandTransport>,
        listener: Option<Arc<dyn CommandListener>>,
    ) -> ServerConnection {
        InternalConnection::new(transport, self.server_id.clone(), listener)
    }

    /// Opens and initializes an application connection, blocking the current thread.
    pub fn open_connection(&self) -> Result<(ServerConnection, InitializationDescription)> {
        let transport = self.transport_factories.application.create(self.address())?;
        let connection = self.new_connection(transport, self.context.command_listener.clone());
        let description = connection.open(&self.context.application_initializer())?;
        Ok((connection, description))
    }

    pub async fn open_connection_async(
        &self,
    ) -> Result<(ServerConnection, InitializationDescription)> {
        let transport = self
            .transport_factories
            .application
            .create_async(self.address())
            .await?;
        let connection = self.new_connection(transport, self.context.command_listener.clone());
        let description = connection
            .open_async(&self.context.application_initializer())
            .await?;
        Ok((connection, description))
    }

    /// Opens an unauthenticated connection for server monitoring.
    pub async fn open_monitoring_connection(
        &self,
    ) -> Result<(ServerConnection, InitializationDescription)> {
        let transport = self
            .transport_factories
            .heartbeat
            .create_async(self.address())
            .await?;
        let connection = self.new_connection(transport, None);
        let description = connection
            .open_async(&self.context.monitoring_initializer())
            .await?;
        Ok((connection, description))
    }
}

/// Creates servers belonging to one cluster.
pub trait ServerFactory: Send + Sync {
    fn create(&self, address: ServerAddress) -> Arc<Server>;
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct DefaultServerFactory {
    cluster_id: ClusterId,
    server_settings: ServerSettings,
    pool_settings: ConnectionPoolSettings,
    #[derivative(Debug = "ignore")]
    transport_factories: TransportFactories,
    context: Arc<ConnectionContext>,
}

impl DefaultServerFactory {
    pub fn new(
        cluster_id: ClusterId,
        server_settings: ServerSettings,
        pool_settings: ConnectionPoolSettings,
        transport_factories: TransportFactories,
        context: ConnectionContext,
    ) -> Self {
        DefaultServerFactory {
            cluster_id,
            server_settings,
            pool_settings,
            transport_factories,
            context: Arc::new(context),
        }
    }

    #[inline]
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }
}

impl ServerFactory for DefaultServerFactory {
    fn create(&self, address: ServerAddress) -> Arc<Server> {
        debug!(cluster_id = %self.cluster_id, %address, "Adding server.");

        Arc::new(Server {
            server_id: ServerId::new(self.cluster_id.clone(), address),
            server_settings: self.server_settings,
            pool_settings: self.pool_settings,
            transport_factories: self.transport_factories.clone(),
            context: self.context.clone(),
        })
    }
}
