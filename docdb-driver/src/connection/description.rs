//! Immutable snapshots describing a connection and the server behind it, as learned from the
//! handshake reply. Snapshots are never changed in place; refinements produce new values.
use derive_more::{Constructor, Display};
use docdb_protocol::address::ServerAddress;
use docdb_protocol::command::handshake::COMPRESSION;
use docdb_protocol::command::status_probe::connection_id_from_reply;
use docdb_protocol::document::{get_bool, get_i32, get_i64, get_str, get_strings, is_ok, Document};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::cluster::ClusterId;

pub const DEFAULT_MAX_DOCUMENT_SIZE: i64 = 0x100_0000;
pub const DEFAULT_MAX_MESSAGE_SIZE: i64 = 0x200_0000;
pub const DEFAULT_MAX_WRITE_BATCH_SIZE: i64 = 512;

static NEXT_LOCAL_VALUE: AtomicI64 = AtomicI64::new(1);

/// Server within a given cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Constructor)]
pub struct ServerId {
    cluster_id: ClusterId,
    address: ServerAddress,
}

impl ServerId {
    #[inline]
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    #[inline]
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }
}

/// Connection identity. The local value is assigned by the client when the connection is
/// created; the server value is learned during initialization, if the server reports one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    server_id: ServerId,
    local_value: i64,
    server_value: Option<i64>,
}

impl ConnectionId {
    /// Creates an id with the next client-assigned value.
    pub fn new(server_id: ServerId) -> Self {
        ConnectionId {
            server_id,
            local_value: NEXT_LOCAL_VALUE.fetch_add(1, Ordering::Relaxed),
            server_value: None,
        }
    }

    /// Returns a copy with the server-assigned value filled in.
    pub fn with_server_value(&self, server_value: i64) -> Self {
        ConnectionId {
            server_id: self.server_id.clone(),
            local_value: self.local_value,
            server_value: Some(server_value),
        }
    }

    #[inline]
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    #[inline]
    pub fn local_value(&self) -> i64 {
        self.local_value
    }

    #[inline]
    pub fn server_value(&self) -> Option<i64> {
        self.server_value
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {} to {}", self.local_value, self.server_id.address)?;
        if let Some(server_value) = self.server_value {
            write!(f, " (server id {server_value})")?;
        }
        Ok(())
    }
}

/// Role of a server, as derived from its handshake reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ServerType {
    Standalone,
    ReplicaSetPrimary,
    ReplicaSetSecondary,
    ReplicaSetArbiter,
    ReplicaSetOther,
    ReplicaSetGhost,
    ShardRouter,
    Unknown,
}

impl ServerType {
    pub fn from_handshake_reply(reply: &Document) -> Self {
        if !is_ok(reply) {
            return ServerType::Unknown;
        }

        if get_bool(reply, "isreplicaset") {
            return ServerType::ReplicaSetGhost;
        }

        if get_str(reply, "setName").is_some() {
            return if get_bool(reply, "hidden") {
                ServerType::ReplicaSetOther
            } else if get_bool(reply, "isWritablePrimary") || get_bool(reply, "ismaster") {
                ServerType::ReplicaSetPrimary
            } else if get_bool(reply, "secondary") {
                ServerType::ReplicaSetSecondary
            } else if get_bool(reply, "arbiterOnly") {
                ServerType::ReplicaSetArbiter
            } else {
                ServerType::ReplicaSetOther
            };
        }

        if get_str(reply, "msg") == Some("isdbgrid") {
            return ServerType::ShardRouter;
        }

        ServerType::Standalone
    }

    #[inline]
    pub fn is_replica_set_member(self) -> bool {
        matches!(
            self,
            ServerType::ReplicaSetPrimary
                | ServerType::ReplicaSetSecondary
                | ServerType::ReplicaSetArbiter
                | ServerType::ReplicaSetOther
                | ServerType::ReplicaSetGhost
        )
    }
}

fn wire_version(reply: &Document, key: &str) -> i32 {
    get_i32(reply, key).unwrap_or(0)
}

/// What the client knows about one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionDescription {
    connection_id: ConnectionId,
    server_type: ServerType,
    min_wire_version: i32,
    max_wire_version: i32,
    max_document_size: i64,
    max_message_size: i64,
    max_batch_count: i64,
    compressors: Vec<String>,
    sasl_supported_mechanisms: Option<Vec<String>>,
}

impl ConnectionDescription {
    /// Description of a connection which has not been initialized yet.
    pub fn new(server_id: ServerId) -> Self {
        ConnectionDescription {
            connection_id: ConnectionId::new(server_id),
            server_type: ServerType::Unknown,
            min_wire_version: 0,
            max_wire_version: 0,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_batch_count: DEFAULT_MAX_WRITE_BATCH_SIZE,
            compressors: vec![],
            sasl_supported_mechanisms: None,
        }
    }

    /// Parses a handshake reply. A `connectionId` in the reply fills in the server-assigned id.
    pub fn from_handshake_reply(connection_id: &ConnectionId, reply: &Document) -> Self {
        let connection_id = match connection_id_from_reply(reply) {
            Some(server_value) => connection_id.with_server_value(server_value),
            None => connection_id.clone(),
        };

        ConnectionDescription {
            connection_id,
            server_type: ServerType::from_handshake_reply(reply),
            min_wire_version: wire_version(reply, "minWireVersion"),
            max_wire_version: wire_version(reply, "maxWireVersion"),
            max_document_size: get_i64(reply, "maxBsonObjectSize")
                .unwrap_or(DEFAULT_MAX_DOCUMENT_SIZE),
            max_message_size: get_i64(reply, "maxMessageSizeBytes")
                .unwrap_or(DEFAULT_MAX_MESSAGE_SIZE),
            max_batch_count: get_i64(reply, "maxWriteBatchSize")
                .unwrap_or(DEFAULT_MAX_WRITE_BATCH_SIZE),
            compressors: get_strings(reply, COMPRESSION),
            sasl_supported_mechanisms: reply
                .contains_key("saslSupportedMechs")
                .then(|| get_strings(reply, "saslSupportedMechs")),
        }
    }

    /// Returns a new description with given connection id; the rest is copied.
    pub fn with_connection_id(&self, connection_id: ConnectionId) -> Self {
        ConnectionDescription {
            connection_id,
            ..self.clone()
        }
    }

    #[inline]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    #[inline]
    pub fn server_address(&self) -> &ServerAddress {
        self.connection_id.server_id().address()
    }

    #[inline]
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    #[inline]
    pub fn min_wire_version(&self) -> i32 {
        self.min_wire_version
    }

    #[inline]
    pub fn max_wire_version(&self) -> i32 {
        self.max_wire_version
    }

    #[inline]
    pub fn max_document_size(&self) -> i64 {
        self.max_document_size
    }

    #[inline]
    pub fn max_message_size(&self) -> i64 {
        self.max_message_size
    }

    #[inline]
    pub fn max_batch_count(&self) -> i64 {
        self.max_batch_count
    }

    /// Compressors accepted by the server, in the server's order.
    #[inline]
    pub fn compressors(&self) -> &[String] {
        &self.compressors
    }

    /// Mechanisms available for the probed user, if the handshake asked for them.
    #[inline]
    pub fn sasl_supported_mechanisms(&self) -> Option<&[String]> {
        self.sasl_supported_mechanisms.as_deref()
    }
}

/// What the client knows about a server, as of one handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerDescription {
    address: ServerAddress,
    server_type: ServerType,
    ok: bool,
    min_wire_version: i32,
    max_wire_version: i32,
    round_trip_time: Duration,
    set_name: Option<String>,
    hosts: Vec<String>,
    passives: Vec<String>,
    arbiters: Vec<String>,
    primary: Option<String>,
    me: Option<String>,
    logical_session_timeout_minutes: Option<i64>,
    max_document_size: i64,
}

impl ServerDescription {
    pub fn from_handshake_reply(
        address: &ServerAddress,
        reply: &Document,
        round_trip_time: Duration,
    ) -> Self {
        let owned = |key: &str| get_str(reply, key).map(str::to_string);

        ServerDescription {
            address: address.clone(),
            server_type: ServerType::from_handshake_reply(reply),
            ok: is_ok(reply),
            min_wire_version: wire_version(reply, "minWireVersion"),
            max_wire_version: wire_version(reply, "maxWireVersion"),
            round_trip_time,
            set_name: owned("setName"),
            hosts: get_strings(reply, "hosts"),
            passives: get_strings(reply, "passives"),
            arbiters: get_strings(reply, "arbiters"),
            primary: owned("primary"),
            me: owned("me"),
            logical_session_timeout_minutes: get_i64(reply, "logicalSessionTimeoutMinutes"),
            max_document_size: get_i64(reply, "maxBsonObjectSize")
                .unwrap_or(DEFAULT_MAX_DOCUMENT_SIZE),
        }
    }

    #[inline]
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    #[inline]
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    #[inline]
    pub fn min_wire_version(&self) -> i32 {
        self.min_wire_version
    }

    #[inline]
    pub fn max_wire_version(&self) -> i32 {
        self.max_wire_version
    }

    /// Latency sample measured around the handshake.
    #[inline]
    pub fn round_trip_time(&self) -> Duration {
        self.round_trip_time
    }

    #[inline]
    pub fn set_name(&self) -> Option<&str> {
        self.set_name.as_deref()
    }

    #[inline]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    #[inline]
    pub fn passives(&self) -> &[String] {
        &self.passives
    }

    #[inline]
    pub fn arbiters(&self) -> &[String] {
        &self.arbiters
    }

    #[inline]
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    #[inline]
    pub fn me(&self) -> Option<&str> {
        self.me.as_deref()
    }

    #[inline]
    pub fn logical_session_timeout_minutes(&self) -> Option<i64> {
        self.logical_session_timeout_minutes
    }

    #[inline]
    pub fn max_document_size(&self) -> i64 {
        self.max_document_size
    }

    /// Copy with a different latency sample; used to compare descriptions across measurements.
    pub fn with_round_trip_time(&self, round_trip_time: Duration) -> Self {
        ServerDescription {
            round_trip_time,
            ..self.clone()
        }
    }
}

/// Result of initializing a connection.
#[derive(Clone, Debug, PartialEq, Eq, Constructor)]
pub struct InitializationDescription {
    pub connection_description: ConnectionDescription,
    pub server_description: ServerDescription,
}

impl InitializationDescription {
    pub fn with_connection_description(
        &self,
        connection_description: ConnectionDescription,
    ) -> Self {
        InitializationDescription {
            connection_description,
            server_description: self.server_description.clone(),
        }
    }
}
