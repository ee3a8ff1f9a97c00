//! # Endpoint Configuration
//!
//! `EndpointConfig` is what a caller hands to `StoreClient::open`. The address
//! decides the topology: one `host:port` is a single node, a comma-separated
//! list is a cluster.
//!
//! ```json
//! { "address": "10.0.0.1:6379,10.0.0.2:6379", "password": "secret", "timeout_ms": 2000 }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Port used when a node omits one.
pub const DEFAULT_PORT: u16 = 6379;

/// Connect timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connection settings for a single node or a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// `host:port`, or a comma-separated list of them for cluster mode.
    pub address: String,
    /// ACL user, cluster mode only.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Logical database index selected after connecting (single node only).
    pub table: u16,
    /// Connect timeout, also applied to each round trip.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            username: None,
            password: None,
            table: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>) -> Self {
        EndpointConfig {
            address: address.into(),
            ..EndpointConfig::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_table(mut self, table: u16) -> Self {
        self.table = table;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Resolves the address into a topology.
    pub fn topology(&self) -> Result<Topology, ConfigError> {
        Topology::parse(&self.address)
    }

    /// Configured password, treating an empty string as none.
    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub(crate) fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }
}

/// One `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    /// Parses `host[:port]`. A port that is present but not a valid u16 is an
    /// error rather than a silent fallback to the default.
    pub fn parse(node: &str) -> Result<Self, ConfigError> {
        let (host, port) = match node.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| ConfigError::InvalidPort {
                    node: node.to_owned(),
                })?;
                (host, port)
            }
            None => (node, DEFAULT_PORT),
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ConfigError::EmptyHost {
                node: node.to_owned(),
            });
        }
        Ok(NodeAddr {
            host: host.to_owned(),
            port,
        })
    }

    pub(crate) fn redis_url(&self) -> String {
        if self.host.contains(':') {
            format!("redis://[{}]:{}", self.host, self.port)
        } else {
            format!("redis://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Deployment shape derived from the configured address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Single(NodeAddr),
    Cluster(Vec<NodeAddr>),
}

impl Topology {
    pub fn parse(address: &str) -> Result<Self, ConfigError> {
        let mut nodes = address
            .split(',')
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(NodeAddr::parse)
            .collect::<Result<Vec<_>, _>>()?;

        match nodes.len() {
            0 => Err(ConfigError::EmptyAddress),
            1 => Ok(Topology::Single(nodes.remove(0))),
            _ => Ok(Topology::Cluster(nodes)),
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Topology::Cluster(_))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
