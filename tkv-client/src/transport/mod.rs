//! # Transport Session
//!
//! Purpose: Give the connection manager one interface for "send command,
//! receive reply" regardless of whether the store is a single node or a
//! cluster.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: `DirectTransport` and `ClusterTransport` implement
//!    `Transport`; the variant is picked once, at login.
//! 2. **Factory Seam**: `Connector` builds transports, so the manager can be
//!    driven by scripted transports in tests.
//! 3. **Fail Fast**: Any transport error is returned as `Err`; the manager
//!    drops the session instead of trying to resynchronize it.

mod cluster;
mod direct;

pub use cluster::ClusterTransport;
pub use direct::DirectTransport;

use std::time::Duration;

use crate::command::Command;
use crate::config::{NodeAddr, Topology};
use crate::error::ClientResult;
use crate::reply::Reply;

/// One live connection to the store.
pub trait Transport {
    /// Sends one command and blocks for its reply.
    ///
    /// Error replies come back as `Ok(Reply::Error)`; `Err` means the
    /// connection itself can no longer be trusted.
    fn execute(&mut self, command: &Command) -> ClientResult<Reply>;
}

/// Credentials and limits handed to a connector.
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub timeout: Duration,
}

/// Factory for transports.
pub trait Connector {
    /// Opens a direct connection to one node. Authentication and table
    /// selection are done afterwards by the manager.
    fn connect_direct(
        &self,
        node: &NodeAddr,
        params: &ConnectParams<'_>,
    ) -> ClientResult<Box<dyn Transport>>;

    /// Opens a slot-routing connection to a cluster. The router handles
    /// authentication itself.
    fn connect_cluster(
        &self,
        nodes: &[NodeAddr],
        params: &ConnectParams<'_>,
    ) -> ClientResult<Box<dyn Transport>>;
}

/// Connects over TCP: RESP2 for single nodes, the `redis` router for clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect_direct(
        &self,
        node: &NodeAddr,
        params: &ConnectParams<'_>,
    ) -> ClientResult<Box<dyn Transport>> {
        Ok(Box::new(DirectTransport::connect(node, params.timeout)?))
    }

    fn connect_cluster(
        &self,
        nodes: &[NodeAddr],
        params: &ConnectParams<'_>,
    ) -> ClientResult<Box<dyn Transport>> {
        Ok(Box::new(ClusterTransport::connect(nodes, params)?))
    }
}

/// Opens the right transport for a topology.
pub(crate) fn connect<C: Connector + ?Sized>(
    connector: &C,
    topology: &Topology,
    params: &ConnectParams<'_>,
) -> ClientResult<Box<dyn Transport>> {
    match topology {
        Topology::Single(node) => connector.connect_direct(node, params),
        Topology::Cluster(nodes) => connector.connect_cluster(nodes, params),
    }
}
