//! # Error Taxonomy
//!
//! Purpose: Name every way an operation can fail so the connection manager can
//! decide whether the live session survives the failure.
//!
//! ## Layers
//! 1. `ClientError`: transport-level failures (I/O, framing, router). Always
//!    tear down the session.
//! 2. `CodecError`: text could not become a typed value (or vice versa).
//! 3. `ConfigError`: the endpoint configuration is malformed.
//! 4. `StoreError`: what the facade records as the last failure. Only
//!    `Connection`, `Server` and `UnexpectedReply` cost the session.

use std::io;

use thiserror::Error;

use crate::codec::ValueKind;
use crate::reply::ReplyKind;

/// Result type for transports.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for the value codec.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for the manager and facade internals.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a transport round trip.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Address could not be resolved into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Cluster router failure (topology, redirection, connect).
    #[error("cluster error: {0}")]
    Cluster(#[from] redis::RedisError),
}

/// Errors from the value codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// An absent string cannot be stored.
    #[error("null string cannot be encoded")]
    NullString,
    /// The text is not a complete literal of the requested kind.
    #[error("cannot decode {text:?} as {kind}")]
    Invalid { kind: ValueKind, text: String },
}

/// Errors in the endpoint configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("address is empty")]
    EmptyAddress,
    #[error("node {node:?} has an empty host")]
    EmptyHost { node: String },
    #[error("node {node:?} has an invalid port")]
    InvalidPort { node: String },
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),
}

/// Failure of one store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No configuration: `open` was never called or the client was closed.
    #[error("store is not open")]
    NotOpen,
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Login or round trip failed at the transport level.
    #[error("connection failure: {0}")]
    Connection(#[from] ClientError),
    /// The store answered with an error reply.
    #[error("command [{command}] failed: {message}")]
    Server { command: String, message: String },
    /// The reply kind did not match the command family.
    #[error("command [{command}] expected {expected} reply, got {actual}")]
    UnexpectedReply {
        command: String,
        expected: ReplyKind,
        actual: &'static str,
    },
    /// Nil reply: nothing stored under the key.
    #[error("command [{command}] found nothing")]
    Missing { command: String },
    /// Well-formed reply that reports no effect (integer 0, non-OK status).
    #[error("command [{command}] was not applied")]
    Rejected { command: String },
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Operation cannot run in the current topology.
    #[error("{0} is not supported in cluster mode")]
    Unsupported(&'static str),
    /// Some keys of a batch failed; every key was still attempted.
    #[error("{failed} of {total} batch operations failed")]
    PartialBatch { failed: usize, total: usize },
}

impl StoreError {
    /// Whether this failure tears down the live session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_) | StoreError::Server { .. } | StoreError::UnexpectedReply { .. }
        )
    }
}
