//! # TypedKV Sync Client
//!
//! Purpose: Provide a typed, synchronous client for a Redis-compatible store,
//! either a single node or a sharded cluster, with transparent reconnects.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `StoreClient` hides commands, codec and sessions.
//! 2. **One String Primitive**: Typed values go through `codec` to text, so
//!    set/get is one code path for every scalar kind.
//! 3. **Strategy Pattern**: Direct and cluster transports share `Transport`
//!    and are chosen once per login.
//! 4. **Lazy Recovery**: A failed session is rebuilt by the next call, never
//!    by a background task.

pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod manager;
pub mod reply;
pub mod transport;

mod client;
mod resp;

pub use client::StoreClient;
pub use codec::{Storable, TypedValue, ValueKind};
pub use config::{EndpointConfig, NodeAddr, Topology};
pub use error::{ClientError, ClientResult, CodecError, ConfigError, StoreError, StoreResult};
pub use manager::{ConnectionManager, SessionState};
pub use transport::{ConnectParams, Connector, TcpConnector, Transport};
