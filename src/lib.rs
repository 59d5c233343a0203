//! Arbiter - External Tie-Breaking Arbitrator
//!
//! A minimal always-reachable service that cluster nodes consult to break
//! ties when they cannot agree among themselves: split-brain resolution,
//! leader election, liveness tracking. Clients perform heartbeats and
//! simple atomic key-value operations over an authenticated, encrypted
//! connection. The arbitrator holds no cluster-specific logic; it is a
//! trusted, neutral witness.
//!
//! # Architecture
//!
//! A single mutex-guarded key-value store is the only state. Around it sits
//! an HTTPS shell that terminates TLS, checks HTTP Basic credentials, and
//! dispatches each call to exactly one of six atomic store operations:
//! `heartbeat`, `get`, `set`, `create`, `set_if_prev`, `delete`.
//!
//! The operation set is the classic coordination minimum: `create` is
//! write-once registration (lock/leader claims), `set_if_prev` is
//! compare-and-swap (safe release and handoff), `heartbeat` is a liveness
//! beacon. The arbitrator is intentionally a single point of shared truth,
//! not a distributed store: no persistence, no replication, no
//! transactions.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod rpc;
pub mod store;
pub mod tls;

pub use config::ArbiterConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::RpcServer;
    pub use crate::auth::Credentials;
    pub use crate::config::ArbiterConfig;
    pub use crate::error::{Error, Result};
    pub use crate::store::KvStore;
}
