//! RPC Endpoint Module
//!
//! Provides the authenticated HTTPS endpoint that dispatches client calls
//! to the key-value store.

mod http;

pub use http::{AppState, RpcServer};
