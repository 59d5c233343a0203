//! RPC Method Dispatch
//!
//! Wire envelope types and the mapping from method name + positional
//! parameters to exactly one store operation. Each call is one envelope:
//!
//! ```json
//! {"method": "set_if_prev", "params": ["lock", "nodeA", "nodeB"]}
//! ```
//!
//! answered with `{"result": ...}` or `{"error": "...", "code": "..."}`.
//! A JSON array of envelopes is a batch: every element is dispatched
//! independently and answered in order.
//!
//! Parameter validation lives entirely here; the store assumes well-typed
//! string arguments. An unknown method or a wrong arity is a fault that
//! never touches the store.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::KvStore;

/// A single decoded RPC call
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// Method name, one of the six store operations
    pub method: String,

    /// Positional string parameters
    #[serde(default)]
    pub params: Vec<Value>,
}

/// A dispatch-level fault, reported to the caller as an error envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcFault {
    pub code: &'static str,
    pub message: String,
}

impl RpcFault {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self {
            code: "UNKNOWN_METHOD",
            message: format!("unknown method: {}", method),
        }
    }

    pub fn bad_params(method: &str, expected: usize, got: usize) -> Self {
        Self {
            code: "BAD_PARAMS",
            message: format!(
                "{} expects {} string parameter(s), got {}",
                method, expected, got
            ),
        }
    }
}

/// Decode a raw JSON value into an [`RpcRequest`]
pub fn decode(value: Value) -> Result<RpcRequest, RpcFault> {
    serde_json::from_value(value).map_err(|e| RpcFault::bad_request(e.to_string()))
}

/// Dispatch one decoded call to the store and return its result value.
///
/// `get` on an absent key yields an empty string rather than a fault: the
/// wire protocol deliberately collapses "missing" and "empty" so that no
/// operation ever reports absence as an error, and callers must not rely
/// on distinguishing the two.
pub async fn dispatch(store: &KvStore, request: &RpcRequest) -> Result<Value, RpcFault> {
    match request.method.as_str() {
        "heartbeat" => {
            let [key] = expect_params::<1>(request)?;
            Ok(json!(store.heartbeat(key).await))
        }
        "set" => {
            let [key, value] = expect_params::<2>(request)?;
            Ok(json!(store.set(key, value).await))
        }
        "get" => {
            let [key] = expect_params::<1>(request)?;
            Ok(json!(store.get(key).await.unwrap_or_default()))
        }
        "create" => {
            let [key, value] = expect_params::<2>(request)?;
            Ok(json!(store.create(key, value).await))
        }
        "set_if_prev" => {
            let [key, prev, new] = expect_params::<3>(request)?;
            Ok(json!(store.set_if_prev(key, prev, new).await))
        }
        "delete" => {
            let [key] = expect_params::<1>(request)?;
            Ok(json!(store.delete(key).await))
        }
        other => Err(RpcFault::unknown_method(other)),
    }
}

/// Build a success envelope
pub fn success_body(result: Value) -> Value {
    json!({ "result": result })
}

/// Build an error envelope
pub fn fault_body(fault: &RpcFault) -> Value {
    json!({ "error": fault.message, "code": fault.code })
}

/// Extract exactly N string parameters from the request
fn expect_params<const N: usize>(request: &RpcRequest) -> Result<[&str; N], RpcFault> {
    if request.params.len() != N {
        return Err(RpcFault::bad_params(
            &request.method,
            N,
            request.params.len(),
        ));
    }

    let mut out = [""; N];
    for (i, param) in request.params.iter().enumerate() {
        out[i] = param
            .as_str()
            .ok_or_else(|| RpcFault::bad_params(&request.method, N, request.params.len()))?;
    }
    Ok(out)
}
