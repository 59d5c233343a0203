//! RPC Endpoint Server
//!
//! The authenticated HTTPS shell around the store: binds the listening
//! socket, terminates TLS, checks credentials on every request, and hands
//! the decoded call to [`crate::rpc`] for dispatch. One request maps to one
//! store operation (or, for a batch, to a sequence of independent ones).
//!
//! TLS streams are served through hyper-util's connection builder, since
//! `axum::serve` only accepts plain TCP listeners. Connections are HTTP/1.1
//! keep-alive by default, so heartbeating clients can hold one connection
//! open.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use hyper_util::service::TowerToHyperService;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::{self, Credentials};
use crate::config::ArbiterConfig;
use crate::error::{Error, Result};
use crate::rpc;
use crate::store::KvStore;
use crate::tls;

/// Shared endpoint state
pub struct AppState {
    /// The arbitrator's key-value store
    pub store: Arc<KvStore>,
    /// Shared credential checked on every request
    pub credentials: Credentials,
}

/// The RPC endpoint server
pub struct RpcServer {
    config: ArbiterConfig,
    state: Arc<AppState>,
}

impl RpcServer {
    /// Create a new server around an existing store
    pub fn new(config: ArbiterConfig, store: Arc<KvStore>) -> Self {
        let credentials = Credentials::new(&config.auth.username, &config.auth.password);
        let state = Arc::new(AppState { store, credentials });
        Self { config, state }
    }

    /// Build the router: a single `/rpc` route behind the auth check
    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/rpc", post(handle_rpc))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                require_auth,
            ))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            )
            .layer(CatchPanicLayer::custom(handle_panic))
            .with_state(state)
    }

    /// Bind the listener and serve until ctrl-c
    pub async fn start(&self) -> Result<()> {
        let app = Self::router(Arc::clone(&self.state));

        let listener = TcpListener::bind(&self.config.server.bind_address)
            .await
            .map_err(|e| {
                Error::Network(format!(
                    "cannot bind {}: {}",
                    self.config.server.bind_address, e
                ))
            })?;

        if self.config.tls.enabled {
            let tls_config =
                tls::load_server_config(&self.config.tls.cert_file, &self.config.tls.key_file)?;
            tracing::info!(
                "RPC endpoint listening on https://{}",
                self.config.server.bind_address
            );
            serve_tls(listener, tls::acceptor(tls_config), app).await
        } else {
            tracing::warn!("TLS disabled, serving plaintext (testing only)");
            tracing::info!(
                "RPC endpoint listening on http://{}",
                self.config.server.bind_address
            );
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(|e| Error::Network(format!("server error: {}", e)))
        }
    }
}

/// Accept loop for TLS connections. A failed handshake drops only that
/// connection; the listener keeps accepting.
async fn serve_tls(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> Result<()> {
    let mut shutdown = std::pin::pin!(shutdown_signal());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let app = app.clone();
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::debug!("TLS handshake with {} failed: {}", peer, e);
                            return;
                        }
                    };

                    let service = TowerToHyperService::new(app);
                    if let Err(e) = ConnectionBuilder::new(TokioExecutor::new())
                        .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
                        .await
                    {
                        tracing::debug!("Connection from {} ended with error: {}", peer, e);
                    }
                });
            }
        }
    }
}

/// Wait for ctrl-c
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Reject any request that does not carry the configured credentials.
/// Rejected calls never reach dispatch, let alone the store.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(auth::parse_basic);

    match presented {
        Some((username, password)) if state.credentials.verify(&username, &password) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("Rejected unauthenticated RPC request");
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"arbiter\"")],
                Json(json!({ "error": "unauthorized", "code": "UNAUTHORIZED" })),
            )
                .into_response()
        }
    }
}

/// POST /rpc
///
/// A single envelope is answered with one envelope (faults become HTTP
/// 400); an array is a batch, answered element-wise in order with HTTP 200
/// since individual elements may succeed or fail independently.
async fn handle_rpc(State(state): State<Arc<AppState>>, Json(payload): Json<Value>) -> Response {
    match payload {
        Value::Array(calls) => {
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                responses.push(match dispatch_one(&state.store, call).await {
                    Ok(result) => rpc::success_body(result),
                    Err(fault) => rpc::fault_body(&fault),
                });
            }
            Json(Value::Array(responses)).into_response()
        }
        single => match dispatch_one(&state.store, single).await {
            Ok(result) => Json(rpc::success_body(result)).into_response(),
            Err(fault) => {
                (StatusCode::BAD_REQUEST, Json(rpc::fault_body(&fault))).into_response()
            }
        },
    }
}

async fn dispatch_one(store: &KvStore, payload: Value) -> std::result::Result<Value, rpc::RpcFault> {
    let request = rpc::decode(payload)?;
    tracing::debug!("Dispatching {} call", request.method);
    rpc::dispatch(store, &request).await
}

/// A panic inside a handler is converted into a 500 error envelope for
/// that call; the process keeps serving.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error", "code": "INTERNAL" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(KvStore::new()),
            credentials: Credentials::new("witness", "secret"),
        })
    }

    fn rpc_request(auth_header: Option<&str>, body: &Value) -> Request {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(value) = auth_header {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn good_auth() -> String {
        format!("Basic {}", BASE64.encode("witness:secret"))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_dispatch() {
        let state = test_state();
        let app = RpcServer::router(Arc::clone(&state));

        let payload = json!({"method": "set", "params": ["k", "v"]});
        let response = app.oneshot(rpc_request(None, &payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // The store must not have been touched
        assert_eq!(state.store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let state = test_state();
        let app = RpcServer::router(state);

        let bad = format!("Basic {}", BASE64.encode("witness:wrong"));
        let payload = json!({"method": "get", "params": ["k"]});
        let response = app.oneshot(rpc_request(Some(&bad), &payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticated_call_dispatches() {
        let state = test_state();
        let app = RpcServer::router(Arc::clone(&state));

        let payload = json!({"method": "create", "params": ["lock", "nodeA"]});
        let response = app
            .oneshot(rpc_request(Some(&good_auth()), &payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"result": true}));
        assert_eq!(state.store.get("lock").await.as_deref(), Some("nodeA"));
    }

    #[tokio::test]
    async fn test_get_absent_key_returns_empty_string() {
        let app = RpcServer::router(test_state());

        let payload = json!({"method": "get", "params": ["nonexistent"]});
        let response = app
            .oneshot(rpc_request(Some(&good_auth()), &payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"result": ""}));
    }

    #[tokio::test]
    async fn test_unknown_method_is_bad_request() {
        let app = RpcServer::router(test_state());

        let payload = json!({"method": "shutdown", "params": []});
        let response = app
            .oneshot(rpc_request(Some(&good_auth()), &payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], json!("UNKNOWN_METHOD"));
    }

    #[tokio::test]
    async fn test_batch_answers_in_order() {
        let app = RpcServer::router(test_state());

        let payload = json!([
            {"method": "create", "params": ["lock", "nodeA"]},
            {"method": "create", "params": ["lock", "nodeB"]},
            {"method": "get", "params": ["lock"]},
            {"method": "bogus", "params": []},
        ]);
        let response = app
            .oneshot(rpc_request(Some(&good_auth()), &payload))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0], json!({"result": true}));
        assert_eq!(body[1], json!({"result": false}));
        assert_eq!(body[2], json!({"result": "nodeA"}));
        assert_eq!(body[3]["code"], json!("UNKNOWN_METHOD"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let app = RpcServer::router(test_state());

        let response = app
            .oneshot(rpc_request(Some(&good_auth()), &json!([])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }
}
