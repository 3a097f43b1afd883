//! Integration test support for the Pylon client.
//!
//! [`FakePylon`] serves a small subset of the Pylon API, including the
//! workbench WebSocket, on an ephemeral local port. Workbench URLs are
//! single-use like the real ones and every socket is closed by the server
//! after [`FakePylon::SOCKET_LIFETIME`].

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use pylon_client::{ClientConfig, PylonClient};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Token accepted by the fake API.
pub const TOKEN: &str = "test-token";
/// The only deployment the fake API knows.
pub const DEPLOYMENT_ID: &str = "5";
/// The only guild the fake API knows.
pub const GUILD_ID: &str = "9";

#[derive(Debug)]
struct FakeState {
    addr: SocketAddr,
    next_session: AtomicU64,
    used_sessions: Mutex<HashSet<u64>>,
    ws_connections: AtomicUsize,
    client_closes: AtomicUsize,
    close_replies: AtomicUsize,
    published: Mutex<Vec<Value>>,
}

/// An in-process fake of the Pylon API.
///
/// The server task is aborted on drop.
#[derive(Debug)]
pub struct FakePylon {
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakePylon {
    /// How long the server keeps a workbench socket open.
    pub const SOCKET_LIFETIME: Duration = Duration::from_millis(300);

    /// Binds an ephemeral port and starts serving.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(FakeState {
            addr,
            next_session: AtomicU64::new(0),
            used_sessions: Mutex::new(HashSet::new()),
            ws_connections: AtomicUsize::new(0),
            client_closes: AtomicUsize::new(0),
            close_replies: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        });

        let app = create_router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        info!(%addr, "fake pylon listening");

        Ok(Self { state, handle })
    }

    /// Base URL of the fake API.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.state.addr)
    }

    /// Client configuration pointing at the fake API with a valid token.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(TOKEN).with_base_url(self.base_url())
    }

    /// Creates a client with a valid token and [`DEPLOYMENT_ID`] as default.
    ///
    /// # Errors
    /// Returns error if client creation fails.
    pub fn client(&self) -> Result<PylonClient, pylon_client::Error> {
        PylonClient::new(self.client_config().with_deployment_id(DEPLOYMENT_ID))
    }

    /// Number of workbench sockets accepted so far.
    #[must_use]
    pub fn ws_connections(&self) -> usize {
        self.state.ws_connections.load(Ordering::SeqCst)
    }

    /// Number of workbench sockets closed by the client.
    #[must_use]
    pub fn client_closes(&self) -> usize {
        self.state.client_closes.load(Ordering::SeqCst)
    }

    /// Number of server-initiated closes the client answered with its own
    /// close frame.
    #[must_use]
    pub fn close_replies(&self) -> usize {
        self.state.close_replies.load(Ordering::SeqCst)
    }

    /// Bodies received by `POST /deployments/{id}`.
    #[must_use]
    pub fn published(&self) -> Vec<Value> {
        self.state.published.lock().clone()
    }
}

impl Drop for FakePylon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn create_router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/api/user", get(get_user))
        .route("/api/user/guilds/available", get(get_available_guilds))
        .route("/api/user/guilds", get(get_editable_guilds))
        .route("/api/guilds/{id}", get(get_guild))
        .route("/api/guilds/{id}/stats", get(get_guild_stats))
        .route(
            "/api/deployments/{id}",
            get(get_deployment).post(publish_deployment),
        )
        .route("/api/deployments/{id}/kv/namespaces", get(get_namespaces))
        .route(
            "/api/deployments/{id}/kv/namespaces/{namespace}/items",
            get(get_namespace_items),
        )
        .route("/ws/{session}", get(ws_handler))
        .fallback(page_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// HTTP handlers
// ============================================================================

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(TOKEN) => Ok(()),
        _ => Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "not authorized" })),
        )
            .into_response()),
    }
}

fn guild_not_found() -> Response {
    (StatusCode::NOT_FOUND, "could not find guild").into_response()
}

fn deployment_not_found() -> Response {
    (StatusCode::NOT_FOUND, "could not find deployment").into_response()
}

async fn page_not_found() -> Response {
    (StatusCode::NOT_FOUND, "\u{26A0}\u{FE0F} Page not found").into_response()
}

fn deployment_json(state: &FakeState) -> Value {
    let session = state.next_session.fetch_add(1, Ordering::SeqCst);
    json!({
        "id": DEPLOYMENT_ID,
        "bot_id": "270148059269300224",
        "type": 0,
        "app_id": null,
        "name": "main",
        "status": 1,
        "revision": 4,
        "config": "{\"enabled\":true,\"events\":[\"MESSAGE_CREATE\"],\"tasks\":{\"cronTasks\":[]}}",
        "workbench_url": format!("ws://{}/ws/{}", state.addr, session),
        "guild": { "id": GUILD_ID, "name": "Fake Guild", "icon": null },
        "script": {
            "id": DEPLOYMENT_ID,
            "project": "{\"files\":[{\"path\":\"/main.ts\",\"content\":\"console.log(1)\"}]}"
        }
    })
}

async fn get_user(headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    Json(json!({
        "id": "1",
        "lastSeenAt": "2022-07-24T00:00:00Z",
        "avatar": null,
        "displayName": "tester",
        "hasAccess": true
    }))
    .into_response()
}

async fn get_available_guilds(headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    Json(json!([
        { "id": GUILD_ID, "name": "Fake Guild", "icon": null, "permissions": 8 },
        { "id": "10", "name": "Other Guild", "icon": "abc", "permissions": 0 }
    ]))
    .into_response()
}

async fn get_editable_guilds(headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    Json(json!([
        { "id": GUILD_ID, "name": "Fake Guild", "icon": null, "permissions": 8, "nick": "bot" }
    ]))
    .into_response()
}

async fn get_guild(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if id != GUILD_ID {
        return guild_not_found();
    }
    Json(json!({
        "id": GUILD_ID,
        "name": "Fake Guild",
        "icon": null,
        "region": "deprecated",
        "deployments": [{
            "id": DEPLOYMENT_ID,
            "bot_id": "270148059269300224",
            "type": 0,
            "app_id": null,
            "name": "main",
            "status": 1,
            "revision": 4,
            "config": "{\"enabled\":true,\"events\":[],\"tasks\":{\"cronTasks\":[]}}",
            "disabled": false,
            "last_updated_at": null
        }]
    }))
    .into_response()
}

async fn get_guild_stats(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if id != GUILD_ID {
        return guild_not_found();
    }
    Json(json!([
        { "date": 1_658_620_800, "cpuMs": 12.5, "events": 3, "kvOperations": 7 },
        { "date": 1_658_620_860 }
    ]))
    .into_response()
}

async fn get_deployment(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<Arc<FakeState>>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if id != DEPLOYMENT_ID {
        return deployment_not_found();
    }
    Json(deployment_json(&state)).into_response()
}

async fn publish_deployment(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<Arc<FakeState>>,
    body: Bytes,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if id != DEPLOYMENT_ID {
        return deployment_not_found();
    }

    let request: Value = match serde_json::from_slice(&body) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "msg": "missing json body" })),
            )
                .into_response();
        }
    };

    let mut response = deployment_json(&state);
    if request.get("contents").and_then(Value::as_str).is_none() {
        response["errors"] = json!({
            "type": "validation",
            "errors": [{ "loc": ["body", "contents"], "msg": "field required", "type": "value_error.missing" }]
        });
    }
    state.published.lock().push(request);
    Json(response).into_response()
}

async fn get_namespaces(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if id != DEPLOYMENT_ID {
        return deployment_not_found();
    }
    Json(json!([
        { "namespace": "default", "count": 2 },
        { "namespace": "binary", "count": 1 }
    ]))
    .into_response()
}

async fn get_namespace_items(
    headers: HeaderMap,
    Path((id, namespace)): Path<(String, String)>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if id != DEPLOYMENT_ID {
        return deployment_not_found();
    }
    match namespace.as_str() {
        "default" => Json(json!([
            { "key": "counter", "value": { "string": "3" } },
            { "key": "profile", "value": { "string": "{\"name\":\"tester\"}" }, "expiresAt": "2030-01-01T00:00:00Z" }
        ]))
        .into_response(),
        "binary" => Json(json!([
            { "key": "blob", "value": { "bytes": "AAE=" } }
        ]))
        .into_response(),
        _ => Json(json!([])).into_response(),
    }
}

// ============================================================================
// Workbench WebSocket
// ============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session): Path<u64>,
    State(state): State<Arc<FakeState>>,
) -> Response {
    if !state.used_sessions.lock().insert(session) {
        return (StatusCode::NOT_FOUND, "workbench session already used").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, session, state))
}

async fn handle_socket(mut socket: WebSocket, session: u64, state: Arc<FakeState>) {
    state.ws_connections.fetch_add(1, Ordering::SeqCst);
    debug!(session, "workbench socket accepted");

    let frame = json!([{ "method": "log", "data": ["session", session] }]).to_string();
    if socket.send(Message::Text(frame.into())).await.is_err() {
        return;
    }

    let closed_by_client = tokio::select! {
        _ = tokio::time::sleep(FakePylon::SOCKET_LIFETIME) => false,
        _ = wait_for_close(&mut socket) => true,
    };

    if closed_by_client {
        state.client_closes.fetch_add(1, Ordering::SeqCst);
    } else {
        let sent = socket
            .send(Message::Close(Some(CloseFrame {
                code: 1000,
                reason: "rotate".into(),
            })))
            .await;
        if sent.is_ok()
            && tokio::time::timeout(Duration::from_secs(1), wait_for_close(&mut socket))
                .await
                .unwrap_or(false)
        {
            state.close_replies.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Returns `true` once a close frame arrives, `false` if the socket ends first.
async fn wait_for_close(socket: &mut WebSocket) -> bool {
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            return true;
        }
    }
    false
}
