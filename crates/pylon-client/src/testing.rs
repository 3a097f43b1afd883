//! In-memory transport and socket connector shared by unit tests.

use crate::client::{ClientConfig, PylonClient};
use crate::error::Error;
use crate::transport::{HttpRequest, HttpTransport, RawResponse};
use crate::websocket::{SocketConnector, SocketFrame, SocketSession};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

type Responder = Box<dyn Fn(usize, &HttpRequest) -> RawResponse + Send + Sync>;

/// Transport answering from a closure and recording every request.
pub(crate) struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    respond: Responder,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl MockTransport {
    pub(crate) fn new(
        respond: impl Fn(usize, &HttpRequest) -> RawResponse + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Answers every request with the same status and body.
    pub(crate) fn reply(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::new(move |_, _| RawResponse::new(status, body.clone()))
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, Error> {
        let index = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len() - 1
        };
        Ok((self.respond)(index, &request))
    }
}

/// Builds a client over `transport` with token "secret" and default
/// deployment "5".
pub(crate) fn client_with(transport: &Arc<MockTransport>) -> PylonClient {
    let config = ClientConfig::new("secret").with_deployment_id("5");
    PylonClient::with_transport(config, transport.clone()).unwrap()
}

/// Deployment body whose workbench URL ends in `n`.
pub(crate) fn deployment_body(n: usize) -> String {
    serde_json::json!({
        "id": "5",
        "bot_id": "1",
        "type": 0,
        "app_id": null,
        "name": "main",
        "status": 1,
        "revision": 1,
        "config": "{\"enabled\":true,\"events\":[],\"tasks\":{\"cronTasks\":[]}}",
        "workbench_url": format!("wss://workbench.pylon.bot/ws/{}", n),
        "guild": { "id": "9", "name": "Guild", "icon": null },
        "script": { "id": "5", "project": "{\"files\":[]}" }
    })
    .to_string()
}

/// Test side of one socket opened through [`MockConnector`].
#[derive(Debug)]
pub(crate) struct MockSocket {
    pub(crate) url: String,
    frames: mpsc::Sender<SocketFrame>,
    close_rx: oneshot::Receiver<()>,
    closed: bool,
}

/// Connector handing out in-memory sockets.
#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    sockets: Mutex<Vec<MockSocket>>,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open_count(&self) -> usize {
        self.sockets.lock().len()
    }

    pub(crate) fn url(&self, index: usize) -> String {
        self.sockets.lock()[index].url.clone()
    }

    /// Returns a sender driving socket `index`.
    pub(crate) fn frames(&self, index: usize) -> mpsc::Sender<SocketFrame> {
        self.sockets.lock()[index].frames.clone()
    }

    /// Returns `true` once the stream explicitly closed socket `index`.
    pub(crate) fn was_closed(&self, index: usize) -> bool {
        let mut sockets = self.sockets.lock();
        let socket = &mut sockets[index];
        if !socket.closed {
            socket.closed = socket.close_rx.try_recv().is_ok();
        }
        socket.closed
    }
}

#[async_trait]
impl SocketConnector for MockConnector {
    async fn open(&self, url: &str) -> Result<SocketSession, Error> {
        let (frame_tx, frame_rx) = mpsc::channel(16);
        let (close_tx, close_rx) = oneshot::channel();
        self.sockets.lock().push(MockSocket {
            url: url.to_string(),
            frames: frame_tx,
            close_rx,
            closed: false,
        });
        Ok(SocketSession::new(frame_rx, close_tx))
    }
}
