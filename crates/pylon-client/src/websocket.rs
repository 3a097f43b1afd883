//! Reconnecting WebSocket stream of a deployment's console output.
//!
//! Pylon drops the workbench socket on a server-defined interval and every
//! socket URL works only once. [`LogStream`] keeps one broadcast emitter alive
//! across any number of sockets: when a socket closes or fails it waits a fixed
//! delay, fetches a fresh URL through [`PylonClient::get_deployment`], and opens
//! the next socket. Subscribers never have to resubscribe.

use crate::client::PylonClient;
use crate::error::Error;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;


/// Console method a message was logged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMethod {
    /// `console.log`.
    Log,
    /// `console.info`.
    Info,
    /// `console.warn`.
    Warn,
    /// `console.error`, also used for runtime errors.
    Error,
    /// `console.debug`.
    Debug,
}

impl std::fmt::Display for ConsoleMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// One console call made by the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Console method used.
    pub method: ConsoleMethod,
    /// Arguments passed to the console method.
    pub data: Vec<Value>,
}

/// Details of a socket close.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code, if the peer sent one.
    pub code: Option<u16>,
    /// Close reason.
    pub reason: String,
}

/// Events republished by a [`LogStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// A socket was (re)opened.
    Open,
    /// The deployment logged something.
    Message(ConsoleMessage),
    /// A socket closed. A reconnect follows unless the stream was closed.
    Close(CloseInfo),
    /// A socket failed, or a reconnect attempt failed.
    Error(String),
}

/// Lifecycle state of a [`LogStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` has not been called yet.
    Idle,
    /// The first connection is being established.
    Connecting,
    /// A socket is live.
    Connected,
    /// The last socket ended; the next one opens after the reconnect delay.
    ReconnectPending,
    /// Closed for good.
    Closed,
}

/// Log stream configuration.
#[derive(Debug, Clone)]
pub struct LogStreamConfig {
    /// Delay between a socket ending and the next connection attempt.
    pub reconnect_delay: Duration,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for LogStreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(250),
            event_capacity: 256,
        }
    }
}

// ============================================================================
// Socket seam
// ============================================================================

/// What an open socket reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    /// A text frame.
    Text(String),
    /// The socket closed.
    Closed(CloseInfo),
    /// The socket failed.
    Error(String),
}

/// An open socket: a stream of frames plus a one-shot close signal.
#[derive(Debug)]
pub struct SocketSession {
    frames: mpsc::Receiver<SocketFrame>,
    closer: oneshot::Sender<()>,
}

impl SocketSession {
    /// Creates a session. Sending on `closer` must close the socket.
    #[must_use]
    pub fn new(frames: mpsc::Receiver<SocketFrame>, closer: oneshot::Sender<()>) -> Self {
        Self { frames, closer }
    }
}

/// Opens sockets for a [`LogStream`].
#[async_trait]
pub trait SocketConnector: Send + Sync + std::fmt::Debug {
    /// Opens a socket to `url`.
    ///
    /// # Errors
    /// Returns error if the socket cannot be opened.
    async fn open(&self, url: &str) -> Result<SocketSession, Error>;
}

/// [`SocketConnector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl SocketConnector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<SocketSession, Error> {
        let (ws_stream, _) = connect_async(url).await.map_err(Box::new)?;
        let (mut write, mut read) = ws_stream.split();

        let (frame_tx, frame_rx) = mpsc::channel::<SocketFrame>(100);
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        let _ = write.send(Message::Close(None)).await;
                        let _ = write.close().await;
                        break;
                    }
                    msg = read.next() => {
                        let frame = match msg {
                            Some(Ok(Message::Text(text))) => SocketFrame::Text(text.as_str().to_owned()),
                            Some(Ok(Message::Close(frame))) => SocketFrame::Closed(
                                frame
                                    .map(|f| CloseInfo {
                                        code: Some(u16::from(f.code)),
                                        reason: f.reason.as_str().to_owned(),
                                    })
                                    .unwrap_or_default(),
                            ),
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => SocketFrame::Error(e.to_string()),
                            None => SocketFrame::Closed(CloseInfo::default()),
                        };
                        let terminal = !matches!(frame, SocketFrame::Text(_));
                        if terminal {
                            // Flushes the queued close reply, finishing the handshake.
                            if let Err(e) = write.close().await {
                                debug!(error = %e, "closing workbench socket");
                            }
                        }
                        if frame_tx.send(frame).await.is_err() || terminal {
                            break;
                        }
                    }
                }
            }
        });

        Ok(SocketSession::new(frame_rx, close_tx))
    }
}

// ============================================================================
// LogStream
// ============================================================================

/// Follows a deployment's console output across socket reconnects.
///
/// Dropping the stream closes it.
#[derive(Debug)]
pub struct LogStream {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    client: PylonClient,
    deployment_id: String,
    config: LogStreamConfig,
    connector: Arc<dyn SocketConnector>,
    state: Mutex<ConnectionState>,
    /// Permanent "do not reconnect" flag.
    closed: watch::Sender<bool>,
    /// Close signal of the live socket.
    socket: Mutex<Option<oneshot::Sender<()>>>,
    /// `None` once closed, which detaches every subscriber.
    events: Mutex<Option<broadcast::Sender<LogEvent>>>,
}

/// Why a socket session stopped.
enum SessionEnd {
    Closed,
    Errored,
    Cancelled,
}

impl LogStream {
    /// Creates a stream for `deployment_id` that opens sockets with
    /// `tokio-tungstenite`.
    ///
    /// # Errors
    /// Returns error if `deployment_id` is empty.
    pub fn new(
        client: PylonClient,
        deployment_id: &str,
        config: LogStreamConfig,
    ) -> Result<Self, Error> {
        Self::with_connector(client, deployment_id, config, Arc::new(TungsteniteConnector))
    }

    /// Creates a stream that opens sockets through `connector`.
    ///
    /// # Errors
    /// Returns error if `deployment_id` is empty.
    pub fn with_connector(
        client: PylonClient,
        deployment_id: &str,
        config: LogStreamConfig,
        connector: Arc<dyn SocketConnector>,
    ) -> Result<Self, Error> {
        if deployment_id.is_empty() {
            return Err(Error::missing("deployment_id"));
        }

        let (closed, _) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                deployment_id: deployment_id.to_string(),
                config,
                connector,
                state: Mutex::new(ConnectionState::Idle),
                closed,
                socket: Mutex::new(None),
                events: Mutex::new(Some(event_tx)),
            }),
        })
    }

    /// Returns the followed deployment ID.
    #[must_use]
    pub fn deployment_id(&self) -> &str {
        &self.inner.deployment_id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns a receiver for stream events.
    ///
    /// Receivers stay valid across reconnects. Dropping one unsubscribes it.
    /// After [`close`](Self::close) the returned receiver is already closed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        match self.inner.events.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .events
            .lock()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Fetches the workbench URL and opens the first socket.
    ///
    /// Later sockets are opened automatically. Calling this while a socket is
    /// live or pending, or after [`close`](Self::close), does nothing.
    ///
    /// # Errors
    /// Returns error if the URL cannot be resolved or the socket cannot be
    /// opened. The stream then stays idle and `connect` may be retried.
    pub async fn connect(&self) -> Result<(), Error> {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Idle {
                debug!(state = ?*state, "connect ignored");
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        match self.inner.open().await {
            Ok(Some(frames)) => {
                tokio::spawn(run(Arc::clone(&self.inner), frames));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.inner.set_state(ConnectionState::Idle);
                Err(e)
            }
        }
    }

    /// Closes the live socket and stops reconnecting, permanently.
    ///
    /// All subscribers are detached. Calling this again does nothing.
    pub fn close(&self) {
        if self.inner.closed.send_replace(true) {
            return;
        }

        *self.inner.state.lock() = ConnectionState::Closed;
        if let Some(closer) = self.inner.socket.lock().take() {
            let _ = closer.send(());
        }
        self.inner.events.lock().take();
        info!(deployment_id = %self.inner.deployment_id, "log stream closed");
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state != ConnectionState::Closed {
            *state = next;
        }
    }

    fn emit(&self, event: LogEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Resolves a fresh URL and opens a socket.
    ///
    /// Returns `None` if the stream was closed while opening.
    async fn open(&self) -> Result<Option<mpsc::Receiver<SocketFrame>>, Error> {
        let deployment = self.client.get_deployment(Some(&self.deployment_id)).await?;
        let url = Url::parse(&deployment.workbench_url).map_err(|e| Error::UnexpectedResponse {
            detail: format!("workbench_url {:?} is not a valid URL: {}", deployment.workbench_url, e),
            response: None,
        })?;

        let SocketSession { frames, closer } = self.connector.open(url.as_str()).await?;

        {
            let mut socket = self.socket.lock();
            if self.is_closed() {
                let _ = closer.send(());
                return Ok(None);
            }
            *socket = Some(closer);
        }

        self.set_state(ConnectionState::Connected);
        info!(deployment_id = %self.deployment_id, "workbench socket open");
        self.emit(LogEvent::Open);
        Ok(Some(frames))
    }

    /// Forwards frames of one socket until it ends.
    async fn pump(&self, frames: &mut mpsc::Receiver<SocketFrame>) -> SessionEnd {
        let mut closed = self.closed.subscribe();
        loop {
            let frame = tokio::select! {
                frame = frames.recv() => frame,
                _ = closed.wait_for(|closed| *closed) => return SessionEnd::Cancelled,
            };

            match frame {
                Some(SocketFrame::Text(text)) => self.emit_messages(&text),
                Some(SocketFrame::Closed(info)) => {
                    debug!(code = ?info.code, reason = %info.reason, "workbench socket closed");
                    self.emit(LogEvent::Close(info));
                    return SessionEnd::Closed;
                }
                Some(SocketFrame::Error(message)) => {
                    warn!(%message, "workbench socket error");
                    self.emit(LogEvent::Error(message));
                    return SessionEnd::Errored;
                }
                None => {
                    self.emit(LogEvent::Close(CloseInfo::default()));
                    return SessionEnd::Closed;
                }
            }
        }
    }

    fn emit_messages(&self, text: &str) {
        match serde_json::from_str::<Vec<ConsoleMessage>>(text) {
            Ok(messages) => {
                for message in messages {
                    self.emit(LogEvent::Message(message));
                }
            }
            Err(e) => warn!(error = %e, "skipping undecodable workbench frame"),
        }
    }

    /// Waits out the reconnect delay. Returns `false` if closed meanwhile.
    async fn wait_reconnect_delay(&self) -> bool {
        let mut closed = self.closed.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(self.config.reconnect_delay) => !self.is_closed(),
            _ = closed.wait_for(|closed| *closed) => false,
        }
    }
}

/// Owns the live socket and reconnects until the stream is closed.
///
/// Only one of these runs per stream, so sockets never overlap.
async fn run(inner: Arc<Inner>, mut frames: mpsc::Receiver<SocketFrame>) {
    loop {
        let end = inner.pump(&mut frames).await;
        drop(frames);

        let closer = inner.socket.lock().take();
        if let (SessionEnd::Errored, Some(closer)) = (&end, closer) {
            let _ = closer.send(());
        }
        if matches!(end, SessionEnd::Cancelled) || inner.is_closed() {
            return;
        }

        frames = loop {
            inner.set_state(ConnectionState::ReconnectPending);
            if !inner.wait_reconnect_delay().await {
                return;
            }

            info!(deployment_id = %inner.deployment_id, "reconnecting workbench socket");
            match inner.open().await {
                Ok(Some(frames)) => break frames,
                Ok(None) => return,
                Err(e) => {
                    if inner.is_closed() {
                        return;
                    }
                    warn!(error = %e, "workbench reconnect failed");
                    inner.emit(LogEvent::Error(e.to_string()));
                }
            }
        };
    }
}
