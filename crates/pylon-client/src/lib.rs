//! Typed client library for the Pylon API.
//!
//! This crate wraps the Pylon REST API and the deployment workbench WebSocket.
//! Every request goes through a single dispatcher that classifies failed
//! responses into a closed set of [`ErrorKind`]s, including the string-only
//! error bodies the API returns for missing guilds and deployments.
//!
//! # Example
//!
//! ```no_run
//! use pylon_client::{ClientConfig, LogEvent, PylonClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pylon_client::Error> {
//!     let client = PylonClient::new(
//!         ClientConfig::new("my-token").with_deployment_id("123456789"),
//!     )?;
//!
//!     let user = client.get_user().await?;
//!     println!("Logged in as {}", user.display_name);
//!
//!     // Follow the deployment's console output across reconnects.
//!     let stream = client.connect_socket(None)?;
//!     let mut events = stream.subscribe();
//!     stream.connect().await?;
//!     while let Ok(event) = events.recv().await {
//!         if let LogEvent::Message(message) = event {
//!             println!("[{}] {:?}", message.method, message.data);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod context;
mod error;
#[cfg(test)]
mod testing;
mod transport;
mod types;
mod websocket;

pub use client::{ClientConfig, DEFAULT_BASE_URL, PylonClient};
pub use context::RequestContext;
pub use error::{Error, ErrorKind, ParameterIssue};
pub use transport::{HttpMethod, HttpRequest, HttpTransport, RawResponse, ReqwestTransport};
pub use types::*;
pub use websocket::{
    CloseInfo, ConnectionState, ConsoleMessage, ConsoleMethod, LogEvent, LogStream,
    LogStreamConfig, SocketConnector, SocketFrame, SocketSession, TungsteniteConnector,
};
