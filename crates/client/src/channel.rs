//! Realtime channel: a WebSocket that pushes job envelopes.
//!
//! [`ChannelConnector`] opens a channel for one job and yields its text
//! frames as a stream. [`WsConnector`] is the tokio-tungstenite
//! implementation; tests provide their own connector.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{future, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use panel_core::endpoints;

/// Text frames received on an open channel. Ends when the peer closes.
pub type FrameStream = BoxStream<'static, Result<String, ChannelError>>;

/// Opens realtime channels scoped to a job id.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, job_id: &str) -> Result<FrameStream, ChannelError>;
}

/// Connects to `{ws_base}/ws/{job_id}` over WebSocket.
pub struct WsConnector {
    ws_base: String,
    secure: bool,
}

impl WsConnector {
    /// * `ws_base` - WebSocket base URL, e.g. `ws://host:8080`.
    /// * `secure`  - upgrade `ws://` to `wss://`.
    pub fn new(ws_base: String, secure: bool) -> Self {
        Self { ws_base, secure }
    }

    /// Full channel URL for a job.
    pub fn url_for(&self, job_id: &str) -> String {
        endpoints::channel_url(&self.ws_base, job_id, self.secure)
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, job_id: &str) -> Result<FrameStream, ChannelError> {
        let url = self.url_for(job_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ChannelError::Connection(format!("Failed to connect to {url}: {e}"))
        })?;

        tracing::info!(job_id, url = %url, "Realtime channel connected");

        Ok(text_frames(ws_stream).boxed())
    }
}

/// Reduce a WebSocket message stream to its text payloads.
///
/// Ping/pong and binary frames are skipped; a close frame ends the stream.
pub fn text_frames<S>(messages: S) -> impl Stream<Item = Result<String, ChannelError>>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>,
{
    messages
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(ChannelError::Protocol(e.to_string()))),
            })
        })
}

/// Errors that can occur on the realtime channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
