//! # Wire side of the client.
//!
//! - [`Transport`] opens the push channel and yields a [`Session`]
//! - [`SseTransport`] is the `reqwest` event-stream implementation
//! - [`TaskApi`] / [`HttpTaskApi`] are the request/response endpoints
//!
//! ```text
//! SseTransport::open()
//!   ├─► GET {base}/events (Accept: text/event-stream)
//!   ├─► decode frames until the `connected` handshake (bounded by connect_timeout)
//!   └─► Session { client_id, messages = buffered frames ++ rest of the stream }
//! ```

mod api;
mod message;
mod sse;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, stream};

use crate::config::Config;
use crate::error::ClientError;

pub use api::{ApiResponse, AudioRequest, CLIENT_ID_HEADER, HttpTaskApi, TaskApi, TaskData};
pub use message::ServerMessage;
pub use sse::{SseDecoder, SseFrame, decode_stream};

/// Stream of decoded push channel messages.
///
/// Ends when the server closes the channel. A [`ClientError::Decode`] item is
/// a skipped frame; any other error means the channel is broken.
pub type MessageStream = BoxStream<'static, Result<ServerMessage, ClientError>>;

/// An open push channel.
pub struct Session {
    /// Id assigned by the server during the handshake.
    pub client_id: Option<String>,
    /// Messages received after the handshake.
    pub messages: MessageStream,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Opens push channels.
///
/// One call is one connection attempt; retrying is the caller's business.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens the channel and completes the handshake.
    async fn open(&self) -> Result<Session, ClientError>;
}

/// Event-stream transport over `reqwest`.
#[derive(Clone, Debug)]
pub struct SseTransport {
    http: reqwest::Client,
    url: String,
    handshake_timeout: Option<Duration>,
}

impl SseTransport {
    /// Creates a transport for `{cfg.base_url}/events`.
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        Self {
            http,
            url: cfg.endpoint("/events"),
            handshake_timeout: cfg.connect_timeout_opt(),
        }
    }

    async fn open_inner(&self) -> Result<Session, ClientError> {
        let resp = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                reason: format!("push channel returned {status}"),
            });
        }

        let mut frames = decode_stream(resp.bytes_stream());
        let mut early = Vec::new();
        while let Some(item) = frames.next().await {
            match item {
                Ok(ServerMessage::Connected { client_id }) => {
                    let messages = stream::iter(early.into_iter().map(Ok))
                        .chain(frames)
                        .boxed();
                    return Ok(Session {
                        client_id: Some(client_id),
                        messages,
                    });
                }
                Ok(other) => early.push(other),
                Err(ClientError::Decode { reason }) => {
                    tracing::warn!(%reason, "skipping undecodable frame before handshake");
                }
                Err(err) => return Err(err),
            }
        }
        Err(ClientError::Http {
            reason: "push channel closed before handshake".to_owned(),
        })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self) -> Result<Session, ClientError> {
        match self.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, self.open_inner())
                .await
                .map_err(|_| ClientError::Http {
                    reason: format!("handshake timed out after {limit:?}"),
                })?,
            None => self.open_inner().await,
        }
    }
}
