//! # cradle-link
//!
//! **cradle-link** is an event-driven client for a remote speech generation
//! task server, plus the cradle feed accumulator that incubates a character
//! from fed material.
//!
//! The server answers requests with a task id and reports progress over a
//! single push channel. This crate keeps that channel alive, multiplexes task
//! updates to interested listeners and turns "submit, then wait for a terminal
//! update" into one awaitable call.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller
//!     │ generate_audio / retry_audio
//!     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TtsAdapter (facade)                                              │
//! │  - ensures the connection (auto-connect)                          │
//! │  - POST /api/tts, /api/tts/retry  (TaskApi)                       │
//! │  - waits for a terminal TaskEvent on a channel subscription       │
//! └──────┬───────────────────────────────────────────────┬────────────┘
//!        ▼                                               ▼
//! ┌───────────────────────────────┐        ┌──────────────────────────┐
//! │  TransportClient              │        │  TaskRegistry            │
//! │  - one push channel           │ ─────► │  - globals, then per-task│
//! │  - bounded reconnect policy   │dispatch│  - one worker per        │
//! │  - read loop (spawned)        │        │    registration          │
//! └──────┬────────────────────────┘        └───┬──────────┬───────────┘
//!        │ lifecycle Events                    ▼          ▼
//!        ▼                               ListenerWorker  ListenerWorker
//!   Bus (broadcast) ◄── ListenerPanicked / Overflow   ▼          ▼
//!                                          listener.on_event()  ...
//! ```
//!
//! ### Task lifecycle
//! ```text
//! queued ──► running ──► succeeded | failed      (terminal: listeners removed)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Facade**        | Submit and await speech generation tasks.                     | [`TtsAdapter`], [`AudioRequest`]            |
//! | **Connection**    | Single reconnecting push channel.                             | [`TransportClient`], [`Transport`]          |
//! | **Subscriptions** | Per-task and global listeners with isolated delivery.         | [`TaskRegistry`], [`Listener`]              |
//! | **Events**        | Task updates and client lifecycle events.                     | [`TaskEvent`], [`Event`], [`Bus`]           |
//! | **Policies**      | Bounded reconnect attempts and delays.                        | [`ReconnectPolicy`], [`BackoffPolicy`]      |
//! | **Errors**        | Typed errors for connection, tasks and feeds.                 | [`ClientError`], [`FeedError`]              |
//! | **Cradle**        | Feed intake and character generation.                         | [`FeedAccumulator`], [`CradleService`]      |
//! | **Configuration** | Centralized client settings.                                  | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] listener (writes every update via `tracing`).
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use cradle_link::{AudioRequest, Config, Listener, ListenerFn, TaskEvent, TtsAdapter};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let progress: Arc<dyn Listener> = ListenerFn::arc("progress", |ev: &TaskEvent| {
//!         println!("{} is {}", ev.task_id, ev.raw_status);
//!     });
//!
//!     let adapter = TtsAdapter::builder(Config::default())
//!         .with_listeners(vec![progress])
//!         .build()?;
//!
//!     let request = AudioRequest::new("voice-7", "Good morning!", "me@example.com");
//!     let result = adapter.generate_audio(&request).await?;
//!     println!("audio at {:?}", result.audio_url);
//!
//!     adapter.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod cradle;
mod error;
mod events;
mod listeners;
mod policies;
mod transport;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_BASE_URL};
pub use core::{
    AudioResult, ClientBuilder, ConnectionState, ConnectionStatus, SubscriptionHandle,
    TaskRegistry, TransportClient, TtsAdapter,
};
pub use cradle::{
    CharacterData, CharacterGenerator, CharacterInitialData, CradleService, Feed,
    FeedAccumulator, FeedId, FeedType, filter_by_type,
};
pub use error::{ClientError, FeedError};
pub use events::{Bus, Event, EventKind, TaskEvent, TaskStatus};
pub use listeners::{ChannelListener, Listener, ListenerFn};
pub use policies::{BackoffPolicy, JitterPolicy, ReconnectPolicy};
pub use transport::{
    ApiResponse, AudioRequest, CLIENT_ID_HEADER, HttpTaskApi, MessageStream, ServerMessage,
    Session, SseDecoder, SseFrame, SseTransport, TaskApi, TaskData, Transport, decode_stream,
};

// Optional: expose a simple built-in logger listener.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogWriter;
