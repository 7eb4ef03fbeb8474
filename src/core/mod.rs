//! Client core: connection, subscriptions and the caller-facing facade.
//!
//! Internal modules:
//! - [`registry`]: maps task ids to listeners and dispatches task updates;
//! - [`connection`]: the single reconnecting push channel and its read loop;
//! - [`adapter`]: request/response operations awaiting terminal task events;
//! - [`builder`]: wires the parts from a [`Config`](crate::Config).

mod adapter;
mod builder;
mod connection;
mod registry;

pub use adapter::{AudioResult, TtsAdapter};
pub use builder::ClientBuilder;
pub use connection::{ConnectionState, ConnectionStatus, TransportClient};
pub use registry::{SubscriptionHandle, TaskRegistry};
