//! Cradle: incubating a character from fed material.
//!
//! ## Contents
//! - [`FeedAccumulator`] insertion-ordered feed store with snapshot queries
//! - [`Feed`], [`FeedType`], [`FeedId`], [`filter_by_type`] feed records
//! - [`CharacterGenerator`] seam to the downstream generation pipeline
//! - [`CradleService`] ties both together (`process_feeds`)

mod accumulator;
mod feed;
mod generator;
mod service;

pub use accumulator::FeedAccumulator;
pub use feed::{Feed, FeedId, FeedType, filter_by_type};
pub use generator::{CharacterData, CharacterGenerator, CharacterInitialData};
pub use service::CradleService;
