//! # Cradle service: feeds in, character out.
//!
//! ```text
//! process_feeds()
//!   ├─► pending = unprocessed feeds        (none → Ok([]))
//!   ├─► split knowledge / other
//!   ├─► other feeds present or no role card yet?
//!   │     ├─ generator has a role card ─► update_with_feeds(other)
//!   │     └─ otherwise                 ─► generate_initial(placeholder seed)
//!   ├─► store role card / world book
//!   └─► mark every pending feed processed
//! ```
//!
//! A generator error leaves every feed unprocessed.

use crate::cradle::accumulator::FeedAccumulator;
use crate::cradle::feed::{Feed, FeedId, FeedType};
use crate::cradle::generator::{CharacterData, CharacterGenerator, CharacterInitialData};
use crate::error::FeedError;

/// Feed intake plus character generation for one cradle session.
pub struct CradleService<G> {
    feeds: FeedAccumulator,
    generator: G,
    character: CharacterData,
    initialized: bool,
}

impl<G: CharacterGenerator> CradleService<G> {
    /// Creates a service around `generator`.
    pub fn new(generator: G) -> Self {
        Self {
            feeds: FeedAccumulator::new(),
            generator,
            character: CharacterData::default(),
            initialized: false,
        }
    }

    /// Marks the service initialized (idempotent).
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        tracing::info!("cradle service initialized");
        self.initialized = true;
    }

    /// Marks the service stopped.
    pub fn shutdown(&mut self) {
        tracing::info!("cradle service shut down");
        self.initialized = false;
    }

    /// True between `initialize()` and `shutdown()`.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Adds a feed; see [`FeedAccumulator::add_feed`].
    pub fn add_feed(
        &mut self,
        content: impl Into<String>,
        feed_type: FeedType,
    ) -> Result<FeedId, FeedError> {
        self.feeds.add_feed(content, feed_type)
    }

    /// Snapshot of every feed, in insertion order.
    pub fn get_all_feeds(&self) -> Vec<Feed> {
        self.feeds.get_all_feeds()
    }

    /// The underlying accumulator.
    pub fn feeds(&self) -> &FeedAccumulator {
        &self.feeds
    }

    /// Runs one processing pass and returns the feeds it consumed.
    ///
    /// # Errors
    /// [`FeedError::Generation`] if the generator fails; no feed is marked then.
    pub async fn process_feeds(&mut self) -> Result<Vec<Feed>, FeedError> {
        let pending = self.feeds.unprocessed();
        if pending.is_empty() {
            tracing::debug!("no feeds to process");
            return Ok(Vec::new());
        }

        let (knowledge, other): (Vec<Feed>, Vec<Feed>) = pending
            .iter()
            .cloned()
            .partition(|f| f.feed_type == FeedType::Knowledge);
        tracing::debug!(
            knowledge = knowledge.len(),
            other = other.len(),
            "processing feeds"
        );

        if !other.is_empty() || self.character.role_card.is_none() {
            let generated = if self.generator.current().role_card.is_some() {
                self.generator.update_with_feeds(&other).await?
            } else {
                let seed = CharacterInitialData::cradle_placeholder();
                self.generator.generate_initial(&seed).await?
            };
            if generated.role_card.is_some() {
                self.character.role_card = generated.role_card;
            }
            if generated.world_book.is_some() {
                self.character.world_book = generated.world_book;
            }
        }

        let ids: Vec<FeedId> = pending.iter().map(|f| f.id).collect();
        self.feeds.mark_processed(&ids);
        Ok(pending
            .into_iter()
            .map(|mut f| {
                f.processed = true;
                f
            })
            .collect())
    }

    /// Creates a character directly from `seed`.
    pub async fn create_initial_character(
        &self,
        seed: &CharacterInitialData,
    ) -> Result<CharacterData, FeedError> {
        self.generator.generate_initial(seed).await
    }

    /// The generator's current character.
    pub fn current_character(&self) -> CharacterData {
        self.generator.current()
    }

    /// Resets the generator and drops every feed and stored character.
    pub fn reset(&mut self) {
        self.generator.reset();
        self.feeds.reset();
        self.character = CharacterData::default();
        tracing::info!("cradle service reset");
    }
}
