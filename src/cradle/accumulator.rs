//! # Feed accumulator.
//!
//! Collects feeds for one cradle session in insertion order.
//!
//! ## Rules
//! - `add_feed` only appends; existing feeds never change on intake
//! - `get_all_feeds` returns an owned snapshot; mutating it changes nothing here
//! - `reset` clears everything; snapshots taken earlier are unaffected
//! - Type filtering works on snapshots and never touches the accumulator

use std::collections::HashSet;

use crate::cradle::feed::{Feed, FeedId, FeedType, filter_by_type};
use crate::error::FeedError;

/// Insertion-ordered feed store.
#[derive(Debug, Clone, Default)]
pub struct FeedAccumulator {
    feeds: Vec<Feed>,
}

impl FeedAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new unprocessed feed and returns its id.
    ///
    /// # Errors
    /// [`FeedError::EmptyContent`] if `content` is empty or whitespace only.
    pub fn add_feed(
        &mut self,
        content: impl Into<String>,
        feed_type: FeedType,
    ) -> Result<FeedId, FeedError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(FeedError::EmptyContent);
        }
        let feed = Feed::new(content, feed_type);
        let id = feed.id;
        self.feeds.push(feed);
        tracing::debug!(feed_id = %id, feed_type = feed_type.as_str(), "feed added");
        Ok(id)
    }

    /// Snapshot of every feed, in insertion order.
    pub fn get_all_feeds(&self) -> Vec<Feed> {
        self.feeds.clone()
    }

    /// Snapshot of the feeds of `feed_type`, in insertion order.
    pub fn feeds_of_type(&self, feed_type: FeedType) -> Vec<Feed> {
        filter_by_type(&self.feeds, feed_type)
    }

    /// Snapshot of the feeds not yet processed.
    pub fn unprocessed(&self) -> Vec<Feed> {
        self.feeds.iter().filter(|f| !f.processed).cloned().collect()
    }

    /// Marks the given feeds processed; returns how many changed.
    pub fn mark_processed(&mut self, ids: &[FeedId]) -> usize {
        let ids: HashSet<&FeedId> = ids.iter().collect();
        let mut changed = 0;
        for feed in self.feeds.iter_mut().filter(|f| ids.contains(&f.id)) {
            if !feed.processed {
                feed.processed = true;
                changed += 1;
            }
        }
        changed
    }

    /// Removes every feed.
    pub fn reset(&mut self) {
        self.feeds.clear();
    }

    /// Number of feeds.
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// True if no feed was added since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
