//! Character generation seam.
//!
//! The generator turns feeds into a role card and a world book. Their schema
//! belongs to the generation pipeline, so both travel as `serde_json::Value`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cradle::feed::Feed;
use crate::error::FeedError;

/// Seed for a brand-new character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterInitialData {
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Personality summary.
    pub personality: String,
    /// Additional seed fields understood by the generator.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CharacterInitialData {
    /// Placeholder seed used when the first feeds are processed.
    pub fn cradle_placeholder() -> Self {
        Self {
            name: "Cradle Character".to_owned(),
            description: "A character being developed in the Cradle System".to_owned(),
            personality: "Personality will be determined based on feed data".to_owned(),
            extra: Map::new(),
        }
    }
}

/// Generated character state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterData {
    /// Role card document.
    pub role_card: Option<Value>,
    /// World book document.
    pub world_book: Option<Value>,
}

/// Builds and refines characters.
///
/// Implementations keep their own current character; `current()` reports it.
#[async_trait]
pub trait CharacterGenerator: Send + Sync {
    /// Creates a character from a seed.
    async fn generate_initial(&self, seed: &CharacterInitialData) -> Result<CharacterData, FeedError>;

    /// Refines the current character with new feeds.
    async fn update_with_feeds(&self, feeds: &[Feed]) -> Result<CharacterData, FeedError>;

    /// The character generated so far.
    fn current(&self) -> CharacterData;

    /// Forgets the current character.
    fn reset(&self);
}
