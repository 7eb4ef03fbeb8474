//! Feed records collected during a cradle session.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of fed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedType {
    /// Statements about the user.
    #[serde(rename = "aboutMe")]
    AboutMe,
    /// Raw material (stories, dialogue, descriptions).
    #[serde(rename = "material")]
    Material,
    /// Reference knowledge kept out of character generation.
    #[serde(rename = "knowledge")]
    Knowledge,
}

impl FeedType {
    /// Every feed type, in declaration order.
    pub const ALL: [FeedType; 3] = [FeedType::AboutMe, FeedType::Material, FeedType::Knowledge];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            FeedType::AboutMe => "aboutMe",
            FeedType::Material => "material",
            FeedType::Knowledge => "knowledge",
        }
    }
}

/// Unique feed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(Uuid);

impl FeedId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One piece of fed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Identifier assigned on intake.
    pub id: FeedId,
    /// Content category.
    #[serde(rename = "type")]
    pub feed_type: FeedType,
    /// Fed text.
    pub content: String,
    /// True once a processing pass consumed the feed.
    pub processed: bool,
    /// Intake time in milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub created_at_ms: u64,
}

impl Feed {
    pub(crate) fn new(content: String, feed_type: FeedType) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0);
        Self {
            id: FeedId::generate(),
            feed_type,
            content,
            processed: false,
            created_at_ms,
        }
    }
}

/// Feeds of `feed_type`, in their original order.
pub fn filter_by_type(feeds: &[Feed], feed_type: FeedType) -> Vec<Feed> {
    feeds
        .iter()
        .filter(|f| f.feed_type == feed_type)
        .cloned()
        .collect()
}
