use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FeedType {
    /// Posts by followees, privacy filtered.
    #[default]
    Personal,
    /// Every public post.
    Public,
    /// Union of personal and public.
    Combined,
}

pub const FEED_TYPES: [FeedType; 3] = [FeedType::Personal, FeedType::Public, FeedType::Combined];

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Personal => "personal",
            FeedType::Public => "public",
            FeedType::Combined => "combined",
        }
    }

    /// Whether a post belongs in this feed for the viewer; the in-memory
    /// counterpart of the SQL predicate in `post_repo`.
    #[cfg(test)]
    pub fn admits(&self, relation: Relation, is_public: bool) -> bool {
        let personal = relation.viewer_follows_author
            && (is_public || relation.author_follows_viewer);
        match self {
            FeedType::Personal => personal,
            FeedType::Public => is_public,
            FeedType::Combined => personal || is_public,
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFeedType;

impl fmt::Display for InvalidFeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = FEED_TYPES.iter().map(FeedType::as_str).collect::<Vec<_>>();
        write!(f, "Invalid feed_type. Must be one of: {}", names.join(", "))
    }
}

impl FromStr for FeedType {
    type Err = InvalidFeedType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FEED_TYPES
            .iter()
            .copied()
            .find(|feed| feed.as_str() == s)
            .ok_or(InvalidFeedType)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct FeedParams {
    pub feed_type: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Follow edges between a viewer and a post's author.
#[cfg(test)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Relation {
    pub viewer_follows_author: bool,
    pub author_follows_viewer: bool,
}

pub fn can_view_post(is_owner: bool, is_public: bool, is_mutual: bool) -> bool {
    is_owner || is_public || is_mutual
}
