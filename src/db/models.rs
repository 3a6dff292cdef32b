use serde::{Deserialize, Serialize};

use crate::graph::{ReactionCount, ReactionTally};

/// A stored page post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub page_id: String,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub message: Option<String>,
    pub message_tags: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub properties: Option<String>,
    pub shares: i64,
    pub source: Option<String>,
    pub post_type: Option<String>,
    pub created_time: Option<String>,
    pub retrieved_time: String,
    pub reactions_like: Option<i64>,
    pub reactions_love: Option<i64>,
    pub reactions_wow: Option<i64>,
    pub reactions_haha: Option<i64>,
    pub reactions_sad: Option<i64>,
    pub reactions_angry: Option<i64>,
    pub reactions_retrieved_time: Option<String>,
}

impl Post {
    /// The attached reaction tally, or `None` if none has been stored yet.
    #[must_use]
    pub fn reactions(&self) -> Option<ReactionTally> {
        self.reactions_retrieved_time.as_ref()?;

        let count = |column: Option<i64>| -> ReactionCount {
            column.and_then(|n| u64::try_from(n).ok()).into()
        };
        Some(ReactionTally {
            like: count(self.reactions_like),
            love: count(self.reactions_love),
            wow: count(self.reactions_wow),
            haha: count(self.reactions_haha),
            sad: count(self.reactions_sad),
            angry: count(self.reactions_angry),
        })
    }
}

/// A stored comment. Replies carry the id of the comment they answer in `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub like_count: i64,
    pub message: Option<String>,
    pub message_tags: Option<String>,
    pub parent_id: Option<String>,
    pub created_time: Option<String>,
    pub retrieved_time: String,
}

/// Data for upserting a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub id: String,
    pub page_id: String,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub message: Option<String>,
    pub message_tags: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub properties: Option<String>,
    pub shares: i64,
    pub source: Option<String>,
    pub post_type: Option<String>,
    pub created_time: Option<String>,
    pub retrieved_time: String,
}

/// Data for inserting a comment or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub id: String,
    pub post_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub like_count: i64,
    pub message: Option<String>,
    pub message_tags: Option<String>,
    pub parent_id: Option<String>,
    pub created_time: Option<String>,
    pub retrieved_time: String,
}
