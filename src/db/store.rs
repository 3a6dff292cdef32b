//! Persistence port consumed by the ingestion pipeline.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use super::models::{Comment, NewComment, NewPost, Post};
use super::{queries, Database};
use crate::graph::ReactionTally;

/// Owner of a comment traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// Top-level comments of a post.
    Post(String),
    /// Replies to a top-level comment.
    Comment(String),
}

impl Parent {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Post(id) | Self::Comment(id) => id,
        }
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post {id}"),
            Self::Comment(id) => write!(f, "comment {id}"),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Number of children already stored for `parent`.
    async fn count_children(&self, parent: &Parent) -> Result<u64>;

    /// Insert a post or refresh the share count of an existing one.
    async fn upsert_post(&self, post: &NewPost) -> Result<()>;

    /// Insert a comment unless its id is already stored. Returns whether a row was written.
    async fn insert_comment_if_absent(&self, comment: &NewComment) -> Result<bool>;

    /// Attach a tally to a stored post. Returns `false` if the post is unknown.
    async fn update_reactions(&self, post_id: &str, tally: &ReactionTally) -> Result<bool>;

    async fn list_posts(&self, page_id: &str) -> Result<Vec<Post>>;

    async fn list_posts_without_reactions(&self, page_id: &str) -> Result<Vec<Post>>;

    async fn list_top_level_comments(&self) -> Result<Vec<Comment>>;
}

#[async_trait]
impl Store for Database {
    async fn count_children(&self, parent: &Parent) -> Result<u64> {
        match parent {
            Parent::Post(id) => queries::count_post_comments(self.pool(), id).await,
            Parent::Comment(id) => queries::count_comment_replies(self.pool(), id).await,
        }
    }

    async fn upsert_post(&self, post: &NewPost) -> Result<()> {
        queries::upsert_post(self.pool(), post).await
    }

    async fn insert_comment_if_absent(&self, comment: &NewComment) -> Result<bool> {
        queries::insert_comment_if_absent(self.pool(), comment).await
    }

    async fn update_reactions(&self, post_id: &str, tally: &ReactionTally) -> Result<bool> {
        queries::update_post_reactions(self.pool(), post_id, tally).await
    }

    async fn list_posts(&self, page_id: &str) -> Result<Vec<Post>> {
        queries::list_posts(self.pool(), page_id).await
    }

    async fn list_posts_without_reactions(&self, page_id: &str) -> Result<Vec<Post>> {
        queries::list_posts_without_reactions(self.pool(), page_id).await
    }

    async fn list_top_level_comments(&self) -> Result<Vec<Comment>> {
        queries::list_top_level_comments(self.pool()).await
    }
}
