//! Graph API port.
//!
//! The ingestion core only sees [`GraphApi`]; [`GraphClient`] binds it to the
//! HTTP API and owns authentication.

mod client;
mod types;

pub use client::GraphClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("Graph API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the access token or the app secret.
        GraphError::Transport(err.without_url().to_string())
    }
}

/// Remote operations the ingestion pipeline depends on.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Fetch a single page of an edge.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse>;

    /// Fetch the total count of one reaction kind on a post.
    ///
    /// A response without a summary resolves to [`ReactionCount::Unknown`].
    async fn fetch_reaction(&self, post_id: &str, kind: ReactionKind) -> Result<ReactionCount>;
}
