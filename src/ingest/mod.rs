//! Incremental ingestion of posts, comments, replies and reactions.

pub mod comments;
pub mod paginator;
pub mod posts;
pub mod reactions;
pub mod resume;
pub mod scheduler;

pub use scheduler::RunReport;

use std::collections::VecDeque;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::graph::{parse_graph_time, GraphApi, GraphError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Graph API request failed: {0}")]
    Graph(#[from] GraphError),

    #[error("failed to look up {what}")]
    Lookup {
        what: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist {entity} {id}")]
    Persist {
        entity: &'static str,
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Page sizes, caps and the post window for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestLimits {
    pub posts_since: i64,
    pub posts_until: Option<i64>,
    pub posts_per_request: u32,
    pub posts_per_run: usize,
    pub comments_per_request: u32,
    pub comments_per_parent_per_run: usize,
}

impl From<&Config> for IngestLimits {
    fn from(config: &Config) -> Self {
        Self {
            posts_since: config.posts_since,
            posts_until: config.posts_until,
            posts_per_request: config.posts_per_request,
            posts_per_run: config.posts_per_run,
            comments_per_request: config.comments_per_request,
            comments_per_parent_per_run: config.comments_per_parent_per_run,
        }
    }
}

/// Outcome of one traversal (or one reaction tally).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// Items received from the API, after the cap.
    pub fetched: usize,
    /// Rows inserted or updated.
    pub written: usize,
    /// Items whose id was already stored.
    pub duplicates: usize,
    /// Items that could not be stored.
    pub failed_writes: usize,
    /// The traversal ended early on a request or response error.
    pub truncated: bool,
}

/// Fetch a page's posts and upsert them.
pub async fn run_posts<A, S>(
    api: &A,
    store: &S,
    page_id: &str,
    limits: &IngestLimits,
) -> TraversalReport
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    posts::ingest_posts(api, store, page_id, limits).await
}

/// Attach reaction tallies to a page's stored posts, one post at a time.
///
/// With `missing_only`, posts that already carry a tally are skipped.
///
/// # Errors
///
/// Fails only if the post list cannot be read; per-post failures are counted.
pub async fn run_reactions<A, S>(
    api: &A,
    store: &S,
    page_id: &str,
    missing_only: bool,
) -> Result<RunReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    let posts = if missing_only {
        store.list_posts_without_reactions(page_id).await
    } else {
        store.list_posts(page_id).await
    }
    .map_err(|source| IngestError::Lookup {
        what: format!("posts of page {page_id}"),
        source,
    })?;

    let queue = VecDeque::from(posts);
    let report = scheduler::drain("reactions", queue, move |post| async move {
        reactions::ingest_reactions(api, store, &post).await
    })
    .await;

    info!(page_id, ?report, "Reaction run finished");
    Ok(report)
}

/// Fetch new top-level comments for each of a page's stored posts.
///
/// # Errors
///
/// Fails only if the post list cannot be read; per-post failures are counted.
pub async fn run_comments<A, S>(
    api: &A,
    store: &S,
    page_id: &str,
    limits: &IngestLimits,
) -> Result<RunReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    let posts = store
        .list_posts(page_id)
        .await
        .map_err(|source| IngestError::Lookup {
            what: format!("posts of page {page_id}"),
            source,
        })?;

    let queue = VecDeque::from(posts);
    let report = scheduler::drain("comments", queue, move |post| async move {
        comments::ingest_comments(api, store, &post, limits).await
    })
    .await;

    info!(page_id, ?report, "Comment run finished");
    Ok(report)
}

/// Fetch new replies for every stored top-level comment.
///
/// # Errors
///
/// Fails only if the comment list cannot be read; per-comment failures are counted.
pub async fn run_replies<A, S>(
    api: &A,
    store: &S,
    limits: &IngestLimits,
) -> Result<RunReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    let comments = store
        .list_top_level_comments()
        .await
        .map_err(|source| IngestError::Lookup {
            what: "top-level comments".to_string(),
            source,
        })?;

    let queue = VecDeque::from(comments);
    let report = scheduler::drain("replies", queue, move |comment| async move {
        comments::ingest_replies(api, store, &comment, limits).await
    })
    .await;

    info!(?report, "Reply run finished");
    Ok(report)
}

/// Convert a page of raw items, skipping the ones that do not have the expected shape.
fn convert_page<T, F>(entity: &str, items: Vec<Value>, mut convert: F) -> Vec<T>
where
    F: FnMut(Value) -> Result<T, GraphError>,
{
    items
        .into_iter()
        .filter_map(|item| {
            let id = item.get("id").and_then(Value::as_str).map(ToString::to_string);
            match convert(item) {
                Ok(converted) => Some(converted),
                Err(e) => {
                    warn!(entity, id = id.as_deref().unwrap_or("?"), "Skipping item: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Store structured fields as JSON text; explicit nulls become NULL.
fn json_text(value: Option<Value>) -> Option<String> {
    value.filter(|v| !v.is_null()).map(|v| v.to_string())
}

/// Graph timestamps are stored as RFC 3339 UTC; unparseable values are kept verbatim.
fn normalize_time(raw: Option<String>) -> Option<String> {
    raw.map(|raw| parse_graph_time(&raw).map_or(raw, |dt| dt.to_rfc3339()))
}
