//! Post ingestion for one page.

use futures_util::{pin_mut, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::paginator::paginate;
use super::{convert_page, json_text, normalize_time, IngestLimits, TraversalReport};
use crate::constants::POST_FIELDS;
use crate::db::{NewPost, Store};
use crate::graph::{GraphApi, GraphError, PageRequest};

/// A post as returned by the `{page_id}/posts` edge.
#[derive(Debug, Deserialize)]
struct GraphPost {
    id: String,
    caption: Option<String>,
    created_time: Option<String>,
    description: Option<String>,
    link: Option<String>,
    message: Option<String>,
    message_tags: Option<Value>,
    name: Option<String>,
    picture: Option<String>,
    properties: Option<Value>,
    shares: Option<Value>,
    source: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Fetch posts newer than the configured floor and upsert each one.
///
/// Posts are deduplicated by id in storage, so there is no resumption offset.
/// A post that cannot be parsed or stored is logged and skipped.
pub async fn ingest_posts<A, S>(
    api: &A,
    store: &S,
    page_id: &str,
    limits: &IngestLimits,
) -> TraversalReport
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    let request = PageRequest::new(
        format!("{page_id}/posts"),
        POST_FIELDS,
        limits.posts_per_request,
    )
    .since(limits.posts_since)
    .until(limits.posts_until);

    info!(page_id, cap = limits.posts_per_run, "Fetching posts");

    let pages = paginate(api, request, limits.posts_per_run, |items| {
        let retrieved_time = chrono::Utc::now().to_rfc3339();
        Ok(convert_page("post", items, |item| {
            post_from_item(page_id, &retrieved_time, item)
        }))
    });
    pin_mut!(pages);

    let mut report = TraversalReport::default();
    while let Some(page) = pages.next().await {
        let posts = match page {
            Ok(posts) => posts,
            Err(e) => {
                warn!(page_id, fetched = report.fetched, "Post traversal truncated: {e}");
                report.truncated = true;
                continue;
            }
        };

        report.fetched += posts.len();
        for post in &posts {
            match store.upsert_post(post).await {
                Ok(()) => {
                    debug!(post_id = %post.id, "Post stored");
                    report.written += 1;
                }
                Err(e) => {
                    warn!(post_id = %post.id, "Failed to store post: {e:#}");
                    report.failed_writes += 1;
                }
            }
        }
    }

    info!(
        page_id,
        fetched = report.fetched,
        written = report.written,
        failed = report.failed_writes,
        truncated = report.truncated,
        "Post ingestion complete"
    );
    report
}

fn post_from_item(page_id: &str, retrieved_time: &str, item: Value) -> Result<NewPost, GraphError> {
    let post: GraphPost = serde_json::from_value(item)
        .map_err(|e| GraphError::Malformed(format!("unexpected post shape: {e}")))?;

    Ok(NewPost {
        shares: share_count(post.shares.as_ref()),
        id: post.id,
        page_id: page_id.to_string(),
        caption: post.caption,
        description: post.description,
        link: post.link,
        message: post.message,
        message_tags: json_text(post.message_tags),
        name: post.name,
        picture: post.picture,
        properties: json_text(post.properties),
        source: post.source,
        post_type: post.kind,
        created_time: normalize_time(post.created_time),
        retrieved_time: retrieved_time.to_string(),
    })
}

/// `shares.count`, or 0 when the field is absent or not a non-negative integer.
fn share_count(shares: Option<&Value>) -> i64 {
    shares
        .and_then(|s| s.get("count"))
        .and_then(Value::as_i64)
        .filter(|n| *n >= 0)
        .unwrap_or(0)
}
