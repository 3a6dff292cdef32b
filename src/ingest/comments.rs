//! Comment and reply ingestion.
//!
//! Both walk the `{id}/comments` edge in chronological order, resuming at the
//! number of children already stored. Rows are insert-if-absent, so overlap
//! between an interrupted run and the next one is harmless.

use futures_util::{pin_mut, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::paginator::paginate;
use super::resume::resume_offset;
use super::{
    convert_page, json_text, normalize_time, IngestError, IngestLimits, TraversalReport,
};
use crate::constants::COMMENT_FIELDS;
use crate::db::{Comment, NewComment, Parent, Post, Store};
use crate::graph::{GraphApi, GraphError, PageRequest};

/// A comment as returned by the `{id}/comments` edge.
#[derive(Debug, Deserialize)]
struct GraphComment {
    id: String,
    created_time: Option<String>,
    from: Option<GraphUser>,
    like_count: Option<i64>,
    message: Option<String>,
    message_tags: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GraphUser {
    id: Option<String>,
    name: Option<String>,
}

/// Ingest the top-level comments of a post.
///
/// # Errors
///
/// Fails if the resumption offset cannot be read or a comment cannot be stored.
pub async fn ingest_comments<A, S>(
    api: &A,
    store: &S,
    post: &Post,
    limits: &IngestLimits,
) -> Result<TraversalReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    ingest_children(api, store, &Parent::Post(post.id.clone()), &post.id, limits).await
}

/// Ingest the replies to a top-level comment.
///
/// # Errors
///
/// Fails if the resumption offset cannot be read or a reply cannot be stored.
pub async fn ingest_replies<A, S>(
    api: &A,
    store: &S,
    comment: &Comment,
    limits: &IngestLimits,
) -> Result<TraversalReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    ingest_children(
        api,
        store,
        &Parent::Comment(comment.id.clone()),
        &comment.post_id,
        limits,
    )
    .await
}

async fn ingest_children<A, S>(
    api: &A,
    store: &S,
    parent: &Parent,
    post_id: &str,
    limits: &IngestLimits,
) -> Result<TraversalReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    let offset = resume_offset(store, parent).await?;
    let parent_id = match parent {
        Parent::Post(_) => None,
        Parent::Comment(id) => Some(id.as_str()),
    };

    let request = PageRequest::new(
        format!("{}/comments", parent.id()),
        COMMENT_FIELDS,
        limits.comments_per_request,
    )
    .chronological()
    .offset(offset);

    let pages = paginate(api, request, limits.comments_per_parent_per_run, |items| {
        let retrieved_time = chrono::Utc::now().to_rfc3339();
        Ok(convert_page("comment", items, |item| {
            comment_from_item(post_id, parent_id, &retrieved_time, item)
        }))
    });
    pin_mut!(pages);

    let mut report = TraversalReport::default();
    while let Some(page) = pages.next().await {
        let comments = match page {
            Ok(comments) => comments,
            Err(e) => {
                warn!(%parent, offset, fetched = report.fetched, "Comment traversal truncated: {e}");
                report.truncated = true;
                continue;
            }
        };

        report.fetched += comments.len();
        for comment in comments {
            // Stop at the first failed write: the stored count must stay a prefix of
            // the remote sequence for the next run's offset to be correct.
            let inserted = store
                .insert_comment_if_absent(&comment)
                .await
                .map_err(|source| IngestError::Persist {
                    entity: "comment",
                    id: comment.id.clone(),
                    source,
                })?;

            if inserted {
                report.written += 1;
            } else {
                debug!(comment_id = %comment.id, %parent, "Comment already stored");
                report.duplicates += 1;
            }
        }
    }

    info!(
        %parent,
        offset,
        fetched = report.fetched,
        written = report.written,
        duplicates = report.duplicates,
        "Comment ingestion complete"
    );
    Ok(report)
}

fn comment_from_item(
    post_id: &str,
    parent_id: Option<&str>,
    retrieved_time: &str,
    item: Value,
) -> Result<NewComment, GraphError> {
    let comment: GraphComment = serde_json::from_value(item)
        .map_err(|e| GraphError::Malformed(format!("unexpected comment shape: {e}")))?;
    let (user_id, user_name) = comment
        .from
        .map_or((None, None), |user| (user.id, user.name));

    Ok(NewComment {
        id: comment.id,
        post_id: post_id.to_string(),
        user_id,
        user_name,
        like_count: comment.like_count.unwrap_or(0),
        message: comment.message,
        message_tags: json_text(comment.message_tags),
        parent_id: parent_id.map(ToString::to_string),
        created_time: normalize_time(comment.created_time),
        retrieved_time: retrieved_time.to_string(),
    })
}
