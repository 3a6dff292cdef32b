//! Per-post reaction tallies.

use futures_util::future::join_all;
use tracing::{debug, warn};

use super::{IngestError, TraversalReport};
use crate::db::{Post, Store};
use crate::graph::{GraphApi, GraphError, ReactionKind, ReactionTally};

/// Query every reaction kind for a post concurrently and combine the answers.
///
/// All six lookups settle before anything is decided. If any of them failed,
/// the whole tally fails; a partial tally is never returned.
///
/// # Errors
///
/// Returns the first lookup error, in [`ReactionKind::ALL`] order.
pub async fn fetch_tally<A>(api: &A, post_id: &str) -> Result<ReactionTally, GraphError>
where
    A: GraphApi + ?Sized,
{
    let lookups = ReactionKind::ALL
        .map(|kind| async move { (kind, api.fetch_reaction(post_id, kind).await) });
    let settled = join_all(lookups).await;

    let mut tally = ReactionTally::default();
    let mut first_error = None;
    for (kind, result) in settled {
        match result {
            Ok(count) => tally.set(kind, count),
            Err(e) => {
                debug!(post_id, kind = kind.as_str(), "Reaction lookup failed: {e}");
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(tally), Err)
}

/// Fetch and store the tally for one stored post.
///
/// # Errors
///
/// Fails if any reaction lookup fails (nothing is stored) or the write fails.
pub async fn ingest_reactions<A, S>(
    api: &A,
    store: &S,
    post: &Post,
) -> Result<TraversalReport, IngestError>
where
    A: GraphApi + ?Sized,
    S: Store + ?Sized,
{
    let tally = fetch_tally(api, &post.id).await?;

    let attached = store
        .update_reactions(&post.id, &tally)
        .await
        .map_err(|source| IngestError::Persist {
            entity: "reactions for post",
            id: post.id.clone(),
            source,
        })?;

    if !attached {
        warn!(post_id = %post.id, "Post is no longer stored, tally discarded");
        return Ok(TraversalReport {
            fetched: 1,
            ..TraversalReport::default()
        });
    }

    debug!(post_id = %post.id, ?tally, "Reactions stored");
    Ok(TraversalReport {
        fetched: 1,
        written: 1,
        ..TraversalReport::default()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Barrier;

    use super::*;
    use crate::graph::{PageRequest, PageResponse, ReactionCount};

    struct ReactionApi {
        answers: HashMap<ReactionKind, Result<ReactionCount, String>>,
        calls: AtomicUsize,
        /// When set, every lookup waits until all six are in flight.
        barrier: Option<Arc<Barrier>>,
    }

    impl ReactionApi {
        fn new(answers: impl IntoIterator<Item = (ReactionKind, Result<ReactionCount, String>)>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                calls: AtomicUsize::new(0),
                barrier: None,
            }
        }
    }

    #[async_trait]
    impl GraphApi for ReactionApi {
        async fn fetch_page(&self, _request: &PageRequest) -> Result<PageResponse, GraphError> {
            unreachable!("reaction tallies never page")
        }

        async fn fetch_reaction(
            &self,
            _post_id: &str,
            kind: ReactionKind,
        ) -> Result<ReactionCount, GraphError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            match self.answers.get(&kind) {
                Some(Ok(count)) => Ok(*count),
                Some(Err(message)) => Err(GraphError::Api {
                    status: 400,
                    message: message.clone(),
                }),
                None => Ok(ReactionCount::Unknown),
            }
        }
    }

    #[tokio::test]
    async fn test_tally_combines_all_kinds() {
        let api = ReactionApi::new([
            (ReactionKind::Like, Ok(ReactionCount::Known(10))),
            (ReactionKind::Love, Ok(ReactionCount::Known(2))),
            (ReactionKind::Wow, Ok(ReactionCount::Known(0))),
            (ReactionKind::Haha, Ok(ReactionCount::Known(1))),
            (ReactionKind::Sad, Ok(ReactionCount::Unknown)),
            (ReactionKind::Angry, Ok(ReactionCount::Known(5))),
        ]);

        let tally = fetch_tally(&api, "p1").await.unwrap();

        assert_eq!(tally.like, ReactionCount::Known(10));
        assert_eq!(tally.wow, ReactionCount::Known(0));
        assert_eq!(tally.sad, ReactionCount::Unknown);
        assert_eq!(tally.angry, ReactionCount::Known(5));
        assert_eq!(api.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_one_rejection_fails_tally_after_all_settle() {
        let api = ReactionApi::new([
            (ReactionKind::Like, Ok(ReactionCount::Known(10))),
            (ReactionKind::Sad, Err("rate limited".to_string())),
        ]);

        let err = fetch_tally(&api, "p1").await.unwrap_err();

        assert!(matches!(err, GraphError::Api { .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_lookups_run_concurrently() {
        // Would deadlock if the lookups were issued one after another.
        let api = ReactionApi {
            barrier: Some(Arc::new(Barrier::new(ReactionKind::ALL.len()))),
            ..ReactionApi::new([])
        };

        let tally = tokio::time::timeout(std::time::Duration::from_secs(5), fetch_tally(&api, "p1"))
            .await
            .expect("lookups were not dispatched concurrently")
            .unwrap();

        assert_eq!(tally, ReactionTally::default());
    }
}
