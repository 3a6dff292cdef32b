//! Cursor-following traversal of one paginated edge.

use futures_util::Stream;
use serde_json::Value;
use tracing::debug;

use crate::graph::{GraphApi, GraphError, PageRequest};

/// Lazily walk an edge page by page, starting at `request`.
///
/// Each element is one transformed page. The traversal ends when `max_items`
/// items have been yielded (the page that crosses the cap is cut short), when a
/// page comes back empty, or when a page has no usable continuation cursor.
///
/// Failures are not retried: a fetch or transform error is yielded as the final
/// element and the stream ends, leaving earlier pages with the caller.
pub fn paginate<'a, A, T, F>(
    api: &'a A,
    request: PageRequest,
    max_items: usize,
    mut transform: F,
) -> impl Stream<Item = Result<Vec<T>, GraphError>> + 'a
where
    A: GraphApi + ?Sized,
    T: 'a,
    F: FnMut(Vec<Value>) -> Result<Vec<T>, GraphError> + 'a,
{
    async_stream::stream! {
        let mut request = request;
        let mut taken = 0usize;

        while taken < max_items {
            let page = match api.fetch_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            if page.items.is_empty() {
                debug!(endpoint = %request.endpoint, taken, "Empty page, traversal exhausted");
                break;
            }

            let mut items = match transform(page.items) {
                Ok(items) => items,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            items.truncate(max_items - taken);
            taken += items.len();
            yield Ok(items);

            match page.next_cursor {
                Some(cursor) if !cursor.is_empty() => request = request.continue_with(cursor),
                _ => {
                    debug!(endpoint = %request.endpoint, taken, "No next cursor, traversal exhausted");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::graph::{Cursor, PageResponse, ReactionCount, ReactionKind};

    const FIELDS: &[&str] = &["id"];

    /// Serves a fixed script of responses and records every request.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<PageResponse, GraphError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<PageResponse, GraphError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphApi for ScriptedApi {
        async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, GraphError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PageResponse::default()))
        }

        async fn fetch_reaction(
            &self,
            _post_id: &str,
            _kind: ReactionKind,
        ) -> Result<ReactionCount, GraphError> {
            unreachable!("paginator never fetches reactions")
        }
    }

    /// A page holding ids `start..end`, with a cursor pointing past it if `more`.
    fn page(start: usize, end: usize, more: bool) -> Result<PageResponse, GraphError> {
        Ok(PageResponse {
            items: (start..end).map(|i| json!({ "id": i.to_string() })).collect(),
            next_cursor: more.then(|| [("after", format!("c{end}"))].into_iter().collect()),
        })
    }

    fn request() -> PageRequest {
        PageRequest::new("1/posts", FIELDS, 100).offset(5)
    }

    async fn drain(api: &ScriptedApi, max_items: usize) -> Vec<Result<Vec<Value>, GraphError>> {
        paginate(api, request(), max_items, Ok).collect().await
    }

    fn flatten(pages: Vec<Result<Vec<Value>, GraphError>>) -> Vec<Value> {
        pages.into_iter().filter_map(Result::ok).flatten().collect()
    }

    #[tokio::test]
    async fn test_follows_cursors_until_exhausted() {
        let api = ScriptedApi::new(vec![page(0, 3, true), page(3, 6, true), page(6, 8, false)]);

        let items = flatten(drain(&api, usize::MAX).await);

        assert_eq!(items.len(), 8);
        assert_eq!(items[7]["id"], "7");
        assert_eq!(api.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_cap_stops_fetching() {
        let api = ScriptedApi::new(vec![
            page(0, 100, true),
            page(100, 200, true),
            page(200, 250, false),
        ]);

        let items = flatten(drain(&api, 200).await);

        assert_eq!(items.len(), 200);
        // The third page is never requested once the cap is met.
        assert_eq!(api.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cap_discards_overflow() {
        let api = ScriptedApi::new(vec![page(0, 100, true), page(100, 200, true)]);

        let pages = drain(&api, 150).await;

        assert_eq!(pages.len(), 2);
        let items = flatten(pages);
        assert_eq!(items.len(), 150);
        assert_eq!(items[149]["id"], "149");
    }

    #[tokio::test]
    async fn test_zero_cap_fetches_nothing() {
        let api = ScriptedApi::new(vec![page(0, 10, true)]);

        assert!(drain(&api, 0).await.is_empty());
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_ends_traversal() {
        let api = ScriptedApi::new(vec![page(0, 2, true), page(2, 2, true), page(2, 4, false)]);

        let items = flatten(drain(&api, usize::MAX).await);

        assert_eq!(items.len(), 2);
        assert_eq!(api.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cursor_is_exhaustion() {
        let api = ScriptedApi::new(vec![
            Ok(PageResponse {
                items: vec![json!({"id": "1"})],
                next_cursor: Some(Cursor::default()),
            }),
            page(1, 2, false),
        ]);

        let items = flatten(drain(&api, usize::MAX).await);

        assert_eq!(items.len(), 1);
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_truncates_and_keeps_earlier_pages() {
        let api = ScriptedApi::new(vec![
            page(0, 3, true),
            Err(GraphError::Transport("connection reset".into())),
            page(3, 6, false),
        ]);

        let pages = drain(&api, usize::MAX).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].as_ref().unwrap().len(), 3);
        assert!(matches!(pages[1], Err(GraphError::Transport(_))));
        assert_eq!(api.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_transform_error_truncates() {
        let api = ScriptedApi::new(vec![page(0, 3, true), page(3, 6, true)]);
        let mut calls = 0;

        let pages: Vec<_> = paginate(&api, request(), usize::MAX, |items| {
            calls += 1;
            if calls == 2 {
                Err(GraphError::Malformed("bad item".into()))
            } else {
                Ok(items)
            }
        })
        .collect()
        .await;

        assert_eq!(pages.len(), 2);
        assert!(matches!(pages[1], Err(GraphError::Malformed(_))));
        assert_eq!(api.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_continuation_requests_use_cursor_not_offset() {
        let api = ScriptedApi::new(vec![page(0, 2, true), page(2, 3, false)]);

        drain(&api, usize::MAX).await;
        let requests = api.requests();

        assert_eq!(requests[0].offset, Some(5));
        assert!(requests[0].cursor.is_none());
        let second = requests[1].query_pairs();
        assert!(second.contains(&("after".to_string(), "c2".to_string())));
        assert!(!second.iter().any(|(k, _)| k == "offset"));
    }
}
