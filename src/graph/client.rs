use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    Cursor, GraphApi, GraphError, PageRequest, PageResponse, ReactionCount, ReactionKind, Result,
};
use crate::config::Config;
use crate::constants::GRAPH_USER_AGENT;

/// Authenticated Graph API client.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GraphClient {
    /// Build the HTTP client and exchange the app credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the token exchange fails.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(GRAPH_USER_AGENT)
            .build()?;

        let mut graph = Self {
            client,
            base_url: config.graph_api_url.trim_end_matches('/').to_string(),
            access_token: String::new(),
        };
        graph.access_token = graph
            .authenticate(&config.app_id, &config.app_secret)
            .await?;

        info!(base_url = %graph.base_url, "Authenticated with Graph API");
        Ok(graph)
    }

    async fn authenticate(&self, app_id: &str, app_secret: &str) -> Result<String> {
        let query = [
            ("client_id", app_id),
            ("client_secret", app_secret),
            ("grant_type", "client_credentials"),
        ];
        let resp = self
            .client
            .get(format!("{}/oauth/access_token", self.base_url))
            .query(&query)
            .send()
            .await?;
        let body = read_body(resp).await?;

        body.get("access_token")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| GraphError::Malformed("token response has no access_token".into()))
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%url, "Graph API request");

        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?;

        read_body(resp).await
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse> {
        let body = self.get(&request.endpoint, &request.query_pairs()).await?;
        parse_page(body)
    }

    async fn fetch_reaction(&self, post_id: &str, kind: ReactionKind) -> Result<ReactionCount> {
        let query = [
            ("type".to_string(), kind.as_str().to_string()),
            ("summary".to_string(), "true".to_string()),
        ];
        let body = self.get(&format!("{post_id}/reactions"), &query).await?;
        Ok(parse_reaction_count(&body))
    }
}

/// Decode a response body, turning error payloads and non-2xx statuses into `Api` errors.
async fn read_body(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await?;

    let body: Value = match serde_json::from_str(&text) {
        Ok(body) => body,
        Err(_) if !status.is_success() => {
            return Err(GraphError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        Err(e) => return Err(GraphError::Malformed(format!("response is not JSON: {e}"))),
    };

    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), ToString::to_string);
        return Err(GraphError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if !status.is_success() {
        return Err(GraphError::Api {
            status: status.as_u16(),
            message: text,
        });
    }

    Ok(body)
}

fn parse_page(mut body: Value) -> Result<PageResponse> {
    let items = match body.get_mut("data").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => return Err(GraphError::Malformed("response has no data array".into())),
    };

    // An unusable next link ends the traversal; the items on hand are kept.
    // The link itself is not logged: it carries the access token.
    let next_cursor = body
        .pointer("/paging/next")
        .and_then(Value::as_str)
        .and_then(|link| match Cursor::from_next_link(link) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                warn!(items = items.len(), "Ignoring paging.next: {e}");
                None
            }
        });

    Ok(PageResponse { items, next_cursor })
}

fn parse_reaction_count(body: &Value) -> ReactionCount {
    body.pointer("/summary/total_count")
        .and_then(Value::as_u64)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_with_next() {
        let body = json!({
            "data": [{"id": "1"}, {"id": "2"}],
            "paging": {
                "cursors": {"before": "a", "after": "b"},
                "next": "https://graph.facebook.com/v2.7/9/comments?access_token=t&limit=2&after=b"
            }
        });

        let page = parse_page(body).unwrap();
        assert_eq!(page.items.len(), 2);
        let cursor = page.next_cursor.unwrap();
        assert_eq!(
            cursor.pairs(),
            &[
                ("limit".to_string(), "2".to_string()),
                ("after".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_page_without_next() {
        let page = parse_page(json!({"data": [{"id": "1"}], "paging": {}})).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());

        let page = parse_page(json!({"data": []})).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_parse_page_keeps_items_when_next_link_is_unusable() {
        let body = json!({
            "data": [{"id": "1"}, {"id": "2"}],
            "paging": {"next": "not a link"}
        });

        let page = parse_page(body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_parse_page_missing_data() {
        assert!(matches!(
            parse_page(json!({"paging": {}})),
            Err(GraphError::Malformed(_))
        ));
        assert!(matches!(
            parse_page(json!({"data": "nope"})),
            Err(GraphError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_reaction_count() {
        assert_eq!(
            parse_reaction_count(&json!({"data": [], "summary": {"total_count": 0}})),
            ReactionCount::Known(0)
        );
        assert_eq!(
            parse_reaction_count(&json!({"data": [], "summary": {"total_count": 42}})),
            ReactionCount::Known(42)
        );
        assert_eq!(
            parse_reaction_count(&json!({"data": []})),
            ReactionCount::Unknown
        );
    }
}
