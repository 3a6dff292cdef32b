use chrono::{DateTime, Utc};
use serde_json::Value;

use super::GraphError;

/// Continuation token decoded from a page's `paging.next` link.
///
/// The query pairs are replayed verbatim on the next request; the access token
/// is stripped because the client appends its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor(Vec<(String, String)>);

impl Cursor {
    /// Decode the query parameters of a `paging.next` link.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Malformed`] if the link is not an absolute URL.
    pub fn from_next_link(link: &str) -> Result<Self, GraphError> {
        let url = url::Url::parse(link)
            .map_err(|e| GraphError::Malformed(format!("invalid paging.next link: {e}")))?;
        Ok(Self(
            url.query_pairs()
                .filter(|(key, _)| key != "access_token")
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        ))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Cursor {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One page request against an edge such as `{page_id}/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub endpoint: String,
    pub fields: &'static [&'static str],
    pub limit: u32,
    /// Ask for oldest-first results (`order=chronological`).
    pub chronological: bool,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub offset: Option<u64>,
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, fields: &'static [&'static str], limit: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            fields,
            limit,
            chronological: false,
            since: None,
            until: None,
            offset: None,
            cursor: None,
        }
    }

    #[must_use]
    pub fn chronological(mut self) -> Self {
        self.chronological = true;
        self
    }

    #[must_use]
    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn until(mut self, until: Option<i64>) -> Self {
        self.until = until;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The request for the page after this one.
    #[must_use]
    pub fn continue_with(&self, cursor: Cursor) -> Self {
        Self {
            cursor: Some(cursor),
            ..self.clone()
        }
    }

    /// Query parameters sent on the wire, excluding the access token.
    ///
    /// The window (`since`/`until`) and the resumption `offset` only apply to the
    /// first request of a traversal. Once a cursor is present its parameters take
    /// over, overriding any projection parameter of the same name.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("fields".to_string(), self.fields.join(",")),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if self.chronological {
            pairs.push(("order".to_string(), "chronological".to_string()));
        }

        match &self.cursor {
            Some(cursor) => {
                for (key, value) in cursor.pairs() {
                    match pairs.iter_mut().find(|(k, _)| k == key) {
                        Some(existing) => existing.1.clone_from(value),
                        None => pairs.push((key.clone(), value.clone())),
                    }
                }
            }
            None => {
                if let Some(since) = self.since {
                    pairs.push(("since".to_string(), since.to_string()));
                }
                if let Some(until) = self.until {
                    pairs.push(("until".to_string(), until.to_string()));
                }
                if let Some(offset) = self.offset {
                    pairs.push(("offset".to_string(), offset.to_string()));
                }
            }
        }

        pairs
    }
}

/// One page of raw items plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResponse {
    pub items: Vec<Value>,
    pub next_cursor: Option<Cursor>,
}

/// Reaction kinds tallied per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Like,
    Love,
    Wow,
    Haha,
    Sad,
    Angry,
}

impl ReactionKind {
    pub const ALL: [Self; 6] = [
        Self::Like,
        Self::Love,
        Self::Wow,
        Self::Haha,
        Self::Sad,
        Self::Angry,
    ];

    /// Value of the `type` parameter on the reactions edge.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Love => "LOVE",
            Self::Wow => "WOW",
            Self::Haha => "HAHA",
            Self::Sad => "SAD",
            Self::Angry => "ANGRY",
        }
    }
}

/// Total for one reaction kind.
///
/// `Unknown` means the API answered without a summary; it is never folded into zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReactionCount {
    Known(u64),
    #[default]
    Unknown,
}

impl ReactionCount {
    #[must_use]
    pub fn known(&self) -> Option<u64> {
        match self {
            Self::Known(n) => Some(*n),
            Self::Unknown => None,
        }
    }
}

impl From<Option<u64>> for ReactionCount {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

/// Per-post reaction counts, one for each [`ReactionKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionTally {
    pub like: ReactionCount,
    pub love: ReactionCount,
    pub wow: ReactionCount,
    pub haha: ReactionCount,
    pub sad: ReactionCount,
    pub angry: ReactionCount,
}

impl ReactionTally {
    #[must_use]
    pub fn get(&self, kind: ReactionKind) -> ReactionCount {
        match kind {
            ReactionKind::Like => self.like,
            ReactionKind::Love => self.love,
            ReactionKind::Wow => self.wow,
            ReactionKind::Haha => self.haha,
            ReactionKind::Sad => self.sad,
            ReactionKind::Angry => self.angry,
        }
    }

    pub fn set(&mut self, kind: ReactionKind, count: ReactionCount) {
        let slot = match kind {
            ReactionKind::Like => &mut self.like,
            ReactionKind::Love => &mut self.love,
            ReactionKind::Wow => &mut self.wow,
            ReactionKind::Haha => &mut self.haha,
            ReactionKind::Sad => &mut self.sad,
            ReactionKind::Angry => &mut self.angry,
        };
        *slot = count;
    }
}

/// Parse a Graph timestamp (`2016-03-01T12:00:00+0000`) or RFC 3339.
#[must_use]
pub fn parse_graph_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[&str] = &["id", "message"];

    fn value_of<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_cursor_strips_access_token() {
        let cursor = Cursor::from_next_link(
            "https://graph.facebook.com/v2.7/1/posts?access_token=secret&limit=100&__paging_token=abc&until=1450000000",
        )
        .unwrap();

        assert_eq!(
            cursor.pairs(),
            &[
                ("limit".to_string(), "100".to_string()),
                ("__paging_token".to_string(), "abc".to_string()),
                ("until".to_string(), "1450000000".to_string()),
            ]
        );
    }

    #[test]
    fn test_cursor_empty_parameter_set() {
        let cursor =
            Cursor::from_next_link("https://graph.facebook.com/v2.7/1/posts?access_token=t")
                .unwrap();
        assert!(cursor.is_empty());

        assert!(Cursor::from_next_link("not a link").is_err());
    }

    #[test]
    fn test_first_request_carries_window_and_offset() {
        let request = PageRequest::new("123/comments", FIELDS, 25)
            .chronological()
            .since(10)
            .until(Some(20))
            .offset(7);
        let pairs = request.query_pairs();

        assert_eq!(value_of(&pairs, "fields"), Some("id,message"));
        assert_eq!(value_of(&pairs, "limit"), Some("25"));
        assert_eq!(value_of(&pairs, "order"), Some("chronological"));
        assert_eq!(value_of(&pairs, "since"), Some("10"));
        assert_eq!(value_of(&pairs, "until"), Some("20"));
        assert_eq!(value_of(&pairs, "offset"), Some("7"));
    }

    #[test]
    fn test_default_order_is_left_to_the_api() {
        let pairs = PageRequest::new("123/posts", FIELDS, 25).since(10).query_pairs();

        assert_eq!(value_of(&pairs, "order"), None);
        assert_eq!(value_of(&pairs, "since"), Some("10"));
    }

    #[test]
    fn test_continuation_replays_cursor() {
        let request = PageRequest::new("123/comments", FIELDS, 25).offset(7);
        let cursor: Cursor = [("limit", "50"), ("after", "xyz")].into_iter().collect();
        let pairs = request.continue_with(cursor).query_pairs();

        assert_eq!(value_of(&pairs, "fields"), Some("id,message"));
        assert_eq!(value_of(&pairs, "limit"), Some("50"));
        assert_eq!(value_of(&pairs, "after"), Some("xyz"));
        assert_eq!(value_of(&pairs, "offset"), None);
        assert_eq!(pairs.iter().filter(|(k, _)| k == "limit").count(), 1);
    }

    #[test]
    fn test_reaction_tally_set_get() {
        let mut tally = ReactionTally::default();
        assert_eq!(tally.get(ReactionKind::Sad), ReactionCount::Unknown);

        tally.set(ReactionKind::Sad, ReactionCount::Known(0));
        tally.set(ReactionKind::Like, ReactionCount::Known(12));
        assert_eq!(tally.sad, ReactionCount::Known(0));
        assert_eq!(tally.get(ReactionKind::Like).known(), Some(12));
        assert_eq!(tally.get(ReactionKind::Angry).known(), None);
    }

    #[test]
    fn test_parse_graph_time() {
        let dt = parse_graph_time("2016-03-01T12:00:00+0000").unwrap();
        assert_eq!(dt.to_rfc3339(), "2016-03-01T12:00:00+00:00");

        let dt = parse_graph_time("2016-03-01T12:00:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2016-03-01T10:00:00+00:00");

        assert!(parse_graph_time("yesterday").is_none());
    }
}
