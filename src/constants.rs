//! Shared constants used across the application.

/// User agent string sent with every Graph API request.
pub const GRAPH_USER_AGENT: &str = concat!("graph-page-ingest/", env!("CARGO_PKG_VERSION"));

/// Graph API root used when `GRAPH_API_URL` is not set.
///
/// Pinned to the version the field projections below were written against.
pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v2.7";

/// Largest `limit` the Graph API accepts on a single page request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Fields requested for every post.
pub const POST_FIELDS: &[&str] = &[
    "id",
    "caption",
    "created_time",
    "description",
    "link",
    "message",
    "message_tags",
    "name",
    "picture",
    "properties",
    "shares",
    "source",
    "type",
];

/// Fields requested for every comment and reply.
pub const COMMENT_FIELDS: &[&str] = &[
    "id",
    "created_time",
    "from",
    "like_count",
    "message",
    "message_tags",
];
