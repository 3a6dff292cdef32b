use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use crate::constants::{DEFAULT_GRAPH_API_URL, MAX_PAGE_LIMIT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse pages file {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A page whose feed is ingested, addressed on the command line by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageTarget {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct PagesFile {
    pages: Vec<PageTarget>,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Graph API
    pub app_id: String,
    pub app_secret: String,
    pub graph_api_url: String,
    pub request_timeout: Duration,

    // Target pages
    pub pages: Vec<PageTarget>,

    // Post window (unix seconds)
    pub posts_since: i64,
    pub posts_until: Option<i64>,

    // Per-run limits
    pub posts_per_request: u32,
    pub posts_per_run: usize,
    pub comments_per_request: u32,
    pub comments_per_parent_per_run: usize,

    // Database
    pub database_path: PathBuf,
}

/// 2015-11-01 00:00:00 UTC.
const DEFAULT_POSTS_SINCE: i64 = 1_446_336_000;

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let pages = match optional_env("PAGES_FILE") {
            Some(path) => load_pages_file(Path::new(&path))?,
            None => parse_pages(&env_or_default("PAGES", ""))?,
        };

        Ok(Self {
            // Graph API
            app_id: required_env("GRAPH_APP_ID")?,
            app_secret: required_env("GRAPH_APP_SECRET")?,
            graph_api_url: env_or_default("GRAPH_API_URL", DEFAULT_GRAPH_API_URL),
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),

            pages,

            posts_since: match optional_env("POSTS_SINCE") {
                Some(value) => parse_timestamp("POSTS_SINCE", &value)?,
                None => DEFAULT_POSTS_SINCE,
            },
            posts_until: optional_env("POSTS_UNTIL")
                .map(|value| parse_timestamp("POSTS_UNTIL", &value))
                .transpose()?,

            posts_per_request: parse_env_u32("POSTS_PER_REQUEST", MAX_PAGE_LIMIT)?,
            posts_per_run: parse_env_usize("POSTS_PER_RUN", 10_000)?,
            comments_per_request: parse_env_u32("COMMENTS_PER_REQUEST", MAX_PAGE_LIMIT)?,
            comments_per_parent_per_run: parse_env_usize("COMMENTS_PER_PARENT_PER_RUN", 10_000)?,

            database_path: database_path_from_env(),
        })
    }

    /// Configuration with every field populated, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            app_id: "test-app".to_string(),
            app_secret: "test-secret".to_string(),
            graph_api_url: DEFAULT_GRAPH_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            pages: vec![PageTarget {
                name: "example".to_string(),
                id: "1000".to_string(),
            }],
            posts_since: DEFAULT_POSTS_SINCE,
            posts_until: None,
            posts_per_request: MAX_PAGE_LIMIT,
            posts_per_run: 10_000,
            comments_per_request: MAX_PAGE_LIMIT,
            comments_per_parent_per_run: 10_000,
            database_path: PathBuf::from("./data/test.sqlite"),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.is_empty() {
            return Err(invalid("GRAPH_APP_ID", "cannot be empty"));
        }
        if self.app_secret.is_empty() {
            return Err(invalid("GRAPH_APP_SECRET", "cannot be empty"));
        }
        if self.pages.is_empty() {
            return Err(invalid("PAGES", "at least one page must be configured"));
        }
        for (name, limit) in [
            ("POSTS_PER_REQUEST", self.posts_per_request),
            ("COMMENTS_PER_REQUEST", self.comments_per_request),
        ] {
            if limit == 0 || limit > MAX_PAGE_LIMIT {
                return Err(invalid(name, &format!("must be between 1 and {MAX_PAGE_LIMIT}")));
            }
        }
        if self.posts_per_run == 0 {
            return Err(invalid("POSTS_PER_RUN", "must be at least 1"));
        }
        if self.comments_per_parent_per_run == 0 {
            return Err(invalid("COMMENTS_PER_PARENT_PER_RUN", "must be at least 1"));
        }
        if let Some(until) = self.posts_until {
            if until <= self.posts_since {
                return Err(invalid("POSTS_UNTIL", "must be later than POSTS_SINCE"));
            }
        }
        Ok(())
    }

    /// Look up a configured page by its name.
    ///
    /// # Errors
    ///
    /// Returns an error naming the configured pages if `name` is unknown.
    pub fn page(&self, name: &str) -> Result<&PageTarget, ConfigError> {
        self.pages.iter().find(|p| p.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.pages.iter().map(|p| p.name.as_str()).collect();
            invalid(
                "--page",
                &format!("page '{name}' not recognised (configured: {})", known.join(", ")),
            )
        })
    }
}

/// `DATABASE_PATH`, readable without the rest of the configuration.
#[must_use]
pub fn database_path_from_env() -> PathBuf {
    PathBuf::from(env_or_default("DATABASE_PATH", "./data/graph.sqlite"))
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

/// Parse `name=id,name=id` into page targets.
fn parse_pages(value: &str) -> Result<Vec<PageTarget>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, id) = entry
                .split_once('=')
                .ok_or_else(|| invalid("PAGES", &format!("expected name=id, got '{entry}'")))?;
            let (name, id) = (name.trim(), id.trim());
            if name.is_empty() || id.is_empty() {
                return Err(invalid("PAGES", &format!("expected name=id, got '{entry}'")));
            }
            Ok(PageTarget {
                name: name.to_string(),
                id: id.to_string(),
            })
        })
        .collect()
}

fn load_pages_file(path: &Path) -> Result<Vec<PageTarget>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: PagesFile = toml::from_str(&raw).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.pages)
}

/// Accepts unix seconds, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, all UTC.
fn parse_timestamp(name: &str, value: &str) -> Result<i64, ConfigError> {
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| {
            invalid(
                name,
                &format!("expected unix seconds or 'YYYY-MM-DD HH:MM:SS', got '{value}'"),
            )
        })
}
