use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Timestamp layout used by the upstream API, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
pub const TWITTER_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// One upstream timeline record.
///
/// Only the fields the pipeline reads are typed; everything else the upstream
/// sends is kept in `extra` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    #[serde(default)]
    pub id_str: String,
    pub created_at: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tweet {
    pub fn new(id_str: impl Into<String>, created_at: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id_str: id_str.into(),
            created_at: created_at.into(),
            text: text.into(),
            retweeted_status: None,
            extra: Map::new(),
        }
    }

    pub fn with_retweeted_status(mut self, original: Value) -> Self {
        self.retweeted_status = Some(original);
        self
    }

    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }

    /// Parse `created_at`, accepting the upstream layout or RFC 3339.
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_str(&self.created_at, TWITTER_DATE_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&self.created_at))
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// A monitored account plus its inclusion rules.
#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    pub screenname: String,
    #[serde(flatten)]
    pub options: FeedOptions,
}

impl Feed {
    pub fn new(screenname: impl Into<String>, options: FeedOptions) -> Self {
        Self {
            screenname: screenname.into(),
            options,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedOptions {
    #[serde(default, alias = "filterTags")]
    pub filter_tags: Option<FilterTags>,
    #[serde(default, alias = "removeRetweets")]
    pub remove_retweets: bool,
}

impl FeedOptions {
    pub fn with_filter_tags(mut self, filter_tags: FilterTags) -> Self {
        self.filter_tags = Some(filter_tags);
        self
    }

    pub fn with_remove_retweets(mut self, remove_retweets: bool) -> Self {
        self.remove_retweets = remove_retweets;
        self
    }
}

/// The accepted shapes of a `filter_tags` value.
#[derive(Debug, Clone)]
pub enum FilterTags {
    /// Already compiled pattern, matched against the tweet text.
    Pattern(Regex),
    /// Plain tags, matched as `#tag1` OR `#tag2` ...
    Tags(Vec<String>),
    /// Anything else a config file handed us. Rejected when the filter is compiled.
    Malformed(Value),
}

impl FilterTags {
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tags(tags.into_iter().map(Into::into).collect())
    }

    /// Human readable form used in reports and error messages.
    pub fn describe(&self) -> String {
        match self {
            FilterTags::Pattern(regex) => format!("/{}/", regex.as_str()),
            FilterTags::Tags(tags) => format!("{:?}", tags),
            FilterTags::Malformed(value) => value.to_string(),
        }
    }
}

impl From<Value> for FilterTags {
    fn from(value: Value) -> Self {
        match value {
            Value::String(source) => match Regex::new(&source) {
                Ok(regex) => FilterTags::Pattern(regex),
                Err(_) => FilterTags::Malformed(Value::String(source)),
            },
            Value::Array(items) if items.iter().all(Value::is_string) => FilterTags::Tags(
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            other => FilterTags::Malformed(other),
        }
    }
}

impl<'de> Deserialize<'de> for FilterTags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(FilterTags::from)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid filter_tags {value} for @{screenname}: {reason}")]
pub struct InvalidFilterError {
    pub screenname: String,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigurationError {
    #[error("You must supply at least one feed")]
    NoFeeds,

    #[error("Screenname required (feed #{index})")]
    EmptyScreenname { index: usize },

    #[error("Invalid comparator: {name}")]
    InvalidComparator { name: String },

    #[error("Refresh interval must be greater than zero")]
    InvalidRefreshInterval,

    #[error("Invalid config file {path}: {reason}")]
    InvalidConfigFile { path: PathBuf, reason: String },

    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),

    #[error("Upstream error for @{screenname} (status {status:?}): {payload}")]
    Upstream {
        screenname: String,
        status: Option<u16>,
        payload: Value,
    },

    #[error("Fetch for @{screenname} timed out after {timeout:?}")]
    Timeout { screenname: String, timeout: Duration },

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Cycle incomplete: {filled}/{expected} feeds reported")]
    IncompleteCycle { filled: usize, expected: usize },

    #[error("Failed to write cache file {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read cache file {path}: {reason}")]
    CacheRead { path: PathBuf, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

impl AggregatorError {
    /// Whether retrying the same upstream request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AggregatorError::Upstream { status: None, .. } => true,
            AggregatorError::Upstream { status: Some(status), .. } => *status == 429 || *status >= 500,
            AggregatorError::Http(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
