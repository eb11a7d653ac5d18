use crate::types::{ConfigurationError, Feed, FeedOptions, FilterTags, Tweet};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// Cap on one timeline call, retries included. The per-feed timeout lowers it further.
    pub retry_budget_seconds: u64,
    pub api_base_url: String,
    pub timeline_count: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Tweet-Aggregator/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            retry_budget_seconds: 20,
            api_base_url: "https://api.twitter.com/".to_string(),
            timeline_count: 200,
        }
    }
}

/// Session-wide settings. Every field has a default, so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    #[serde(alias = "logReports")]
    pub log_reports: bool,
    pub server: bool,
    pub port: u16,
    pub url: String,
    #[serde(alias = "testData")]
    pub test_data: Option<Vec<Tweet>>,
    #[serde(alias = "useTestData")]
    pub use_test_data: bool,
    #[serde(alias = "refreshTime")]
    pub refresh_time: u64,
    #[serde(alias = "cacheDir")]
    pub cache_dir: PathBuf,
    pub cache_file: String,
    pub credentials_path: PathBuf,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    pub cold_start_wait_ms: u64,
    pub feed_timeout_ms: u64,
    pub dedupe: bool,
    pub feeds: Vec<Feed>,
    pub fetch: FetchConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            log_reports: false,
            server: true,
            port: 8417,
            url: "/birdwatch/tweets".to_string(),
            test_data: None,
            use_test_data: false,
            refresh_time: 600,
            cache_dir: PathBuf::from("cache"),
            cache_file: "cached_tweets.json".to_string(),
            credentials_path: PathBuf::from("configure/credentials.json"),
            sort_by: None,
            cold_start_wait_ms: 1200,
            feed_timeout_ms: 30_000,
            dedupe: false,
            feeds: Vec::new(),
            fetch: FetchConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn retry_budget(&self) -> Duration {
        Duration::from_secs(self.retry_budget_seconds)
    }
}

impl AggregatorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = serde_json::from_str(&content).map_err(|e| ConfigurationError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `TWEET_AGGREGATOR_*` overrides from the environment.
    pub fn apply_env(&mut self) {
        if let Some(port) = env_parse("TWEET_AGGREGATOR_PORT") {
            self.port = port;
        }
        if let Some(refresh_time) = env_parse("TWEET_AGGREGATOR_REFRESH_TIME") {
            self.refresh_time = refresh_time;
        }
        if let Ok(cache_dir) = std::env::var("TWEET_AGGREGATOR_CACHE_DIR") {
            self.cache_dir = PathBuf::from(cache_dir);
        }
    }

    /// Test mode is forced by the flag or by injecting fixture data.
    pub fn wants_test_data(&self) -> bool {
        self.use_test_data || self.test_data.is_some()
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_file)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_time)
    }

    pub fn cold_start_wait(&self) -> Duration {
        Duration::from_millis(self.cold_start_wait_ms)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={}", key, raw);
            None
        }
    }
}

/// Parses the command-line feed form: `screenname` or `screenname:tag1,tag2`.
impl FromStr for Feed {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (screenname, tags) = match s.split_once(':') {
            Some((name, tags)) => (name, Some(tags)),
            None => (s, None),
        };
        let screenname = screenname.trim().trim_start_matches('@');
        if screenname.is_empty() {
            return Err(ConfigurationError::EmptyScreenname { index: 0 });
        }

        let mut options = FeedOptions::default();
        if let Some(tags) = tags {
            let tags: Vec<&str> = tags.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
            if !tags.is_empty() {
                options = options.with_filter_tags(FilterTags::tags(tags));
            }
        }

        Ok(Feed::new(screenname, options))
    }
}
