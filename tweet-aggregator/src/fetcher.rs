use crate::config::FetchConfig;
use crate::credentials::{Credentials, FetchMode};
use crate::traits::TimelineSource;
use crate::types::{AggregatorError, Result, Tweet};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const TIMELINE_PATH: &str = "1.1/statuses/user_timeline.json";
const TOKEN_PATH: &str = "oauth2/token";

/// Live upstream client for the v1.1 REST API using app-only bearer auth.
pub struct TwitterClient {
    client: Client,
    api_base: Url,
    bearer_token: String,
    config: FetchConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

impl TwitterClient {
    pub fn with_bearer_token(config: &FetchConfig, bearer_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base(&config.api_base_url)?,
            bearer_token: bearer_token.into(),
            config: config.clone(),
        })
    }

    /// Build a client from configured credentials, exchanging the consumer
    /// key and secret for a bearer token when none was supplied.
    pub async fn connect(credentials: &Credentials, config: &FetchConfig) -> Result<Self> {
        if let Some(token) = credentials.bearer_token() {
            return Self::with_bearer_token(config, token);
        }

        let mut client = Self::with_bearer_token(config, String::new())?;
        client.bearer_token = client.request_bearer_token(credentials).await?;
        info!("Obtained bearer token from {}", client.api_base);
        Ok(client)
    }

    async fn request_bearer_token(&self, credentials: &Credentials) -> Result<String> {
        let url = self.api_base.join(TOKEN_PATH)?;
        let response = self
            .client
            .post(url)
            .basic_auth(&credentials.consumer_key, Some(&credentials.consumer_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let payload = error_payload(response).await;
            return Err(AggregatorError::Credentials(format!(
                "token request failed with HTTP {}: {}",
                status, payload
            )));
        }

        let token: TokenResponse = response.json().await?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(AggregatorError::Credentials(format!(
                "unexpected token type: {}",
                token.token_type
            )));
        }
        Ok(token.access_token)
    }

    async fn timeline_once(&self, screenname: &str, count: u32, include_rts: bool) -> Result<Vec<Tweet>> {
        let mut url = self.api_base.join(TIMELINE_PATH)?;
        url.query_pairs_mut()
            .append_pair("screen_name", screenname)
            .append_pair("count", &count.to_string())
            .append_pair("include_rts", if include_rts { "true" } else { "false" });

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| AggregatorError::Upstream {
                screenname: screenname.to_string(),
                status: None,
                payload: Value::String(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Upstream {
                screenname: screenname.to_string(),
                status: Some(status.as_u16()),
                payload: error_payload(response).await,
            });
        }

        response.json::<Vec<Tweet>>().await.map_err(|e| AggregatorError::Upstream {
            screenname: screenname.to_string(),
            status: Some(status.as_u16()),
            payload: Value::String(format!("unreadable timeline: {}", e)),
        })
    }
}

#[async_trait]
impl TimelineSource for TwitterClient {
    fn source_name(&self) -> String {
        format!("Twitter API ({})", self.api_base)
    }

    async fn user_timeline(
        &self,
        screenname: &str,
        count: u32,
        include_rts: bool,
        budget: Duration,
    ) -> Result<Vec<Tweet>> {
        let start_time = Instant::now();
        let budget = budget.min(self.config.retry_budget());
        debug!("Fetching timeline for @{}", screenname);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(budget),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            let attempt_started = Instant::now();
            match self.timeline_once(screenname, count, include_rts).await {
                Ok(tweets) => {
                    info!(
                        "Fetched {} tweets for @{} in {}ms",
                        tweets.len(),
                        screenname,
                        start_time.elapsed().as_millis()
                    );
                    return Ok(tweets);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let Some(delay) = backoff.next_backoff() else {
                        return Err(e);
                    };
                    // The next attempt has to finish inside the budget too.
                    if start_time.elapsed() + delay + attempt_started.elapsed() >= budget {
                        debug!("Retry budget of {:?} spent for @{}", budget, screenname);
                        return Err(e);
                    }
                    attempt += 1;
                    warn!("Attempt {} failed for @{}, retrying in {:?}: {}", attempt, screenname, delay, e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Retrieves raw items for one feed, from fixtures or the live upstream.
pub struct FeedFetcher {
    fixture: Arc<Vec<Tweet>>,
    timeline_count: u32,
}

impl FeedFetcher {
    pub fn new(fixture: Vec<Tweet>, timeline_count: u32) -> Self {
        Self {
            fixture: Arc::new(fixture),
            timeline_count,
        }
    }

    /// `budget` is the time left for this feed; live fetches stop retrying within it.
    pub async fn fetch(&self, screenname: &str, mode: &FetchMode, budget: Duration) -> Result<Vec<Tweet>> {
        match mode {
            FetchMode::Test => Ok(self.fixture.as_ref().clone()),
            FetchMode::Live(source) => {
                source
                    .user_timeline(screenname, self.timeline_count, true, budget)
                    .await
            }
        }
    }
}

fn api_base(raw: &str) -> Result<Url> {
    let mut base = Url::parse(raw)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

async fn error_payload(response: Response) -> Value {
    match response.text().await {
        Ok(body) => serde_json::from_str(&body).unwrap_or(Value::String(body)),
        Err(e) => Value::String(e.to_string()),
    }
}
