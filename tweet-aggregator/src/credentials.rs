use crate::config::FetchConfig;
use crate::fetcher::TwitterClient;
use crate::traits::TimelineSource;
use crate::types::Result;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const BEARER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";
const PLACEHOLDER_PREFIX: &str = "YOUR_";

#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    bearer_token: Option<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .field("bearer_token", &self.bearer_token.as_deref().map(redact))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "***"
    }
}

fn is_real(value: &str) -> bool {
    !value.trim().is_empty() && !value.starts_with(PLACEHOLDER_PREFIX)
}

impl Credentials {
    pub fn from_bearer_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn from_consumer_keys(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            bearer_token: None,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref().filter(|token| is_real(token))
    }

    /// Whether these are usable rather than the shipped `YOUR_...` placeholders.
    pub fn is_configured(&self) -> bool {
        self.bearer_token().is_some() || (is_real(&self.consumer_key) && is_real(&self.consumer_secret))
    }

    /// Look for credentials in the environment, then in `path`.
    /// Absent or placeholder credentials are `Ok(None)`.
    pub async fn discover(path: &Path) -> Result<Option<Self>> {
        if let Ok(token) = std::env::var(BEARER_TOKEN_ENV) {
            let credentials = Self::from_bearer_token(token);
            if credentials.is_configured() {
                debug!("Using bearer token from {}", BEARER_TOKEN_ENV);
                return Ok(Some(credentials));
            }
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credentials file at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let credentials: Self = serde_json::from_str(&content)?;
        Ok(credentials.is_configured().then_some(credentials))
    }
}

/// How a cycle obtains its raw items.
#[derive(Clone)]
pub enum FetchMode {
    Test,
    Live(Arc<dyn TimelineSource>),
}

impl FetchMode {
    pub fn is_test(&self) -> bool {
        matches!(self, FetchMode::Test)
    }
}

impl fmt::Debug for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Test => f.write_str("Test"),
            FetchMode::Live(source) => write!(f, "Live({})", source.source_name()),
        }
    }
}

/// Decides per cycle whether live upstream calls are possible.
///
/// The upstream client is built at most once per resolver and reused by every
/// later cycle.
pub struct CredentialResolver {
    credentials_path: PathBuf,
    fetch_config: FetchConfig,
    client: OnceCell<Arc<dyn TimelineSource>>,
}

impl CredentialResolver {
    pub fn new(credentials_path: impl Into<PathBuf>, fetch_config: FetchConfig) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            fetch_config,
            client: OnceCell::new(),
        }
    }

    /// A resolver whose live client is already known, e.g. a custom upstream.
    pub fn with_client(client: Arc<dyn TimelineSource>) -> Self {
        Self {
            credentials_path: PathBuf::new(),
            fetch_config: FetchConfig::default(),
            client: OnceCell::new_with(Some(client)),
        }
    }

    pub async fn resolve(&self, use_test_data: bool) -> Result<FetchMode> {
        if use_test_data {
            return Ok(FetchMode::Test);
        }

        if let Some(client) = self.client.get() {
            return Ok(FetchMode::Live(client.clone()));
        }

        let Some(credentials) = Credentials::discover(&self.credentials_path).await? else {
            debug!("No credentials configured, using test data");
            return Ok(FetchMode::Test);
        };

        let client = self
            .client
            .get_or_try_init(|| async {
                let client = TwitterClient::connect(&credentials, &self.fetch_config).await?;
                info!("Upstream client ready: {}", client.source_name());
                Ok::<_, crate::types::AggregatorError>(Arc::new(client) as Arc<dyn TimelineSource>)
            })
            .await?;

        Ok(FetchMode::Live(client.clone()))
    }
}
