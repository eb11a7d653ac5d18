use crate::config::AggregatorConfig;
use crate::types::AggregatorError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Status notifications for a running aggregator.
///
/// Progress messages go out at `info` when `log_reports` is on and at `debug`
/// otherwise. Failures are always logged.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    enabled: bool,
}

macro_rules! progress {
    ($self:expr, $($arg:tt)+) => {
        if $self.enabled {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

impl Reporter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn log_start_message(&self, config: &AggregatorConfig, feed_count: usize) {
        if !self.enabled {
            return;
        }
        let refresh_minutes = (config.refresh_time as f64 / 60.0).round() as u64;
        info!("| ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~");
        info!("|  Running tweet-aggregator v{}", env!("CARGO_PKG_VERSION"));
        info!("|  Monitoring Feeds: {}", feed_count);
        info!("|  Refresh Time: {} secs ({} min)", config.refresh_time, refresh_minutes);
        info!("|  Cache File: {}", config.cache_path().display());
        if config.server {
            info!("|  Query Server: localhost:{}{}", config.port, config.url);
        }
        info!("| ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~");
    }

    pub fn cycle_started(&self, cycle_id: Uuid, feed_count: usize) {
        progress!(self, %cycle_id, feed_count, "Starting aggregation cycle");
    }

    pub fn fetching(&self, cycle_id: Uuid, screenname: &str, filter: Option<&str>) {
        progress!(self, %cycle_id, filter = filter.unwrap_or(""), "Fetching twitter data for @{}", screenname);
    }

    pub fn feed_failed(&self, cycle_id: Uuid, screenname: &str, error: &AggregatorError) {
        warn!(%cycle_id, "Feed @{} contributed nothing this cycle: {}", screenname, error);
    }

    pub fn cache_updated(&self, cycle_id: Uuid, count: usize, elapsed_ms: u64) {
        progress!(self, %cycle_id, elapsed_ms, "Cache updated with {} tweets", count);
    }

    pub fn cache_write_failed(&self, cycle_id: Uuid, error: &AggregatorError) {
        error!(%cycle_id, "Error saving cache file: {}", error);
    }

    pub fn cycle_skipped(&self) {
        progress!(self, "Previous cycle still running, skipping this trigger");
    }
}
