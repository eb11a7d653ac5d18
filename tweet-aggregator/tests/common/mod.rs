#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tweet_aggregator::{AggregatorConfig, AggregatorError, Result, TimelineSource, Tweet};

static TRACING: Once = Once::new();

/// Initialize tracing once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Config rooted in `dir` that never touches real credentials.
pub fn test_config(dir: &Path) -> AggregatorConfig {
    AggregatorConfig {
        cache_dir: dir.to_path_buf(),
        credentials_path: dir.join("no-credentials.json"),
        cold_start_wait_ms: 200,
        feed_timeout_ms: 5_000,
        server: false,
        ..AggregatorConfig::default()
    }
}

pub fn tweet(id: &str, created_at: &str, text: &str) -> Tweet {
    Tweet::new(id, created_at, text)
}

/// `count` tweets for `screenname`, one hour apart on 2016-01-01, newest first.
pub fn timeline(screenname: &str, count: usize) -> Vec<Tweet> {
    (0..count)
        .map(|i| {
            let hour = 23 - i;
            let mut t = tweet(
                &format!("{}-{}", screenname, i),
                &format!("Fri Jan 01 {:02}:00:00 +0000 2016", hour),
                &format!("@{} says {}", screenname, i),
            );
            t.extra.insert("user".to_string(), json!({ "screen_name": screenname }));
            t
        })
        .collect()
}

/// In-process upstream with canned timelines, per-call delay and failures.
#[derive(Default)]
pub struct ScriptedTimeline {
    timelines: HashMap<String, Vec<Tweet>>,
    failing: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, screenname: &str, tweets: Vec<Tweet>) -> Self {
        self.timelines.insert(screenname.to_string(), tweets);
        self
    }

    pub fn failing(mut self, screenname: &str) -> Self {
        self.failing.insert(screenname.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of `user_timeline` calls seen running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimelineSource for ScriptedTimeline {
    fn source_name(&self) -> String {
        "scripted".to_string()
    }

    async fn user_timeline(
        &self,
        screenname: &str,
        _count: u32,
        _include_rts: bool,
        _budget: Duration,
    ) -> Result<Vec<Tweet>> {
        self.calls.lock().unwrap().push(screenname.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(screenname) {
            return Err(AggregatorError::Upstream {
                screenname: screenname.to_string(),
                status: Some(404),
                payload: not_found_payload(),
            });
        }
        Ok(self.timelines.get(screenname).cloned().unwrap_or_default())
    }
}

pub fn not_found_payload() -> Value {
    json!({ "errors": [{ "code": 34, "message": "Sorry, that page does not exist." }] })
}
