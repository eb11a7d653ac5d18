use crate::config::AggregatorConfig;
use crate::credentials::{CredentialResolver, FetchMode};
use crate::fetcher::FeedFetcher;
use crate::filter::FeedFilter;
use crate::fixtures;
use crate::report::Reporter;
use crate::sort::{SortBy, Sorter};
use crate::state::CacheStore;
use crate::traits::TimelineSource;
use crate::types::{AggregatorError, ConfigurationError, Feed, FeedOptions, Result, Tweet};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Per-cycle join barrier: one slot per registered feed, filled in any order.
#[derive(Debug)]
pub struct CycleAccumulator {
    slots: Vec<Option<Vec<Tweet>>>,
    filled: usize,
}

impl CycleAccumulator {
    pub fn new(feed_count: usize) -> Self {
        Self {
            slots: vec![None; feed_count],
            filled: 0,
        }
    }

    pub fn feed_count(&self) -> usize {
        self.slots.len()
    }

    /// Fill `feed_index`'s slot. Returns `false` (and keeps the first batch)
    /// when the slot was already filled or does not exist.
    pub fn record(&mut self, feed_index: usize, batch: Vec<Tweet>) -> bool {
        match self.slots.get_mut(feed_index) {
            Some(slot @ None) => {
                *slot = Some(batch);
                self.filled += 1;
                true
            }
            Some(Some(_)) => {
                warn!("Feed #{} already reported this cycle, ignoring second batch", feed_index);
                false
            }
            None => {
                warn!("No feed #{} in a cycle of {} feeds", feed_index, self.slots.len());
                false
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Concatenate every batch in registration order.
    pub fn flatten(self) -> Result<Vec<Tweet>> {
        if !self.is_complete() {
            return Err(AggregatorError::IncompleteCycle {
                filled: self.filled,
                expected: self.slots.len(),
            });
        }
        Ok(self.slots.into_iter().flatten().flatten().collect())
    }
}

/// A registered feed with its filter compiled.
#[derive(Debug, Clone)]
pub struct CompiledFeed {
    pub index: usize,
    pub screenname: String,
    pub filter: FeedFilter,
}

#[derive(Debug)]
pub struct FeedFailure {
    pub feed_index: usize,
    pub screenname: String,
    pub error: AggregatorError,
}

/// What one cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub feed_count: usize,
    pub item_count: usize,
    pub failures: Vec<FeedFailure>,
    pub cache_error: Option<AggregatorError>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cache_error.is_none()
    }
}

/// One configured aggregation session: its feeds and everything a cycle
/// needs to fetch, filter, merge, sort and commit them.
pub struct TweetAggregator {
    config: AggregatorConfig,
    feeds: Vec<CompiledFeed>,
    resolver: CredentialResolver,
    fetcher: FeedFetcher,
    sorter: Sorter,
    cache: Arc<CacheStore>,
    reporter: Reporter,
}

impl TweetAggregator {
    pub fn builder(config: AggregatorConfig) -> AggregatorBuilder {
        AggregatorBuilder::new(config)
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn feeds(&self) -> &[CompiledFeed] {
        &self.feeds
    }

    pub fn cache(&self) -> Arc<CacheStore> {
        self.cache.clone()
    }

    pub fn reporter(&self) -> Reporter {
        self.reporter
    }

    /// Run one full fetch, filter, merge, sort and commit pass.
    ///
    /// Per-feed problems never fail the cycle: each one becomes an empty
    /// contribution and an entry in the report, and the cycle still commits.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started = Instant::now();
        self.reporter.cycle_started(cycle_id, self.feeds.len());

        let mode = self
            .resolver
            .resolve(self.config.wants_test_data())
            .await
            .map_err(|e| e.to_string());
        debug!(%cycle_id, ?mode, "Resolved fetch mode");

        let mut accumulator = CycleAccumulator::new(self.feeds.len());
        let mut failures = Vec::new();

        let mut pending: FuturesUnordered<_> = self
            .feeds
            .iter()
            .map(|feed| self.collect_feed(cycle_id, feed, &mode))
            .collect();

        while let Some((feed, outcome)) = pending.next().await {
            let batch = match outcome {
                Ok(items) => items,
                Err(error) => {
                    self.reporter.feed_failed(cycle_id, &feed.screenname, &error);
                    failures.push(FeedFailure {
                        feed_index: feed.index,
                        screenname: feed.screenname.clone(),
                        error,
                    });
                    Vec::new()
                }
            };
            accumulator.record(feed.index, batch);
        }
        drop(pending);

        let merged = match accumulator.flatten() {
            Ok(merged) => merged,
            Err(e) => {
                error!(%cycle_id, "{}", e);
                Vec::new()
            }
        };
        let merged = if self.config.dedupe { dedupe(merged) } else { merged };
        let sorted = self.sorter.sort(merged);
        let item_count = sorted.len();

        let cache_error = match self.cache.commit(sorted).await {
            Ok(_) => {
                self.reporter
                    .cache_updated(cycle_id, item_count, started.elapsed().as_millis() as u64);
                None
            }
            Err(e) => {
                self.reporter.cache_write_failed(cycle_id, &e);
                Some(e)
            }
        };

        CycleReport {
            cycle_id,
            feed_count: self.feeds.len(),
            item_count,
            failures,
            cache_error,
            elapsed: started.elapsed(),
        }
    }

    async fn collect_feed<'a>(
        &self,
        cycle_id: Uuid,
        feed: &'a CompiledFeed,
        mode: &std::result::Result<FetchMode, String>,
    ) -> (&'a CompiledFeed, Result<Vec<Tweet>>) {
        let outcome = async {
            feed.filter.check()?;
            let mode = mode
                .as_ref()
                .map_err(|reason| AggregatorError::Credentials(reason.clone()))?;

            self.reporter
                .fetching(cycle_id, &feed.screenname, feed.filter.describe().as_deref());

            let timeout = self.config.feed_timeout();
            let raw = tokio::time::timeout(timeout, self.fetcher.fetch(&feed.screenname, mode, timeout))
                .await
                .map_err(|_| AggregatorError::Timeout {
                    screenname: feed.screenname.clone(),
                    timeout,
                })??;

            Ok::<_, AggregatorError>(feed.filter.apply(raw)?)
        }
        .await;

        (feed, outcome)
    }
}

/// Drop later repeats of an `id_str`, keeping the first (registration order).
fn dedupe(items: Vec<Tweet>) -> Vec<Tweet> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|tweet| tweet.id_str.is_empty() || seen.insert(tweet.id_str.clone()))
        .collect()
}

/// Collects feeds and overrides, then validates everything before the first
/// cycle can run.
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    feeds: Vec<Feed>,
    sort_by: Option<SortBy>,
    upstream: Option<Arc<dyn TimelineSource>>,
}

impl AggregatorBuilder {
    pub fn new(mut config: AggregatorConfig) -> Self {
        let feeds = std::mem::take(&mut config.feeds);
        Self {
            config,
            feeds,
            sort_by: None,
            upstream: None,
        }
    }

    pub fn feed(mut self, screenname: impl Into<String>, options: FeedOptions) -> Self {
        self.feeds.push(Feed::new(screenname, options));
        self
    }

    pub fn feeds(mut self, feeds: impl IntoIterator<Item = Feed>) -> Self {
        self.feeds.extend(feeds);
        self
    }

    /// Overrides `sort_by` from the config.
    pub fn sort_by(mut self, order: SortBy) -> Self {
        self.sort_by = Some(order);
        self
    }

    /// Use `source` for live fetches instead of building a client from credentials.
    pub fn upstream(mut self, source: Arc<dyn TimelineSource>) -> Self {
        self.upstream = Some(source);
        self
    }

    /// Validate and build. A malformed `filter_tags` on any feed is fatal here.
    pub fn build(self) -> std::result::Result<TweetAggregator, ConfigurationError> {
        let aggregator = self.build_lenient()?;
        for feed in &aggregator.feeds {
            feed.filter.check()?;
        }
        Ok(aggregator)
    }

    /// Like [`build`](Self::build), but a feed with a malformed `filter_tags`
    /// is kept and contributes an empty batch (plus a reported error) every cycle.
    pub fn build_lenient(self) -> std::result::Result<TweetAggregator, ConfigurationError> {
        if self.feeds.is_empty() {
            return Err(ConfigurationError::NoFeeds);
        }

        let feeds = self
            .feeds
            .iter()
            .enumerate()
            .map(|(index, feed)| {
                let screenname = feed.screenname.trim().trim_start_matches('@');
                if screenname.is_empty() {
                    return Err(ConfigurationError::EmptyScreenname { index });
                }
                Ok(CompiledFeed {
                    index,
                    screenname: screenname.to_string(),
                    filter: FeedFilter::compile(screenname, &feed.options),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let order = match (self.sort_by, &self.config.sort_by) {
            (Some(order), _) => order,
            (None, Some(name)) => SortBy::named(name)?,
            (None, None) => SortBy::default(),
        };

        let resolver = match self.upstream {
            Some(source) => CredentialResolver::with_client(source),
            None => CredentialResolver::new(self.config.credentials_path.clone(), self.config.fetch.clone()),
        };

        let fixture = self
            .config
            .test_data
            .clone()
            .unwrap_or_else(fixtures::sample_timeline);

        let cache = Arc::new(CacheStore::new(self.config.cache_path(), self.config.cold_start_wait()));

        Ok(TweetAggregator {
            fetcher: FeedFetcher::new(fixture, self.config.fetch.timeline_count),
            sorter: Sorter::new(order),
            reporter: Reporter::new(self.config.log_reports),
            feeds,
            resolver,
            cache,
            config: self.config,
        })
    }
}
