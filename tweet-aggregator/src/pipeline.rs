use crate::aggregator::{CycleReport, TweetAggregator};
use crate::types::{AggregatorError, ConfigurationError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was still in flight; this trigger was dropped.
    Skipped,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped)
    }
}

/// Runs cycles on demand and on a fixed period, never more than one at a time.
#[derive(Clone)]
pub struct CycleScheduler {
    aggregator: Arc<TweetAggregator>,
    in_flight: Arc<Mutex<()>>,
    is_running: Arc<RwLock<bool>>,
    timer: Arc<Mutex<Option<(JoinHandle<()>, oneshot::Sender<()>)>>>,
    completed: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

impl CycleScheduler {
    pub fn new(aggregator: Arc<TweetAggregator>) -> Self {
        Self {
            aggregator,
            in_flight: Arc::new(Mutex::new(())),
            is_running: Arc::new(RwLock::new(false)),
            timer: Arc::new(Mutex::new(None)),
            completed: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn aggregator(&self) -> Arc<TweetAggregator> {
        self.aggregator.clone()
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Run one cycle unless one is already in flight.
    pub async fn run_once(&self) -> CycleOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            self.aggregator.reporter().cycle_skipped();
            return CycleOutcome::Skipped;
        };

        let report = self.aggregator.run_cycle().await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        CycleOutcome::Completed(report)
    }

    /// Run a cycle now, then every `period` until [`stop`](Self::stop).
    ///
    /// Each tick spawns its cycle, so a tick that lands while the previous
    /// cycle is still running is skipped rather than queued.
    pub async fn start(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(ConfigurationError::InvalidRefreshInterval.into());
        }

        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(AggregatorError::General("Scheduler is already running".to_string()));
        }
        *is_running = true;
        drop(is_running);

        info!(
            "Starting scheduler for {} feeds, refreshing every {:?}",
            self.aggregator.feeds().len(),
            period
        );

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*this.is_running.read().await {
                            break;
                        }
                        let cycle = this.clone();
                        tokio::spawn(async move {
                            cycle.run_once().await;
                        });
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            debug!("Scheduler timer stopped");
        });

        *self.timer.lock().await = Some((handle, shutdown_tx));
        Ok(())
    }

    /// Stop the timer. A cycle already in flight is left to finish.
    pub async fn stop(&self) -> Result<()> {
        let mut is_running = self.is_running.write().await;
        *is_running = false;
        drop(is_running);

        let timer = self.timer.lock().await.take();
        if let Some((handle, shutdown)) = timer {
            let _ = shutdown.send(());
            if let Err(e) = handle.await {
                return Err(AggregatorError::General(format!("Scheduler task failed: {}", e)));
            }
        }
        info!("Stopping scheduler");
        Ok(())
    }
}
