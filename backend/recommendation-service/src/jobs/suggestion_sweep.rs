//! Suggestion Sweep Background Job
//!
//! Periodically recomputes friend and event suggestions for every user in the
//! store. Each sweep enumerates all user ids and runs both engines per user
//! with bounded concurrency and no ordering guarantee between users.
//!
//! A failure for one user is logged and counted, never aborting the sweep.
//! Sweeps never overlap: a tick that fires while the previous sweep is still
//! running is skipped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use uuid::Uuid;

use crate::config::SweepSettings;
use crate::error::Result;
use crate::metrics;
use crate::state::AppContext;

/// Default sweep period (0.1 hours)
const SWEEP_INTERVAL: Duration = Duration::from_secs(6 * 60);

/// Delay before the first sweep so the service can finish starting up
const INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Users processed concurrently within one sweep
const SWEEP_CONCURRENCY: usize = 4;

/// Configuration for the suggestion sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: SWEEP_INTERVAL,
            initial_delay: INITIAL_DELAY,
            concurrency: SWEEP_CONCURRENCY,
        }
    }
}

impl From<&SweepSettings> for SweepConfig {
    fn from(settings: &SweepSettings) -> Self {
        Self {
            enabled: settings.enabled,
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            concurrency: settings.concurrency.max(1),
        }
    }
}

/// Outcome of one completed sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub users: usize,
    pub friend_failures: usize,
    pub event_failures: usize,
    pub duration: Duration,
}

/// Runs sweeps over all users, one at a time
pub struct SuggestionSweeper {
    ctx: Arc<AppContext>,
    concurrency: usize,
    running: AtomicBool,
}

/// Clears the in-progress flag when the sweep ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SuggestionSweeper {
    pub fn new(ctx: Arc<AppContext>, concurrency: usize) -> Self {
        Self {
            ctx,
            concurrency: concurrency.max(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    /// Run one sweep over every user.
    ///
    /// Returns `Ok(None)` without doing any work when another sweep is still in
    /// progress. Only failing to enumerate users is an error.
    pub async fn run_sweep(&self) -> Result<Option<SweepReport>> {
        let Some(_guard) = self.try_begin() else {
            metrics::record_sweep_skipped();
            return Ok(None);
        };

        let started = Instant::now();
        let user_ids = self.ctx.store.list_user_ids().await?;
        let users = user_ids.len();

        let friend_failures = AtomicUsize::new(0);
        let event_failures = AtomicUsize::new(0);

        stream::iter(user_ids)
            .for_each_concurrent(self.concurrency, |user_id| {
                let friend_failures = &friend_failures;
                let event_failures = &event_failures;
                async move {
                    let (friends_ok, events_ok) = self.process_user(user_id).await;
                    if !friends_ok {
                        friend_failures.fetch_add(1, Ordering::Relaxed);
                    }
                    if !events_ok {
                        event_failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        let duration = started.elapsed();
        metrics::record_sweep_duration(duration);

        Ok(Some(SweepReport {
            users,
            friend_failures: friend_failures.into_inner(),
            event_failures: event_failures.into_inner(),
            duration,
        }))
    }

    /// Run both engines for one user; returns whether each succeeded
    async fn process_user(&self, user_id: Uuid) -> (bool, bool) {
        let friends_ok = match self.ctx.friends.suggest_friends(user_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Friend suggestion failed");
                metrics::record_sweep_failure("friends");
                false
            }
        };

        let events_ok = match self.ctx.events.suggest_events(user_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Event suggestion failed");
                metrics::record_sweep_failure("events");
                false
            }
        };

        (friends_ok, events_ok)
    }

    async fn run_and_log(&self) {
        match self.run_sweep().await {
            Ok(Some(report)) => {
                tracing::info!(
                    users = report.users,
                    friend_failures = report.friend_failures,
                    event_failures = report.event_failures,
                    duration_ms = report.duration.as_millis(),
                    "Suggestion sweep completed"
                );
            }
            Ok(None) => {
                tracing::warn!("Previous suggestion sweep still running, skipping this tick");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Suggestion sweep failed to enumerate users");
            }
        }
    }
}

/// Handle to the running sweep loop
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop scheduling sweeps and wait for any sweep in flight to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Suggestion sweeper task ended abnormally");
        }
    }
}

/// Start the periodic suggestion sweep.
///
/// Each tick spawns a sweep; the in-progress guard turns a tick that overlaps
/// a running sweep into a skip.
pub fn spawn_suggestion_sweeper(ctx: Arc<AppContext>, config: SweepConfig) -> SweepHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Suggestion sweep disabled by configuration");
            return;
        }

        tracing::info!(
            interval_secs = config.interval.as_secs(),
            concurrency = config.concurrency,
            "Starting suggestion sweep background job"
        );

        tokio::select! {
            _ = sleep(config.initial_delay) => {}
            _ = shutdown_rx.changed() => return,
        }

        let sweeper = Arc::new(SuggestionSweeper::new(ctx, config.concurrency));
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    in_flight.retain(|task| !task.is_finished());
                    let sweeper = sweeper.clone();
                    in_flight.push(tokio::spawn(async move { sweeper.run_and_log().await }));
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        for task in in_flight {
            let _ = task.await;
        }
        tracing::info!("Suggestion sweep stopped");
    });

    SweepHandle { shutdown_tx, task }
}
