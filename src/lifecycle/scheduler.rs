//! Periodic lifecycle driver.
//!
//! Runs decay/tier sweeps (lightweight, frequent) and consolidation batches
//! (heavier, less frequent) over every owner scope. Scopes are independent:
//! each runs in its own task under a concurrency limit, and a slow or failing
//! scope never blocks the others.

use crate::config::SchedulerConfig;
use crate::models::OwnerScope;
use crate::services::MemoryEngine;
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Which periodic job a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Sweep,
    Consolidate,
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the scheduler to stop and waits for in-flight cycles to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

/// Periodic, owner-scope-partitioned lifecycle executor.
pub struct LifecycleScheduler {
    engine: Arc<MemoryEngine>,
    config: SchedulerConfig,
}

impl LifecycleScheduler {
    /// Creates a scheduler over an engine.
    #[must_use]
    pub const fn new(engine: Arc<MemoryEngine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Starts the periodic loop on the current tokio runtime.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut sweep_tick =
                tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs));
            let mut consolidation_tick = tokio::time::interval(Duration::from_secs(
                self.config.consolidation_interval_secs,
            ));
            sweep_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            consolidation_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Consume the immediate first ticks; cycles start one interval in.
            sweep_tick.tick().await;
            consolidation_tick.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = sweep_tick.tick() => self.run_cycle(Job::Sweep).await,
                    _ = consolidation_tick.tick() => self.run_cycle(Job::Consolidate).await,
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Runs one job over every scope, isolating per-scope failures.
    async fn run_cycle(&self, job: Job) {
        let scopes = match self.engine.list_scopes().await {
            Ok(scopes) => scopes,
            Err(e) => {
                warn!(error = %e, "scheduler could not list scopes, skipping cycle");
                return;
            },
        };

        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_scopes.max(1)));
        let mut tasks = JoinSet::new();
        for scope in scopes {
            let engine = Arc::clone(&self.engine);
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let Ok(_permit) = limit.acquire().await else {
                    return;
                };
                run_scope_job(&engine, &scope, job).await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // A panicking scope task is contained here; others proceed.
                warn!(error = %e, "scope task aborted");
            }
        }
    }
}

async fn run_scope_job(engine: &MemoryEngine, scope: &OwnerScope, job: Job) {
    match job {
        Job::Sweep => match engine.sweep(scope).await {
            Ok(report) => {
                if !report.is_empty() {
                    debug!(
                        scope = %scope,
                        promoted = report.promoted,
                        archived = report.archived,
                        deferred = report.deferred,
                        "sweep cycle finished"
                    );
                }
            },
            Err(e) => warn!(scope = %scope, error = %e, "sweep cycle failed"),
        },
        Job::Consolidate => match engine.run_consolidation(scope).await {
            Ok(report) => {
                if !report.is_empty() {
                    debug!(scope = %scope, summary = %report.summary(), "consolidation finished");
                }
            },
            // Contended is expected, not an error: another run holds the
            // scope; pick it up next cycle.
            Err(Error::LockContended { .. }) => {
                debug!(scope = %scope, "consolidation lock contended, skipping cycle");
            },
            Err(e) => warn!(scope = %scope, error = %e, "consolidation cycle failed"),
        },
    }
}

impl std::fmt::Debug for LifecycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
