//! The job runner.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sentra_storage::{KvStore, MemoryKvStore};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{JobHandler, JobRecord, Trigger};

const NS_JOBS: &str = "scheduler:jobs";

/// How late a one-shot job may still run after its scheduled time.
pub const DEFAULT_MISFIRE_GRACE: Duration = Duration::from_secs(60);

struct Inner {
    store: Arc<dyn KvStore>,
    handlers: DashMap<String, Arc<dyn JobHandler>>,
    tasks: DashMap<String, JoinHandle<()>>,
}

impl Inner {
    async fn run(&self, record: &JobRecord) {
        let Some(handler) = self
            .handlers
            .get(&record.handler)
            .map(|entry| Arc::clone(entry.value()))
        else {
            warn!(job = %record.id, handler = %record.handler, "no handler for job");
            return;
        };
        debug!(job = %record.id, "running job");
        if let Err(e) = handler.execute(record.payload.clone()).await {
            error!(job = %record.id, error = %e, "job failed");
        }
    }

    async fn finish_once(&self, id: &str) {
        if let Err(e) = self.store.delete(NS_JOBS, id).await {
            warn!(job = id, error = %e, "could not remove completed job record");
        }
        self.tasks.remove(id);
    }
}

/// The process-wide background job runner.
///
/// Supports one-shot "run at time T" jobs and recurring cron jobs. Job ids
/// are unique; registering a duplicate id is rejected rather than creating
/// parallel executions. `start` may be called exactly once per process.
pub struct Scheduler {
    inner: Arc<Inner>,
    started: AtomicBool,
    misfire_grace: Duration,
}

impl Scheduler {
    /// Create a scheduler persisting one-shot jobs in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                handlers: DashMap::new(),
                tasks: DashMap::new(),
            }),
            started: AtomicBool::new(false),
            misfire_grace: DEFAULT_MISFIRE_GRACE,
        }
    }

    /// Create a scheduler over a fresh in-memory store (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// Override the misfire grace window.
    #[must_use]
    pub fn with_misfire_grace(mut self, grace: Duration) -> Self {
        self.misfire_grace = grace;
        self
    }

    /// Register a named handler. Jobs reference handlers by this name.
    pub fn register_handler(&self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.inner.handlers.insert(name.into(), handler);
    }

    /// Start the scheduler: re-arm persisted one-shot jobs.
    ///
    /// Records whose run time passed within the misfire grace still run
    /// (immediately); older ones are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyStarted`] on a second call, or a
    /// storage error if the job records cannot be read.
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let mut restored: usize = 0;
        for key in self.inner.store.list_keys(NS_JOBS).await? {
            let Some(bytes) = self.inner.store.get(NS_JOBS, &key).await? else {
                continue;
            };
            let record: JobRecord = match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    warn!(job = %key, error = %e, "dropping unreadable job record");
                    self.inner.store.delete(NS_JOBS, &key).await?;
                    continue;
                },
            };
            let Trigger::Once { run_at } = &record.trigger else {
                // Recurring jobs are re-registered at boot, not restored.
                self.inner.store.delete(NS_JOBS, &key).await?;
                continue;
            };
            let run_at = *run_at;
            if self.is_beyond_grace(run_at) {
                warn!(job = %record.id, run_at = %run_at, "dropping misfired job");
                self.inner.store.delete(NS_JOBS, &key).await?;
                continue;
            }
            self.arm_once(record)?;
            restored = restored.saturating_add(1);
        }

        info!(restored, "scheduler started");
        Ok(())
    }

    /// Schedule a one-shot job at `run_at`. The record is persisted so the
    /// job survives a restart.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateJob`] if the id is taken,
    /// [`SchedulerError::UnknownHandler`] if no handler is registered under
    /// `handler`, or a storage error if the record cannot be persisted.
    pub async fn schedule_once(
        &self,
        id: impl Into<String>,
        run_at: DateTime<Utc>,
        handler: &str,
        payload: Value,
    ) -> SchedulerResult<()> {
        self.check_handler(handler)?;
        let record = JobRecord {
            id: id.into(),
            trigger: Trigger::Once { run_at },
            handler: handler.to_string(),
            payload,
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| SchedulerError::StorageError(e.to_string()))?;
        self.inner.store.set(NS_JOBS, &record.id, bytes).await?;
        self.arm_once(record)
    }

    /// Schedule a recurring cron job (not persisted; re-register at boot).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTrigger`] for an unparsable
    /// expression, [`SchedulerError::DuplicateJob`] if the id is taken, or
    /// [`SchedulerError::UnknownHandler`] if no handler is registered.
    pub fn schedule_cron(
        &self,
        id: impl Into<String>,
        expr: &str,
        handler: &str,
        payload: Value,
    ) -> SchedulerResult<()> {
        self.check_handler(handler)?;
        let schedule = cron::Schedule::from_str(expr)
            .map_err(|e| SchedulerError::InvalidTrigger(e.to_string()))?;
        let record = JobRecord {
            id: id.into(),
            trigger: Trigger::Cron {
                expr: expr.to_string(),
            },
            handler: handler.to_string(),
            payload,
        };

        let inner = Arc::clone(&self.inner);
        let job = record.clone();
        match self.inner.tasks.entry(record.id) {
            Entry::Occupied(entry) => Err(SchedulerError::DuplicateJob {
                id: entry.key().clone(),
            }),
            Entry::Vacant(slot) => {
                let handle = tokio::spawn(async move {
                    loop {
                        let Some(next) = schedule.upcoming(Utc).next() else {
                            warn!(job = %job.id, "cron schedule exhausted");
                            break;
                        };
                        tokio::time::sleep(until(next)).await;
                        inner.run(&job).await;
                    }
                });
                slot.insert(handle);
                Ok(())
            },
        }
    }

    /// Whether a job with this id is currently scheduled.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.tasks.contains_key(id)
    }

    /// Number of currently scheduled jobs.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Abort every scheduled job task. Persisted one-shot records remain
    /// for the next start.
    pub fn shutdown(&self) {
        self.inner.tasks.retain(|_, handle| {
            handle.abort();
            false
        });
        info!("scheduler shut down");
    }

    fn check_handler(&self, name: &str) -> SchedulerResult<()> {
        if self.inner.handlers.contains_key(name) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownHandler {
                name: name.to_string(),
            })
        }
    }

    fn is_beyond_grace(&self, run_at: DateTime<Utc>) -> bool {
        match Utc::now().signed_duration_since(run_at).to_std() {
            Ok(late) => late > self.misfire_grace,
            // run_at is in the future.
            Err(_) => false,
        }
    }

    fn arm_once(&self, record: JobRecord) -> SchedulerResult<()> {
        let Trigger::Once { run_at } = &record.trigger else {
            return Err(SchedulerError::InvalidTrigger(
                "arm_once requires a one-shot trigger".to_string(),
            ));
        };
        let run_at = *run_at;
        let inner = Arc::clone(&self.inner);
        let job = record.clone();
        match self.inner.tasks.entry(record.id) {
            Entry::Occupied(entry) => Err(SchedulerError::DuplicateJob {
                id: entry.key().clone(),
            }),
            Entry::Vacant(slot) => {
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(until(run_at)).await;
                    inner.run(&job).await;
                    inner.finish_once(&job.id).await;
                });
                slot.insert(handle);
                Ok(())
            },
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("jobs", &self.inner.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Duration from now until `at`; zero when `at` has passed.
fn until(at: DateTime<Utc>) -> Duration {
    at.signed_duration_since(Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO)
}
