use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::hooks::Hooks;
use crate::job::{Job, JobFilter, ScheduledJob};
use crate::serializer::{CanonicalJsonSerializer, Serializer};
use crate::store::Store;

/// The queue engine: the public surface of this crate.
///
/// Wraps a [`Store`] implementation, enforcing the claim protocol's
/// invariants at the call site and owning a background maintenance task
/// that requeues timed-out jobs, reaps aged terminal jobs, and fires due
/// cron schedules.
pub struct QueueEngine<S: Store + 'static> {
    store: Arc<S>,
    serializer: Arc<dyn Serializer>,
    config: QueueConfig,
    hooks: Hooks,
    shutdown: Arc<Notify>,
    closed: Arc<AtomicBool>,
    maintenance: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<S: Store + 'static> QueueEngine<S> {
    /// Construct a queue engine and start its background maintenance loop.
    pub fn new(store: S, config: QueueConfig, hooks: Hooks) -> Arc<Self> {
        Self::with_serializer(store, config, hooks, Arc::new(CanonicalJsonSerializer))
    }

    pub fn with_serializer(
        store: S,
        config: QueueConfig,
        hooks: Hooks,
        serializer: Arc<dyn Serializer>,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            store: Arc::new(store),
            serializer,
            config,
            hooks,
            shutdown: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
            maintenance: tokio::sync::Mutex::new(None),
        });
        engine.clone().spawn_maintenance();
        engine
    }

    fn spawn_maintenance(self: Arc<Self>) {
        let interval = self.config.maintenance_interval;
        let shutdown = self.shutdown.clone();
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so callers who add
            // work right after construction see it before the first reap.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = ticker.tick() => {
                        engine.tick().await;
                    }
                }
            }
        });
        // spawn_maintenance runs once from `new`, before any other task
        // could observe `maintenance`, so this lock never contends.
        if let Ok(mut guard) = self.maintenance.try_lock() {
            *guard = Some(handle);
        }
    }

    /// One maintenance pass: scheduler fire, timeout requeue, reap. Exposed
    /// for the drive-to-empty test helper; the background loop calls the
    /// same method on its own interval.
    pub async fn tick(&self) {
        if let Err(e) = self.fire_due_schedules().await {
            tracing::error!(error = %e, "maintenance tick: scheduler fire failed");
        }
        if let Err(e) = self.requeue_timed_out_jobs().await {
            tracing::error!(error = %e, "maintenance tick: requeue failed");
        }
        if let Some(age) = self.config.remove_done_jobs_older_than {
            if let Err(e) = self.remove_done_jobs(age).await {
                tracing::error!(error = %e, "maintenance tick: reap done jobs failed");
            }
        }
        if let Some(age) = self.config.remove_failed_jobs_older_than {
            if let Err(e) = self.remove_failed_jobs(age).await {
                tracing::error!(error = %e, "maintenance tick: reap failed jobs failed");
            }
        }
    }

    async fn fire_due_schedules(&self) -> Result<(), QueueError> {
        while let Some(scheduled) = self.get_and_mark_scheduled_job_as_processing().await? {
            let empty_payload = self.serializer.serialize(serde_json::json!({}))?;
            if let Err(e) = self.store.insert_job(&scheduled.job_type, &empty_payload).await {
                tracing::error!(error = %e, job_type = %scheduled.job_type, "failed to materialise scheduled job");
            }
            let now = Utc::now();
            let next_run = crate::cron_schedule::CronSchedule::parse(&scheduled.cron_expression)?
                .next_after(now)
                .unwrap_or(now);
            self.mark_scheduled_job_as_idle(scheduled.id, next_run).await?;
        }
        Ok(())
    }

    /// Atomically select one `Idle` schedule with `next_run <= now` and
    /// flip it to `Processing`, returning it. Part of the engine's public
    /// contract alongside [`Self::mark_scheduled_job_as_idle`]; the
    /// maintenance loop's own [`Self::fire_due_schedules`] is built on the
    /// same pair.
    pub async fn get_and_mark_scheduled_job_as_processing(
        &self,
    ) -> Result<Option<ScheduledJob>, QueueError> {
        Ok(self.store.claim_due_schedule(Utc::now()).await?)
    }

    /// Flip a schedule claimed via [`Self::get_and_mark_scheduled_job_as_processing`]
    /// back to `Idle`, recording its next fire time.
    pub async fn mark_scheduled_job_as_idle(
        &self,
        id: i64,
        next_run: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        Ok(self.store.release_schedule(id, next_run).await?)
    }

    /// Insert one `Pending` job.
    pub async fn add(&self, job_type: &str, payload: serde_json::Value) -> Result<i64, QueueError> {
        let data = self.serializer.serialize(payload)?;
        Ok(self.store.insert_job(job_type, &data).await?)
    }

    /// Insert many `Pending` jobs of the same type, atomically.
    pub async fn add_many(
        &self,
        job_type: &str,
        payloads: Vec<serde_json::Value>,
    ) -> Result<Vec<i64>, QueueError> {
        let mut data = Vec::with_capacity(payloads.len());
        for payload in payloads {
            data.push(self.serializer.serialize(payload)?);
        }
        Ok(self.store.insert_jobs(job_type, &data).await?)
    }

    /// Atomically claim the oldest pending job of `job_type`.
    pub async fn claim(&self, job_type: &str) -> Result<Option<Job>, QueueError> {
        Ok(self.store.claim_job(job_type).await?)
    }

    /// Mark a claimed job done. Returns `Ok(false)` if it was not
    /// `Processing` — a recoverable precondition violation, not an error.
    pub async fn mark_done(&self, id: i64) -> Result<bool, QueueError> {
        Ok(self.store.mark_job_done(id).await?)
    }

    /// Mark a claimed job failed with the given error text.
    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<bool, QueueError> {
        Ok(self.store.mark_job_failed(id, error).await?)
    }

    pub async fn get_job_by_id(&self, id: i64) -> Result<Option<Job>, QueueError> {
        Ok(self.store.get_job(id).await?)
    }

    pub async fn count_jobs(&self, filter: JobFilter) -> Result<i64, QueueError> {
        Ok(self.store.count_jobs(&filter).await?)
    }

    pub async fn job_types(&self) -> Result<Vec<String>, QueueError> {
        Ok(self.store.job_types().await?)
    }

    /// Validate `cron` and create or update the schedule for `job_type`.
    /// Re-scheduling an existing type updates its expression and recomputes
    /// `next_run` from now, returning the original id.
    pub async fn schedule(&self, job_type: &str, cron_expression: &str) -> Result<i64, QueueError> {
        let parsed = crate::cron_schedule::CronSchedule::parse(cron_expression)?;
        let now = Utc::now();
        let next_run = parsed.next_after(now).unwrap_or(now);
        let (id, _created) = self
            .store
            .upsert_schedule(job_type, cron_expression, next_run)
            .await?;
        Ok(id)
    }

    pub async fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, QueueError> {
        Ok(self.store.list_schedules().await?)
    }

    pub async fn get_scheduled_job_by_id(&self, id: i64) -> Result<Option<ScheduledJob>, QueueError> {
        Ok(self.store.get_schedule(id).await?)
    }

    /// Delete `Done` jobs older than `age`. Invokes
    /// [`Hooks::on_done_jobs_removed`] with the count on success.
    pub async fn remove_done_jobs(&self, age: StdDuration) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - to_chrono(age);
        let n = self.store.delete_done_jobs(cutoff).await?;
        self.hooks.fire_done_removed(n as usize);
        Ok(n)
    }

    /// Delete `Failed` jobs older than `age`. Invokes
    /// [`Hooks::on_failed_jobs_removed`] with the count on success.
    pub async fn remove_failed_jobs(&self, age: StdDuration) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - to_chrono(age);
        let n = self.store.delete_failed_jobs(cutoff).await?;
        self.hooks.fire_failed_removed(n as usize);
        Ok(n)
    }

    /// Requeue `Processing` jobs older than `timeout` back to `Pending`.
    /// Invokes [`Hooks::on_processing_jobs_requeued`] with the count.
    pub async fn requeue_timed_out_jobs(&self) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - to_chrono(self.config.timeout);
        let n = self.store.requeue_timed_out(cutoff).await?;
        if n > 0 {
            self.hooks.fire_requeued(n as usize);
        }
        Ok(n)
    }

    /// Stop the maintenance loop and wait for any in-flight tick to
    /// finish. Idempotent: a second call is a no-op.
    ///
    /// Also wakes any [`crate::Worker`] idling on this engine via
    /// [`Self::shutdown_signal`], so workers started against this engine
    /// stop their claim loop rather than spinning against a closed queue.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();
        let handle = self.maintenance.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// True once [`Self::close`] has run.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The `Notify` fired once (to all current waiters) when [`Self::close`]
    /// runs. Used by [`crate::Worker`] to stop its claim loop on queue close.
    pub(crate) fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }
}

fn to_chrono(d: StdDuration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or(ChronoDuration::zero())
}
