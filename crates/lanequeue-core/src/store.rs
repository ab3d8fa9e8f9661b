use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::job::{Job, JobFilter, ScheduledJob};

/// The storage seam. A `Store` implementation owns all SQL and all
/// transactional guarantees; the [`crate::QueueEngine`] only orchestrates
/// calls to it and never touches rows directly.
///
/// All operations are phrased as `anyhow::Result` per the convention of
/// the job-store adapters this trait is modelled on: adapter-specific
/// failures (connection errors, constraint violations) are not part of
/// this trait's contract and are wrapped unchanged by
/// [`crate::error::QueueError::Store`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert one `Pending` job. Returns its assigned id.
    async fn insert_job(&self, job_type: &str, data: &str) -> anyhow::Result<i64>;

    /// Insert many `Pending` jobs of the same type atomically. Returned ids
    /// are in input order.
    async fn insert_jobs(&self, job_type: &str, data: &[String]) -> anyhow::Result<Vec<i64>>;

    /// Atomically select the oldest `Pending` job of `job_type` (ties
    /// broken by ascending id), flip it to `Processing`, and return the
    /// updated row. `None` if no pending job of that type exists.
    async fn claim_job(&self, job_type: &str) -> anyhow::Result<Option<Job>>;

    /// Set `status=Done, done_at=now`. `Ok(false)` if the row was not
    /// `Processing` (a recoverable precondition violation, not an error).
    async fn mark_job_done(&self, id: i64) -> anyhow::Result<bool>;

    /// Set `status=Failed, failed_at=now, error=error`. `Ok(false)` if the
    /// row was not `Processing`.
    async fn mark_job_failed(&self, id: i64, error: &str) -> anyhow::Result<bool>;

    async fn get_job(&self, id: i64) -> anyhow::Result<Option<Job>>;

    async fn count_jobs(&self, filter: &JobFilter) -> anyhow::Result<i64>;

    /// Distinct `job_type` values across all jobs.
    async fn job_types(&self) -> anyhow::Result<Vec<String>>;

    /// Insert a new `Idle` schedule row, or update the existing row for
    /// `job_type` in place. Returns `(id, created)`.
    async fn upsert_schedule(
        &self,
        job_type: &str,
        cron_expression: &str,
        next_run: DateTime<Utc>,
    ) -> anyhow::Result<(i64, bool)>;

    async fn list_schedules(&self) -> anyhow::Result<Vec<ScheduledJob>>;

    async fn get_schedule(&self, id: i64) -> anyhow::Result<Option<ScheduledJob>>;

    /// Atomically select one `Idle` schedule with `next_run <= now`
    /// (ordered by ascending `next_run`) and flip it to `Processing`.
    async fn claim_due_schedule(&self, now: DateTime<Utc>) -> anyhow::Result<Option<ScheduledJob>>;

    /// Flip a schedule back to `Idle` with a new `next_run`.
    async fn release_schedule(&self, id: i64, next_run: DateTime<Utc>) -> anyhow::Result<()>;

    /// Delete `Done` jobs with `done_at < cutoff`. Returns count deleted.
    async fn delete_done_jobs(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Delete `Failed` jobs with `failed_at < cutoff`. Returns count deleted.
    async fn delete_failed_jobs(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Requeue `Processing` jobs with `processing_at < cutoff` back to
    /// `Pending`, clearing `processing_at`. Returns count requeued.
    async fn requeue_timed_out(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;
}
