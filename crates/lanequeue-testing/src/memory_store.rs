use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lanequeue_core::{Job, JobFilter, JobStatus, ScheduleStatus, ScheduledJob, Store};
use tokio::sync::Mutex;

/// An in-process [`Store`] double, used to exercise [`lanequeue_core`]'s
/// engine logic without a live Postgres instance.
///
/// Not a production backend: all state lives in a single `Mutex` and is
/// lost when the process exits. Mirrors the claim-protocol semantics of a
/// real SQL backend (single-writer ordering, select-then-guarded-update)
/// closely enough for deterministic unit testing.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: BTreeMap<i64, Job>,
    schedules: BTreeMap<i64, ScheduledJob>,
    next_job_id: i64,
    next_schedule_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_job(&self, job_type: &str, data: &str) -> anyhow::Result<i64> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_job_id;
        inner.next_job_id += 1;
        inner.jobs.insert(
            id,
            Job {
                id,
                job_type: job_type.to_string(),
                data: data.to_string(),
                status: JobStatus::Pending,
                created_at: Utc::now(),
                processing_at: None,
                done_at: None,
                failed_at: None,
                error: None,
            },
        );
        Ok(id)
    }

    async fn insert_jobs(&self, job_type: &str, data: &[String]) -> anyhow::Result<Vec<i64>> {
        let mut inner = self.inner.lock().await;
        let mut ids = Vec::with_capacity(data.len());
        for text in data {
            let id = inner.next_job_id;
            inner.next_job_id += 1;
            inner.jobs.insert(
                id,
                Job {
                    id,
                    job_type: job_type.to_string(),
                    data: text.clone(),
                    status: JobStatus::Pending,
                    created_at: Utc::now(),
                    processing_at: None,
                    done_at: None,
                    failed_at: None,
                    error: None,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn claim_job(&self, job_type: &str) -> anyhow::Result<Option<Job>> {
        let mut inner = self.inner.lock().await;
        let candidate = inner
            .jobs
            .values()
            .filter(|j| j.job_type == job_type && j.status == JobStatus::Pending)
            .min_by_key(|j| (j.created_at, j.id))
            .map(|j| j.id);

        let Some(id) = candidate else {
            return Ok(None);
        };
        let job = inner.jobs.get_mut(&id).expect("candidate id must exist");
        job.status = JobStatus::Processing;
        job.processing_at = Some(Utc::now());
        Ok(Some(job.clone()))
    }

    async fn mark_job_done(&self, id: i64) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing {
            return Ok(false);
        }
        job.status = JobStatus::Done;
        job.done_at = Some(Utc::now());
        Ok(true)
    }

    async fn mark_job_failed(&self, id: i64, error: &str) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing {
            return Ok(false);
        }
        job.status = JobStatus::Failed;
        job.failed_at = Some(Utc::now());
        job.error = Some(error.to_string());
        Ok(true)
    }

    async fn get_job(&self, id: i64) -> anyhow::Result<Option<Job>> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn count_jobs(&self, filter: &JobFilter) -> anyhow::Result<i64> {
        let inner = self.inner.lock().await;
        let n = inner
            .jobs
            .values()
            .filter(|j| {
                filter.job_type.as_deref().map_or(true, |t| t == j.job_type)
                    && filter.status.map_or(true, |s| s == j.status)
            })
            .count();
        Ok(n as i64)
    }

    async fn job_types(&self) -> anyhow::Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut types: Vec<String> = inner
            .jobs
            .values()
            .map(|j| j.job_type.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        types.sort();
        Ok(types)
    }

    async fn upsert_schedule(
        &self,
        job_type: &str,
        cron_expression: &str,
        next_run: DateTime<Utc>,
    ) -> anyhow::Result<(i64, bool)> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .schedules
            .values_mut()
            .find(|s| s.job_type == job_type)
        {
            existing.cron_expression = cron_expression.to_string();
            existing.next_run = next_run;
            return Ok((existing.id, false));
        }
        let id = inner.next_schedule_id;
        inner.next_schedule_id += 1;
        inner.schedules.insert(
            id,
            ScheduledJob {
                id,
                job_type: job_type.to_string(),
                cron_expression: cron_expression.to_string(),
                status: ScheduleStatus::Idle,
                next_run,
            },
        );
        Ok((id, true))
    }

    async fn list_schedules(&self) -> anyhow::Result<Vec<ScheduledJob>> {
        Ok(self.inner.lock().await.schedules.values().cloned().collect())
    }

    async fn get_schedule(&self, id: i64) -> anyhow::Result<Option<ScheduledJob>> {
        Ok(self.inner.lock().await.schedules.get(&id).cloned())
    }

    async fn claim_due_schedule(&self, now: DateTime<Utc>) -> anyhow::Result<Option<ScheduledJob>> {
        let mut inner = self.inner.lock().await;
        let candidate = inner
            .schedules
            .values()
            .filter(|s| s.status == ScheduleStatus::Idle && s.next_run <= now)
            .min_by_key(|s| s.next_run)
            .map(|s| s.id);

        let Some(id) = candidate else {
            return Ok(None);
        };
        let schedule = inner.schedules.get_mut(&id).expect("candidate id must exist");
        schedule.status = ScheduleStatus::Processing;
        Ok(Some(schedule.clone()))
    }

    async fn release_schedule(&self, id: i64, next_run: DateTime<Utc>) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(schedule) = inner.schedules.get_mut(&id) {
            schedule.status = ScheduleStatus::Idle;
            schedule.next_run = next_run;
        }
        Ok(())
    }

    async fn delete_done_jobs(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, j| {
            !(j.status == JobStatus::Done && j.done_at.is_some_and(|t| t < cutoff))
        });
        Ok((before - inner.jobs.len()) as u64)
    }

    async fn delete_failed_jobs(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, j| {
            !(j.status == JobStatus::Failed && j.failed_at.is_some_and(|t| t < cutoff))
        });
        Ok((before - inner.jobs.len()) as u64)
    }

    async fn requeue_timed_out(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut n = 0u64;
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Processing && job.processing_at.is_some_and(|t| t < cutoff) {
                job.status = JobStatus::Pending;
                job.processing_at = None;
                n += 1;
            }
        }
        Ok(n)
    }
}
