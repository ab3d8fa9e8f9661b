//! PostgreSQL implementation of the `lanequeue` job store.
//!
//! This crate provides the production `Store` implementation behind
//! `lanequeue-core`'s `QueueEngine`.
//!
//! # Features
//!
//! - Atomic claim via `FOR UPDATE SKIP LOCKED` so concurrent workers never
//!   receive the same job
//! - Scheduled-job promotion sharing the same claim shape
//! - Timeout-driven requeue and age-based reaping of terminal jobs
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id BIGSERIAL PRIMARY KEY,
//!     job_type TEXT NOT NULL,
//!     data TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     processing_at TIMESTAMPTZ,
//!     done_at TIMESTAMPTZ,
//!     failed_at TIMESTAMPTZ,
//!     error TEXT
//! );
//! CREATE INDEX idx_jobs_type_status ON jobs (job_type, status);
//! CREATE INDEX idx_jobs_status_processing_at ON jobs (status, processing_at);
//!
//! CREATE TABLE scheduled_jobs (
//!     id BIGSERIAL PRIMARY KEY,
//!     job_type TEXT NOT NULL UNIQUE,
//!     cron_expression TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     next_run TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX idx_scheduled_jobs_status_next_run ON scheduled_jobs (status, next_run);
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use lanequeue_postgres::PgStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/mydb").await?;
//! let store = PgStore::new(pool).await?;
//! let engine = lanequeue_core::QueueEngine::new(store, Default::default(), Default::default());
//! ```

mod migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lanequeue_core::{Job, JobFilter, JobStatus, ScheduleStatus, ScheduledJob, Store};
use sqlx::{PgPool, Row};

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and ensure `jobs`/`scheduled_jobs` exist.
    pub async fn new(pool: PgPool) -> anyhow::Result<Self> {
        migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    /// Get the underlying connection pool, e.g. to share it with other
    /// application tables.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<Job> {
    let status_text: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_text)
        .ok_or_else(|| anyhow::anyhow!("unrecognized job status in row: {status_text}"))?;
    Ok(Job {
        id: row.try_get("id")?,
        job_type: row.try_get("job_type")?,
        data: row.try_get("data")?,
        status,
        created_at: row.try_get("created_at")?,
        processing_at: row.try_get("processing_at")?,
        done_at: row.try_get("done_at")?,
        failed_at: row.try_get("failed_at")?,
        error: row.try_get("error")?,
    })
}

fn scheduled_job_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<ScheduledJob> {
    let status_text: String = row.try_get("status")?;
    let status = ScheduleStatus::parse(&status_text)
        .ok_or_else(|| anyhow::anyhow!("unrecognized schedule status in row: {status_text}"))?;
    Ok(ScheduledJob {
        id: row.try_get("id")?,
        job_type: row.try_get("job_type")?,
        cron_expression: row.try_get("cron_expression")?,
        status,
        next_run: row.try_get("next_run")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn insert_job(&self, job_type: &str, data: &str) -> anyhow::Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO jobs (job_type, data, status, created_at)
            VALUES ($1, $2, 'pending', now())
            RETURNING id
            "#,
        )
        .bind(job_type)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn insert_jobs(&self, job_type: &str, data: &[String]) -> anyhow::Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(data.len());
        for text in data {
            let row = sqlx::query(
                r#"
                INSERT INTO jobs (job_type, data, status, created_at)
                VALUES ($1, $2, 'pending', now())
                RETURNING id
                "#,
            )
            .bind(job_type)
            .bind(text)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(row.try_get("id")?);
        }
        tx.commit().await?;
        Ok(ids)
    }

    /// Claims the oldest pending job of `job_type` via `FOR UPDATE SKIP
    /// LOCKED`: concurrent claimants never block on each other and never
    /// see the same row, which is what rules out duplicate dispatch under
    /// contention.
    async fn claim_job(&self, job_type: &str) -> anyhow::Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM jobs
                WHERE job_type = $1 AND status = 'pending'
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'processing', processing_at = now()
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id, job_type, data, status, created_at, processing_at, done_at, failed_at, error
            "#,
        )
        .bind(job_type)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn mark_job_done(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'done', done_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_job_failed(&self, id: i64, error: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', failed_at = now(), error = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_job(&self, id: i64) -> anyhow::Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn count_jobs(&self, filter: &JobFilter) -> anyhow::Result<i64> {
        let mut builder = sqlx::QueryBuilder::new("SELECT COUNT(*) AS n FROM jobs WHERE 1 = 1");
        if let Some(job_type) = &filter.job_type {
            builder.push(" AND job_type = ").push_bind(job_type.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        let row = builder.build().fetch_one(&self.pool).await?;
        Ok(row.try_get("n")?)
    }

    async fn job_types(&self) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT job_type FROM jobs")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| -> anyhow::Result<String> { Ok(r.try_get("job_type")?) })
            .collect()
    }

    async fn upsert_schedule(
        &self,
        job_type: &str,
        cron_expression: &str,
        next_run: DateTime<Utc>,
    ) -> anyhow::Result<(i64, bool)> {
        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (job_type, cron_expression, status, next_run)
            VALUES ($1, $2, 'idle', $3)
            ON CONFLICT (job_type) DO UPDATE
            SET cron_expression = EXCLUDED.cron_expression,
                next_run = EXCLUDED.next_run
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(job_type)
        .bind(cron_expression)
        .bind(next_run)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("id")?, row.try_get("inserted")?))
    }

    async fn list_schedules(&self) -> anyhow::Result<Vec<ScheduledJob>> {
        let rows = sqlx::query("SELECT * FROM scheduled_jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(scheduled_job_from_row).collect()
    }

    async fn get_schedule(&self, id: i64) -> anyhow::Result<Option<ScheduledJob>> {
        let row = sqlx::query("SELECT * FROM scheduled_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(scheduled_job_from_row).transpose()
    }

    async fn claim_due_schedule(&self, now: DateTime<Utc>) -> anyhow::Result<Option<ScheduledJob>> {
        let row = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM scheduled_jobs
                WHERE status = 'idle' AND next_run <= $1
                ORDER BY next_run ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE scheduled_jobs
            SET status = 'processing'
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id, job_type, cron_expression, status, next_run
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(scheduled_job_from_row).transpose()
    }

    async fn release_schedule(&self, id: i64, next_run: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE scheduled_jobs SET status = 'idle', next_run = $2 WHERE id = $1")
            .bind(id)
            .bind(next_run)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_done_jobs(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM jobs WHERE status = 'done' AND done_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_failed_jobs(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM jobs WHERE status = 'failed' AND failed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn requeue_timed_out(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', processing_at = NULL
            WHERE status = 'processing' AND processing_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
