use sqlx::PgPool;

/// Creates `jobs` and `scheduled_jobs` plus the indexes named in the
/// store's external schema contract, if they do not already exist.
///
/// Idempotent: safe to call on every process start, matching the pattern
/// of running migrations inline at store construction rather than via a
/// separate CLI step.
pub(crate) async fn run(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id BIGSERIAL PRIMARY KEY,
            job_type TEXT NOT NULL,
            data TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            processing_at TIMESTAMPTZ,
            done_at TIMESTAMPTZ,
            failed_at TIMESTAMPTZ,
            error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_type_status ON jobs (job_type, status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_status_processing_at ON jobs (status, processing_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scheduled_jobs (
            id BIGSERIAL PRIMARY KEY,
            job_type TEXT NOT NULL UNIQUE,
            cron_expression TEXT NOT NULL,
            status TEXT NOT NULL,
            next_run TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scheduled_jobs_status_next_run ON scheduled_jobs (status, next_run)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
