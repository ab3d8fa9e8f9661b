use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lanequeue_core::{Handler, JobFilter, JobStatus, QueueEngine, Store, Worker};

/// Runs one worker against its bound job type until both the pending queue
/// and the due-scheduled queue for that type are empty.
///
/// Performs one explicit maintenance tick first, so any schedule that is
/// already due gets materialised into a pending job before the emptiness
/// check runs. Intended for tests and graceful drains, not production use
/// (it polls with a short fixed delay rather than the worker's own
/// backoff).
pub async fn drain<S, H>(engine: &Arc<QueueEngine<S>>, worker: &Arc<Worker<S, H>>)
where
    S: Store + 'static,
    H: Handler + 'static,
{
    engine.tick().await;

    loop {
        let pending = engine
            .count_jobs(
                JobFilter::new()
                    .with_type(worker.job_type())
                    .with_status(JobStatus::Pending),
            )
            .await
            .unwrap_or(0);

        let now = Utc::now();
        let due_schedule = engine
            .scheduled_jobs()
            .await
            .unwrap_or_default()
            .into_iter()
            .any(|s| s.job_type == worker.job_type() && s.next_run <= now);

        if pending == 0 && !due_schedule {
            return;
        }

        if !worker.try_process_once().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
