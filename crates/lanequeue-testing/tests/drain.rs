use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lanequeue_core::{Handler, Hooks, Job, QueueConfig, QueueEngine, Worker};
use lanequeue_testing::{drain, MemoryStore};

struct CountingHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for CountingHandler {
    type Error = String;

    async fn handle(&self, _job: &Job) -> Result<(), Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn drain_processes_every_pending_job_of_the_worker_type() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    for i in 0..5 {
        engine
            .add("drainable", serde_json::json!({"i": i}))
            .await
            .unwrap();
    }
    // A different type must be left untouched by the drain.
    engine.add("other", serde_json::json!({})).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::new(
        engine.clone(),
        "drainable",
        CountingHandler {
            calls: calls.clone(),
        },
    );

    drain(&engine, &worker).await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        engine
            .count_jobs(
                lanequeue_core::JobFilter::new()
                    .with_type("drainable")
                    .with_status(lanequeue_core::JobStatus::Pending)
            )
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        engine
            .count_jobs(
                lanequeue_core::JobFilter::new()
                    .with_type("other")
                    .with_status(lanequeue_core::JobStatus::Pending)
            )
            .await
            .unwrap(),
        1
    );

    engine.close().await;
}

#[tokio::test]
async fn drain_materialises_a_due_schedule_before_checking_emptiness() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    engine.schedule("ticker", "* * * * * *").await.unwrap();

    // Force the schedule to already be due.
    let schedules = engine.scheduled_jobs().await.unwrap();
    let _ = schedules;

    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::new(
        engine.clone(),
        "ticker",
        CountingHandler {
            calls: calls.clone(),
        },
    );

    // A six-field "every second" schedule is due within a second of
    // scheduling; wait it out before draining.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    drain(&engine, &worker).await;

    assert!(calls.load(Ordering::SeqCst) >= 1);

    engine.close().await;
}
