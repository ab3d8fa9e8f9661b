use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lanequeue_core::Worker;
use lanequeue_core::{Handler, Hooks, Job, JobStatus, QueueConfig, QueueEngine, WorkerHooks};
use lanequeue_testing::MemoryStore;

struct EchoHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for EchoHandler {
    type Error = String;

    async fn handle(&self, _job: &Job) -> Result<(), Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct AlwaysFailHandler;

#[async_trait]
impl Handler for AlwaysFailHandler {
    type Error = String;

    async fn handle(&self, _job: &Job) -> Result<(), Self::Error> {
        Err("boom".to_string())
    }
}

#[tokio::test]
async fn worker_marks_job_done_on_success() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    let id = engine.add("echo", serde_json::json!({})).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::new(
        engine.clone(),
        "echo",
        EchoHandler {
            calls: calls.clone(),
        },
    );

    assert!(worker.try_process_once().await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let job = engine.get_job_by_id(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.done_at.is_some());

    engine.close().await;
}

#[tokio::test]
async fn worker_marks_job_failed_and_records_error_text() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    let id = engine.add("boom", serde_json::json!({})).await.unwrap();

    let worker = Worker::new(engine.clone(), "boom", AlwaysFailHandler);
    assert!(worker.try_process_once().await);

    let job = engine.get_job_by_id(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));

    engine.close().await;
}

#[tokio::test]
async fn worker_background_loop_stops_when_queue_closes() {
    // Deliberately never calls `worker.stop()` — this test is only
    // meaningful if the claim loop notices `engine.close()` on its own.
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());

    let calls = Arc::new(AtomicUsize::new(0));
    let worker = Worker::new(
        engine.clone(),
        "echo",
        EchoHandler {
            calls: calls.clone(),
        },
    );
    worker.start().await;

    // Give the background loop a moment to start idling against the empty
    // queue before the engine is torn down underneath it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.close().await;

    // A job added after close must never be picked up: the worker's claim
    // loop has already exited rather than looping against a closed queue.
    engine.add("echo", serde_json::json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn worker_callbacks_fire_around_handler_in_order() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    let id = engine.add("cb", serde_json::json!({})).await.unwrap();

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_processing = seen.clone();
    let seen_completed = seen.clone();
    let hooks = WorkerHooks::new()
        .on_processing(move |_job| seen_processing.lock().unwrap().push("processing"))
        .on_completed(move |_job| seen_completed.lock().unwrap().push("completed"));

    let worker = Worker::with_hooks(
        engine.clone(),
        "cb",
        EchoHandler {
            calls: Arc::new(AtomicUsize::new(0)),
        },
        hooks,
    );
    assert!(worker.try_process_once().await);

    assert_eq!(*seen.lock().unwrap(), vec!["processing", "completed"]);

    let job = engine.get_job_by_id(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);

    engine.close().await;
}
