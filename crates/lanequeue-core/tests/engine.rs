use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lanequeue_core::{
    Hooks, JobFilter, JobStatus, QueueConfig, QueueEngine, QueueError, Serializer,
};
use lanequeue_testing::MemoryStore;

#[tokio::test]
async fn round_trip_through_add_and_claim() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());

    engine
        .add("paint", serde_json::json!({"color": "red"}))
        .await
        .unwrap();

    let job = engine.claim("paint").await.unwrap().expect("job available");
    assert_eq!(job.status, JobStatus::Processing);
    let payload: serde_json::Value = serde_json::from_str(&job.data).unwrap();
    assert_eq!(payload, serde_json::json!({"color": "red"}));

    engine.close().await;
}

/// A serializer whose canonical form is an array of `[key, value]` pairs,
/// sorted by key — distinct from the shipped `CanonicalJsonSerializer`'s
/// sorted-object form, to demonstrate the trait is a real extension point.
struct SortedPairsSerializer;

impl Serializer for SortedPairsSerializer {
    fn serialize(&self, value: serde_json::Value) -> Result<String, QueueError> {
        let serde_json::Value::Object(map) = value else {
            return Err(QueueError::Serialization("expected an object".into()));
        };
        let sorted: BTreeMap<String, serde_json::Value> = map.into_iter().collect();
        let pairs: Vec<(String, serde_json::Value)> = sorted.into_iter().collect();
        serde_json::to_string(&pairs).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    fn deserialize(&self, text: &str) -> Result<serde_json::Value, QueueError> {
        let pairs: Vec<(String, serde_json::Value)> =
            serde_json::from_str(text).map_err(|e| QueueError::Serialization(e.to_string()))?;
        Ok(serde_json::Value::Object(pairs.into_iter().collect()))
    }
}

#[tokio::test]
async fn custom_serializer_controls_wire_form() {
    let engine = QueueEngine::with_serializer(
        MemoryStore::new(),
        QueueConfig::new(),
        Hooks::new(),
        Arc::new(SortedPairsSerializer),
    );

    engine
        .add("x", serde_json::json!({"b": 2, "a": 1, "c": 3}))
        .await
        .unwrap();

    let job = engine.claim("x").await.unwrap().unwrap();
    assert_eq!(job.data, r#"[["a",1],["b",2],["c",3]]"#);

    engine.close().await;
}

#[tokio::test]
async fn schedule_rejects_invalid_cron() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());

    let err = engine
        .schedule("s", "invalid cron expression")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid cron expression"));

    engine.close().await;
}

#[tokio::test]
async fn schedule_is_unique_per_type_and_keeps_its_id() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());

    let id_a = engine.schedule("u", "0 * * * *").await.unwrap();
    let id_b = engine.schedule("u", "*/30 * * * *").await.unwrap();
    assert_eq!(id_a, id_b);

    let schedules = engine.scheduled_jobs().await.unwrap();
    let matching: Vec<_> = schedules.iter().filter(|s| s.job_type == "u").collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].cron_expression, "*/30 * * * *");

    engine.close().await;
}

#[tokio::test]
async fn timed_out_processing_job_is_requeued_to_pending() {
    let config = QueueConfig::new()
        .timeout(Duration::from_millis(25))
        .maintenance_interval(Duration::from_millis(20));
    let engine = QueueEngine::new(MemoryStore::new(), config, Hooks::new());

    let id = engine.add("t", serde_json::json!({"v": 1})).await.unwrap();
    engine.claim("t").await.unwrap().expect("job available");

    tokio::time::sleep(Duration::from_millis(80)).await;

    let job = engine.get_job_by_id(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    engine.close().await;
}

#[tokio::test]
async fn remove_done_jobs_respects_age_cutoff_and_fires_hook() {
    let removed = Arc::new(AtomicUsize::new(0));
    let removed_for_hook = removed.clone();
    let hooks = Hooks::new().on_done_jobs_removed(move |n| {
        removed_for_hook.fetch_add(n, Ordering::SeqCst);
    });
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), hooks);

    let old_id = engine.add("r", serde_json::json!({})).await.unwrap();
    engine.claim("r").await.unwrap().unwrap();
    engine.mark_done(old_id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let new_id = engine.add("r", serde_json::json!({})).await.unwrap();
    engine.claim("r").await.unwrap().unwrap();
    engine.mark_done(new_id).await.unwrap();

    engine
        .remove_done_jobs(Duration::from_millis(20))
        .await
        .unwrap();

    assert!(engine.get_job_by_id(old_id).await.unwrap().is_none());
    assert!(engine.get_job_by_id(new_id).await.unwrap().is_some());
    assert_eq!(removed.load(Ordering::SeqCst), 1);

    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_duplicate_dispatch() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());

    const N: usize = 20;
    for i in 0..N {
        engine.add("fanout", serde_json::json!({"i": i})).await.unwrap();
    }

    let mut handles = Vec::with_capacity(N);
    for _ in 0..N {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.claim("fanout").await.unwrap().map(|j| j.id)
        }));
    }

    let mut claimed = Vec::with_capacity(N);
    for handle in handles {
        if let Some(id) = handle.await.unwrap() {
            claimed.push(id);
        }
    }

    claimed.sort_unstable();
    claimed.dedup();
    assert_eq!(claimed.len(), N, "every job must be claimed exactly once");

    assert_eq!(
        engine
            .count_jobs(JobFilter::new().with_type("fanout").with_status(JobStatus::Pending))
            .await
            .unwrap(),
        0
    );

    engine.close().await;
}

#[tokio::test]
async fn scheduled_job_can_be_claimed_and_released_through_the_public_api() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    engine.schedule("digest", "* * * * * *").await.unwrap();

    // The schedule isn't due yet; nothing to claim.
    assert!(engine
        .get_and_mark_scheduled_job_as_processing()
        .await
        .unwrap()
        .is_none());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let claimed = engine
        .get_and_mark_scheduled_job_as_processing()
        .await
        .unwrap()
        .expect("schedule is due");
    assert_eq!(claimed.job_type, "digest");

    // While Processing, it isn't claimable a second time.
    assert!(engine
        .get_and_mark_scheduled_job_as_processing()
        .await
        .unwrap()
        .is_none());

    let far_future = chrono::Utc::now() + chrono::Duration::hours(1);
    engine
        .mark_scheduled_job_as_idle(claimed.id, far_future)
        .await
        .unwrap();

    let schedule = engine
        .get_scheduled_job_by_id(claimed.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(schedule.status, lanequeue_core::ScheduleStatus::Idle);
    assert_eq!(schedule.next_run, far_future);

    engine.close().await;
}

#[tokio::test]
async fn close_is_idempotent() {
    let engine = QueueEngine::new(MemoryStore::new(), QueueConfig::new(), Hooks::new());
    engine.close().await;
    engine.close().await;
}
