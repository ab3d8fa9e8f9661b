use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::engine::QueueEngine;
use crate::hooks::WorkerHooks;
use crate::job::Job;
use crate::store::Store;

/// Idle-poll floor and ceiling. A claim miss doubles the backoff up to
/// `MAX_BACKOFF`; a successful claim resets it to `MIN_BACKOFF`.
const MIN_BACKOFF: Duration = Duration::from_millis(20);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// A user-supplied unit of work, bound to one job type via [`Worker`].
#[async_trait]
pub trait Handler: Send + Sync {
    type Error: std::fmt::Display + Send;

    async fn handle(&self, job: &Job) -> Result<(), Self::Error>;
}

/// Claims jobs of one type in a loop, invokes a [`Handler`], and reports
/// the outcome back to the queue.
///
/// At most one handler invocation is in flight per `Worker` instance.
/// Multiple `Worker`s for the same type are safe to run concurrently — the
/// engine's claim protocol serialises dispatch. Stops on [`Self::stop`] or
/// when the bound [`QueueEngine`] is closed via [`QueueEngine::close`].
pub struct Worker<S: Store + 'static, H: Handler + 'static> {
    engine: Arc<QueueEngine<S>>,
    job_type: String,
    handler: Arc<H>,
    hooks: WorkerHooks,
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<S: Store + 'static, H: Handler + 'static> Worker<S, H> {
    pub fn new(engine: Arc<QueueEngine<S>>, job_type: impl Into<String>, handler: H) -> Arc<Self> {
        Self::with_hooks(engine, job_type, handler, WorkerHooks::default())
    }

    pub fn with_hooks(
        engine: Arc<QueueEngine<S>>,
        job_type: impl Into<String>,
        handler: H,
        hooks: WorkerHooks,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            job_type: job_type.into(),
            handler: Arc::new(handler),
            hooks,
            stop: Arc::new(Notify::new()),
            stopped: Arc::new(AtomicBool::new(false)),
            task: tokio::sync::Mutex::new(None),
        })
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Begin the background claim loop.
    pub async fn start(self: &Arc<Self>) {
        let worker = self.clone();
        let handle = tokio::spawn(async move {
            worker.run().await;
        });
        *self.task.lock().await = Some(handle);
    }

    async fn run(self: Arc<Self>) {
        let mut backoff = MIN_BACKOFF;
        loop {
            if self.stopped.load(Ordering::SeqCst) || self.engine.is_closed() {
                return;
            }
            let claimed = self.engine.claim(&self.job_type).await;
            match claimed {
                Ok(Some(job)) => {
                    backoff = MIN_BACKOFF;
                    self.process(job).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = self.stop.notified() => return,
                        _ = self.engine.shutdown_signal().notified() => return,
                        _ = tokio::time::sleep(backoff) => {
                            backoff = (backoff * 2).min(MAX_BACKOFF);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, job_type = %self.job_type, "worker claim failed");
                    tokio::select! {
                        _ = self.stop.notified() => return,
                        _ = self.engine.shutdown_signal().notified() => return,
                        _ = tokio::time::sleep(backoff) => {
                            backoff = (backoff * 2).min(MAX_BACKOFF);
                        }
                    }
                }
            }
        }
    }

    /// Claim and process a single job of this worker's type, synchronously.
    /// Returns `true` if a job was claimed, `false` if the pending queue
    /// was empty. Used by the drive-to-empty test helper, which needs to
    /// pump the claim loop without starting the background task.
    pub async fn try_process_once(&self) -> bool {
        match self.engine.claim(&self.job_type).await {
            Ok(Some(job)) => {
                self.process(job).await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!(error = %e, job_type = %self.job_type, "worker claim failed");
                false
            }
        }
    }

    async fn process(&self, job: Job) {
        self.hooks.fire_processing(job.clone());
        match self.handler.handle(&job).await {
            Ok(()) => {
                if let Err(e) = self.engine.mark_done(job.id).await {
                    tracing::warn!(error = %e, job_id = job.id, "failed to mark job done; will be recovered by timeout requeue");
                }
                self.hooks.fire_completed(job);
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(store_err) = self.engine.mark_failed(job.id, &message).await {
                    tracing::warn!(error = %store_err, job_id = job.id, "failed to mark job failed");
                }
                self.hooks.fire_failed(job, message);
            }
        }
    }

    /// Cooperative cancel: resolves after the current handler invocation
    /// (if any) returns.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop.notify_one();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
