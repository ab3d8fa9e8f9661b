use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::job::Job;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Runs a hook closure, catching and logging a panic instead of letting it
/// unwind into the caller — the maintenance loop and worker loop both
/// invoke hooks from a spawned task with no restart logic, so a panicking
/// hook would otherwise kill that task permanently.
fn run_hook<F: FnOnce() + std::panic::UnwindSafe>(f: F) {
    if let Err(payload) = catch_unwind(f) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(panic = %message, "hook callback panicked; ignoring");
    }
}

/// Optional observational callbacks, invoked best-effort around queue
/// engine and worker operations. A `None` slot is a no-op.
///
/// Hook invocation never influences row state: a panicking callback is
/// caught and logged, never propagated back into the operation that
/// triggered it.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_done_jobs_removed: Option<Callback<usize>>,
    pub on_failed_jobs_removed: Option<Callback<usize>>,
    pub on_processing_jobs_requeued: Option<Callback<usize>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_done_jobs_removed(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_done_jobs_removed = Some(Arc::new(f));
        self
    }

    pub fn on_failed_jobs_removed(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_failed_jobs_removed = Some(Arc::new(f));
        self
    }

    pub fn on_processing_jobs_requeued(
        mut self,
        f: impl Fn(usize) + Send + Sync + 'static,
    ) -> Self {
        self.on_processing_jobs_requeued = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire_done_removed(&self, n: usize) {
        if let Some(f) = &self.on_done_jobs_removed {
            run_hook(AssertUnwindSafe(move || f(n)));
        }
    }

    pub(crate) fn fire_failed_removed(&self, n: usize) {
        if let Some(f) = &self.on_failed_jobs_removed {
            run_hook(AssertUnwindSafe(move || f(n)));
        }
    }

    pub(crate) fn fire_requeued(&self, n: usize) {
        if let Some(f) = &self.on_processing_jobs_requeued {
            run_hook(AssertUnwindSafe(move || f(n)));
        }
    }
}

/// Lifecycle callbacks for a [`crate::Worker`], invoked synchronously
/// around each handler call.
#[derive(Clone, Default)]
pub struct WorkerHooks {
    pub on_processing: Option<Callback<Job>>,
    pub on_completed: Option<Callback<Job>>,
    pub on_failed: Option<Arc<dyn Fn(Job, String) + Send + Sync>>,
}

impl WorkerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_processing(mut self, f: impl Fn(Job) + Send + Sync + 'static) -> Self {
        self.on_processing = Some(Arc::new(f));
        self
    }

    pub fn on_completed(mut self, f: impl Fn(Job) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(f));
        self
    }

    pub fn on_failed(mut self, f: impl Fn(Job, String) + Send + Sync + 'static) -> Self {
        self.on_failed = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire_processing(&self, job: Job) {
        if let Some(f) = &self.on_processing {
            run_hook(AssertUnwindSafe(move || f(job)));
        }
    }

    pub(crate) fn fire_completed(&self, job: Job) {
        if let Some(f) = &self.on_completed {
            run_hook(AssertUnwindSafe(move || f(job)));
        }
    }

    pub(crate) fn fire_failed(&self, job: Job, error: String) {
        if let Some(f) = &self.on_failed {
            run_hook(AssertUnwindSafe(move || f(job, error)));
        }
    }
}
