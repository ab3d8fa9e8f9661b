use std::time::Duration;

/// Tunables recognized by [`crate::QueueEngine::new`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Age after which a `Processing` row is considered abandoned and
    /// reclaimed by the maintenance loop.
    pub timeout: Duration,
    /// Period between maintenance ticks. Defaults to `timeout`.
    pub maintenance_interval: Duration,
    /// If set, `Done` jobs older than this are reaped each tick.
    pub remove_done_jobs_older_than: Option<Duration>,
    /// If set, `Failed` jobs older than this are reaped each tick.
    pub remove_failed_jobs_older_than: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let timeout = Duration::from_millis(60_000);
        Self {
            timeout,
            maintenance_interval: timeout,
            remove_done_jobs_older_than: None,
            remove_failed_jobs_older_than: None,
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    pub fn remove_done_jobs_older_than(mut self, age: Duration) -> Self {
        self.remove_done_jobs_older_than = Some(age);
        self
    }

    pub fn remove_failed_jobs_older_than(mut self, age: Duration) -> Self {
        self.remove_failed_jobs_older_than = Some(age);
        self
    }
}
