use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Job`] row.
///
/// Transitions in order `Pending -> Processing -> {Done | Failed}`; the
/// sole exception is the maintenance loop's recovery transition
/// `Processing -> Pending` on timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// A single unit of work.
///
/// `data` is the raw text produced by the configured [`crate::Serializer`];
/// the queue engine never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub job_type: String,
    pub data: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub processing_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Lifecycle state of a [`ScheduledJob`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Idle,
    Processing,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Idle => "idle",
            ScheduleStatus::Processing => "processing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(ScheduleStatus::Idle),
            "processing" => Some(ScheduleStatus::Processing),
            _ => None,
        }
    }
}

/// A cron-driven template that periodically materialises a [`Job`].
///
/// At most one row exists per distinct `job_type` (enforced by the store's
/// unique constraint); re-scheduling the same type updates the row in
/// place and preserves its `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: i64,
    pub job_type: String,
    pub cron_expression: String,
    pub status: ScheduleStatus,
    pub next_run: DateTime<Utc>,
}

/// Optional filters for [`crate::QueueEngine::count_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub job_type: Option<String>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }
}
