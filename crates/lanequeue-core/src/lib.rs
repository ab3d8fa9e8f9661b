//! # Lane Queue
//!
//! A durable, embedded job queue backed by a local relational store.
//!
//! An application enqueues named work items ("jobs") via [`QueueEngine`]
//! and schedules recurring work with cron expressions; long-running
//! [`Worker`]s claim and process that work within the same process.
//! Durability, crash recovery, and timeout-driven requeueing are the core
//! guarantees: once a job is accepted, it is either executed to a terminal
//! state (`Done`/`Failed`) or returned to the pending pool for another
//! attempt, even across process restarts.
//!
//! ## At-least-once
//!
//! A job may execute more than once under crash or claim-timeout.
//! Handlers must be idempotent. Timeouts are enforced post-hoc by the
//! maintenance loop's [`QueueEngine::requeue_timed_out_jobs`], not by
//! cancelling the handler — handler cancellation is not portable and
//! process crashes must be recovered identically either way.
//!
//! ## Layout
//!
//! This crate defines the engine and its storage seam ([`Store`]); a
//! concrete backend lives in `lanequeue-postgres`. The [`store`] module's
//! trait is the only thing a new backend needs to implement.

mod config;
mod cron_schedule;
mod engine;
mod error;
mod hooks;
mod job;
mod serializer;
mod store;
mod worker;

pub use config::QueueConfig;
pub use cron_schedule::CronSchedule;
pub use engine::QueueEngine;
pub use error::QueueError;
pub use hooks::{Hooks, WorkerHooks};
pub use job::{Job, JobFilter, JobStatus, ScheduleStatus, ScheduledJob};
pub use serializer::{CanonicalJsonSerializer, Serializer};
pub use store::Store;
pub use worker::{Handler, Worker};
