//! Testing utilities for `lanequeue-core` consumers.
//!
//! Provides [`MemoryStore`], an in-process [`lanequeue_core::Store`]
//! double, and [`drain`], the drive-to-empty helper used by integration
//! tests to pump a worker until its queue is empty.

mod drain;
mod memory_store;

pub use drain::drain;
pub use memory_store::MemoryStore;
