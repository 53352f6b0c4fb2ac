//! taskq - a task queue for AI-assisted development
//!
//! taskq coordinates named, inter-dependent tasks, each carried out by
//! invoking an external assistant CLI. The scheduler selects runnable batches
//! respecting dependencies and a concurrency ceiling, gates every invocation
//! through a shared sliding-window rate limiter, and persists queue state so
//! processing can resume after a restart.

pub mod error;
pub mod executor;
pub mod limiter;
pub mod queue;
pub mod seed;
pub mod task;
pub mod template;

pub use error::{Result, TaskqError};
