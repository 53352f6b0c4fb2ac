//! Error types for taskq
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in taskq
#[derive(Debug, Error)]
pub enum TaskqError {
    /// Invalid configuration value, rejected at construction time
    #[error("Config error: {0}")]
    Config(String),

    /// Task not found in the queue
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// External process invocation failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for taskq operations
pub type Result<T> = std::result::Result<T, TaskqError>;
