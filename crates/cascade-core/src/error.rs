//! Error types for Cascade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Cycle errors
    #[error("Infinite trigger loop detected: {0}")]
    LoopDetected(String),

    // Resolution errors
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Invalid build number {number} for pipeline {pipeline}")]
    InvalidBuildNumber { pipeline: String, number: u32 },

    #[error("Invalid skip downstream triggers pattern '{pattern}': {message}")]
    InvalidSkipPattern { pattern: String, message: String },

    // Host errors
    #[error("Failed to persist build {build}: {message}")]
    Persistence { build: String, message: String },

    #[error("Dependency graph query failed: {0}")]
    Graph(String),

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
