//! Error types for codegraph-ifds
//!
//! Provides unified error handling for the tabulation engine.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for analysis runs
#[derive(Debug, Error)]
pub enum IfdsError {
    /// An analyzer or runner broke the engine contract
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// An inbox or event channel closed while the run was still live
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// A runner task panicked
    #[error("Runner panicked: {0}")]
    RunnerPanicked(String),

    /// Runtime construction or task failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl IfdsError {
    /// Create a contract violation error
    pub fn contract(msg: impl Into<String>) -> Self {
        IfdsError::ContractViolation(msg.into())
    }

    /// Create a channel closed error
    pub fn channel_closed(msg: impl Into<String>) -> Self {
        IfdsError::ChannelClosed(msg.into())
    }

    /// Create a runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        IfdsError::Runtime(msg.into())
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, IfdsError>;
