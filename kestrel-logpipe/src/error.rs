//! Error types for log pipeline primitives

use thiserror::Error;

/// Error raised while building a pipeline primitive
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A regular expression failed to compile
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// An IP pattern could not be parsed
    #[error("invalid ip pattern {pattern:?}: {message}")]
    InvalidIpPattern { pattern: String, message: String },

    /// The primitive does not support the requested operation
    #[error("unsupported stage: {0}")]
    UnsupportedStage(String),

    /// A stage factory rejected its parameters
    #[error("invalid stage: {0}")]
    InvalidStage(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn invalid_ip(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::InvalidIpPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        PipelineError::UnsupportedStage(message.into())
    }

    pub fn invalid_stage(message: impl Into<String>) -> Self {
        PipelineError::InvalidStage(message.into())
    }
}
