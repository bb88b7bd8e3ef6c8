//! Error types for LogQL expressions

use kestrel_logpipe::PipelineError;
use thiserror::Error;

/// LogQL expression error type
#[derive(Error, Debug)]
pub enum LogqlError {
    /// Construction error: the node would violate the language's static rules
    #[error("{}", render_parse_error(.message, .line, .col))]
    Parse {
        message: String,
        line: usize,
        col: usize,
    },

    /// A pipeline stage failed to compile
    #[error("stage '{stage}' : {source}")]
    Stage {
        stage: String,
        #[source]
        source: PipelineError,
    },

    /// Merge requested for an operator without sample arithmetic
    #[error("unsupported merge operation: {op}")]
    UnsupportedMerge { op: String },

    /// Extractor requested from a node that reads no logs
    #[error("no sample extractor for expression: {expr}")]
    NoExtractor { expr: String },

    /// Extractor requested for a range operation that cannot extract samples
    #[error("unsupported range vector aggregation operation: {op}")]
    UnsupportedRangeOperation { op: String },
}

/// Result type for LogQL operations
pub type Result<T> = std::result::Result<T, LogqlError>;

fn render_parse_error(message: &str, line: &usize, col: &usize) -> String {
    if *line == 0 && *col == 0 {
        format!("parse error : {}", message)
    } else {
        format!("parse error at line {}, col {}: {}", line, col, message)
    }
}

impl LogqlError {
    pub fn parse(message: impl Into<String>) -> Self {
        LogqlError::Parse {
            message: message.into(),
            line: 0,
            col: 0,
        }
    }

    pub fn stage(stage: impl Into<String>, source: PipelineError) -> Self {
        LogqlError::Stage {
            stage: stage.into(),
            source,
        }
    }

    /// Attach a source position to a construction error; other errors are returned unchanged
    pub fn with_position(self, line: usize, col: usize) -> Self {
        match self {
            LogqlError::Parse { message, .. } => LogqlError::Parse { message, line, col },
            other => other,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, LogqlError::Parse { .. })
    }
}
