//! Errors raised while generating pipeline scripts.

use thiserror::Error;

/// Rejection of caller-supplied template input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("invalid {field}: {message}")]
    InvalidArgument { field: &'static str, message: String },

    #[error("failed to render {document} manifest: {message}")]
    Manifest {
        document: &'static str,
        message: String,
    },
}

impl PipelineError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
