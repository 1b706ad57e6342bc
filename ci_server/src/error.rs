//! API error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use deploy_pipeline::PipelineError;
use serde::Serialize;
use thiserror::Error;

use crate::services::cluster::ClusterError;
use crate::services::jenkins::JenkinsError;

/// Outcome of one step of a multi-step operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub fn from_result<E: std::fmt::Display>(step: &'static str, result: &Result<(), E>) -> Self {
        Self {
            step,
            success: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{message}")]
    PartialFailure {
        message: String,
        details: Vec<StepReport>,
    },

    #[error("{0}")]
    Stream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_)
            | Self::PartialFailure { .. }
            | Self::Stream(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [StepReport]>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{self}");
        } else {
            tracing::warn!(status = status.as_u16(), "{self}");
        }

        let details = match &self {
            Self::PartialFailure { details, .. } => Some(details.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidArgument { .. } => Self::Validation(err.to_string()),
            PipelineError::Manifest { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<JenkinsError> for ApiError {
    fn from(err: JenkinsError) -> Self {
        match err {
            JenkinsError::NotFound(_) => Self::NotFound(err.to_string()),
            JenkinsError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            JenkinsError::InvalidUrl(_) => Self::Internal(err.to_string()),
            // Only the operation and status reach the client.
            JenkinsError::Status { .. } => Self::Upstream(err.to_string()),
            JenkinsError::Transport { operation, .. } => {
                tracing::error!("{err}");
                Self::Upstream(format!("{operation} request failed"))
            }
        }
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        Self::Upstream(err.to_string())
    }
}
