//! Request and response bodies for the REST API.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use deploy_pipeline::{DeployJob, ProjectType, ScanJob};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::build::LogPage;
use crate::models::scan::AnalysisReport;

/// Success envelope shared by the JSON routes.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data,
    })
}

/// `Json` whose rejections become 400 validation errors.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(rejection_message(&rejection))),
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "expected a JSON body with content-type application/json".to_string()
        }
        other => other.body_text(),
    }
}

/// `Path` whose rejections go out in the error envelope.
pub struct ValidPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection @ PathRejection::FailedToDeserializePathParams(_)) => {
                Err(ApiError::Validation(rejection.body_text()))
            }
            // Route and handler disagree on the parameters.
            Err(rejection) => Err(ApiError::Internal(rejection.body_text())),
        }
    }
}

/// `Query` whose rejections become 400 validation errors.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub job_name: String,
    pub image_name: String,
    pub project_type: ProjectType,
    #[serde(default)]
    pub env_vars: Option<BTreeMap<String, String>>,
}

impl CreateJobRequest {
    pub fn into_job(self) -> DeployJob {
        DeployJob {
            job_name: self.job_name,
            image: self.image_name,
            project_type: self.project_type,
            env: self.env_vars.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanJobRequest {
    pub job_name: String,
    pub git_url: String,
    #[serde(default)]
    pub build_path: Option<String>,
    pub project_type: ProjectType,
}

impl CreateScanJobRequest {
    pub fn into_job(self) -> ScanJob {
        ScanJob {
            job_name: self.job_name,
            git_url: self.git_url,
            build_path: self.build_path.unwrap_or_else(|| ".".to_string()),
            project_type: self.project_type,
        }
    }
}

/// Empty `data` object.
#[derive(Debug, Serialize)]
pub struct Empty {}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    /// Jenkins queue item id, when reported.
    pub build_result: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse<T> {
    pub jobs: Vec<T>,
}

/// Log page body: the bare text, or the page with its cursor when
/// `meta=true`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LogResponse {
    Page(LogPage),
    Text { text: String },
}

impl LogResponse {
    pub fn new(page: LogPage, meta: bool) -> Self {
        if meta {
            Self::Page(page)
        } else {
            Self::Text { text: page.text }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanAck {
    pub payload: AnalysisReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_env() {
        let req: CreateJobRequest = serde_json::from_str(
            r#"{"jobName":"deploy-shop","imageName":"shop:1","projectType":"NodeJs","envVars":null}"#,
        )
        .unwrap();
        let job = req.into_job();
        assert_eq!(job.image, "shop:1");
        assert_eq!(job.project_type, ProjectType::NodeJs);
        assert!(job.env.is_empty());
    }

    #[test]
    fn unsupported_project_type_is_rejected() {
        let err = serde_json::from_str::<CreateJobRequest>(
            r#"{"jobName":"deploy-shop","imageName":"shop:1","projectType":"Cobol"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Cobol"));
    }

    #[test]
    fn scan_request_defaults_build_path() {
        let req: CreateScanJobRequest = serde_json::from_str(
            r#"{"jobName":"scan-shop","gitUrl":"https://git/shop.git","projectType":"DotNetCore"}"#,
        )
        .unwrap();
        assert_eq!(req.into_job().build_path, ".");
    }

    #[test]
    fn log_response_shapes() {
        let page = LogPage {
            text: "hi".into(),
            more: true,
            size: 2,
        };
        assert_eq!(
            serde_json::to_value(LogResponse::new(page.clone(), false)).unwrap(),
            serde_json::json!({"text": "hi"})
        );
        assert_eq!(
            serde_json::to_value(LogResponse::new(page, true)).unwrap(),
            serde_json::json!({"text": "hi", "more": true, "size": 2})
        );
    }

    #[test]
    fn envelope_shape() {
        let Json(body) = success(ExistsResponse { exists: true }, "checked");
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"success": true, "message": "checked", "data": {"exists": true}})
        );
    }
}
