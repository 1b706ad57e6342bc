//! Deployment status, read from the URL marker the deploy stage writes.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DeploymentStatus {
    Completed {
        #[serde(rename = "appUrl")]
        app_url: String,
    },
    InProgress,
}

/// Resolve the marker file for `job_name`, refusing anything that would
/// land outside `scratch_dir`.
pub fn marker_path(scratch_dir: &Path, job_name: &str) -> Result<PathBuf, ApiError> {
    let namespace = deploy_pipeline::checked_namespace(job_name)?;
    let file_name = deploy_pipeline::naming::url_marker_name(&namespace);

    let relative = Path::new(&file_name);
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(scratch_dir.join(relative)),
        _ => Err(ApiError::Validation(format!(
            "invalid jobName: {job_name} does not map to a marker file"
        ))),
    }
}

pub async fn deployment_status(
    scratch_dir: &Path,
    job_name: &str,
) -> Result<DeploymentStatus, ApiError> {
    let path = marker_path(scratch_dir, job_name)?;
    tracing::debug!(path = %path.display(), "Checking for app URL");

    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            let app_url = contents.trim();
            if app_url.is_empty() {
                return Ok(DeploymentStatus::InProgress);
            }
            tracing::info!(job = job_name, app_url, "Deployment completed");
            Ok(DeploymentStatus::Completed {
                app_url: app_url.to_string(),
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeploymentStatus::InProgress),
        Err(e) => Err(ApiError::Internal(format!(
            "failed to read deployment marker: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_present_means_completed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shop_url.txt"), "http://localhost:7080\n").unwrap();

        let status = deployment_status(dir.path(), "deploy-shop").await.unwrap();
        assert_eq!(
            status,
            DeploymentStatus::Completed {
                app_url: "http://localhost:7080".into()
            }
        );
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({"status": "completed", "appUrl": "http://localhost:7080"})
        );
    }

    #[tokio::test]
    async fn missing_or_empty_marker_means_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let status = deployment_status(dir.path(), "deploy-shop").await.unwrap();
        assert_eq!(status, DeploymentStatus::InProgress);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({"status": "in-progress"})
        );

        std::fs::write(dir.path().join("shop_url.txt"), "  \n").unwrap();
        let status = deployment_status(dir.path(), "deploy-shop").await.unwrap();
        assert_eq!(status, DeploymentStatus::InProgress);
    }

    #[test]
    fn marker_lives_directly_in_scratch_dir() {
        let scratch = Path::new("/srv/scratch");
        let path = marker_path(scratch, "deploy-a/../b").unwrap();
        assert_eq!(path, Path::new("/srv/scratch/a----b_url.txt"));
        assert_eq!(path.parent(), Some(scratch));
    }

    #[test]
    fn unusable_names_are_rejected() {
        let scratch = Path::new("/srv/scratch");
        for name in ["deploy-", "../../etc/passwd", "shop/"] {
            assert!(
                matches!(marker_path(scratch, name), Err(ApiError::Validation(_))),
                "{name} accepted"
            );
        }
    }

    #[tokio::test]
    async fn job_name_is_sanitized_like_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my-shop_url.txt"), "http://app").unwrap();

        let status = deployment_status(dir.path(), "Deploy_My Shop").await.unwrap();
        assert_eq!(
            status,
            DeploymentStatus::Completed {
                app_url: "http://app".into()
            }
        );
    }
}
