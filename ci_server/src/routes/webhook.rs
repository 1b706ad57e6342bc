//! SonarQube webhook: receives analysis reports for scan jobs.

use axum::http::HeaderMap;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::models::scan::AnalysisReport;
use crate::services::webhook_signature::{validate_signature, SONARQUBE_SIGNATURE_HEADER};

/// Verify and parse an incoming analysis report.
pub fn handle_sonarqube(
    config: &ServerConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<AnalysisReport, ApiError> {
    let signature = headers
        .get(SONARQUBE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !validate_signature(&config.sonarqube_webhook_secret, body, signature) {
        tracing::warn!("SonarQube webhook signature validation failed");
        return Err(ApiError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let report: AnalysisReport = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid webhook payload: {e}")))?;

    tracing::info!(
        task_id = %report.task_id,
        status = %report.status,
        project_key = %report.project.key,
        project_name = %report.project.name,
        url = report.project.url.as_deref().unwrap_or(""),
        is_main = report.branch.as_ref().is_some_and(|b| b.is_main),
        analysed_at = report.analysed_at.as_deref().unwrap_or(""),
        quality_gate = report.gate_status(),
        "Received SonarQube analysis"
    );
    for condition in report.failed_conditions() {
        tracing::info!(
            task_id = %report.task_id,
            metric = %condition.metric,
            value = condition.value.as_deref().unwrap_or(""),
            threshold = condition.error_threshold.as_deref().unwrap_or(""),
            "Quality gate condition failed"
        );
    }

    Ok(report)
}
