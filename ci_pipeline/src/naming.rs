//! Job-name sanitization shared by the generated pipeline, the deployment
//! status check and namespace deletion.

use crate::error::{PipelineError, Result};

const DEPLOY_PREFIX: &str = "deploy-";
const MAX_NAMESPACE_LEN: usize = 63;

/// Directory on the execution host where deploy markers are written.
pub const SCRATCH_DIR: &str = "/tmp";

/// File holding the application URL once a deployment completes.
pub fn url_marker_name(namespace: &str) -> String {
    format!("{namespace}_url.txt")
}

pub fn port_forward_log_name(namespace: &str) -> String {
    format!("{namespace}_port_forward.log")
}

pub fn port_forward_pid_name(namespace: &str) -> String {
    format!("{namespace}_port_forward.pid")
}

/// Replace every character outside `[A-Za-z0-9-]` with `-` and lower-case
/// the result.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Cluster namespace for a job: the sanitized name with a leading `deploy-`
/// stripped.
pub fn namespace_for(job_name: &str) -> String {
    let sanitized = sanitize_name(job_name);
    match sanitized.strip_prefix(DEPLOY_PREFIX) {
        Some(rest) => rest.to_string(),
        None => sanitized,
    }
}

/// Like [`namespace_for`], but rejects names that do not form a valid
/// Kubernetes namespace (DNS label).
pub fn checked_namespace(job_name: &str) -> Result<String> {
    let namespace = namespace_for(job_name);
    if namespace.is_empty() {
        return Err(PipelineError::invalid(
            "jobName",
            format!("'{job_name}' does not yield a namespace"),
        ));
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(PipelineError::invalid(
            "jobName",
            format!("namespace '{namespace}' exceeds {MAX_NAMESPACE_LEN} characters"),
        ));
    }
    if namespace.starts_with('-') || namespace.ends_with('-') {
        return Err(PipelineError::invalid(
            "jobName",
            format!("namespace '{namespace}' must start and end with a letter or digit"),
        ));
    }
    Ok(namespace)
}
