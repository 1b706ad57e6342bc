//! Pipeline generation for deploy jobs and scan-only jobs.

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::escape;
use crate::manifests;
use crate::naming;
use crate::project::ProjectType;
use crate::script::ScriptWriter;
use crate::stages::{self, deploy::DeployStage};

/// Values fixed per installation rather than per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Cluster API endpoint used by `kubectl` inside the pipeline.
    pub cluster_url: String,
    /// Jenkins credentials id for the container registry.
    pub registry_credentials_id: String,
    /// Jenkins tool name for the docker installation.
    pub docker_tool: String,
    /// Jenkins secret-text credentials id holding the cluster token.
    pub cluster_token_credentials_id: String,
    /// Name of the SonarQube installation configured in Jenkins.
    pub sonar_installation: String,
    pub sonar_host_url: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cluster_url: "http://127.0.0.1:37147".to_string(),
            registry_credentials_id: "docker-cred".to_string(),
            docker_tool: "docker".to_string(),
            cluster_token_credentials_id: "my_kubernetes".to_string(),
            sonar_installation: "sonarqube".to_string(),
            sonar_host_url: None,
        }
    }
}

/// A job that deploys an existing image to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployJob {
    pub job_name: String,
    pub image: String,
    pub project_type: ProjectType,
    /// Container environment; rendered in key order.
    pub env: BTreeMap<String, String>,
}

/// A job that checks out, builds and statically analyses a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub job_name: String,
    pub git_url: String,
    pub build_path: String,
    pub project_type: ProjectType,
}

/// Generate the deploy pipeline: registry check, pull, vulnerability scan
/// and the project-specific deploy stage.
pub fn generate_pipeline(job: &DeployJob, settings: &PipelineSettings) -> Result<String> {
    let namespace = naming::checked_namespace(&job.job_name)?;
    validate_image(&job.image)?;
    for key in job.env.keys() {
        validate_env_key(key)?;
    }

    let deployment_yaml = manifests::to_yaml(
        "deployment",
        &manifests::deployment(job.project_type, &namespace, &job.image, &job.env),
    )?;
    let service_yaml = manifests::to_yaml(
        "service",
        &manifests::service(job.project_type, &namespace),
    )?;
    let deploy = DeployStage::new(job.project_type, &namespace, &deployment_yaml, &service_yaml)?;

    let mut w = ScriptWriter::new();
    w.block("pipeline", |w| {
        w.line("agent any");
        w.block("environment", |w| {
            w.line(format!("IMAGE_NAME = {}", escape::groovy_literal(&job.image)));
            w.line(format!(
                "CLUSTER_URL = {}",
                escape::groovy_literal(&settings.cluster_url)
            ));
        });
        w.block("stages", |w| {
            stages::check::render(w, settings);
            stages::pull::render(w, settings);
            stages::security::render(w, &namespace);
            deploy.render(w, settings);
        });
    });
    Ok(w.finish())
}

/// Generate the scan-only pipeline: checkout, build, code scan and
/// quality gate.
pub fn generate_scan_pipeline(job: &ScanJob, settings: &PipelineSettings) -> Result<String> {
    let project_key = naming::checked_namespace(&job.job_name)?;
    validate_git_url(&job.git_url)?;
    let build_path = normalize_build_path(&job.build_path)?;

    let mut w = ScriptWriter::new();
    w.block("pipeline", |w| {
        w.line("agent any");
        w.block("stages", |w| {
            stages::checkout::render(w, &job.git_url);
            stages::build::render(w, job.project_type, &build_path);
            stages::code_scan::render(w, settings, &project_key, &job.job_name, &build_path);
        });
    });
    Ok(w.finish())
}

fn validate_image(image: &str) -> Result<()> {
    if image.is_empty() {
        return Err(PipelineError::invalid("imageName", "must not be empty"));
    }
    if image.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(PipelineError::invalid(
            "imageName",
            "must not contain whitespace or control characters",
        ));
    }
    Ok(())
}

/// Environment variable names follow the POSIX shell identifier rules.
fn validate_env_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PipelineError::invalid(
            "envVars",
            format!("'{key}' is not a valid environment variable name"),
        ))
    }
}

fn validate_git_url(url: &str) -> Result<()> {
    if url.is_empty() || url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(PipelineError::invalid(
            "gitUrl",
            "must be a non-empty URL without whitespace",
        ));
    }
    Ok(())
}

/// Build paths are relative to the checkout and may not leave it.
fn normalize_build_path(path: &str) -> Result<String> {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return Ok(".".to_string());
    }
    if trimmed.starts_with('/') || trimmed.split('/').any(|part| part == "..") {
        return Err(PipelineError::invalid(
            "buildPath",
            "must be a relative path inside the repository",
        ));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(PipelineError::invalid(
            "buildPath",
            "must not contain control characters",
        ));
    }
    Ok(trimmed.to_string())
}
