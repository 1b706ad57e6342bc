//! Cluster operations, run through the `kubectl` binary.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deleting namespace {namespace} exited with {status}: {stderr}")]
    Failed {
        namespace: String,
        status: String,
        stderr: String,
    },
}

#[async_trait]
pub trait Cluster: Send + Sync {
    /// Delete a namespace and everything in it; returns once the command exits.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClusterError>;
}

#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
}

impl Kubectl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Cluster for Kubectl {
    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        tracing::info!(namespace, "Deleting namespace");

        let output = Command::new(&self.program)
            .args(["delete", "namespace", namespace])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ClusterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(namespace, "kubectl: {}", stdout.trim());
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let status = output
            .status
            .code()
            .map(|code| format!("code {code}"))
            .unwrap_or_else(|| "a signal".to_string());
        tracing::warn!(namespace, %status, "Namespace deletion failed: {stderr}");
        Err(ClusterError::Failed {
            namespace: namespace.to_string(),
            status,
            stderr,
        })
    }
}
