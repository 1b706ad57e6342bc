//! Server configuration, loaded from environment variables.

use std::path::PathBuf;

use deploy_pipeline::PipelineSettings;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Jenkins root URL. A bare `host:port` is treated as plain http.
    pub jenkins_url: String,
    pub jenkins_username: String,
    pub jenkins_password: String,
    /// API token; preferred over the password when both are set.
    pub jenkins_user_token: String,
    /// Connect timeout for Jenkins calls; none when unset.
    pub jenkins_connect_timeout_secs: Option<u64>,
    /// Cluster API endpoint baked into generated pipelines.
    pub cluster_url: Option<String>,
    /// SonarQube server handed to the scanner in scan pipelines.
    pub sonarqube_url: Option<String>,
    /// Shared secret for the SonarQube webhook HMAC header.
    pub sonarqube_webhook_secret: String,
    /// Dashboard origin allowed by CORS.
    pub client_url: String,
    /// Public tunnel origin, also allowed by CORS.
    pub ngrok_url: Option<String>,
    /// Directory the generated pipelines write their marker files to.
    pub scratch_dir: PathBuf,
    pub kubectl_bin: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jenkins_url = var("JENKINS_URL").unwrap_or_else(|| "localhost:8080".to_string());
        let jenkins_username = var("JENKINS_USERNAME").unwrap_or_default();
        let jenkins_password = var("JENKINS_PASSWORD").unwrap_or_default();
        let jenkins_user_token = var("JENKINS_USER_TOKEN").unwrap_or_default();
        let jenkins_connect_timeout_secs =
            var("JENKINS_CONNECT_TIMEOUT").and_then(|s| s.parse().ok());
        let cluster_url = var("MINIKUBE_URL");
        let sonarqube_url = var("SONARQUBE_URL");
        let sonarqube_webhook_secret = var("SONARQUBE_WEBHOOK_SECRET").unwrap_or_default();
        let client_url = var("CLIENT_URL").unwrap_or_else(|| "http://localhost:5173".to_string());
        let ngrok_url = var("NGROK_URL");
        let scratch_dir = var("DEPLOY_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(deploy_pipeline::naming::SCRATCH_DIR));
        let kubectl_bin = var("KUBECTL_BIN").unwrap_or_else(|| "kubectl".to_string());

        if jenkins_username.is_empty() {
            tracing::warn!("JENKINS_USERNAME not set -- Jenkins calls will be anonymous");
        } else if jenkins_user_token.is_empty() && jenkins_password.is_empty() {
            tracing::warn!("neither JENKINS_USER_TOKEN nor JENKINS_PASSWORD set");
        }
        if cluster_url.is_none() {
            tracing::warn!("MINIKUBE_URL not set -- pipelines use the default cluster endpoint");
        }
        if sonarqube_webhook_secret.is_empty() {
            tracing::warn!(
                "SONARQUBE_WEBHOOK_SECRET not set -- webhook signature validation disabled"
            );
        }

        Self {
            jenkins_url,
            jenkins_username,
            jenkins_password,
            jenkins_user_token,
            jenkins_connect_timeout_secs,
            cluster_url,
            sonarqube_url,
            sonarqube_webhook_secret,
            client_url,
            ngrok_url,
            scratch_dir,
            kubectl_bin,
        }
    }

    /// Secret used for Jenkins basic auth, if any.
    pub fn jenkins_secret(&self) -> Option<&str> {
        [&self.jenkins_user_token, &self.jenkins_password]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let mut settings = PipelineSettings::default();
        if let Some(url) = &self.cluster_url {
            settings.cluster_url = url.clone();
        }
        settings.sonar_host_url = self.sonarqube_url.clone();
        settings
    }

    /// Origins the CORS layer accepts.
    pub fn allowed_origins(&self) -> Vec<String> {
        std::iter::once(&self.client_url)
            .chain(self.ngrok_url.as_ref())
            .map(|origin| origin.trim_end_matches('/').to_string())
            .collect()
    }
}
