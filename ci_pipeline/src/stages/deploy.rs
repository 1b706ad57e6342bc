//! Deploy stage: namespace, manifests, rollout wait, URL marker and
//! background port-forward.

use crate::error::Result;
use crate::escape::{self, shell_quote};
use crate::manifests::SERVICE_PORT;
use crate::naming::{self, SCRATCH_DIR};
use crate::pipeline::PipelineSettings;
use crate::project::ProjectType;
use crate::script::{ScriptWriter, ShellBody};
use crate::stages;

/// Local port the port-forward listens on.
pub const LOCAL_PORT: u16 = 7080;

/// Readiness wait applied to the deployed pods.
pub const READY_TIMEOUT: &str = "120s";

const KUBE_FN: &str = r#"kube() { kubectl --token "$api_token" --server "$CLUSTER_URL" --insecure-skip-tls-verify=true "$@"; }"#;

/// Deploy stage with its shell bodies prepared up front, so rendering
/// cannot fail.
pub struct DeployStage {
    project: ProjectType,
    deploy: ShellBody,
    diagnose: ShellBody,
}

impl DeployStage {
    pub fn new(
        project: ProjectType,
        namespace: &str,
        deployment_yaml: &str,
        service_yaml: &str,
    ) -> Result<Self> {
        Ok(Self {
            project,
            deploy: deploy_body(project, namespace, deployment_yaml, service_yaml)?,
            diagnose: diagnose_body(project, namespace),
        })
    }

    pub fn render(&self, w: &mut ScriptWriter, settings: &PipelineSettings) {
        let credentials = format!(
            "withCredentials([string(credentialsId: {}, variable: 'api_token')])",
            escape::groovy_literal(&settings.cluster_token_credentials_id)
        );

        w.block(stages::header(self.project.deploy_stage_title()), |w| {
            w.block("steps", |w| {
                w.block(&credentials, |w| {
                    w.block("script", |w| {
                        w.try_catch(
                            |w| {
                                w.sh(&self.deploy);
                            },
                            "e",
                            |w| {
                                w.line("echo 'Deployment failed: ' + e.message");
                                w.sh(&self.diagnose);
                                w.line("throw e");
                            },
                        );
                    });
                });
            });
        });
    }
}

fn deploy_body(
    project: ProjectType,
    namespace: &str,
    deployment_yaml: &str,
    service_yaml: &str,
) -> Result<ShellBody> {
    let ns = shell_quote(namespace);
    let app = project.app_name();
    let scratch = |name: String| shell_quote(&format!("{SCRATCH_DIR}/{name}"));

    let mut body = ShellBody::new();
    body.line("set -e")
        .line(KUBE_FN)
        .echo(&format!("Creating namespace {}", namespace))
        .line(format!("kube create namespace {ns} || true"))
        .echo("Generating deployment.yaml");
    body.heredoc("deployment.yaml", deployment_yaml)?;
    body.line("cat deployment.yaml").echo("Generating service.yaml");
    body.heredoc("service.yaml", service_yaml)?;
    body.line("cat service.yaml")
        .line(r#"echo "Deploying $IMAGE_NAME""#)
        .line("kube apply -f deployment.yaml")
        .line("kube apply -f service.yaml")
        .line(format!(
            "kube wait --for=condition=ready pod -l {} --timeout={READY_TIMEOUT} -n {ns}",
            shell_quote(&format!("app={app}"))
        ))
        .echo("Deployment completed successfully")
        .line(format!(
            "APP_URL={}",
            shell_quote(&format!("http://localhost:{LOCAL_PORT}"))
        ))
        .line(r#"echo "Application URL: $APP_URL""#)
        .line(format!(
            r#"echo "$APP_URL" > {}"#,
            scratch(naming::url_marker_name(namespace))
        ))
        .echo("Starting port forwarding")
        .line("export JENKINS_NODE_COOKIE=dontKillMe")
        .line(format!(
            "kube port-forward {} {LOCAL_PORT}:{SERVICE_PORT} -n {ns} > {} 2>&1 &",
            shell_quote(&format!("service/{}", project.service_name())),
            scratch(naming::port_forward_log_name(namespace))
        ))
        .line(format!(
            "echo $! > {}",
            scratch(naming::port_forward_pid_name(namespace))
        ));
    Ok(body)
}

fn diagnose_body(project: ProjectType, namespace: &str) -> ShellBody {
    let ns = shell_quote(namespace);
    let app = project.app_name();

    let mut body = ShellBody::new();
    body.line(KUBE_FN)
        .echo("Describing deployment:")
        .line(format!("kube describe deployment {} -n {ns} || true", shell_quote(&app)))
        .echo("Fetching logs:")
        .line(format!(
            "kube logs {} -n {ns} || true",
            shell_quote(&format!("deployment/{app}"))
        ));
    body
}
