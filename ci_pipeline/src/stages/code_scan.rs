//! Static analysis stages for scan-only jobs.

use crate::escape::{self, shell_quote};
use crate::pipeline::PipelineSettings;
use crate::script::{ScriptWriter, ShellBody};
use crate::stages;

/// Minutes to wait for the analysis server to report the quality gate.
pub const QUALITY_GATE_TIMEOUT_MINUTES: u32 = 10;

/// Run `sonar-scanner` from `build_path`, keyed by `project_key`.
pub fn render(
    w: &mut ScriptWriter,
    settings: &PipelineSettings,
    project_key: &str,
    project_name: &str,
    build_path: &str,
) {
    let mut body = ShellBody::new();
    let mut scanner = format!(
        "sonar-scanner -Dsonar.projectKey={} -Dsonar.projectName={} -Dsonar.sources=.",
        shell_quote(project_key),
        shell_quote(project_name)
    );
    if let Some(host) = &settings.sonar_host_url {
        scanner.push_str(&format!(" -Dsonar.host.url={}", shell_quote(host)));
    }
    body.line("set -e").line(scanner);

    w.block(stages::header("Code Scan"), |w| {
        w.block("steps", |w| {
            w.block(
                format!(
                    "withSonarQubeEnv({})",
                    escape::groovy_literal(&settings.sonar_installation)
                ),
                |w| {
                    w.block(format!("dir({})", escape::groovy_literal(build_path)), |w| {
                        w.sh(&body);
                    });
                },
            );
        });
    });

    w.block(stages::header("Quality Gate"), |w| {
        w.block("steps", |w| {
            w.block(
                format!("timeout(time: {QUALITY_GATE_TIMEOUT_MINUTES}, unit: 'MINUTES')"),
                |w| {
                    w.line("waitForQualityGate abortPipeline: false");
                },
            );
        });
    });
}
