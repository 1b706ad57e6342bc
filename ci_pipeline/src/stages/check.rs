use crate::escape;
use crate::pipeline::PipelineSettings;
use crate::script::ScriptWriter;
use crate::stages;

/// Fail the build early when the image is missing from the registry.
pub fn render(w: &mut ScriptWriter, settings: &PipelineSettings) {
    w.block(stages::header("Check Image In Registry"), |w| {
        w.block("steps", |w| {
            w.block("script", |w| {
                w.block(registry_scope(settings), |w| {
                    w.sh_status("imageInRegistry", r#"docker manifest inspect "$IMAGE_NAME""#);
                    w.block("if (imageInRegistry != 0)", |w| {
                        w.line("error 'Image does not exist in the registry'");
                    });
                    w.echo("Image exists in the registry");
                });
            });
        });
    });
}

/// `withDockerRegistry(...)` header shared by the registry stages.
pub(crate) fn registry_scope(settings: &PipelineSettings) -> String {
    format!(
        "withDockerRegistry(credentialsId: {}, toolName: {})",
        escape::groovy_literal(&settings.registry_credentials_id),
        escape::groovy_literal(&settings.docker_tool)
    )
}
