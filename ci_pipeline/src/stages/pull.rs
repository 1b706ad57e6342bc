use crate::pipeline::PipelineSettings;
use crate::script::ScriptWriter;
use crate::stages::{self, check};

/// Pull the image unless the agent already has it.
pub fn render(w: &mut ScriptWriter, settings: &PipelineSettings) {
    w.block(stages::header("Pull Image"), |w| {
        w.block("steps", |w| {
            w.block("script", |w| {
                w.block(check::registry_scope(settings), |w| {
                    w.sh_status("imageIsLocal", r#"docker image inspect "$IMAGE_NAME""#);
                    w.if_else(
                        "imageIsLocal == 0",
                        |w| {
                            w.echo("Image already present locally");
                        },
                        |w| {
                            w.echo("Image not present locally, pulling");
                            w.line(r#"sh 'docker pull "$IMAGE_NAME"'"#);
                        },
                    );
                });
            });
        });
    });
}
