use crate::escape;
use crate::project::ProjectType;
use crate::script::{ScriptWriter, ShellBody};
use crate::stages;

/// Build the project inside `build_path` so the scanner sees compiled
/// output.
pub fn render(w: &mut ScriptWriter, project: ProjectType, build_path: &str) {
    let mut body = ShellBody::new();
    body.line("set -e").line(project.build_command());

    w.block(stages::header("Build"), |w| {
        w.block("steps", |w| {
            w.block(format!("dir({})", escape::groovy_literal(build_path)), |w| {
                w.sh(&body);
            });
        });
    });
}
