use crate::escape;
use crate::script::ScriptWriter;
use crate::stages;

/// Clone the repository under scan into the workspace.
pub fn render(w: &mut ScriptWriter, git_url: &str) {
    w.block(stages::header("Checkout"), |w| {
        w.block("steps", |w| {
            w.line(format!("git url: {}", escape::groovy_literal(git_url)));
        });
    });
}
