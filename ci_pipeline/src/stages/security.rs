use crate::escape;
use crate::script::{ScriptWriter, ShellBody};
use crate::stages;

/// Scan the image for known vulnerabilities, writing a table report named
/// after the namespace.
pub fn render(w: &mut ScriptWriter, namespace: &str) {
    let mut body = ShellBody::new();
    body.line(format!(
        r#"trivy image --format table -o {} "$IMAGE_NAME""#,
        escape::shell_quote(&format!("{namespace}.html"))
    ));

    w.block(stages::header("Image Vulnerability Scan"), |w| {
        w.block("steps", |w| {
            w.sh(&body);
        });
    });
}
