//! Declarative-pipeline script builder.
//!
//! [`ScriptWriter`] emits Groovy structure; [`ShellBody`] collects shell
//! lines that the writer embeds as `sh '''…'''` steps. Shell values are
//! quoted by the caller with [`crate::escape::shell_quote`]; the writer
//! applies Groovy escaping to the whole body when embedding it.

use crate::error::{PipelineError, Result};
use crate::escape;

const INDENT: &str = "  ";

/// Heredoc delimiter for documents written from shell steps.
pub const HEREDOC_DELIMITER: &str = "DEPLOY_CONSOLE_EOF";

#[derive(Debug, Default)]
pub struct ScriptWriter {
    out: String,
    depth: usize,
}

impl ScriptWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line of Groovy at the current depth.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
        self
    }

    /// Write `header {`, the body produced by `body`, then `}`.
    pub fn block(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line("}")
    }

    /// `try { … } catch (Exception <var>) { … }`
    pub fn try_catch(
        &mut self,
        body: impl FnOnce(&mut Self),
        var: &str,
        handler: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.line("try {");
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line(format!("}} catch (Exception {var}) {{"));
        self.depth += 1;
        handler(self);
        self.depth -= 1;
        self.line("}")
    }

    /// `if (<condition>) { … } else { … }`
    pub fn if_else(
        &mut self,
        condition: &str,
        then: impl FnOnce(&mut Self),
        otherwise: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.line(format!("if ({condition}) {{"));
        self.depth += 1;
        then(self);
        self.depth -= 1;
        self.line("} else {");
        self.depth += 1;
        otherwise(self);
        self.depth -= 1;
        self.line("}")
    }

    /// Embed a shell body as an `sh '''…'''` step.
    pub fn sh(&mut self, body: &ShellBody) -> &mut Self {
        self.line("sh '''");
        self.depth += 1;
        for line in &body.lines {
            match line {
                ShellLine::Command(text) => {
                    self.line(escape::groovy(text));
                }
                ShellLine::Verbatim(text) => {
                    self.out.push_str(&escape::groovy(text));
                    self.out.push('\n');
                }
            }
        }
        self.depth -= 1;
        self.line("'''")
    }

    /// `def <var> = sh(script: '<command>', returnStatus: true)`
    pub fn sh_status(&mut self, var: &str, command: &str) -> &mut Self {
        self.line(format!(
            "def {var} = sh(script: {}, returnStatus: true)",
            escape::groovy_literal(command)
        ))
    }

    /// `echo '<message>'` as a Groovy step.
    pub fn echo(&mut self, message: &str) -> &mut Self {
        self.line(format!("echo {}", escape::groovy_literal(message)))
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[derive(Debug)]
enum ShellLine {
    /// Indented with the surrounding Groovy.
    Command(String),
    /// Written at column zero (heredoc content and delimiter).
    Verbatim(String),
}

#[derive(Debug, Default)]
pub struct ShellBody {
    lines: Vec<ShellLine>,
}

impl ShellBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(ShellLine::Command(text.into()));
        self
    }

    /// `echo '<message>'` with the message shell-quoted.
    pub fn echo(&mut self, message: &str) -> &mut Self {
        self.line(format!("echo {}", escape::shell_quote(message)))
    }

    /// Write `content` to `target` through a quoted heredoc, so the shell
    /// performs no expansion inside it.
    pub fn heredoc(&mut self, target: &str, content: &str) -> Result<&mut Self> {
        if content.lines().any(|l| l == HEREDOC_DELIMITER) {
            return Err(PipelineError::invalid(
                "document",
                format!("content contains the heredoc delimiter {HEREDOC_DELIMITER}"),
            ));
        }
        self.line(format!(
            "cat <<'{HEREDOC_DELIMITER}' > {}",
            escape::shell_quote(target)
        ));
        for l in content.lines() {
            self.lines.push(ShellLine::Verbatim(l.to_string()));
        }
        self.lines
            .push(ShellLine::Verbatim(HEREDOC_DELIMITER.to_string()));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_nest_with_indentation() {
        let mut w = ScriptWriter::new();
        w.block("pipeline", |w| {
            w.line("agent any");
            w.block("stages", |w| {
                w.echo("hi");
            });
        });
        assert_eq!(
            w.finish(),
            "pipeline {\n  agent any\n  stages {\n    echo 'hi'\n  }\n}\n"
        );
    }

    #[test]
    fn try_catch_keeps_catch_on_closing_line() {
        let mut w = ScriptWriter::new();
        w.try_catch(
            |w| {
                w.line("a()");
            },
            "e",
            |w| {
                w.line("throw e");
            },
        );
        assert_eq!(
            w.finish(),
            "try {\n  a()\n} catch (Exception e) {\n  throw e\n}\n"
        );
    }

    #[test]
    fn if_else_keeps_else_on_closing_line() {
        let mut w = ScriptWriter::new();
        w.block("script", |w| {
            w.if_else(
                "status == 0",
                |w| {
                    w.echo("ok");
                },
                |w| {
                    w.line("retry()");
                },
            );
        });
        assert_eq!(
            w.finish(),
            "script {\n  if (status == 0) {\n    echo 'ok'\n  } else {\n    retry()\n  }\n}\n"
        );
    }

    #[test]
    fn sh_escapes_body_for_groovy() {
        let mut body = ShellBody::new();
        body.echo("it's").line(r"printf 'a\n'");
        let mut w = ScriptWriter::new();
        w.sh(&body);
        let out = w.finish();
        assert!(out.contains(r"echo \'it\'\\\'\'s\'"));
        assert!(out.contains(r"printf \'a\\n\'"));
        assert!(out.starts_with("sh '''\n"));
        assert!(out.ends_with("'''\n"));
    }

    #[test]
    fn heredoc_content_is_written_at_column_zero() {
        let mut body = ShellBody::new();
        body.heredoc("out.yaml", "a: 1\nb:\n  c: 2").unwrap();
        let mut w = ScriptWriter::new();
        w.block("script", |w| {
            w.sh(&body);
        });
        let out = w.finish();
        assert!(out.contains("\na: 1\nb:\n  c: 2\nDEPLOY_CONSOLE_EOF\n"));
        assert!(out.contains("cat <<\\'DEPLOY_CONSOLE_EOF\\' > \\'out.yaml\\'"));
    }

    #[test]
    fn heredoc_rejects_delimiter_in_content() {
        let mut body = ShellBody::new();
        let err = body
            .heredoc("x", &format!("a\n{HEREDOC_DELIMITER}\nb"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument { .. }));
    }
}
