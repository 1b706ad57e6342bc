//! Escaping for the three output contexts a pipeline value can land in.
//!
//! Values are escaped for the innermost context first: shell text is quoted
//! for the shell, the whole shell body is then quoted as a Groovy literal,
//! and the finished script is escaped once more for the job-definition XML.

/// Escape the five XML metacharacters.
pub fn xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for the body of a single-quoted (or triple-single-quoted)
/// Groovy string. Such strings never interpolate `$`.
pub fn groovy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `text` as a single-quoted Groovy literal.
pub fn groovy_literal(text: &str) -> String {
    format!("'{}'", groovy(text))
}

/// Quote `text` as a single shell word.
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
