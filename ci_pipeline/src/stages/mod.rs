//! Pipeline stages. Each module renders one `stage(...)` block.

pub mod build;
pub mod check;
pub mod checkout;
pub mod code_scan;
pub mod deploy;
pub mod pull;
pub mod security;

use crate::escape;

/// `stage('<title>')` header with the title quoted for Groovy.
pub(crate) fn header(title: &str) -> String {
    format!("stage({})", escape::groovy_literal(title))
}
