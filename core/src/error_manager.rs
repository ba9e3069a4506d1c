//! Accumulates diagnostics for one compilation stage into a single message.
//!
//! Every [`ErrorManager::push`] call appends one
//! `"\n{source_name}{position} Error: {text}"` line and sets a sticky
//! "has errors" bit. The parser additionally wraps pushes in its own panic
//! flag (see [`crate::parser::Parser`]) so one syntactic failure yields one
//! diagnostic; the resolver pushes unconditionally, since each of its errors
//! already corresponds to one rejected node.

use crate::source_position::SourcePosition;
use crate::{String, format};

#[derive(Default)]
pub struct ErrorManager {
    has_errors: bool,
    message: String,
    count: u32,
}

impl ErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: SourcePosition<'_>, text: impl core::fmt::Display) {
        self.has_errors = true;
        self.count += 1;
        tracing::debug!(source = position.source_name, %position, %text, "diagnostic pushed");
        self.message
            .push_str(&format!("\n{}{} Error: {}", position.source_name, position, text));
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_formats_one_line_per_error() {
        let mut mgr = ErrorManager::new();
        mgr.push(SourcePosition::new("main.rt", 2, 5), "Expected an expression.");
        assert!(mgr.has_errors());
        assert_eq!(
            mgr.message(),
            "\nmain.rt(ln 2, col 5) Error: Expected an expression."
        );
    }

    #[test]
    fn multiple_pushes_accumulate() {
        let mut mgr = ErrorManager::new();
        mgr.push(SourcePosition::new("a", 1, 1), "first");
        mgr.push(SourcePosition::new("a", 2, 1), "second");
        assert_eq!(mgr.message(), "\na(ln 1, col 1) Error: first\na(ln 2, col 1) Error: second");
    }
}
