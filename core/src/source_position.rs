//! Source positions shared by the tokenizer, parser, resolver, and error manager.

use core::fmt;

/// A location in a named source buffer.
///
/// Lines and columns are 1-based. [`SourcePosition::NO_POS`] is the sentinel used for
/// synthesized nodes (e.g. an implicit zero-initializer) that have no real source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition<'a> {
    pub source_name: &'a str,
    pub line: u32,
    pub column: u32,
}

impl<'a> SourcePosition<'a> {
    pub const NO_POS_LINE: u32 = u32::MAX;
    pub const NO_POS_COLUMN: u32 = u32::MAX;

    pub const fn new(source_name: &'a str, line: u32, column: u32) -> Self {
        Self {
            source_name,
            line,
            column,
        }
    }

    /// A synthesized position, carrying no real line/column information.
    pub const fn no_pos(source_name: &'a str) -> Self {
        Self::new(source_name, Self::NO_POS_LINE, Self::NO_POS_COLUMN)
    }

    pub const fn is_synthesized(&self) -> bool {
        self.line == Self::NO_POS_LINE && self.column == Self::NO_POS_COLUMN
    }
}

impl fmt::Display for SourcePosition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synthesized() {
            write!(f, "(ln ?, col ?)")
        } else {
            write!(f, "(ln {}, col {})", self.line, self.column)
        }
    }
}

impl fmt::Debug for SourcePosition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_name, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn display_formats_ln_col() {
        let pos = SourcePosition::new("main.wf", 3, 7);
        assert_eq!(crate::format!("{}", pos), "(ln 3, col 7)");
    }

    #[test]
    fn no_pos_is_synthesized() {
        let pos = SourcePosition::no_pos("main.wf");
        assert!(pos.is_synthesized());
        assert_eq!(pos.line, u32::MAX);
        assert_eq!(pos.column, u32::MAX);
    }

    #[test]
    fn equality_is_structural() {
        let a = SourcePosition::new("main.wf", 1, 1);
        let b = SourcePosition::new("main.wf", 1, 1);
        let c = SourcePosition::new("main.wf", 1, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
