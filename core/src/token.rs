//! Token types produced by the tokenizer and consumed by the parser.

use crate::source_position::SourcePosition;
use core::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TokenType {
    Eof,
    Error,
    Newline,
    Identifier,
    Underscore,
    IntConstant,
    FloatConstant,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Comma,
    Colon,
    ColonEquals,
    Arrow,
    LeftParen,
    RightParen,
    KwVoid,
    KwInt,
    KwFloat,
    KwVar,
    KwExtern,
    KwReturn,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Eof => "end of file",
            TokenType::Error => "error",
            TokenType::Newline => "newline",
            TokenType::Identifier => "identifier",
            TokenType::Underscore => "'_'",
            TokenType::IntConstant => "integer constant",
            TokenType::FloatConstant => "float constant",
            TokenType::Plus => "'+'",
            TokenType::Minus => "'-'",
            TokenType::Star => "'*'",
            TokenType::Slash => "'/'",
            TokenType::Percent => "'%'",
            TokenType::Comma => "','",
            TokenType::Colon => "':'",
            TokenType::ColonEquals => "':='",
            TokenType::Arrow => "'->'",
            TokenType::LeftParen => "'('",
            TokenType::RightParen => "')'",
            TokenType::KwVoid => "'Void'",
            TokenType::KwInt => "'Int'",
            TokenType::KwFloat => "'Float'",
            TokenType::KwVar => "'var'",
            TokenType::KwExtern => "'extern'",
            TokenType::KwReturn => "'return'",
        };
        write!(f, "{}", s)
    }
}

/// A lexical token: a type tag, the source position it starts at, and the slice of
/// source text it spans. `Error` tokens carry their diagnostic message as `text`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    pub ty: TokenType,
    pub position: SourcePosition<'a>,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub const fn new(ty: TokenType, position: SourcePosition<'a>, text: &'a str) -> Self {
        Self { ty, position, text }
    }
}

/// Maps a complete identifier-like run of bytes to its keyword token type, if any.
///
/// `_` alone is `Underscore`; everything else that isn't an exact keyword match is
/// left to the caller to treat as a plain `Identifier`.
pub fn keyword_for(text: &str) -> Option<TokenType> {
    Some(match text {
        "_" => TokenType::Underscore,
        "Void" => TokenType::KwVoid,
        "Int" => TokenType::KwInt,
        "Float" => TokenType::KwFloat,
        "var" => TokenType::KwVar,
        "extern" => TokenType::KwExtern,
        "return" => TokenType::KwReturn,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keyword_lookup() {
        assert_eq!(keyword_for("var"), Some(TokenType::KwVar));
        assert_eq!(keyword_for("_"), Some(TokenType::Underscore));
        assert_eq!(keyword_for("variable"), None);
        assert_eq!(keyword_for("Int"), Some(TokenType::KwInt));
    }
}
