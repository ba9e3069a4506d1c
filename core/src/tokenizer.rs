//! Single-pass byte-stream tokenizer.
//!
//! Mirrors the source language's lexical grammar: decimal numeric literals,
//! `[A-Za-z_][A-Za-z0-9_]*` identifiers/keywords, the fixed set of punctuators, and
//! `--` line comments. The tokenizer carries one piece of parser-controlled state,
//! the newline-ignore bit, so the parser can suppress `NEWLINE` tokens inside
//! parenthesized groups without the tokenizer knowing anything about grouping.

use crate::source_position::SourcePosition;
use crate::token::{Token, TokenType, keyword_for};

/// Lexes `source` one token at a time. `source_name` is carried into every
/// [`SourcePosition`] so diagnostics can identify which buffer they came from.
pub struct Tokenizer<'a> {
    source_name: &'a str,
    source: &'a str,
    bytes: &'a [u8],
    cursor: usize,
    line: u32,
    column: u32,
    newline_ignore: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source_name: &'a str, source: &'a str) -> Self {
        Self {
            source_name,
            source,
            bytes: source.as_bytes(),
            cursor: 0,
            line: 1,
            column: 1,
            newline_ignore: false,
        }
    }

    pub fn set_newline_ignore(&mut self, ignore: bool) {
        self.newline_ignore = ignore;
    }

    fn position(&self) -> SourcePosition<'a> {
        SourcePosition::new(self.source_name, self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.cursor + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.cursor += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn slice_from(&self, start: usize) -> &'a str {
        &self.source[start..self.cursor]
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(0x0B) | Some(0x0C) | Some(b'\r') => {
                    self.advance();
                }
                Some(b'\n') if self.newline_ignore => {
                    self.advance();
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    self.advance();
                    self.advance();
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_'
    }

    fn is_ident_continue(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }

    fn lex_number(&mut self) -> Token<'a> {
        let start = self.cursor;
        let pos = self.position();
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.advance();
        }
        let mut ty = TokenType::IntConstant;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
            ty = TokenType::FloatConstant;
            self.advance(); // '.'
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.advance();
            }
        }
        Token::new(ty, pos, self.slice_from(start))
    }

    fn lex_ident_or_keyword(&mut self) -> Token<'a> {
        let start = self.cursor;
        let pos = self.position();
        while matches!(self.peek(), Some(b) if Self::is_ident_continue(b)) {
            self.advance();
        }
        let text = self.slice_from(start);
        let ty = keyword_for(text).unwrap_or(TokenType::Identifier);
        Token::new(ty, pos, text)
    }

    fn single(&mut self, ty: TokenType, pos: SourcePosition<'a>) -> Token<'a> {
        let start = self.cursor;
        self.advance();
        Token::new(ty, pos, self.slice_from(start))
    }

    /// Returns the next token. Idempotent at end of buffer: once `cursor` reaches
    /// the end, every subsequent call returns an `Eof` token at the same position.
    pub fn next(&mut self) -> Token<'a> {
        self.skip_whitespace();
        let pos = self.position();

        let Some(b) = self.peek() else {
            return Token::new(TokenType::Eof, pos, "");
        };

        match b {
            b'\n' => self.single(TokenType::Newline, pos),
            b'0'..=b'9' => self.lex_number(),
            b if Self::is_ident_start(b) => self.lex_ident_or_keyword(),
            b'+' => self.single(TokenType::Plus, pos),
            b'-' if self.peek_at(1) == Some(b'>') => {
                let start = self.cursor;
                self.advance();
                self.advance();
                Token::new(TokenType::Arrow, pos, self.slice_from(start))
            }
            b'-' => self.single(TokenType::Minus, pos),
            b'*' => self.single(TokenType::Star, pos),
            b'/' => self.single(TokenType::Slash, pos),
            b'%' => self.single(TokenType::Percent, pos),
            b',' => self.single(TokenType::Comma, pos),
            b':' if self.peek_at(1) == Some(b'=') => {
                let start = self.cursor;
                self.advance();
                self.advance();
                Token::new(TokenType::ColonEquals, pos, self.slice_from(start))
            }
            b':' => self.single(TokenType::Colon, pos),
            b'(' => self.single(TokenType::LeftParen, pos),
            b')' => self.single(TokenType::RightParen, pos),
            _ => {
                self.advance();
                Token::new(TokenType::Error, pos, "Unknown character.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> alloc::vec::Vec<(TokenType, &str)> {
        let mut tok = Tokenizer::new("t", source);
        let mut out = alloc::vec::Vec::new();
        loop {
            let t = tok.next();
            let done = t.ty == TokenType::Eof;
            out.push((t.ty, t.text));
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn integer_and_float_constants() {
        assert_eq!(
            tokens("1 2.5 10"),
            alloc::vec![
                (TokenType::IntConstant, "1"),
                (TokenType::FloatConstant, "2.5"),
                (TokenType::IntConstant, "10"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            tokens("var x return _"),
            alloc::vec![
                (TokenType::KwVar, "var"),
                (TokenType::Identifier, "x"),
                (TokenType::KwReturn, "return"),
                (TokenType::Underscore, "_"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn two_char_punctuators() {
        assert_eq!(
            tokens(":= ->"),
            alloc::vec![
                (TokenType::ColonEquals, ":="),
                (TokenType::Arrow, "->"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn line_comment_consumes_to_newline() {
        let mut tok = Tokenizer::new("t", "1 -- comment\n2");
        assert_eq!(tok.next().ty, TokenType::IntConstant);
        let nl = tok.next();
        assert_eq!(nl.ty, TokenType::Newline);
        assert_eq!(tok.next().ty, TokenType::IntConstant);
    }

    #[test]
    fn newline_ignore_suppresses_newline_tokens() {
        let mut tok = Tokenizer::new("t", "1\n2");
        tok.set_newline_ignore(true);
        assert_eq!(tok.next().ty, TokenType::IntConstant);
        assert_eq!(tok.next().ty, TokenType::IntConstant);
    }

    #[test]
    fn unknown_byte_is_error_token() {
        let mut tok = Tokenizer::new("t", "@");
        let t = tok.next();
        assert_eq!(t.ty, TokenType::Error);
        assert_eq!(t.text, "Unknown character.");
    }

    #[test]
    fn eof_is_idempotent() {
        let mut tok = Tokenizer::new("t", "1");
        tok.next();
        let a = tok.next();
        let b = tok.next();
        assert_eq!(a.ty, TokenType::Eof);
        assert_eq!(b.ty, TokenType::Eof);
        assert_eq!(a.position, b.position);
    }

    #[test]
    fn line_and_column_tracking() {
        let mut tok = Tokenizer::new("t", "1\n  2");
        let first = tok.next();
        assert_eq!((first.position.line, first.position.column), (1, 1));
        let nl = tok.next();
        assert_eq!(nl.ty, TokenType::Newline);
        let second = tok.next();
        assert_eq!((second.position.line, second.position.column), (2, 3));
    }
}
