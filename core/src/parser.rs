//! Pratt-precedence-climbing parser: tokens → untyped [`Node`](crate::ast::Node) tree.
//!
//! Dispatch is a `match` on [`TokenType`] rather than the source language's
//! table of member-function pointers — Rust has no direct equivalent, and a
//! match arm is the idiomatic stand-in. Precedence is still a small integer
//! ladder: `parse_expression` keeps consuming infix operators whose
//! precedence is at least `min_prec`, recursing at `op_prec + 1` so
//! same-precedence operators stay left-associative.

use bumpalo::Bump;

use crate::ast::{BinaryOp, ConstantKind, Node, UnaryOp};
use crate::error_manager::ErrorManager;
use crate::source_position::SourcePosition;
use crate::token::{Token, TokenType};
use crate::tokenizer::Tokenizer;
use crate::types::TypeId;
use crate::{Vec, format};

const PREC_ADDITIVE: u8 = 1;
const PREC_MULTIPLICATIVE: u8 = 2;
const PREC_SIGN: u8 = 3;

/// Default maximum recursion depth for nested expressions/groupings, guarding
/// against stack overflow on pathological input; see `--max-parse-depth` on
/// `rt-cli`.
pub const DEFAULT_MAX_PARSE_DEPTH: usize = 500;

fn infix_precedence(ty: TokenType) -> Option<u8> {
    match ty {
        TokenType::Plus | TokenType::Minus => Some(PREC_ADDITIVE),
        TokenType::Star | TokenType::Slash | TokenType::Percent => Some(PREC_MULTIPLICATIVE),
        _ => None,
    }
}

fn binary_op_for(ty: TokenType) -> Option<BinaryOp> {
    match ty {
        TokenType::Plus => Some(BinaryOp::Add),
        TokenType::Minus => Some(BinaryOp::Subtract),
        TokenType::Star => Some(BinaryOp::Multiply),
        TokenType::Slash => Some(BinaryOp::Divide),
        TokenType::Percent => Some(BinaryOp::Modulo),
        _ => None,
    }
}

pub struct Parser<'a> {
    arena: &'a Bump,
    tokenizer: Tokenizer<'a>,
    errors: ErrorManager,
    newline_ignore_stack: Vec<bool>,
    panicking: bool,
    current: Token<'a>,
    max_depth: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(arena: &'a Bump, source_name: &'a str, source: &'a str) -> Self {
        let tokenizer = Tokenizer::new(source_name, source);
        let placeholder = Token::new(
            TokenType::Eof,
            SourcePosition::new(source_name, 1, 1),
            "",
        );
        let mut parser = Self {
            arena,
            tokenizer,
            errors: ErrorManager::new(),
            newline_ignore_stack: Vec::new(),
            panicking: false,
            current: placeholder,
            max_depth: DEFAULT_MAX_PARSE_DEPTH,
            depth: 0,
        };
        parser.advance();
        parser
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn error_message(&self) -> &str {
        self.errors.message()
    }

    pub fn into_error_message(self) -> crate::String {
        self.errors.into_message()
    }

    fn push_error(&mut self, position: SourcePosition<'a>, text: impl core::fmt::Display) {
        if self.panicking {
            return;
        }
        self.panicking = true;
        self.errors.push(position, text);
    }

    fn advance(&mut self) {
        self.current = self.tokenizer.next();
        while self.current.ty == TokenType::Error {
            let text = self.current.text;
            let position = self.current.position;
            self.push_error(position, text);
            self.current = self.tokenizer.next();
        }
    }

    fn push_newline_ignore(&mut self, ignore: bool) {
        self.newline_ignore_stack.push(ignore);
        self.tokenizer.set_newline_ignore(ignore);
    }

    fn pop_newline_ignore(&mut self) {
        self.newline_ignore_stack.pop();
        let restore = self.newline_ignore_stack.last().copied().unwrap_or(false);
        self.tokenizer.set_newline_ignore(restore);
    }

    fn alloc(&self, node: Node<'a>) -> &'a Node<'a> {
        self.arena.alloc(node)
    }

    /// Top-level entry point: parses one statement block, requires `EOF`
    /// afterwards, and returns `None` if any error was recorded.
    pub fn parse(&mut self) -> Option<&'a Node<'a>> {
        tracing::trace!("parse starting");
        self.push_newline_ignore(false);
        let block = self.parse_statement_block_until_eof();
        self.pop_newline_ignore();

        if self.errors.has_errors() {
            tracing::debug!(error_count = self.errors.count(), "parse failed");
            None
        } else {
            Some(block)
        }
    }

    fn parse_statement_block_until_eof(&mut self) -> &'a Node<'a> {
        let position = self.current.position;
        let mut statements: Vec<&'a Node<'a>> = Vec::new();

        loop {
            while self.current.ty == TokenType::Newline {
                self.advance();
            }
            if self.current.ty == TokenType::Eof {
                break;
            }

            self.panicking = false;
            match self.parse_statement() {
                Some(stmt) => {
                    statements.push(stmt);
                    self.require_statement_terminator();
                }
                None => self.recover_to_newline_or_eof(),
            }
        }

        self.alloc(Node::StatementBlock {
            statements: self.arena.alloc_slice_copy(&statements),
            position,
        })
    }

    fn require_statement_terminator(&mut self) {
        if self.panicking {
            return;
        }
        if self.current.ty == TokenType::Newline {
            self.advance();
        } else if self.current.ty != TokenType::Eof {
            let position = self.current.position;
            self.push_error(position, "Expected a newline.");
        }
    }

    fn recover_to_newline_or_eof(&mut self) {
        while self.current.ty != TokenType::Newline && self.current.ty != TokenType::Eof {
            self.advance();
        }
        if self.current.ty == TokenType::Newline {
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> Option<&'a Node<'a>> {
        match self.current.ty {
            TokenType::KwVar => self.parse_variable_declaration(),
            TokenType::KwReturn => self.parse_return(),
            _ => self.parse_expression(PREC_ADDITIVE),
        }
    }

    fn parse_variable_declaration(&mut self) -> Option<&'a Node<'a>> {
        let position = self.current.position;
        self.advance(); // 'var'

        if self.current.ty != TokenType::Identifier {
            let position = self.current.position;
            self.push_error(position, "Expected an identifier.");
            return None;
        }
        let name = self.current.text;
        self.advance();

        let mut storage_type = None;
        if self.current.ty == TokenType::Colon {
            self.advance();
            storage_type = Some(self.parse_builtin_type()?);
        }

        let mut initializer = None;
        if self.current.ty == TokenType::ColonEquals {
            self.advance();
            initializer = self.parse_expression(PREC_ADDITIVE);
            if initializer.is_none() {
                let position = self.current.position;
                self.push_error(position, "Expected an expression.");
                return None;
            }
        }

        if storage_type.is_none() && initializer.is_none() {
            self.push_error(position, "Expected a storage type.");
            return None;
        }

        Some(self.alloc(Node::VariableDeclaration {
            name,
            storage_type,
            initializer,
            position,
        }))
    }

    fn parse_builtin_type(&mut self) -> Option<&'a Node<'a>> {
        let position = self.current.position;
        let type_id = match self.current.ty {
            TokenType::KwVoid => TypeId::Void,
            TokenType::KwInt => TypeId::Int,
            TokenType::KwFloat => TypeId::Float,
            _ => {
                self.push_error(position, "Expected a storage type.");
                return None;
            }
        };
        self.advance();
        Some(self.alloc(Node::BuiltinType { type_id, position }))
    }

    fn parse_return(&mut self) -> Option<&'a Node<'a>> {
        let position = self.current.position;
        self.advance(); // 'return'

        let starts_value = !matches!(self.current.ty, TokenType::Newline | TokenType::Eof);
        let value = if starts_value {
            self.parse_expression(PREC_ADDITIVE)
        } else {
            None
        };

        Some(self.alloc(Node::Return { value, position }))
    }

    fn parse_expression(&mut self, min_prec: u8) -> Option<&'a Node<'a>> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let position = self.current.position;
            self.push_error(position, "Expression nesting depth exceeds maximum.");
            self.depth -= 1;
            return None;
        }

        let result = self.parse_expression_inner(min_prec);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, min_prec: u8) -> Option<&'a Node<'a>> {
        let position = self.current.position;
        let mut left = match self.parse_prefix() {
            Some(node) => node,
            None => {
                self.push_error(position, "Expected an expression.");
                return None;
            }
        };

        while let Some(prec) = infix_precedence(self.current.ty) {
            if prec < min_prec {
                break;
            }
            left = self.parse_infix(left, prec)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<&'a Node<'a>> {
        match self.current.ty {
            TokenType::IntConstant => Some(self.parse_constant(ConstantKind::Int)),
            TokenType::FloatConstant => Some(self.parse_constant(ConstantKind::Float)),
            TokenType::Identifier => Some(self.parse_variable_access()),
            TokenType::Plus | TokenType::Minus => self.parse_unary_op(),
            TokenType::LeftParen => self.parse_grouping(),
            _ => None,
        }
    }

    fn parse_infix(&mut self, left: &'a Node<'a>, op_prec: u8) -> Option<&'a Node<'a>> {
        let op_token = self.current;
        let op = binary_op_for(op_token.ty).expect("infix_precedence only matches binary ops");
        self.advance();

        let right_position = self.current.position;
        let right = self.parse_expression(op_prec + 1);
        let Some(right) = right else {
            self.push_error(right_position, "Expected an expression.");
            return None;
        };

        Some(self.alloc(Node::BinaryOp {
            op,
            left,
            right,
            position: op_token.position,
        }))
    }

    fn parse_unary_op(&mut self) -> Option<&'a Node<'a>> {
        let position = self.current.position;
        let op = match self.current.ty {
            TokenType::Plus => UnaryOp::Plus,
            TokenType::Minus => UnaryOp::Negate,
            _ => unreachable!("parse_unary_op only called for +/-"),
        };
        self.advance();

        let operand_position = self.current.position;
        let operand = self.parse_expression(PREC_SIGN);
        let Some(operand) = operand else {
            self.push_error(operand_position, "Expected an expression.");
            return None;
        };

        Some(self.alloc(Node::UnaryOp { op, operand, position }))
    }

    fn parse_constant(&mut self, kind: ConstantKind) -> &'a Node<'a> {
        let position = self.current.position;
        let text = self.current.text;
        self.advance();
        self.alloc(Node::Constant { kind, text, position })
    }

    fn parse_variable_access(&mut self) -> &'a Node<'a> {
        let position = self.current.position;
        let name = self.current.text;
        self.advance();
        self.alloc(Node::VariableAccess { name, position })
    }

    fn parse_grouping(&mut self) -> Option<&'a Node<'a>> {
        let paren_position = self.current.position;
        self.advance(); // '('
        self.push_newline_ignore(true);

        let expr_position = self.current.position;
        let expr = self.parse_expression(PREC_ADDITIVE);

        let Some(expr) = expr else {
            self.pop_newline_ignore();
            self.push_error(expr_position, "Expected an expression.");
            return None;
        };

        if self.current.ty != TokenType::RightParen {
            self.pop_newline_ignore();
            let position = self.current.position;
            self.push_error(
                position,
                format!("Expected a ')' to match the '( at {}", paren_position),
            );
            return None;
        }
        self.advance();
        self.pop_newline_ignore();

        Some(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_return_arithmetic() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "return 1 + 2 * 3");
        let ast = parser.parse();
        assert!(ast.is_some(), "{}", parser.error_message());
        let Node::StatementBlock { statements, .. } = ast.unwrap() else {
            panic!("expected a statement block");
        };
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Node::Return { value: Some(_), .. }));
    }

    #[test]
    fn precedence_groups_multiplicative_tighter() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "return 1 + 2 * 3");
        let ast = parser.parse().unwrap();
        let Node::StatementBlock { statements, .. } = ast else {
            unreachable!()
        };
        let Node::Return { value: Some(expr), .. } = statements[0] else {
            unreachable!()
        };
        let Node::BinaryOp { op: BinaryOp::Add, right, .. } = expr else {
            panic!("expected a top-level '+'");
        };
        assert!(matches!(right, Node::BinaryOp { op: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn grouping_overrides_precedence() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "return (1 + 2) * 3");
        let ast = parser.parse().unwrap();
        let Node::StatementBlock { statements, .. } = ast else {
            unreachable!()
        };
        let Node::Return { value: Some(expr), .. } = statements[0] else {
            unreachable!()
        };
        assert!(matches!(expr, Node::BinaryOp { op: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn variable_declaration_requires_type_or_initializer() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "var x\nreturn 1");
        assert!(parser.parse().is_none());
        assert!(parser.error_message().contains("Expected a storage type."));
    }

    #[test]
    fn variable_declaration_with_annotation_and_initializer() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "var x: Int := 10\nreturn x");
        let ast = parser.parse();
        assert!(ast.is_some(), "{}", parser.error_message());
    }

    #[test]
    fn unclosed_paren_reports_open_position() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "return (1 + 2");
        assert!(parser.parse().is_none());
        assert!(parser.error_message().contains("Expected a ')' to match the '('"));
    }

    #[test]
    fn missing_newline_between_statements_is_an_error() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t", "var x := 1 var y := 2");
        assert!(parser.parse().is_none());
        assert!(parser.error_message().contains("Expected a newline."));
    }

    #[test]
    fn recovery_allows_later_statements_to_parse() {
        let arena = Bump::new();
        // The first line is malformed; the second should still be reachable
        // by the panic-mode recovery scan to the next newline.
        let mut parser = Parser::new(&arena, "t", "var\nreturn 1");
        let ast = parser.parse();
        // Still an overall compile failure (one diagnostic), but parsing
        // doesn't stop dead after the first statement.
        assert!(ast.is_none());
        assert_eq!(parser.error_message().matches("Error:").count(), 1);
    }

    #[test]
    fn bare_token_with_no_prefix_parselet_is_an_error() {
        let arena = Bump::new();
        // ')' has neither a prefix nor an infix role at statement position;
        // this must not silently compile to an empty program.
        let mut parser = Parser::new(&arena, "t", ")");
        assert!(parser.parse().is_none());
        assert!(parser.error_message().contains("Expected an expression."));
    }
}
