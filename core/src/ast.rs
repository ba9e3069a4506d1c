//! Untyped AST produced by the parser.
//!
//! Nodes are allocated out of a [`bumpalo::Bump`] arena owned by the `Parser` for the
//! duration of one `parse()` call. This replaces the source language's virtual
//! `Node` base class (freed through a polymorphic-size accessor) with one tagged
//! enum per tree, so there is neither a vtable nor per-node bookkeeping: the arena
//! is simply dropped wholesale when parsing finishes.

use crate::source_position::SourcePosition;
use crate::types::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }
}

impl core::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Negate,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Negate => "-",
        }
    }
}

impl core::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstantKind {
    Int,
    Float,
}

/// One node in the untyped AST. Expression and statement nodes share a tree since
/// the grammar never needs to distinguish them structurally (a statement block is
/// just a list of nodes); the resolver is what gives each node a statement or
/// expression *role*.
#[derive(Debug)]
pub enum Node<'a> {
    StatementBlock {
        statements: &'a [&'a Node<'a>],
        position: SourcePosition<'a>,
    },
    BuiltinType {
        type_id: TypeId,
        position: SourcePosition<'a>,
    },
    VariableDeclaration {
        name: &'a str,
        storage_type: Option<&'a Node<'a>>,
        initializer: Option<&'a Node<'a>>,
        position: SourcePosition<'a>,
    },
    Return {
        value: Option<&'a Node<'a>>,
        position: SourcePosition<'a>,
    },
    BinaryOp {
        op: BinaryOp,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
        position: SourcePosition<'a>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: &'a Node<'a>,
        position: SourcePosition<'a>,
    },
    Constant {
        kind: ConstantKind,
        text: &'a str,
        position: SourcePosition<'a>,
    },
    VariableAccess {
        name: &'a str,
        position: SourcePosition<'a>,
    },
}

impl<'a> Node<'a> {
    pub fn position(&self) -> SourcePosition<'a> {
        match self {
            Node::StatementBlock { position, .. }
            | Node::BuiltinType { position, .. }
            | Node::VariableDeclaration { position, .. }
            | Node::Return { position, .. }
            | Node::BinaryOp { position, .. }
            | Node::UnaryOp { position, .. }
            | Node::Constant { position, .. }
            | Node::VariableAccess { position, .. } => *position,
        }
    }
}
