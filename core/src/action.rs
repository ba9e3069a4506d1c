//! Typed action tree produced by [`crate::resolver::resolve`].
//!
//! This is the lowering of [`crate::ast::Node`] once name resolution, type
//! checking and implicit numeric promotion have all run: every expression
//! variant carries a concrete [`TypeId`] and every name has become a register
//! address. Like the AST, this is one tagged enum per tree rather than the
//! source language's `Action` base class with a `Type` discriminant field,
//! so there is nothing to keep in sync between the tag and the payload.

use crate::source_position::SourcePosition;
use crate::symbol_table::RegisterAddress;
use crate::types::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericUnaryOp {
    Negation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntBinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatBinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// A resolved action. Statement actions have no `result_type`; expression
/// actions (everything from `IntBinary` down) always do — invariant (a) in
/// the data model.
#[derive(Debug)]
pub enum Action<'a> {
    StatementBlock {
        statements: &'a [&'a Action<'a>],
        register_count: u32,
        position: SourcePosition<'a>,
    },
    CreateStackVariable {
        address: RegisterAddress,
        initializer: Option<&'a Action<'a>>,
        position: SourcePosition<'a>,
    },
    Return {
        value: Option<&'a Action<'a>>,
        position: SourcePosition<'a>,
    },
    IntUnary {
        op: NumericUnaryOp,
        operand: &'a Action<'a>,
        position: SourcePosition<'a>,
    },
    FloatUnary {
        op: NumericUnaryOp,
        operand: &'a Action<'a>,
        position: SourcePosition<'a>,
    },
    IntBinary {
        op: IntBinaryOp,
        result_type: TypeId,
        left: &'a Action<'a>,
        right: &'a Action<'a>,
        position: SourcePosition<'a>,
    },
    FloatBinary {
        op: FloatBinaryOp,
        result_type: TypeId,
        left: &'a Action<'a>,
        right: &'a Action<'a>,
        position: SourcePosition<'a>,
    },
    NumericConversion {
        to: TypeId,
        operand: &'a Action<'a>,
        position: SourcePosition<'a>,
    },
    IntConstant {
        value: u64,
        position: SourcePosition<'a>,
    },
    FloatConstant {
        value: f64,
        position: SourcePosition<'a>,
    },
    StackVariableAccess {
        result_type: TypeId,
        address: RegisterAddress,
        position: SourcePosition<'a>,
    },
}

impl<'a> Action<'a> {
    pub fn position(&self) -> SourcePosition<'a> {
        match self {
            Action::StatementBlock { position, .. }
            | Action::CreateStackVariable { position, .. }
            | Action::Return { position, .. }
            | Action::IntUnary { position, .. }
            | Action::FloatUnary { position, .. }
            | Action::IntBinary { position, .. }
            | Action::FloatBinary { position, .. }
            | Action::NumericConversion { position, .. }
            | Action::IntConstant { position, .. }
            | Action::FloatConstant { position, .. }
            | Action::StackVariableAccess { position, .. } => *position,
        }
    }

    /// The type a top-level program returns, inferred from its first
    /// `return` statement in declaration order. There is no control flow in
    /// this language (§9 Non-goals), so statements execute strictly in
    /// order and the first `return` encountered is the only one that can
    /// ever run; later statements (including further `return`s) are
    /// unreachable dead code the resolver still type-checks but which never
    /// determines what the program actually hands back.
    ///
    /// `None` covers both "falls off the end with no `return`" and
    /// "`return`s with no value" — ambient tooling (e.g. `rt-cli`) that
    /// wants to print a result treats both the same way, as nothing to show.
    pub fn program_result_type(&self) -> Option<TypeId> {
        let Action::StatementBlock { statements, .. } = self else {
            return None;
        };
        for stmt in *statements {
            if let Action::Return { value, .. } = stmt {
                return value.and_then(|v| v.result_type());
            }
        }
        None
    }

    /// The resolved type of an expression action. `None` for statement
    /// actions, which have no value.
    pub fn result_type(&self) -> Option<TypeId> {
        match self {
            Action::IntUnary { .. } | Action::IntConstant { .. } => Some(TypeId::Int),
            Action::FloatUnary { .. } | Action::FloatConstant { .. } => Some(TypeId::Float),
            Action::IntBinary { result_type, .. }
            | Action::FloatBinary { result_type, .. }
            | Action::StackVariableAccess { result_type, .. } => Some(*result_type),
            Action::NumericConversion { to, .. } => Some(*to),
            Action::StatementBlock { .. }
            | Action::CreateStackVariable { .. }
            | Action::Return { .. } => None,
        }
    }
}
