//! AST → typed [`Action`](crate::action::Action) tree: name resolution, type
//! checking, and implicit numeric promotion.
//!
//! One flat [`SymbolTable`] is built as declarations are encountered in
//! source order, so a variable is visible to every statement after its own
//! `var` line and to none before it — there is no hoisting. Every error is
//! pushed unconditionally (unlike the parser, the resolver never enters a
//! panic mode: each rejected node already corresponds to exactly one
//! diagnostic, and resolution of siblings continues regardless).

use bumpalo::Bump;

use crate::action::{Action, FloatBinaryOp, IntBinaryOp, NumericUnaryOp};
use crate::ast::{BinaryOp, ConstantKind, Node, UnaryOp};
use crate::error_manager::ErrorManager;
use crate::source_position::SourcePosition;
use crate::symbol_table::SymbolTable;
use crate::types::{self, TypeId};
use crate::{String, Vec, format};

pub struct Resolver<'ast, 'act> {
    arena: &'act Bump,
    symbols: SymbolTable<'ast>,
    errors: ErrorManager,
}

impl<'ast, 'act> Resolver<'ast, 'act> {
    pub fn new(arena: &'act Bump) -> Self {
        Self {
            arena,
            symbols: SymbolTable::new(),
            errors: ErrorManager::new(),
        }
    }

    pub fn error_message(&self) -> &str {
        self.errors.message()
    }

    pub fn into_error_message(self) -> String {
        self.errors.into_message()
    }

    fn push_error(&mut self, position: SourcePosition<'ast>, text: impl core::fmt::Display) {
        self.errors.push(position, text);
    }

    fn alloc(&self, action: Action<'act>) -> &'act Action<'act> {
        self.arena.alloc(action)
    }

    /// Resolves the top-level program, which is itself one statement block.
    /// Returns `None` if any declaration or expression failed to resolve.
    pub fn resolve(&mut self, root: &Node<'ast>) -> Option<&'act Action<'act>> {
        tracing::trace!("resolve starting");
        let Node::StatementBlock { statements, position } = root else {
            self.push_error(root.position(), "Expected a statement block.");
            return None;
        };

        let resolved = self.resolve_statements(statements);
        let register_count = self.symbols.count();
        tracing::debug!(register_count, "resolution complete");

        if self.errors.has_errors() {
            None
        } else {
            Some(self.alloc(Action::StatementBlock {
                statements: self.arena.alloc_slice_copy(&resolved),
                register_count,
                position: *position,
            }))
        }
    }

    fn resolve_statements(&mut self, statements: &[&Node<'ast>]) -> Vec<&'act Action<'act>> {
        let mut out = Vec::new();
        for stmt in statements {
            if let Some(action) = self.resolve_statement(stmt) {
                out.push(action);
            }
        }
        out
    }

    fn resolve_statement(&mut self, node: &Node<'ast>) -> Option<&'act Action<'act>> {
        match node {
            Node::VariableDeclaration {
                name,
                storage_type,
                initializer,
                position,
            } => self.resolve_variable_declaration(name, *storage_type, *initializer, *position),
            Node::Return { value, position } => self.resolve_return(*value, *position),
            _ => self.resolve_expression(node).map(|(action, _)| action),
        }
    }

    fn resolve_variable_declaration(
        &mut self,
        name: &'ast str,
        storage_type: Option<&Node<'ast>>,
        initializer: Option<&Node<'ast>>,
        position: SourcePosition<'ast>,
    ) -> Option<&'act Action<'act>> {
        if self.symbols.contains(name) {
            self.push_error(
                position,
                format!("'{}' was already defined when redefined here.", name),
            );
            return None;
        }

        let annotated_type = storage_type.map(Self::builtin_type_id);

        let resolved_initializer = match initializer {
            Some(node) => Some(self.resolve_expression(node)?),
            None => None,
        };

        let declared_type = match (annotated_type, resolved_initializer) {
            (Some(annotated), Some((_, init_type))) => {
                if !types::is_implicitly_convertible(init_type, annotated) {
                    self.push_error(
                        position,
                        format!("'{}' can not be implicitly converted to '{}'.", init_type, annotated),
                    );
                    return None;
                }
                annotated
            }
            (Some(annotated), None) => {
                if annotated == TypeId::Void {
                    self.push_error(position, "Cannot declare a variable of type 'Void'.");
                    return None;
                }
                annotated
            }
            (None, Some((_, init_type))) => init_type,
            (None, None) => unreachable!("parser requires a storage type or an initializer"),
        };

        let initializer_action = match resolved_initializer {
            Some((action, init_type)) => Some(self.promote(action, init_type, declared_type, position)),
            None => Some(self.default_value(declared_type, position)),
        };

        let info = self.symbols.create_variable(name);
        info.storage_type = declared_type;
        let address = info.address;

        Some(self.alloc(Action::CreateStackVariable {
            address,
            initializer: initializer_action,
            position,
        }))
    }

    fn default_value(&self, ty: TypeId, position: SourcePosition<'ast>) -> &'act Action<'act> {
        match ty {
            TypeId::Int => self.alloc(Action::IntConstant { value: 0, position }),
            TypeId::Float => self.alloc(Action::FloatConstant { value: 0.0, position }),
            TypeId::Void => unreachable!("Void is rejected before reaching default_value"),
        }
    }

    fn resolve_return(
        &mut self,
        value: Option<&Node<'ast>>,
        position: SourcePosition<'ast>,
    ) -> Option<&'act Action<'act>> {
        let value_action = match value {
            Some(node) => {
                let (action, ty) = self.resolve_expression(node)?;
                if !ty.is_numeric() {
                    self.push_error(
                        position,
                        format!("Cannot return a value of type '{}'.", ty),
                    );
                    return None;
                }
                Some(action)
            }
            None => None,
        };

        Some(self.alloc(Action::Return {
            value: value_action,
            position,
        }))
    }

    fn resolve_expression(&mut self, node: &Node<'ast>) -> Option<(&'act Action<'act>, TypeId)> {
        match node {
            Node::Constant { kind, text, position } => self.resolve_constant(*kind, text, *position),
            Node::VariableAccess { name, position } => self.resolve_variable_access(name, *position),
            Node::UnaryOp { op, operand, position } => self.resolve_unary_op(*op, operand, *position),
            Node::BinaryOp { op, left, right, position } => {
                self.resolve_binary_op(*op, left, right, *position)
            }
            _ => {
                self.push_error(node.position(), "Expected an expression.");
                None
            }
        }
    }

    fn resolve_constant(
        &mut self,
        kind: ConstantKind,
        text: &str,
        position: SourcePosition<'ast>,
    ) -> Option<(&'act Action<'act>, TypeId)> {
        match kind {
            ConstantKind::Int => match text.parse::<u64>() {
                Ok(value) => Some((self.alloc(Action::IntConstant { value, position }), TypeId::Int)),
                Err(_) => {
                    self.push_error(position, format!("Integer constant '{}' is out of range.", text));
                    None
                }
            },
            ConstantKind::Float => match text.parse::<f64>() {
                Ok(value) => Some((self.alloc(Action::FloatConstant { value, position }), TypeId::Float)),
                Err(_) => {
                    self.push_error(position, format!("Float constant '{}' is invalid.", text));
                    None
                }
            },
        }
    }

    fn resolve_variable_access(
        &mut self,
        name: &str,
        position: SourcePosition<'ast>,
    ) -> Option<(&'act Action<'act>, TypeId)> {
        let Some(info) = self.symbols.find(name) else {
            self.push_error(position, format!("'{}' is not defined when referenced here.", name));
            return None;
        };
        let (address, ty) = (info.address, info.storage_type);
        Some((
            self.alloc(Action::StackVariableAccess {
                result_type: ty,
                address,
                position,
            }),
            ty,
        ))
    }

    fn resolve_unary_op(
        &mut self,
        op: UnaryOp,
        operand: &Node<'ast>,
        position: SourcePosition<'ast>,
    ) -> Option<(&'act Action<'act>, TypeId)> {
        let (action, ty) = self.resolve_expression(operand)?;
        if !ty.is_numeric() {
            self.push_error(
                position,
                format!("Cannot apply unary '{}' to a value of type '{}'.", op.symbol(), ty),
            );
            return None;
        }

        match op {
            // Unary plus is the identity; it never changes the value or type.
            UnaryOp::Plus => Some((action, ty)),
            UnaryOp::Negate => {
                let negated = match ty {
                    TypeId::Int => self.alloc(Action::IntUnary {
                        op: NumericUnaryOp::Negation,
                        operand: action,
                        position,
                    }),
                    TypeId::Float => self.alloc(Action::FloatUnary {
                        op: NumericUnaryOp::Negation,
                        operand: action,
                        position,
                    }),
                    TypeId::Void => unreachable!("Void rejected by is_numeric check above"),
                };
                Some((negated, ty))
            }
        }
    }

    fn resolve_binary_op(
        &mut self,
        op: BinaryOp,
        left: &Node<'ast>,
        right: &Node<'ast>,
        position: SourcePosition<'ast>,
    ) -> Option<(&'act Action<'act>, TypeId)> {
        let (left_action, left_type) = self.resolve_expression(left)?;
        let (right_action, right_type) = self.resolve_expression(right)?;

        if !left_type.is_numeric() || !right_type.is_numeric() {
            self.push_error(
                position,
                format!(
                    "Cannot perform '{}' with operands of type '{}' and '{}'.",
                    op.symbol(),
                    left_type,
                    right_type
                ),
            );
            return None;
        }

        if op == BinaryOp::Modulo {
            if left_type != TypeId::Int || right_type != TypeId::Int {
                self.push_error(
                    position,
                    format!(
                        "Cannot perform '{}' with operands of type '{}' and '{}'.",
                        op.symbol(),
                        left_type,
                        right_type
                    ),
                );
                return None;
            }
            let action = self.alloc(Action::IntBinary {
                op: IntBinaryOp::Modulo,
                result_type: TypeId::Int,
                left: left_action,
                right: right_action,
                position,
            });
            return Some((action, TypeId::Int));
        }

        let result_type = types::numeric_promote(left_type, right_type);
        let left_action = self.promote(left_action, left_type, result_type, position);
        let right_action = self.promote(right_action, right_type, result_type, position);

        let action = if result_type == TypeId::Int {
            self.alloc(Action::IntBinary {
                op: int_binary_op(op),
                result_type,
                left: left_action,
                right: right_action,
                position,
            })
        } else {
            self.alloc(Action::FloatBinary {
                op: float_binary_op(op),
                result_type,
                left: left_action,
                right: right_action,
                position,
            })
        };

        Some((action, result_type))
    }

    fn promote(
        &self,
        action: &'act Action<'act>,
        from: TypeId,
        to: TypeId,
        position: SourcePosition<'ast>,
    ) -> &'act Action<'act> {
        if from == to {
            action
        } else {
            self.alloc(Action::NumericConversion { to, operand: action, position })
        }
    }

    fn builtin_type_id(node: &Node<'ast>) -> TypeId {
        match node {
            Node::BuiltinType { type_id, .. } => *type_id,
            _ => unreachable!("parser only ever produces BuiltinType nodes for storage_type"),
        }
    }
}

fn int_binary_op(op: BinaryOp) -> IntBinaryOp {
    match op {
        BinaryOp::Add => IntBinaryOp::Add,
        BinaryOp::Subtract => IntBinaryOp::Subtract,
        BinaryOp::Multiply => IntBinaryOp::Multiply,
        BinaryOp::Divide => IntBinaryOp::Divide,
        BinaryOp::Modulo => IntBinaryOp::Modulo,
    }
}

fn float_binary_op(op: BinaryOp) -> FloatBinaryOp {
    match op {
        BinaryOp::Add => FloatBinaryOp::Add,
        BinaryOp::Subtract => FloatBinaryOp::Subtract,
        BinaryOp::Multiply => FloatBinaryOp::Multiply,
        BinaryOp::Divide => FloatBinaryOp::Divide,
        BinaryOp::Modulo => unreachable!("Modulo is rejected before reaching a numeric_promote type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn resolve_source<'act>(arena: &'act Bump, ast_arena: &Bump, source: &str) -> Option<&'act Action<'act>> {
        let mut parser = Parser::new(ast_arena, "t", source);
        let ast = parser.parse().expect(parser.error_message());
        let mut resolver = Resolver::new(arena);
        let result = resolver.resolve(ast);
        if result.is_none() {
            panic!("{}", resolver.error_message());
        }
        result
    }

    #[test]
    fn binary_op_promotes_mixed_operands_to_float() {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let action = resolve_source(&act_arena, &ast_arena, "return 1 + 2.5").unwrap();
        let Action::StatementBlock { statements, .. } = action else { unreachable!() };
        let Action::Return { value: Some(expr), .. } = statements[0] else { unreachable!() };
        let Action::FloatBinary { op: FloatBinaryOp::Add, left, .. } = expr else {
            panic!("expected a float add after promotion");
        };
        assert!(matches!(left, Action::NumericConversion { to: TypeId::Float, .. }));
    }

    #[test]
    fn redeclaration_is_an_error() {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let mut parser = Parser::new(&ast_arena, "t", "var x := 1\nvar x := 2\nreturn x");
        let ast = parser.parse().unwrap();
        let mut resolver = Resolver::new(&act_arena);
        assert!(resolver.resolve(ast).is_none());
        assert!(resolver.error_message().contains("'x' was already defined"));
    }

    #[test]
    fn undeclared_variable_is_an_error() {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let mut parser = Parser::new(&ast_arena, "t", "return x");
        let ast = parser.parse().unwrap();
        let mut resolver = Resolver::new(&act_arena);
        assert!(resolver.resolve(ast).is_none());
        assert!(resolver.error_message().contains("is not defined when referenced here"));
    }

    #[test]
    fn modulo_requires_integer_operands() {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let mut parser = Parser::new(&ast_arena, "t", "return 1.0 % 2.0");
        let ast = parser.parse().unwrap();
        let mut resolver = Resolver::new(&act_arena);
        assert!(resolver.resolve(ast).is_none());
        assert!(
            resolver
                .error_message()
                .contains("Cannot perform '%' with operands of type 'Float' and 'Float'")
        );
    }

    #[test]
    fn default_initializer_matches_declared_type() {
        let act_arena = Bump::new();
        let ast_arena = Bump::new();
        let action = resolve_source(&act_arena, &ast_arena, "var x: Float\nreturn x").unwrap();
        let Action::StatementBlock { statements, .. } = action else { unreachable!() };
        let Action::CreateStackVariable { initializer: Some(init), .. } = statements[0] else {
            panic!("expected a default-initialized variable")
        };
        assert!(matches!(init, Action::FloatConstant { value, .. } if *value == 0.0));
    }
}
