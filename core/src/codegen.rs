//! Typed [`Action`] tree → packed [`Instruction`] stream.
//!
//! Registers are handed out with a simple bump allocator: the first
//! `locals_count` registers are the frame's named variables (their addresses
//! were already fixed by the resolver's [`crate::symbol_table::SymbolTable`]);
//! everything above that is a temporary, pushed and popped in strict
//! last-allocated-first-freed order as each expression subtree is compiled.
//! Because an instruction carries at most two 12-bit operands, a binary
//! operator's result overwrites its left operand's register in place rather
//! than writing to a third, separate destination — the left register is
//! promoted to a fresh temporary first if it would otherwise be a named
//! local, so evaluating an expression never corrupts a variable's storage.

use crate::action::{Action, FloatBinaryOp, IntBinaryOp, NumericUnaryOp};
use crate::heap::{ConstantKind, LineInfoEntry};
use crate::instruction::{Instruction, Opcode};
use crate::source_position::SourcePosition;
use crate::value::Value;
use crate::Vec;

/// Output of [`generate`]: the raw pieces [`crate::heap::Heap::alloc_bytecode`]
/// assembles into one heap object.
pub struct GeneratedCode {
    pub code: Vec<Instruction>,
    pub constants: Vec<Value>,
    pub constant_kinds: Vec<ConstantKind>,
    pub line_info: Vec<LineInfoEntry>,
}

struct CodeGenerator {
    code: Vec<Instruction>,
    constants: Vec<Value>,
    constant_kinds: Vec<ConstantKind>,
    line_info: Vec<LineInfoEntry>,
    locals_count: u32,
    register_top: u32,
    max_register: u32,
    last_line: Option<u16>,
}

impl CodeGenerator {
    fn new(locals_count: u32) -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            constant_kinds: Vec::new(),
            line_info: Vec::new(),
            locals_count,
            register_top: locals_count,
            max_register: locals_count,
            last_line: None,
        }
    }

    fn is_local(&self, reg: u32) -> bool {
        reg < self.locals_count
    }

    fn alloc_register(&mut self) -> u32 {
        let reg = self.register_top;
        self.register_top += 1;
        if self.register_top > self.max_register {
            self.max_register = self.register_top;
        }
        reg
    }

    /// Frees `reg` if it was a temporary this generator allocated. Named
    /// locals are never freed; they live for the whole frame.
    fn maybe_free(&mut self, reg: u32) {
        if !self.is_local(reg) {
            debug_assert_eq!(reg + 1, self.register_top, "registers must free in LIFO order");
            self.register_top -= 1;
        }
    }

    /// Moves `reg` into a fresh temporary if it names a local, so an in-place
    /// operator can safely clobber the result register.
    fn ensure_temp(&mut self, reg: u32, position: SourcePosition<'_>) -> u32 {
        if self.is_local(reg) {
            let temp = self.alloc_register();
            self.emit(Instruction::two_op(Opcode::Move, temp, reg), position);
            temp
        } else {
            reg
        }
    }

    fn emit(&mut self, instruction: Instruction, position: SourcePosition<'_>) {
        let line = position.line.min(u16::MAX as u32) as u16;
        if self.last_line != Some(line) {
            self.line_info.push(LineInfoEntry {
                offset: self.code.len() as u64,
                line,
            });
            self.last_line = Some(line);
        }
        self.code.push(instruction);
    }

    /// Interns a constant by exact bit pattern, deduplicating repeats.
    fn add_constant(&mut self, value: Value, kind: ConstantKind) -> u32 {
        for (index, (existing, existing_kind)) in
            self.constants.iter().zip(self.constant_kinds.iter()).enumerate()
        {
            if *existing_kind == kind {
                // SAFETY: comparing raw bit patterns only, never interpreting
                // either value as a typed variant.
                let matches = unsafe { existing.as_uint() == value.as_uint() };
                if matches {
                    return index as u32;
                }
            }
        }
        let index = self.constants.len() as u32;
        self.constants.push(value);
        self.constant_kinds.push(kind);
        index
    }

    fn generate_statement(&mut self, action: &Action) {
        match action {
            Action::StatementBlock { statements, .. } => {
                for stmt in *statements {
                    self.generate_statement(stmt);
                }
            }
            Action::CreateStackVariable {
                address,
                initializer,
                position,
            } => {
                if let Some(init) = initializer {
                    let reg = self.generate_expression(init);
                    self.emit(Instruction::two_op(Opcode::Move, *address, reg), *position);
                    self.maybe_free(reg);
                }
            }
            Action::Return { value, position } => {
                if let Some(v) = value {
                    let reg = self.generate_expression(v);
                    self.emit(Instruction::long_op(Opcode::ReturnValue, reg), *position);
                    self.maybe_free(reg);
                } else {
                    self.emit(Instruction::bare(Opcode::Return), *position);
                }
            }
            // Every other variant is an expression; a bare expression
            // statement evaluates for side effects (none exist yet) and its
            // result register is simply discarded.
            _ => {
                let reg = self.generate_expression(action);
                self.maybe_free(reg);
            }
        }
    }

    fn generate_expression(&mut self, action: &Action) -> u32 {
        match action {
            Action::IntConstant { value, position } => {
                let reg = self.alloc_register();
                let index = self.add_constant(Value::from_uint(*value), ConstantKind::Int);
                self.emit(Instruction::two_op(Opcode::LoadConstant, reg, index), *position);
                reg
            }
            Action::FloatConstant { value, position } => {
                let reg = self.alloc_register();
                let index = self.add_constant(Value::from_float(*value), ConstantKind::Float);
                self.emit(Instruction::two_op(Opcode::LoadConstant, reg, index), *position);
                reg
            }
            Action::StackVariableAccess { address, .. } => *address,
            Action::IntUnary { operand, position, .. } | Action::FloatUnary { operand, position, .. } => {
                let opcode = match action {
                    Action::IntUnary { op: NumericUnaryOp::Negation, .. } => Opcode::NegationInt,
                    Action::FloatUnary { op: NumericUnaryOp::Negation, .. } => Opcode::NegationFloat,
                    _ => unreachable!(),
                };
                let src = self.generate_expression(operand);
                let reg = self.ensure_temp(src, *position);
                self.emit(Instruction::long_op(opcode, reg), *position);
                reg
            }
            Action::NumericConversion { operand, position, .. } => {
                let src = self.generate_expression(operand);
                let reg = self.ensure_temp(src, *position);
                self.emit(Instruction::long_op(Opcode::IntToFloat, reg), *position);
                reg
            }
            Action::IntBinary { op, left, right, position, .. } => {
                self.generate_binary(int_opcode(*op), left, right, *position)
            }
            Action::FloatBinary { op, left, right, position, .. } => {
                self.generate_binary(float_opcode(*op), left, right, *position)
            }
            Action::StatementBlock { .. } | Action::CreateStackVariable { .. } | Action::Return { .. } => {
                unreachable!("statement actions never appear in expression position")
            }
        }
    }

    fn generate_binary(
        &mut self,
        opcode: Opcode,
        left: &Action,
        right: &Action,
        position: SourcePosition<'_>,
    ) -> u32 {
        let left_reg = self.generate_expression(left);
        let left_reg = self.ensure_temp(left_reg, position);
        let right_reg = self.generate_expression(right);
        self.emit(Instruction::two_op(opcode, left_reg, right_reg), position);
        self.maybe_free(right_reg);
        left_reg
    }
}

fn int_opcode(op: IntBinaryOp) -> Opcode {
    match op {
        IntBinaryOp::Add => Opcode::AddInt,
        IntBinaryOp::Subtract => Opcode::SubtractInt,
        IntBinaryOp::Multiply => Opcode::MultiplyInt,
        IntBinaryOp::Divide => Opcode::DivideInt,
        IntBinaryOp::Modulo => Opcode::ModuloInt,
    }
}

fn float_opcode(op: FloatBinaryOp) -> Opcode {
    match op {
        FloatBinaryOp::Add => Opcode::AddFloat,
        FloatBinaryOp::Subtract => Opcode::SubtractFloat,
        FloatBinaryOp::Multiply => Opcode::MultiplyFloat,
        FloatBinaryOp::Divide => Opcode::DivideFloat,
    }
}

/// Compiles a resolved program into a flat instruction stream, patching in
/// the frame's total register count (locals plus the deepest temporary
/// nesting reached) once code generation has discovered it.
pub fn generate(program: &Action, position: SourcePosition<'_>) -> GeneratedCode {
    tracing::trace!(?position, "code generation starting");
    let locals_count = match program {
        Action::StatementBlock { register_count, .. } => *register_count,
        _ => 0,
    };

    let mut gen = CodeGenerator::new(locals_count);
    gen.emit(Instruction::long_op(Opcode::Reserve, 0), position);
    gen.generate_statement(program);

    let needs_implicit_return = !matches!(
        gen.code.last().map(|i| i.opcode()),
        Some(Opcode::Return) | Some(Opcode::ReturnValue)
    );
    if needs_implicit_return {
        gen.emit(Instruction::bare(Opcode::Return), position);
    }

    gen.code[0] = Instruction::long_op(Opcode::Reserve, gen.max_register);
    tracing::debug!(
        instruction_count = gen.code.len(),
        register_count = gen.max_register,
        "code generation complete"
    );

    GeneratedCode {
        code: gen.code,
        constants: gen.constants,
        constant_kinds: gen.constant_kinds,
        line_info: gen.line_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> GeneratedCode {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let mut parser = crate::parser::Parser::new(&ast_arena, "t", source);
        let ast = parser.parse().expect(parser.error_message());
        let mut resolver = crate::resolver::Resolver::new(&act_arena);
        let program = resolver.resolve(ast).expect(resolver.error_message());
        generate(program, program.position())
    }

    #[test]
    fn reserve_is_patched_with_max_register() {
        let generated = compile("var x := 1\nreturn x + 2 * 3");
        assert_eq!(generated.code[0].opcode(), Opcode::Reserve);
        // One local (x) plus at least one temporary for the multiplication.
        assert!(generated.code[0].op_long() >= 2);
    }

    #[test]
    fn constant_pool_deduplicates_equal_values() {
        let generated = compile("return 7 + 7");
        assert_eq!(generated.constants.len(), 1);
    }

    #[test]
    fn binary_op_reuses_left_register_in_place() {
        let generated = compile("return 1 + 2");
        let binary = generated
            .code
            .iter()
            .find(|i| i.opcode() == Opcode::AddInt)
            .expect("expected an AddInt instruction");
        let ret = generated
            .code
            .iter()
            .find(|i| i.opcode() == Opcode::ReturnValue)
            .expect("expected a ReturnValue instruction");
        assert_eq!(binary.op_a(), ret.op_long());
    }

    #[test]
    fn implicit_return_is_appended_when_missing() {
        let generated = compile("var x := 1");
        assert_eq!(generated.code.last().unwrap().opcode(), Opcode::Return);
    }

    #[test]
    fn variable_read_does_not_allocate_a_temporary() {
        let generated = compile("var x := 5\nreturn x");
        // No LoadConstant beyond the initializer, and no Move before the
        // ReturnValue: reading `x` reuses its own register directly.
        let move_count = generated.code.iter().filter(|i| i.opcode() == Opcode::Move).count();
        assert_eq!(move_count, 1, "only the initializer's Move should be emitted");
    }
}
