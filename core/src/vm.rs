//! Register-window interpreter: executes one [`BytecodeObject`] at a time
//! over a flat array of [`Value`] cells shared by every frame on the call
//! stack.
//!
//! There is no `CALL` opcode in this instruction set (§4.6, §9 Non-goals): a
//! frame is only ever pushed by the host calling [`Vm::call`] directly, so in
//! practice at most one frame is active per call. The frame bookkeeping below
//! still follows the general call protocol (§4.6), since a richer dialect of
//! this bytecode could add an in-language `CALL` without changing [`Frame`]'s
//! shape.

use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;
use allocator_api2::vec::Vec as RawVec;

use crate::heap::BytecodeObject;
use crate::instruction::Opcode;
use crate::value::Value;
use crate::{String, format};

/// Register file capacity, matching the source runtime's fixed `128K`-slot
/// stack.
pub const DEFAULT_REGISTER_CAPACITY: usize = 128 * 1024;
/// Frame stack depth, matching the source runtime's fixed `256`-frame limit.
pub const DEFAULT_FRAME_CAPACITY: usize = 256;

/// One activation record. `saved_ip` is the instruction offset execution
/// resumes at *in the caller* once this frame pops — not this frame's own
/// program counter, which the interpreter loop tracks locally since only one
/// frame is ever running at a time. The bottommost frame (`function: None`)
/// is the host's own register window: it is pushed once by [`Vm::new`] and
/// never popped, so `reserve`/`release`/register access work before the
/// first [`Vm::call`].
struct Frame {
    function: Option<NonNull<BytecodeObject>>,
    saved_ip: usize,
    return_idx: Option<u32>,
    reserved_count: u32,
    frame_offset: u32,
}

/// What kind of fault a [`RuntimeError`] reports. Only `DivisionByZero` is
/// reachable from this language's surface grammar (§4.6); the others guard
/// bytecode-format invariants that well-formed codegen output never
/// violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    DivisionByZero,
    CallStackOverflow,
    MalformedBytecode,
}

/// A runtime error raised while executing bytecode (§4.6, §7). Carries the
/// source line recovered from the faulting [`BytecodeObject`]'s line-info
/// table, or `None` when no entry covers the faulting offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: Option<u16>,
    pub message: String,
}

impl RuntimeError {
    fn new(kind: RuntimeErrorKind, line: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "runtime error: {}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " (ln {})", line)?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RuntimeError {}

/// The register-window call stack. Generic over the host's allocator so the
/// (large, fixed-capacity) register and frame arrays are routed through it
/// like every other allocation this runtime makes.
pub struct Vm<A: Allocator + Clone> {
    registers: RawVec<Value, A>,
    frames: RawVec<Frame, A>,
    ip: usize,
}

impl<A: Allocator + Clone> Vm<A> {
    pub fn new(allocator: A) -> Self {
        let mut registers = RawVec::with_capacity_in(DEFAULT_REGISTER_CAPACITY, allocator.clone());
        registers.resize(DEFAULT_REGISTER_CAPACITY, Value::ZERO);
        let mut frames = RawVec::with_capacity_in(DEFAULT_FRAME_CAPACITY, allocator);
        // The host's own register window: never popped, so reserve/release
        // and register access work before the first call.
        frames.push(Frame {
            function: None,
            saved_ip: 0,
            return_idx: None,
            reserved_count: 0,
            frame_offset: 0,
        });
        Self {
            registers,
            frames,
            ip: 0,
        }
    }

    fn frame_offset(&self) -> u32 {
        self.frames
            .last()
            .expect("register access outside of an active call frame")
            .frame_offset
    }

    /// Reads the register at `logical_index` within the current frame's
    /// window, i.e. `registers[frame_offset + logical_index]` (§4.6
    /// Indexing).
    pub fn register(&self, logical_index: u32) -> Value {
        self.registers[self.frame_offset() as usize + logical_index as usize]
    }

    pub fn set_register(&mut self, logical_index: u32, value: Value) {
        let index = self.frame_offset() as usize + logical_index as usize;
        self.registers[index] = value;
    }

    /// Grows the current frame's register window by `count` cells.
    pub fn reserve(&mut self, count: u32) {
        let frame = self
            .frames
            .last_mut()
            .expect("reserve outside of an active call frame");
        frame.reserved_count += count;
        assert!(
            frame.frame_offset as usize + frame.reserved_count as usize <= self.registers.len(),
            "register stack exhausted"
        );
    }

    /// Shrinks the current frame's register window by `count` cells.
    /// Asserts `count <= reserved` per §4.6.
    pub fn release(&mut self, count: u32) {
        let frame = self
            .frames
            .last_mut()
            .expect("release outside of an active call frame");
        assert!(count <= frame.reserved_count, "cannot release more registers than reserved");
        frame.reserved_count -= count;
    }

    /// Executes `callee` as a fresh call. If `return_idx` is `Some`, the
    /// callee's `RETURN_VALUE` target is copied into that register of
    /// whichever frame was active before this call (the caller's frame, or
    /// the bare register file itself on the first call).
    ///
    /// # Safety
    /// `callee` must point at a live [`BytecodeObject`] — i.e. one still
    /// reachable through the owning [`crate::heap::Heap`]'s all-objects
    /// list.
    pub unsafe fn call(&mut self, callee: NonNull<BytecodeObject>, return_idx: Option<u32>) -> Result<(), RuntimeError> {
        tracing::trace!(depth = self.frames.len(), "call starting");
        if self.frames.len() == self.frames.capacity() {
            tracing::debug!(depth = self.frames.len(), "call stack overflow");
            return Err(RuntimeError::new(RuntimeErrorKind::CallStackOverflow, None, "Call stack overflow."));
        }

        let frame_offset = self
            .frames
            .last()
            .map(|f| f.frame_offset + f.reserved_count)
            .unwrap_or(0);

        self.frames.push(Frame {
            function: Some(callee),
            saved_ip: self.ip,
            return_idx,
            reserved_count: 0,
            frame_offset,
        });
        self.ip = 0;

        let target_depth = self.frames.len() - 1;
        tracing::trace!(target_depth, "entering frame");
        self.run(target_depth)
    }

    /// Runs instructions of the current top frame until it pops back down
    /// to `target_depth` (i.e. until the frame [`Vm::call`] just pushed
    /// returns).
    fn run(&mut self, target_depth: usize) -> Result<(), RuntimeError> {
        loop {
            // SAFETY: every frame's `function` came from `call`'s caller,
            // which requires it to still be a live heap object. Only the
            // never-popped bottom frame has `function: None`, and `run` is
            // never reached with that frame on top (it pops back out to
            // `target_depth` before the loop would read it).
            let function = self
                .frames
                .last()
                .unwrap()
                .function
                .expect("run() never executes with the bottom frame on top");
            let code = unsafe { function.as_ref() };

            let Some(&instruction) = code.code.get(self.ip) else {
                return Err(self.error(
                    RuntimeErrorKind::MalformedBytecode,
                    code,
                    self.ip,
                    "Instruction pointer ran past the end of the code.",
                ));
            };
            let offset = self.ip;
            self.ip += 1;

            match instruction.opcode() {
                Opcode::NoOp => {}
                Opcode::Reserve => self.reserve(instruction.op_long()),
                Opcode::Return => {
                    self.pop_frame(None);
                    if self.frames.len() == target_depth {
                        return Ok(());
                    }
                }
                Opcode::ReturnValue => {
                    let value = self.register(instruction.op_long());
                    self.pop_frame(Some(value));
                    if self.frames.len() == target_depth {
                        return Ok(());
                    }
                }
                Opcode::Move => {
                    let value = self.register(instruction.op_b());
                    self.set_register(instruction.op_a(), value);
                }
                Opcode::LoadConstant => {
                    let value = code.constants[instruction.op_b() as usize];
                    self.set_register(instruction.op_a(), value);
                }
                Opcode::NegationInt => {
                    let r = instruction.op_long();
                    // SAFETY: the resolver only ever routes `IntUnary` through
                    // this opcode, so the register holds the integer variant.
                    let value = unsafe { self.register(r).as_uint() } as i64;
                    self.set_register(r, Value::from_uint(value.wrapping_neg() as u64));
                }
                Opcode::NegationFloat => {
                    let r = instruction.op_long();
                    // SAFETY: see NegationInt; this path is for `FloatUnary`.
                    let value = unsafe { self.register(r).as_float() };
                    self.set_register(r, Value::from_float(-value));
                }
                Opcode::IntToFloat => {
                    let r = instruction.op_long();
                    // SAFETY: only emitted for a `NumericConversion` whose
                    // operand resolved to `Int`.
                    let value = unsafe { self.register(r).as_uint() } as i64;
                    self.set_register(r, Value::from_float(value as f64));
                }
                Opcode::FloatToInt => {
                    let r = instruction.op_long();
                    // SAFETY: the inverse conversion; unreachable from this
                    // surface language (§9 Open Questions) but implemented
                    // for bytecode-format completeness.
                    let value = unsafe { self.register(r).as_float() };
                    self.set_register(r, Value::from_uint(value as i64 as u64));
                }
                Opcode::AddInt => self.int_binop(instruction.op_a(), instruction.op_b(), u64::wrapping_add),
                Opcode::SubtractInt => self.int_binop(instruction.op_a(), instruction.op_b(), u64::wrapping_sub),
                Opcode::MultiplyInt => self.int_binop(instruction.op_a(), instruction.op_b(), u64::wrapping_mul),
                Opcode::DivideInt => {
                    let (a, b) = (instruction.op_a(), instruction.op_b());
                    // SAFETY: integer binary opcodes only ever address
                    // registers the resolver proved hold the Int variant.
                    if unsafe { self.register(b).as_uint() } == 0 {
                        return Err(self.error(
                            RuntimeErrorKind::DivisionByZero,
                            code,
                            offset,
                            "Cannot divide an integer by 0.",
                        ));
                    }
                    self.int_binop(a, b, u64::wrapping_div);
                }
                Opcode::ModuloInt => {
                    let (a, b) = (instruction.op_a(), instruction.op_b());
                    if unsafe { self.register(b).as_uint() } == 0 {
                        return Err(self.error(
                            RuntimeErrorKind::DivisionByZero,
                            code,
                            offset,
                            "Cannot divide an integer by 0.",
                        ));
                    }
                    self.int_binop(a, b, u64::wrapping_rem);
                }
                Opcode::AddFloat => self.float_binop(instruction.op_a(), instruction.op_b(), |a, b| a + b),
                Opcode::SubtractFloat => self.float_binop(instruction.op_a(), instruction.op_b(), |a, b| a - b),
                Opcode::MultiplyFloat => self.float_binop(instruction.op_a(), instruction.op_b(), |a, b| a * b),
                Opcode::DivideFloat => self.float_binop(instruction.op_a(), instruction.op_b(), |a, b| a / b),
            }
        }
    }

    fn int_binop(&mut self, a: u32, b: u32, op: fn(u64, u64) -> u64) {
        // SAFETY: int binary opcodes only address registers proven Int by the resolver.
        let (left, right) = unsafe { (self.register(a).as_uint(), self.register(b).as_uint()) };
        self.set_register(a, Value::from_uint(op(left, right)));
    }

    fn float_binop(&mut self, a: u32, b: u32, op: fn(f64, f64) -> f64) {
        // SAFETY: float binary opcodes only address registers proven Float by the resolver.
        let (left, right) = unsafe { (self.register(a).as_float(), self.register(b).as_float()) };
        self.set_register(a, Value::from_float(op(left, right)));
    }

    fn pop_frame(&mut self, value: Option<Value>) {
        let frame = self.frames.pop().expect("return without an active call frame");
        self.ip = frame.saved_ip;
        if let (Some(value), Some(return_idx)) = (value, frame.return_idx) {
            let caller_offset = self.frames.last().map(|f| f.frame_offset).unwrap_or(0);
            self.registers[caller_offset as usize + return_idx as usize] = value;
        }
    }

    fn error(
        &self,
        kind: RuntimeErrorKind,
        code: &BytecodeObject,
        offset: usize,
        message: impl Into<String>,
    ) -> RuntimeError {
        RuntimeError::new(kind, code.line_for_offset(offset), message.into())
    }
}

/// Textual disassembly of one [`BytecodeObject`], one instruction per line:
/// offset, opcode mnemonic, and operands. Used by the host API's
/// `disassemble` entry point (§6).
pub fn disassemble(code: &BytecodeObject) -> String {
    let mut out = String::new();
    for (offset, instruction) in code.code.iter().enumerate() {
        let opcode = instruction.opcode();
        let line = match opcode {
            Opcode::NoOp
            | Opcode::Return
            | Opcode::ReturnValue
            | Opcode::Reserve
            | Opcode::NegationInt
            | Opcode::NegationFloat
            | Opcode::IntToFloat
            | Opcode::FloatToInt => format!("{:4}  {:?} {}", offset, opcode, instruction.op_long()),
            _ => format!(
                "{:4}  {:?} {}, {}",
                offset,
                opcode,
                instruction.op_a(),
                instruction.op_b()
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocator_api2::alloc::Global;
    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    use crate::heap::Heap;

    fn compile_and_run(source: &str) -> Result<Value, RuntimeError> {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let mut parser = crate::parser::Parser::new(&ast_arena, "t", source);
        let ast = parser.parse().expect(parser.error_message());
        let mut resolver = crate::resolver::Resolver::new(&act_arena);
        let program = resolver.resolve(ast).expect(resolver.error_message());
        let generated = crate::codegen::generate(program, program.position());

        let mut heap = Heap::new(Global);
        let bytecode = heap.alloc_bytecode(
            generated.code,
            generated.constants,
            generated.constant_kinds,
            generated.line_info,
        );

        let mut vm = Vm::new(Global);
        // SAFETY: `bytecode` stays alive in `heap`'s all-objects list for
        // the rest of this function.
        unsafe { vm.call(bytecode, Some(0))? };
        Ok(vm.register(0))
    }

    #[test]
    fn arithmetic_precedence() {
        let value = compile_and_run("return 1 + 2 * 3").unwrap();
        assert_eq!(unsafe { value.as_uint() }, 7);
    }

    #[test]
    fn float_division_returns_float() {
        let value = compile_and_run("return 5.0 / 2").unwrap();
        assert_eq!(unsafe { value.as_float() }, 2.5);
    }

    #[test]
    fn variable_reads_reuse_register() {
        let value = compile_and_run("var x: Int := 10\nvar y := x + 5\nreturn y").unwrap();
        assert_eq!(unsafe { value.as_uint() }, 15);
    }

    #[test]
    fn modulo_by_zero_is_a_runtime_error() {
        let err = compile_and_run("return 7 % 0").unwrap_err();
        assert!(err.message.contains("Cannot divide an integer by 0."));
    }

    #[test]
    fn float_division_by_zero_follows_ieee_semantics() {
        let value = compile_and_run("return 1.0 / 0.0").unwrap();
        assert!(unsafe { value.as_float() }.is_infinite());
    }

    #[test]
    fn negation_then_addition() {
        let value = compile_and_run("return -3 + 4").unwrap();
        assert_eq!(unsafe { value.as_uint() as i64 }, 1);
    }

    #[test]
    fn disassembly_lists_one_line_per_instruction() {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();
        let mut parser = crate::parser::Parser::new(&ast_arena, "t", "return 1 + 2");
        let ast = parser.parse().unwrap();
        let mut resolver = crate::resolver::Resolver::new(&act_arena);
        let program = resolver.resolve(ast).unwrap();
        let generated = crate::codegen::generate(program, program.position());
        let code_len = generated.code.len();

        let mut heap = Heap::new(Global);
        let bytecode = heap.alloc_bytecode(
            generated.code,
            generated.constants,
            generated.constant_kinds,
            generated.line_info,
        );
        // SAFETY: `bytecode` is alive for the duration of this test.
        let text = disassemble(unsafe { bytecode.as_ref() });
        assert_eq!(text.lines().count(), code_len);
    }
}
