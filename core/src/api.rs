//! The host-facing register-window API (§6/§6A).
//!
//! A host does not touch the tokenizer, parser, resolver, code generator or
//! VM directly: it drives one [`Environment`], which owns all of that state
//! plus the [`crate::heap::Heap`] and routes every allocation through the
//! `A: Allocator` the host supplied at construction. This is one collapsed
//! register-window surface rather than a tiered build-once/run-many split,
//! since there are no user-defined functions or closures here to build a
//! richer API around.

use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;
use bumpalo::Bump;

use crate::codegen;
use crate::heap::{BytecodeObject, Heap, ObjectHeader, StringObject};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::value::Value;
use crate::vm::{self, RuntimeError, Vm};
use crate::String;

/// Everything an [`Environment`] needs to construct itself: today, just the
/// allocator every internal allocation is routed through.
pub struct EnvironmentCreateInfo<A: Allocator + Clone> {
    pub allocator: A,
}

impl<A: Allocator + Clone + Default> Default for EnvironmentCreateInfo<A> {
    fn default() -> Self {
        Self {
            allocator: A::default(),
        }
    }
}

/// One named source buffer to compile, as accepted by [`Environment::compile`].
#[derive(Clone, Copy)]
pub struct CompileInfo<'a> {
    pub name: &'a str,
    pub source: &'a str,
    /// Overrides the parser's nesting-depth guard (§9 Open Questions); `None`
    /// keeps [`crate::parser::DEFAULT_MAX_PARSE_DEPTH`].
    pub max_parse_depth: Option<usize>,
}

impl<'a> CompileInfo<'a> {
    pub fn new(name: &'a str, source: &'a str) -> Self {
        Self { name, source, max_parse_depth: None }
    }
}

/// A compile-stage failure: the [`crate::error_manager::ErrorManager`]'s
/// accumulated, multi-line message, surfaced to Rust callers as a typed error
/// rather than a bare string while matching the host contract's "a
/// human-readable error string" byte for byte (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    message: String,
}

impl CompileError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl core::fmt::Display for CompileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CompileError {}

/// A host misused the register-window contract: asked to run or disassemble
/// a register that doesn't hold a compiled [`BytecodeObject`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotBytecodeError;

impl core::fmt::Display for NotBytecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "register does not hold a compiled unit")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NotBytecodeError {}

/// Owns one runtime instance: the register/frame stack (§4.6), the heap and
/// interned-string set (§3 "Heap object"/"String interning"), all routed
/// through `A`. This is the single point a host talks to (§6).
pub struct Environment<A: Allocator + Clone> {
    heap: Heap<A>,
    vm: Vm<A>,
}

impl<A: Allocator + Clone> Environment<A> {
    pub fn new(create_info: EnvironmentCreateInfo<A>) -> Self {
        Self {
            heap: Heap::new(create_info.allocator.clone()),
            vm: Vm::new(create_info.allocator),
        }
    }

    /// Grows the current frame's register window by `count` cells.
    pub fn reserve(&mut self, count: u32) {
        self.vm.reserve(count);
    }

    /// Shrinks the current frame's register window by `count` cells.
    pub fn release(&mut self, count: u32) {
        self.vm.release(count);
    }

    pub fn store_int(&mut self, idx: u32, value: i64) {
        self.vm.set_register(idx, Value::from_uint(value as u64));
    }

    pub fn store_uint(&mut self, idx: u32, value: u64) {
        self.vm.set_register(idx, Value::from_uint(value));
    }

    pub fn store_float(&mut self, idx: u32, value: f64) {
        self.vm.set_register(idx, Value::from_float(value));
    }

    pub fn store_bool(&mut self, idx: u32, value: bool) {
        self.vm.set_register(idx, Value::from_bool(value));
    }

    pub fn store_string(&mut self, idx: u32, text: &str) {
        let interned = self.heap.intern(text);
        self.vm.set_register(idx, Value::from_object(object_header(interned)));
    }

    /// # Safety (informal)
    /// Reads the register as whichever variant the host last stored there;
    /// like the VM's own opcode semantics (§4.6), the register's type is
    /// tracked by convention, not by a runtime tag.
    pub fn get_int(&self, idx: u32) -> i64 {
        unsafe { self.vm.register(idx).as_uint() as i64 }
    }

    pub fn get_uint(&self, idx: u32) -> u64 {
        unsafe { self.vm.register(idx).as_uint() }
    }

    pub fn get_float(&self, idx: u32) -> f64 {
        unsafe { self.vm.register(idx).as_float() }
    }

    pub fn get_bool(&self, idx: u32) -> bool {
        unsafe { self.vm.register(idx).as_bool() }
    }

    /// Reads the register as an interned string. Panics if it does not hold
    /// a `StringObject` handle, mirroring the other untyped register
    /// accessors above.
    pub fn get_string(&self, idx: u32) -> &str {
        let value = self.vm.register(idx);
        // SAFETY: caller is expected to only call this on a register last
        // written by `store_string` or a runtime operation that writes
        // strings (e.g. `disassemble`'s `out_idx`).
        let header = unsafe { value.as_object() };
        let ptr = NonNull::new(header).expect("register does not hold a string object");
        // SAFETY: `StringObject` is `#[repr(C)]` with `header` as its first
        // field, matching the cast convention `Heap` uses throughout.
        unsafe { ptr.cast::<StringObject>().as_ref().as_str() }
    }

    /// Runs the tokenizer → parser → resolver → codegen pipeline over
    /// `info.source` and, on success, writes a compiled unit's handle into
    /// `registers[idx]`; on failure, writes the same accumulated error
    /// message as an interned string into `registers[idx]` and returns it
    /// (§6 "on failure writes a human-readable error string there").
    ///
    /// On success, also returns the program's inferred result type (the
    /// type of its first `return` statement, `None` if it never returns a
    /// value) — an ambient convenience beyond the host contract's bare
    /// `ok|error` (§6A), used by `rt-cli` to know whether to print the
    /// result with `get_int` or `get_float` without the host having to
    /// already know the script's shape.
    ///
    /// The parser's and resolver's arenas are scoped to this call and freed
    /// when it returns (§5 "Resource discipline"); only the resulting
    /// `BytecodeObject`, now owned by this environment's heap, survives.
    pub fn compile(
        &mut self,
        idx: u32,
        info: CompileInfo<'_>,
    ) -> Result<Option<crate::types::TypeId>, CompileError> {
        let ast_arena = Bump::new();
        let act_arena = Bump::new();

        let mut parser = Parser::new(&ast_arena, info.name, info.source);
        if let Some(max_depth) = info.max_parse_depth {
            parser = parser.with_max_depth(max_depth);
        }
        let ast = match parser.parse() {
            Some(ast) => ast,
            None => {
                let message = parser.into_error_message();
                self.store_compile_error(idx, &message);
                return Err(CompileError { message });
            }
        };

        let mut resolver = Resolver::new(&act_arena);
        let program = match resolver.resolve(ast) {
            Some(program) => program,
            None => {
                let message = resolver.into_error_message();
                self.store_compile_error(idx, &message);
                return Err(CompileError { message });
            }
        };

        let result_type = program.program_result_type();
        let generated = codegen::generate(program, program.position());
        let bytecode = self.heap.alloc_bytecode(
            generated.code,
            generated.constants,
            generated.constant_kinds,
            generated.line_info,
        );
        self.vm.set_register(idx, Value::from_object(object_header(bytecode)));
        Ok(result_type)
    }

    fn store_compile_error(&mut self, idx: u32, message: &str) {
        let interned = self.heap.intern(message);
        self.vm.set_register(idx, Value::from_object(object_header(interned)));
    }

    /// Executes the compiled unit at `callee_idx` as a fresh call. If
    /// `return_idx` is given, its `RETURN_VALUE` target is copied there
    /// once the call returns (§6, §4.6 "Call protocol").
    pub fn call(&mut self, callee_idx: u32, return_idx: Option<u32>) -> Result<(), RuntimeError> {
        let bytecode = self.bytecode_at(callee_idx).unwrap_or_else(|_| {
            panic!("register {callee_idx} does not hold a compiled unit")
        });
        // SAFETY: `bytecode` was produced by a prior successful `compile`
        // call and is reachable through this environment's heap, which
        // keeps it alive until teardown.
        unsafe { self.vm.call(bytecode, return_idx) }
    }

    /// Produces a textual disassembly of the compiled unit at `code_idx` and
    /// stores it as an interned string at `out_idx` (§6).
    pub fn disassemble(&mut self, out_idx: u32, code_idx: u32) -> Result<(), NotBytecodeError> {
        let bytecode = self.bytecode_at(code_idx)?;
        // SAFETY: see `call`.
        let text = vm::disassemble(unsafe { bytecode.as_ref() });
        let interned = self.heap.intern(&text);
        self.vm.set_register(out_idx, Value::from_object(object_header(interned)));
        Ok(())
    }

    fn bytecode_at(&self, idx: u32) -> Result<NonNull<BytecodeObject>, NotBytecodeError> {
        let value = self.vm.register(idx);
        // SAFETY: reading the untyped object-pointer variant; `NonNull::new`
        // below rejects a null/zeroed register rather than dereferencing it.
        let header = unsafe { value.as_object() };
        NonNull::new(header)
            .map(|ptr| ptr.cast::<BytecodeObject>())
            .ok_or(NotBytecodeError)
    }
}

fn object_header<T>(ptr: NonNull<T>) -> *mut ObjectHeader {
    ptr.cast::<ObjectHeader>().as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocator_api2::alloc::Global;
    use pretty_assertions::assert_eq;

    fn env() -> Environment<Global> {
        Environment::new(EnvironmentCreateInfo { allocator: Global })
    }

    #[test]
    fn compile_call_and_read_back_an_int() {
        let mut env = env();
        env.reserve(2);
        env.compile(0, CompileInfo { name: "t", source: "return 1 + 2 * 3", max_parse_depth: None }).unwrap();
        env.call(0, Some(1)).unwrap();
        assert_eq!(env.get_int(1), 7);
    }

    #[test]
    fn compile_error_is_written_into_the_slot_as_a_string() {
        let mut env = env();
        env.reserve(1);
        let err = env.compile(0, CompileInfo { name: "t", source: "var x := 1\nvar x := 2", max_parse_depth: None }).unwrap_err();
        assert!(err.message().contains("'x' was already defined"));
        assert!(env.get_string(0).contains("'x' was already defined"));
    }

    #[test]
    fn runtime_error_unwinds_out_of_call() {
        let mut env = env();
        env.reserve(1);
        env.compile(0, CompileInfo { name: "t", source: "return 7 % 0", max_parse_depth: None }).unwrap();
        let err = env.call(0, None).unwrap_err();
        assert!(err.message.contains("Cannot divide an integer by 0."));
    }

    #[test]
    fn disassemble_produces_readable_text() {
        let mut env = env();
        env.reserve(2);
        env.compile(0, CompileInfo { name: "t", source: "return 1 + 2", max_parse_depth: None }).unwrap();
        env.disassemble(1, 0).unwrap();
        assert!(env.get_string(1).contains("AddInt"));
    }

    #[test]
    fn store_and_get_round_trip_every_primitive() {
        let mut env = env();
        env.reserve(4);
        env.store_uint(0, 42);
        env.store_float(1, 2.5);
        env.store_bool(2, true);
        env.store_string(3, "hello");
        assert_eq!(env.get_uint(0), 42);
        assert_eq!(env.get_float(1), 2.5);
        assert!(env.get_bool(2));
        assert_eq!(env.get_string(3), "hello");
    }
}
