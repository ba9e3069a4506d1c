//! `rt` — an embeddable, statically-typed scripting runtime.
//!
//! A host drives one [`Environment`]: reserve some registers, [`compile`]
//! a source unit into one of them, [`call`] it, and read the result back
//! with `get_int`/`get_float`. There are no user-defined functions, no
//! closures, no control flow beyond `return` — just variables, arithmetic,
//! and the `Int`/`Float` numeric tower (see `rt-core` for the pipeline that
//! gets a source string there: tokenizer, parser, resolver, code generator,
//! register-window VM).
//!
//! [`compile`]: Environment::compile
//! [`call`]: Environment::call
//!
//! ```
//! use rt::{CompileInfo, Environment, EnvironmentCreateInfo, Global};
//!
//! let mut env = Environment::new(EnvironmentCreateInfo { allocator: Global });
//! env.reserve(2);
//! env.compile(0, CompileInfo { name: "example", source: "return 1 + 2 * 3", max_parse_depth: None })
//!     .expect("source compiles");
//! env.call(0, Some(1)).expect("call succeeds");
//! assert_eq!(env.get_int(1), 7);
//! ```

mod diagnostic;

pub use allocator_api2::alloc::{Allocator, Global};
pub use diagnostic::Diagnostic;
pub use rt_core::api::{
    CompileError, CompileInfo, Environment, EnvironmentCreateInfo, NotBytecodeError,
};
pub use rt_core::vm::{RuntimeError, RuntimeErrorKind};
