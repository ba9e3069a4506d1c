//! The facade's single error type: either compile-stage diagnostics or a
//! runtime fault, rendered through `miette` into one consistent, styled
//! `Report` a host can print. This core's positions are line/column only
//! (no byte spans survive past the parser), so there is no source snippet
//! to underline here, unlike a richer span-aware diagnostic renderer.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use rt_core::api::CompileError;
use rt_core::vm::RuntimeError;

/// Everything that can go wrong calling into this runtime, in one type a
/// host can hand straight to `miette::Report::new` for terminal rendering.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum Diagnostic {
    #[error("{0}")]
    #[diagnostic(code(rt::compile_error), help("fix the reported source locations and recompile"))]
    Compile(#[from] CompileError),

    #[error("{0}")]
    #[diagnostic(code(rt::runtime_error))]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::api::{CompileInfo, Environment, EnvironmentCreateInfo};
    use allocator_api2::alloc::Global;

    #[test]
    fn compile_error_renders_through_miette() {
        let mut env = Environment::new(EnvironmentCreateInfo { allocator: Global });
        env.reserve(1);
        let err = env
            .compile(0, CompileInfo { name: "t", source: "var x := 1\nvar x := 2", max_parse_depth: None })
            .unwrap_err();
        let diagnostic: Diagnostic = err.into();
        let report = miette::Report::new(diagnostic);
        assert!(format!("{report:?}").contains("'x' was already defined"));
    }
}
