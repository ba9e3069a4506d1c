use allocator_api2::alloc::Global;
use pretty_assertions::assert_eq;
use rt::{CompileInfo, Environment, EnvironmentCreateInfo};

fn env() -> Environment<Global> {
    Environment::new(EnvironmentCreateInfo { allocator: Global })
}

#[test]
fn arithmetic_precedence_and_float_promotion() {
    let mut e = env();
    e.reserve(2);
    e.compile(
        0,
        CompileInfo {
            name: "precedence",
            source: "return 1 + 2 * 3.0",
            max_parse_depth: None,
        },
    )
    .unwrap();
    e.call(0, Some(1)).unwrap();
    assert_eq!(e.get_float(1), 7.0);
}

#[test]
fn variables_and_shadowed_storage_type() {
    let mut e = env();
    e.reserve(2);
    e.compile(
        0,
        CompileInfo {
            name: "variables",
            source: "var x: Float := 1\nvar y := x + 1\nreturn y",
            max_parse_depth: None,
        },
    )
    .unwrap();
    e.call(0, Some(1)).unwrap();
    assert_eq!(e.get_float(1), 2.0);
}

#[test]
fn division_by_zero_is_a_runtime_error_not_a_panic() {
    let mut e = env();
    e.reserve(1);
    e.compile(
        0,
        CompileInfo {
            name: "div0",
            source: "return 1 / 0",
            max_parse_depth: None,
        },
    )
    .unwrap();
    let err = e.call(0, None).unwrap_err();
    assert!(err.to_string().contains("divide"));
}

#[test]
fn redeclaration_is_a_compile_error_naming_the_variable() {
    let mut e = env();
    e.reserve(1);
    let err = e
        .compile(
            0,
            CompileInfo {
                name: "redecl",
                source: "var x := 1\nvar x := 2",
                max_parse_depth: None,
            },
        )
        .unwrap_err();
    assert!(err.message().contains("'x' was already defined"));
}

#[test]
fn program_with_no_return_compiles_to_a_void_result() {
    let mut e = env();
    e.reserve(1);
    let result_type = e
        .compile(
            0,
            CompileInfo {
                name: "no_return",
                source: "var x := 1",
                max_parse_depth: None,
            },
        )
        .unwrap();
    assert_eq!(result_type, None);
    e.call(0, None).unwrap();
}

#[test]
fn exceeding_the_parse_depth_guard_fails_to_compile() {
    let mut e = env();
    e.reserve(1);
    let nested = "(".repeat(32) + "1" + &")".repeat(32);
    let source = format!("return {nested}");
    let err = e
        .compile(
            0,
            CompileInfo {
                name: "too_deep",
                source: &source,
                max_parse_depth: Some(8),
            },
        )
        .unwrap_err();
    assert!(!err.message().is_empty());
}
