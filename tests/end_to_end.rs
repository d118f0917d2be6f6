//! Integration tests exercising the public `compile_and_run` entry point
//! end to end, source text in and stdout bytes out.

use patito::{compile_and_run, PatitoError};

fn run(src: &str) -> String {
    let mut out = Vec::new();
    compile_and_run(src, &mut out).expect("program should compile and run");
    String::from_utf8(out).unwrap()
}

fn run_err(src: &str) -> PatitoError {
    let mut out = Vec::new();
    compile_and_run(src, &mut out).expect_err("program should fail to compile or run")
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("program p; vars x: integer; begin x = 3 + 4 * 2; write(x); end"), "11\n");
}

#[test]
fn while_loop_counts_up() {
    assert_eq!(
        run("program p; vars i: integer; begin i = 0; while (i < 3) do { write(i); i = i + 1; }; end"),
        "0\n1\n2\n"
    );
}

#[test]
fn if_else_branches_on_string_output() {
    assert_eq!(
        run("program p; vars x: integer; begin x = 2; if (x > 0) { write(\"pos\"); } else { write(\"neg\"); }; end"),
        "pos\n"
    );
}

#[test]
fn recursive_fibonacci() {
    let src = "program p; \
         integer fib(n: integer) { { if (n < 2) { return n; }; return fib(n - 1) + fib(n - 2); } }; \
         vars x: integer; \
         begin x = fib(5); write(x); end";
    assert_eq!(run(src), "5\n");
}

#[test]
fn type_mismatch_assigning_a_comparison_result_to_an_integer() {
    let err = run_err("program p; vars x: integer; begin x = (1 < 2); end");
    assert!(matches!(err, PatitoError::Semantic(_)));
    assert!(err.to_string().contains("type-mismatch"));
}

#[test]
fn returning_a_value_from_a_void_function_is_rejected() {
    let err = run_err("program p; void hi() { { return 1; } }; begin hi(); end");
    assert!(matches!(err, PatitoError::Semantic(_)));
    assert!(err.to_string().contains("return-value-in-void"));
}

#[test]
fn functions_with_multiple_parameters_and_locals() {
    let src = "program p; \
         integer add(a: integer, b: integer) { vars t: integer; { t = a + b; return t; } }; \
         vars x: integer; \
         begin x = add(3, 4); write(x); end";
    assert_eq!(run(src), "7\n");
}

#[test]
fn void_function_with_side_effects_only() {
    let src = "program p; \
         void greet() { { write(\"hi\"); } }; \
         begin greet(); greet(); end";
    assert_eq!(run(src), "hi\nhi\n");
}

#[test]
fn float_promotion_in_mixed_arithmetic() {
    assert_eq!(
        run("program p; vars x: float; begin x = 1 + 2.5; write(x); end"),
        "3.5\n"
    );
}

#[test]
fn undeclared_function_call_is_a_semantic_error() {
    let err = run_err("program p; begin mystery(); end");
    assert!(matches!(err, PatitoError::Semantic(_)));
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = run_err("program p; vars x: integer; begin x = 1 / 0; end");
    assert!(matches!(err, PatitoError::Runtime(_)));
}
