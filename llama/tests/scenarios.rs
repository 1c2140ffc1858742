//! One end-to-end scenario per row of the source → compiled module → run table:
//! source text goes in, a global binding or a diagnostic class comes out.

use llama_core::diagnostics::{LogLevel, Status};
use llama_core::value::Value;
use llama_core::Logger;

fn compile_and_run(source: &str) -> Result<llama_vm::Vm, Status> {
    let mut log = Logger::new();
    log.set_recoverable(true);
    let module = llama_compiler::compile(source, &mut log)?;
    let mut vm = llama_vm::Vm::new(module);
    vm.log.set_recoverable(true);
    vm.run_main()?;
    Ok(vm)
}

#[test]
fn global_arithmetic_evaluates_with_precedence() {
    let vm = compile_and_run("var x = 1 + 2 * 3;").unwrap();
    assert_eq!(vm.global("x"), Some(&Value::Int(7)));
}

#[test]
fn while_loop_counts_to_three() {
    let vm = compile_and_run("var i = 0; while i < 3 { i = i + 1; }").unwrap();
    assert_eq!(vm.global("i"), Some(&Value::Int(3)));
}

#[test]
fn if_else_takes_the_true_branch() {
    let vm = compile_and_run("var r = 0; if 1 < 2 { r = 1; } else { r = 2; }").unwrap();
    assert_eq!(vm.global("r"), Some(&Value::Int(1)));
}

#[test]
fn function_call_returns_the_square() {
    let vm = compile_and_run("fn sq(x) { return x * x; } var r = sq(5);").unwrap();
    assert_eq!(vm.global("r"), Some(&Value::Int(25)));
}

#[test]
fn redeclared_global_is_a_compile_time_error() {
    let mut log = Logger::new();
    log.set_recoverable(true);
    let result = llama_compiler::compile("var x = 1; var x = 2;", &mut log);
    assert!(result.is_err());
    assert_eq!(log.last().unwrap().level, LogLevel::SyntaxError);
}

#[test]
fn reading_an_unknown_global_is_a_runtime_error() {
    let result = compile_and_run("var r = missing;");
    assert!(result.is_err());
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let result = compile_and_run("var r = 1 / 0;");
    assert!(result.is_err());
}

#[test]
fn a_malformed_number_literal_is_a_lex_error() {
    let mut log = Logger::new();
    log.set_recoverable(true);
    let result = llama_compiler::compile("var x = 1.2.3;", &mut log);
    assert!(result.is_err());
    assert_eq!(log.last().unwrap().level, LogLevel::SyntaxError);
}

#[test]
fn power_is_right_associative_and_unary_minus_binds_tighter() {
    let vm = compile_and_run("var a = 2 ** 3 ** 2; var b = -2 ** 2;").unwrap();
    assert_eq!(vm.global("a"), Some(&Value::Int(512)));
    // unary minus binds tighter than `**`, so this is (-2) ** 2, not -(2 ** 2).
    assert_eq!(vm.global("b"), Some(&Value::Int(4)));
}

#[test]
fn const_reassignment_is_rejected_at_compile_time() {
    let mut log = Logger::new();
    log.set_recoverable(true);
    let result = llama_compiler::compile("const x = 1; x = 2;", &mut log);
    assert!(result.is_err());
}

#[test]
fn class_and_for_statements_are_rejected() {
    let mut log = Logger::new();
    log.set_recoverable(true);
    assert!(llama_compiler::compile("class Foo { }", &mut log).is_err());

    let mut log = Logger::new();
    log.set_recoverable(true);
    assert!(llama_compiler::compile("for i in list { }", &mut log).is_err());
}

#[test]
fn a_verified_module_passes_llama_verify() {
    let mut log = Logger::new();
    log.set_recoverable(true);
    let module = llama_compiler::compile("fn sq(x) { return x * x; } var r = sq(5);", &mut log).unwrap();
    let report = llama_verify::Verifier::new(&module).verify().unwrap();
    assert_eq!(report.functions_checked, 2);
}
