// crates/qalam-engine/src/engine/tests/test_exec.rs

use pretty_assertions::assert_eq;

use super::test_utils::{run, run_err};
use crate::engine::{Engine, EngineOptions};
use crate::value::Value;

#[test]
fn test_plain_text_passes_through_unchanged() {
    let source = "plain line\n  indented line\n\nlast line without newline";
    assert_eq!(run(source), source);
}

#[test]
fn test_crlf_terminators_are_preserved() {
    let source = "one\r\ntwo\r\nthree\n";
    assert_eq!(run(source), source);
}

#[test]
fn test_inline_expressions_substitute() {
    assert_eq!(run("2 + 2 = @{2 + 2}\n"), "2 + 2 = 4\n");
    assert_eq!(run("@{'a'}@{'b'}@{'c'}\n"), "abc\n");
}

#[test]
fn test_number_formatting_in_output() {
    assert_eq!(run("@{8 / 2} and @{10 / 4}\n"), "4 and 2.5\n");
}

#[test]
fn test_null_renders_as_empty() {
    assert_eq!(run("[@{undefined_name}]\n"), "[]\n");
}

#[test]
fn test_set_then_read() {
    assert_eq!(run("@set greeting \"hi\"\n@{greeting} there\n"), "hi there\n");
}

#[test]
fn test_set_accepts_equals_sign() {
    assert_eq!(run("@set x = 5\n@set y x * 2\n@{y}\n"), "10\n");
}

#[test]
fn test_comment_lines_produce_nothing() {
    assert_eq!(run("first\n@ this is a comment\n@\nsecond\n"), "first\nsecond\n");
}

#[test]
fn test_email_addresses_are_not_directives() {
    let source = "write to user@example.com\n";
    assert_eq!(run(source), source);
}

#[test]
fn test_error_directive_stops_with_message() {
    assert_eq!(run_err("ok\n@error \"boom \" + 42\nnever\n"), "boom 42");
}

#[test]
fn test_warning_directive_continues() {
    assert_eq!(run("a\n@warning \"heads up\"\nb\n"), "a\nb\n");
}

#[test]
fn test_expression_errors_carry_the_site() {
    assert_eq!(
        run_err("fine\nfine\n@{missing()}\n"),
        "Function \"missing\" is not defined (main:3)"
    );
    assert_eq!(run_err("@set x 1 / 0\n"), "Division by zero (main:1)");
}

#[test]
fn test_directive_comments_are_stripped() {
    assert_eq!(run("@set x 3 // chosen by fair dice roll\n@{x}\n"), "3\n");
    assert_eq!(run("@set url \"https://a/b\" // not a comment inside\n@{url}\n"), "https://a/b\n");
}

#[test]
fn test_execution_reports_final_globals() {
    let engine = Engine::new(EngineOptions::default());
    let execution = engine.execute("@set answer 42\n", "main").unwrap();
    assert_eq!(execution.globals.get("answer"), Some(&Value::Number(42.0)));
    assert_eq!(execution.output, "");
}

#[test]
fn test_predefined_vars_are_visible() {
    let mut engine = Engine::new(EngineOptions::default());
    engine.define("version", Value::Str("1.2.3".into()));
    assert_eq!(
        engine.execute("v@{version}\n", "main").unwrap().output,
        "v1.2.3\n"
    );
}

#[test]
fn test_builtins_are_callable_from_documents() {
    assert_eq!(run("@{upper(\"abc\")} @{min(3, 1, 2)}\n"), "ABC 1\n");
    assert_eq!(run("@{\"a-b\" | replace(\"-\", \"+\")}\n"), "a+b\n");
}

#[test]
fn test_builtin_argument_errors_are_located() {
    assert_eq!(
        run_err("@{length(5)}\n"),
        "length() takes a string or an array, got number (main:1)"
    );
}
