// crates/qalam-engine/src/expr/tests.rs

use pretty_assertions::assert_eq;

use super::eval::NullHost;
use super::{evaluate_str, parse_expression, parse_macro_call, parse_macro_declaration, ExprError};
use crate::scope::Scope;
use crate::value::Value;

fn eval(input: &str) -> Result<Value, ExprError> {
    evaluate_str(input, &Scope::new("main", "main"), &mut NullHost)
}

fn eval_ok(input: &str) -> Value {
    eval(input).unwrap()
}

#[test]
fn test_arithmetic_with_precedence() {
    assert_eq!(eval_ok("156*4+3"), Value::Number(627.0));
    assert_eq!(eval_ok("(256 - 128) / 2"), Value::Number(64.0));
    assert_eq!(eval_ok("2 + 3 * 4"), Value::Number(14.0));
    assert_eq!(eval_ok("10 % 3"), Value::Number(1.0));
    assert_eq!(eval_ok("-2 * -3"), Value::Number(6.0));
    assert_eq!(eval_ok("1 + 2 == 3"), Value::Bool(true));
}

#[test]
fn test_division_by_zero_is_an_error() {
    assert_eq!(eval("1 / 0"), Err(ExprError::DivisionByZero));
    assert_eq!(eval("5 % 0"), Err(ExprError::DivisionByZero));
    assert_eq!(eval("1 / (2 - 2)"), Err(ExprError::DivisionByZero));
}

#[test]
fn test_string_concatenation_and_coercion() {
    assert_eq!(eval_ok("\"ab\" + \"cd\""), Value::Str("abcd".into()));
    assert_eq!(eval_ok("\"v\" + 2"), Value::Str("v2".into()));
    assert_eq!(eval_ok("\"5\" * \"2\""), Value::Number(10.0));
    assert_eq!(eval_ok("\"5\" == 5"), Value::Bool(true));
    assert_eq!(eval_ok("\"b\" > \"a\""), Value::Bool(true));
    assert_eq!(eval_ok("\"10\" > 9"), Value::Bool(true));
}

#[test]
fn test_logical_operators_yield_operands() {
    assert_eq!(eval_ok("0 || \"fallback\""), Value::Str("fallback".into()));
    assert_eq!(eval_ok("\"x\" || \"y\""), Value::Str("x".into()));
    assert_eq!(eval_ok("1 && 2"), Value::Number(2.0));
    assert_eq!(eval_ok("0 && 2"), Value::Number(0.0));
}

#[test]
fn test_logical_operators_short_circuit() {
    // The untaken side would divide by zero if it were evaluated.
    assert_eq!(eval_ok("1 || 1/0"), Value::Number(1.0));
    assert_eq!(eval_ok("0 && 1/0"), Value::Number(0.0));
    assert_eq!(eval_ok("true ? 7 : 1/0"), Value::Number(7.0));
    assert_eq!(eval_ok("false ? 1/0 : 7"), Value::Number(7.0));
}

#[test]
fn test_ternary_is_right_associative() {
    assert_eq!(eval_ok("false ? 1 : false ? 2 : 3"), Value::Number(3.0));
    assert_eq!(eval_ok("true ? false ? 1 : 2 : 3"), Value::Number(2.0));
}

#[test]
fn test_unbound_identifiers_are_null() {
    assert_eq!(eval_ok("no_such_name"), Value::Null);
    assert_eq!(eval_ok("no_such_name == null"), Value::Bool(true));
    assert_eq!(eval_ok("!no_such_name"), Value::Bool(true));
}

#[test]
fn test_environment_variables_resolve_as_strings() {
    // SAFETY: test-local variable name, no concurrent reader cares.
    unsafe { std::env::set_var("QALAM_EXPR_TEST_VAR", "from-env") };
    assert_eq!(
        eval_ok("QALAM_EXPR_TEST_VAR"),
        Value::Str("from-env".into())
    );
}

#[test]
fn test_member_access_and_methods() {
    assert_eq!(eval_ok("\"abc\".length"), Value::Number(3.0));
    assert_eq!(eval_ok("\"abc\".toUpperCase()"), Value::Str("ABC".into()));
    assert_eq!(eval_ok("\"  x \".trim()"), Value::Str("x".into()));
    assert_eq!(eval_ok("[1, 2, 3].length"), Value::Number(3.0));
    assert_eq!(eval_ok("[1, 2, 3][1]"), Value::Number(2.0));
    assert_eq!(eval_ok("[\"a\", \"b\"].join(\"-\")"), Value::Str("a-b".into()));
    assert_eq!(eval_ok("\"a,b,c\".split(\",\").length"), Value::Number(3.0));
    assert_eq!(eval_ok("\"hello\".indexOf(\"llo\")"), Value::Number(2.0));
    assert_eq!(eval_ok("\"hello\".slice(-3)"), Value::Str("llo".into()));
    assert_eq!(eval_ok("(1/3).toFixed(2)"), Value::Str("0.33".into()));
}

#[test]
fn test_member_errors() {
    assert_eq!(
        eval("missing.prop"),
        Err(ExprError::Eval(
            "Cannot read property \"prop\" of null".into()
        ))
    );
    assert_eq!(
        eval("\"abc\".unknown"),
        Err(ExprError::Eval("Property \"unknown\" is not defined".into()))
    );
    assert_eq!(
        eval("[1][5]"),
        Err(ExprError::Eval("Property \"5\" is not defined".into()))
    );
}

#[test]
fn test_calling_an_unknown_function_is_an_error() {
    assert_eq!(
        eval("nope(1)"),
        Err(ExprError::UndefinedFunction("nope".into()))
    );
    assert_eq!(
        eval("\"x\".frobnicate()"),
        Err(ExprError::UndefinedFunction("frobnicate".into()))
    );
}

#[test]
fn test_defined_requires_a_bare_identifier() {
    assert_eq!(eval_ok("defined(anything)"), Value::Bool(false));
    assert_eq!(eval_ok("defined(__FILE__)"), Value::Bool(true));
    assert!(matches!(eval("defined(\"x\")"), Err(ExprError::Syntax(_))));
    assert!(matches!(eval("defined(a.b)"), Err(ExprError::Syntax(_))));
    assert!(matches!(eval("defined(a, b)"), Err(ExprError::Syntax(_))));
}

#[test]
fn test_rejected_syntax() {
    assert!(matches!(eval("`tpl`"), Err(ExprError::Syntax(_))));
    assert_eq!(
        eval("this.x"),
        Err(ExprError::Syntax("\"this\" is not supported".into()))
    );
    assert!(matches!(eval("\"a\" \"b\""), Err(ExprError::Syntax(_))));
    assert!(matches!(eval("1 +"), Err(ExprError::Syntax(_))));
    assert!(matches!(eval("a = 1"), Err(ExprError::Syntax(_))));
    assert!(matches!(eval(""), Err(ExprError::Syntax(_))));
}

#[test]
fn test_filters_desugar_to_calls() {
    let expr = parse_expression("name | upper").unwrap();
    let direct = parse_expression("upper(name)").unwrap();
    assert_eq!(expr, direct);

    let expr = parse_expression("x | pad(3, \"0\")").unwrap();
    let direct = parse_expression("pad(x, 3, \"0\")").unwrap();
    assert_eq!(expr, direct);

    // Left-associative chains nest outward.
    let expr = parse_expression("x | f | g").unwrap();
    let direct = parse_expression("g(f(x))").unwrap();
    assert_eq!(expr, direct);
}

#[test]
fn test_filter_binds_between_comparison_and_addition() {
    let piped = parse_expression("1 + 2 | f").unwrap();
    let direct = parse_expression("f(1 + 2)").unwrap();
    assert_eq!(piped, direct);

    let compared = parse_expression("x | f == 3").unwrap();
    let direct = parse_expression("f(x) == 3").unwrap();
    assert_eq!(compared, direct);
}

#[test]
fn test_macro_declarations_parse_names_and_params() {
    assert_eq!(
        parse_macro_declaration("greet(name, polite)").unwrap(),
        ("greet".to_string(), vec!["name".to_string(), "polite".to_string()])
    );
    assert_eq!(
        parse_macro_declaration("nullary()").unwrap(),
        ("nullary".to_string(), vec![])
    );
    let err = parse_macro_declaration("greet(1)").unwrap_err();
    assert_eq!(err.to_string(), "Syntax error in macro declaration");
    assert!(parse_macro_declaration("not a call").is_err());
    assert!(parse_macro_declaration("obj.method(x)").is_err());
}

#[test]
fn test_macro_call_recognition_is_conservative() {
    let known = |n: &str| n == "greet";
    let (name, args) = parse_macro_call("greet(\"world\")", known).unwrap();
    assert_eq!(name, "greet");
    assert_eq!(args.len(), 1);

    assert!(parse_macro_call("other(1)", known).is_none());
    assert!(parse_macro_call("\"plain string\"", known).is_none());
    assert!(parse_macro_call("greet", known).is_none());
    assert!(parse_macro_call("greet(", known).is_none());
}
