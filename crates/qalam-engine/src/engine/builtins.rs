// crates/qalam-engine/src/engine/builtins.rs

use std::collections::HashMap;

use crate::expr::eval::call_method;
use crate::expr::ExprError;
use crate::value::Value;

/// A pure builtin: evaluated arguments in, value out. `include` is not in
/// this table because it needs session state; the engine dispatches it
/// itself.
pub type BuiltinFn = fn(&[Value]) -> Result<Value, ExprError>;

/// The standard library available to every document.
pub fn default_builtins() -> HashMap<String, BuiltinFn> {
    let mut table: HashMap<String, BuiltinFn> = HashMap::new();
    table.insert("abs".into(), builtin_abs);
    table.insert("min".into(), builtin_min);
    table.insert("max".into(), builtin_max);
    table.insert("upper".into(), builtin_upper);
    table.insert("lower".into(), builtin_lower);
    table.insert("capitalize".into(), builtin_capitalize);
    table.insert("trim".into(), builtin_trim);
    table.insert("length".into(), builtin_length);
    table.insert("split".into(), builtin_split);
    table.insert("join".into(), builtin_join);
    table.insert("replace".into(), builtin_replace);
    table.insert("substring".into(), builtin_substring);
    table.insert("contains".into(), builtin_contains);
    table.insert("repeat".into(), builtin_repeat);
    table
}

fn require(args: &[Value], count: usize, name: &str) -> Result<(), ExprError> {
    if args.len() < count {
        let plural = if count == 1 { "" } else { "s" };
        return Err(ExprError::BadCall(format!(
            "{name}() takes at least {count} argument{plural}"
        )));
    }
    Ok(())
}

fn builtin_abs(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "abs")?;
    Ok(Value::Number(args[0].as_number().abs()))
}

fn builtin_min(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "min")?;
    let mut best = f64::INFINITY;
    for arg in args {
        let n = arg.as_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.min(n);
    }
    Ok(Value::Number(best))
}

fn builtin_max(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "max")?;
    let mut best = f64::NEG_INFINITY;
    for arg in args {
        let n = arg.as_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.max(n);
    }
    Ok(Value::Number(best))
}

fn builtin_upper(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "upper")?;
    Ok(Value::Str(args[0].to_output_string().to_uppercase()))
}

fn builtin_lower(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "lower")?;
    Ok(Value::Str(args[0].to_output_string().to_lowercase()))
}

fn builtin_capitalize(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "capitalize")?;
    let text = args[0].to_output_string();
    let mut chars = text.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::Str(capitalized))
}

fn builtin_trim(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "trim")?;
    Ok(Value::Str(args[0].to_output_string().trim().to_string()))
}

fn builtin_length(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "length")?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::Array(items) => Ok(Value::Number(items.len() as f64)),
        Value::Object(map) => Ok(Value::Number(map.len() as f64)),
        other => Err(ExprError::BadCall(format!(
            "length() takes a string or an array, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_split(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 2, "split")?;
    let owner = Value::Str(args[0].to_output_string());
    call_method(&owner, "split", &args[1..])
}

fn builtin_join(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 1, "join")?;
    match &args[0] {
        Value::Array(_) => call_method(&args[0], "join", &args[1..]),
        other => Err(ExprError::BadCall(format!(
            "join() takes an array, got {}",
            other.type_name()
        ))),
    }
}

/// Replaces every occurrence, unlike the `.replace` method which stops at
/// the first one.
fn builtin_replace(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 3, "replace")?;
    let owner = Value::Str(args[0].to_output_string());
    call_method(&owner, "replaceAll", &args[1..])
}

fn builtin_substring(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 2, "substring")?;
    let owner = Value::Str(args[0].to_output_string());
    call_method(&owner, "slice", &args[1..])
}

fn builtin_contains(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 2, "contains")?;
    match &args[0] {
        Value::Array(items) => Ok(Value::Bool(items.iter().any(|v| v.loose_eq(&args[1])))),
        other => {
            let haystack = other.to_output_string();
            let needle = args[1].to_output_string();
            Ok(Value::Bool(haystack.contains(&needle)))
        }
    }
}

fn builtin_repeat(args: &[Value]) -> Result<Value, ExprError> {
    require(args, 2, "repeat")?;
    let owner = Value::Str(args[0].to_output_string());
    call_method(&owner, "repeat", &args[1..])
}
