// crates/qalam-engine/src/expr/eval.rs

use std::cmp::Ordering;

use super::parser::{parse_expression, BinOp, Expr, LogicalOp, Prop, UnaryOp};
use super::ExprError;
use crate::scope::Scope;
use crate::value::{format_number, FunctionRef, Value};

/// Engine-side services the evaluator needs beyond local bindings: the
/// global store and function dispatch (builtins, macros, inline includes).
pub trait EvalHost {
    /// Look up a name in the global store.
    fn global(&self, name: &str) -> Option<Value>;

    /// True if the name is bound in the global store (for `defined()`).
    fn is_global(&self, name: &str) -> bool;

    /// Invoke a callable with already-evaluated arguments.
    fn call(
        &mut self,
        func: &FunctionRef,
        args: Vec<Value>,
        scope: &Scope,
    ) -> Result<Value, ExprError>;
}

/// Host with no globals and nothing callable; enough for pure expressions.
#[derive(Debug, Default)]
pub struct NullHost;

impl EvalHost for NullHost {
    fn global(&self, _name: &str) -> Option<Value> {
        None
    }

    fn is_global(&self, _name: &str) -> bool {
        false
    }

    fn call(
        &mut self,
        func: &FunctionRef,
        _args: Vec<Value>,
        _scope: &Scope,
    ) -> Result<Value, ExprError> {
        Err(ExprError::UndefinedFunction(func.name().to_string()))
    }
}

/// Parse and evaluate in one step.
pub fn evaluate_str<H: EvalHost>(
    input: &str,
    scope: &Scope,
    host: &mut H,
) -> Result<Value, ExprError> {
    let expr = parse_expression(input)?;
    evaluate(&expr, scope, host)
}

pub fn evaluate<H: EvalHost>(
    expr: &Expr,
    scope: &Scope,
    host: &mut H,
) -> Result<Value, ExprError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => Ok(resolve(name, scope, host)),
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(evaluate(item, scope, host)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, scope, host)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!v.is_truthy()),
                UnaryOp::Neg => Value::Number(-v.as_number()),
                UnaryOp::Pos => Value::Number(v.as_number()),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = evaluate(lhs, scope, host)?;
            let r = evaluate(rhs, scope, host)?;
            binary(*op, l, r)
        }
        Expr::Logical { op, lhs, rhs } => {
            let l = evaluate(lhs, scope, host)?;
            match op {
                // Both operators yield the deciding operand, not a boolean,
                // and never evaluate the other side when decided.
                LogicalOp::And => {
                    if l.is_truthy() {
                        evaluate(rhs, scope, host)
                    } else {
                        Ok(l)
                    }
                }
                LogicalOp::Or => {
                    if l.is_truthy() {
                        Ok(l)
                    } else {
                        evaluate(rhs, scope, host)
                    }
                }
            }
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if evaluate(cond, scope, host)?.is_truthy() {
                evaluate(then, scope, host)
            } else {
                evaluate(otherwise, scope, host)
            }
        }
        Expr::Member { owner, prop } => {
            let owner_val = evaluate(owner, scope, host)?;
            match prop {
                Prop::Name(name) => member_by_name(&owner_val, name),
                Prop::Index(index) => {
                    let key = evaluate(index, scope, host)?.to_output_string();
                    member_by_name(&owner_val, &key)
                }
            }
        }
        Expr::Call { callee, args } => eval_call(callee, args, scope, host),
    }
}

/// Identifier resolution: locals, then the global store, then process
/// environment variables. Unbound names are null, never an error.
fn resolve<H: EvalHost>(name: &str, scope: &Scope, host: &H) -> Value {
    if let Some(v) = scope.lookup(name) {
        return v;
    }
    if let Some(v) = host.global(name) {
        return v;
    }
    if let Ok(s) = std::env::var(name) {
        return Value::Str(s);
    }
    Value::Null
}

fn eval_args<H: EvalHost>(
    args: &[Expr],
    scope: &Scope,
    host: &mut H,
) -> Result<Vec<Value>, ExprError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(evaluate(arg, scope, host)?);
    }
    Ok(values)
}

fn eval_call<H: EvalHost>(
    callee: &Expr,
    args: &[Expr],
    scope: &Scope,
    host: &mut H,
) -> Result<Value, ExprError> {
    if let Expr::Ident(name) = callee {
        // defined() is syntactic: its argument is inspected, not evaluated.
        if name == "defined" {
            let [Expr::Ident(target)] = args else {
                return Err(ExprError::Syntax(
                    "defined() takes a single identifier argument".to_string(),
                ));
            };
            return Ok(Value::Bool(scope.is_bound(target) || host.is_global(target)));
        }
        return match resolve(name, scope, host) {
            Value::Function(func) => {
                let values = eval_args(args, scope, host)?;
                host.call(&func, values, scope)
            }
            _ => Err(ExprError::UndefinedFunction(name.clone())),
        };
    }
    if let Expr::Member {
        owner,
        prop: Prop::Name(method),
    } = callee
    {
        let owner_val = evaluate(owner, scope, host)?;
        // A member holding a function wins over the built-in method table.
        if let Ok(Value::Function(func)) = member_by_name(&owner_val, method) {
            let values = eval_args(args, scope, host)?;
            return host.call(&func, values, scope);
        }
        let values = eval_args(args, scope, host)?;
        return call_method(&owner_val, method, &values);
    }
    match evaluate(callee, scope, host)? {
        Value::Function(func) => {
            let values = eval_args(args, scope, host)?;
            host.call(&func, values, scope)
        }
        _ => Err(ExprError::Eval("Expression is not callable".to_string())),
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    match op {
        BinOp::Add => {
            if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
                Ok(Value::Str(format!(
                    "{}{}",
                    lhs.to_output_string(),
                    rhs.to_output_string()
                )))
            } else {
                Ok(Value::Number(lhs.as_number() + rhs.as_number()))
            }
        }
        BinOp::Sub => Ok(Value::Number(lhs.as_number() - rhs.as_number())),
        BinOp::Mul => Ok(Value::Number(lhs.as_number() * rhs.as_number())),
        BinOp::Div | BinOp::Rem => {
            let divisor = rhs.as_number();
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let dividend = lhs.as_number();
            Ok(Value::Number(if op == BinOp::Div {
                dividend / divisor
            } else {
                dividend % divisor
            }))
        }
        BinOp::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
        BinOp::Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
        BinOp::Lt => Ok(Value::Bool(matches!(
            lhs.compare(&rhs),
            Some(Ordering::Less)
        ))),
        BinOp::Gt => Ok(Value::Bool(matches!(
            lhs.compare(&rhs),
            Some(Ordering::Greater)
        ))),
        BinOp::Le => Ok(Value::Bool(matches!(
            lhs.compare(&rhs),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinOp::Ge => Ok(Value::Bool(matches!(
            lhs.compare(&rhs),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
    }
}

fn undefined_property(name: &str) -> ExprError {
    ExprError::Eval(format!("Property \"{name}\" is not defined"))
}

/// Property access. Reading through null is an error naming the property,
/// as is an undefined property or out-of-range index on a defined owner.
fn member_by_name(owner: &Value, name: &str) -> Result<Value, ExprError> {
    match owner {
        Value::Null => Err(ExprError::Eval(format!(
            "Cannot read property \"{name}\" of null"
        ))),
        Value::Object(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| undefined_property(name)),
        Value::Array(items) => match name {
            "length" => Ok(Value::Number(items.len() as f64)),
            _ => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| undefined_property(name)),
        },
        Value::Str(s) => match name {
            "length" => Ok(Value::Number(s.chars().count() as f64)),
            _ => name
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| undefined_property(name)),
        },
        _ => Err(undefined_property(name)),
    }
}

fn str_arg(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::to_output_string).unwrap_or_default()
}

fn num_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map(Value::as_number).unwrap_or(f64::NAN)
}

fn norm_slice_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as f64).min(len as f64) as usize
    }
}

fn clamp_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        0
    } else {
        n.clamp(0.0, len as f64) as usize
    }
}

/// Method dispatch on values: the usual script string/number/array methods.
pub fn call_method(owner: &Value, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    if let Value::Null = owner {
        return Err(ExprError::Eval(format!(
            "Cannot read property \"{name}\" of null"
        )));
    }
    if name == "toString" {
        return Ok(Value::Str(owner.to_output_string()));
    }
    match owner {
        Value::Str(s) => str_method(s, name, args),
        Value::Number(n) => num_method(*n, name, args),
        Value::Array(items) => array_method(items, name, args),
        _ => Err(ExprError::UndefinedFunction(name.to_string())),
    }
}

fn str_method(s: &str, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let result = match name {
        "toUpperCase" => Value::Str(s.to_uppercase()),
        "toLowerCase" => Value::Str(s.to_lowercase()),
        "trim" => Value::Str(s.trim().to_string()),
        "trimStart" => Value::Str(s.trim_start().to_string()),
        "trimEnd" => Value::Str(s.trim_end().to_string()),
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None => vec![Value::Str(s.to_string())],
                Some(sep) => {
                    let sep = sep.to_output_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::Str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str())
                            .map(|p| Value::Str(p.to_string()))
                            .collect()
                    }
                }
            };
            Value::Array(parts)
        }
        "replace" => {
            let from = str_arg(args, 0);
            let to = str_arg(args, 1);
            Value::Str(s.replacen(from.as_str(), &to, 1))
        }
        "replaceAll" => {
            let from = str_arg(args, 0);
            let to = str_arg(args, 1);
            if from.is_empty() {
                Value::Str(s.to_string())
            } else {
                Value::Str(s.replace(from.as_str(), &to))
            }
        }
        "substring" => {
            let len = s.chars().count();
            let mut a = clamp_index(num_arg(args, 0), len);
            let mut b = match args.get(1) {
                Some(v) => clamp_index(v.as_number(), len),
                None => len,
            };
            if a > b {
                std::mem::swap(&mut a, &mut b);
            }
            Value::Str(s.chars().skip(a).take(b - a).collect())
        }
        "slice" => {
            let len = s.chars().count();
            let a = norm_slice_index(num_arg(args, 0), len);
            let b = match args.get(1) {
                Some(v) => norm_slice_index(v.as_number(), len),
                None => len,
            };
            if a >= b {
                Value::Str(String::new())
            } else {
                Value::Str(s.chars().skip(a).take(b - a).collect())
            }
        }
        "indexOf" => {
            let needle = str_arg(args, 0);
            match s.find(needle.as_str()) {
                Some(byte) => Value::Number(s[..byte].chars().count() as f64),
                None => Value::Number(-1.0),
            }
        }
        "includes" => Value::Bool(s.contains(str_arg(args, 0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(str_arg(args, 0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(str_arg(args, 0).as_str())),
        "charAt" => {
            let n = num_arg(args, 0);
            let n = if n.is_nan() { 0.0 } else { n };
            if n < 0.0 {
                Value::Str(String::new())
            } else {
                Value::Str(
                    s.chars()
                        .nth(n as usize)
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                )
            }
        }
        "repeat" => {
            let n = num_arg(args, 0);
            if n.is_nan() || n < 0.0 {
                return Err(ExprError::BadCall(
                    "repeat() count must be a non-negative number".to_string(),
                ));
            }
            Value::Str(s.repeat(n as usize))
        }
        "padStart" | "padEnd" => {
            let target = num_arg(args, 0);
            let pad = match args.get(1) {
                Some(v) => v.to_output_string(),
                None => " ".to_string(),
            };
            let len = s.chars().count();
            if target.is_nan() || (target as usize) <= len || pad.is_empty() {
                Value::Str(s.to_string())
            } else {
                let want = target as usize - len;
                let mut fill = String::new();
                while fill.chars().count() < want {
                    fill.push_str(&pad);
                }
                let fill: String = fill.chars().take(want).collect();
                if name == "padStart" {
                    Value::Str(format!("{fill}{s}"))
                } else {
                    Value::Str(format!("{s}{fill}"))
                }
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for arg in args {
                out.push_str(&arg.to_output_string());
            }
            Value::Str(out)
        }
        _ => return Err(ExprError::UndefinedFunction(name.to_string())),
    };
    Ok(result)
}

fn num_method(n: f64, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "toFixed" => {
            let digits = num_arg(args, 0);
            let digits = if digits.is_nan() {
                0
            } else {
                digits.clamp(0.0, 100.0) as usize
            };
            Ok(Value::Str(format!("{n:.digits$}")))
        }
        _ => Err(ExprError::UndefinedFunction(name.to_string())),
    }
}

fn array_method(items: &[Value], name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let result = match name {
        "join" => {
            let sep = match args.first() {
                Some(v) => v.to_output_string(),
                None => ",".to_string(),
            };
            Value::Str(
                items
                    .iter()
                    .map(Value::to_output_string)
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "includes" => {
            let needle = args.first().cloned().unwrap_or(Value::Null);
            Value::Bool(items.iter().any(|v| v.loose_eq(&needle)))
        }
        "indexOf" => {
            let needle = args.first().cloned().unwrap_or(Value::Null);
            match items.iter().position(|v| v.loose_eq(&needle)) {
                Some(i) => Value::Number(i as f64),
                None => Value::Number(-1.0),
            }
        }
        "slice" => {
            let len = items.len();
            let a = norm_slice_index(num_arg(args, 0), len);
            let b = match args.get(1) {
                Some(v) => norm_slice_index(v.as_number(), len),
                None => len,
            };
            if a >= b {
                Value::Array(Vec::new())
            } else {
                Value::Array(items[a..b].to_vec())
            }
        }
        "concat" => {
            let mut out = items.to_vec();
            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        _ => return Err(ExprError::UndefinedFunction(name.to_string())),
    };
    Ok(result)
}
