// crates/qalam-engine/src/value.rs

use std::collections::BTreeMap;
use std::fmt;

/// A callable bound in the evaluation context. Builtins are engine-provided;
/// macros are looked up by name in the session registry at call time.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionRef {
    Builtin(String),
    Macro(String),
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        match self {
            FunctionRef::Builtin(name) => name,
            FunctionRef::Macro(name) => name,
        }
    }
}

/// A runtime value of the expression language. Numbers are always doubles;
/// `Null` also stands in for anything unbound.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Function(FunctionRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness for `@if`, `@while`, `&&`, `||` and `?:`. Empty strings,
    /// zero and NaN are false; arrays and objects are always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Numeric coercion: booleans count, numeric strings parse, everything
    /// else is NaN except null and the empty string, which are zero.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// Loose equality: same-typed operands compare structurally, mixed
    /// strings/numbers/booleans compare after numeric coercion, and null
    /// equals only null.
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Null, _) | (_, Null) => false,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Object(a), Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (Function(a), Function(b)) => a == b,
            (Array(_), _) | (_, Array(_)) => false,
            (Object(_), _) | (_, Object(_)) => false,
            (Function(_), _) | (_, Function(_)) => false,
            _ => {
                let (a, b) = (self.as_number(), other.as_number());
                !a.is_nan() && !b.is_nan() && a == b
            }
        }
    }

    /// Relational comparison: two strings compare lexicographically,
    /// anything else numerically. NaN on either side compares as nothing.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        self.as_number().partial_cmp(&other.as_number())
    }

    /// String form used when a value lands in the output document. Null
    /// renders as nothing, whole numbers without a decimal point.
    pub fn to_output_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_output_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => format!("[function {}]", f.name()),
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON form for snapshots; functions have no JSON shape and become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_output_string())
    }
}

/// Format a double the way the output document expects: `3` not `3.0`,
/// but `3.5` stays `3.5`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    // 2^53, the range where an f64 still holds exact integers.
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_numbers_format_without_decimal_point() {
        assert_eq!(format_number(627.0), "627");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_truthiness_follows_script_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::Str(" ".to_string()).is_truthy());
    }

    #[test]
    fn test_loose_equality_coerces_numbers_and_strings() {
        assert!(Value::Str("5".into()).loose_eq(&Value::Number(5.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Str("true".into()).loose_eq(&Value::Bool(true)));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        assert!(Value::Null.loose_eq(&Value::Null));
    }

    #[test]
    fn test_output_strings() {
        assert_eq!(Value::Null.to_output_string(), "");
        assert_eq!(
            Value::Array(vec![Value::Number(1.0), Value::Str("a".into())]).to_output_string(),
            "1,a"
        );
        assert_eq!(Value::Bool(false).to_output_string(), "false");
    }

    #[test]
    fn test_json_round_trip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, "x", null], "b": true}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
