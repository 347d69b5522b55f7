// crates/qalam-engine/src/expr/mod.rs

//! The expression language behind `@{...}` sites, directive conditions and
//! `@set` values: script-style literals, loose comparisons, `?:`, `||`/`&&`,
//! member access, calls and the `value | filter` shorthand.

pub mod eval;
pub mod parser;
pub mod scanner;

#[cfg(test)]
mod tests;

use thiserror::Error;

pub use eval::{evaluate, evaluate_str, EvalHost, NullHost};
pub use parser::{
    parse_expression, parse_macro_call, parse_macro_declaration, BinOp, Expr, LogicalOp, Prop,
    UnaryOp,
};

/// Errors produced while scanning, parsing or evaluating an expression.
/// Messages carry no source location; the engine attaches `(file:line)`
/// when it wraps them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The text does not scan or parse as an expression.
    #[error("{0}")]
    Syntax(String),

    /// The expression parsed but could not be evaluated.
    #[error("{0}")]
    Eval(String),

    /// A call site named something that is not callable.
    #[error("Function \"{0}\" is not defined")]
    UndefinedFunction(String),

    /// A builtin or method was invoked with unusable arguments.
    #[error("{0}")]
    BadCall(String),

    #[error("Division by zero")]
    DivisionByZero,

    /// An error raised by nested execution (inline includes, macro bodies);
    /// the message already carries its own location.
    #[error("{0}")]
    Nested(String),
}
