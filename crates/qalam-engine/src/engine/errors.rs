// crates/qalam-engine/src/engine/errors.rs

use thiserror::Error;

use crate::lexer::SyntaxError;

/// Errors raised while executing a document. Every located variant renders
/// as `message (file:line)`; `@error` output and propagated nested errors
/// already carry what they need.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("{message} ({file}:{line})")]
    Expression {
        message: String,
        file: String,
        line: u32,
    },

    #[error("Macro \"{name}\" is already declared at {first_file}:{first_line} ({file}:{line})")]
    MacroAlreadyDeclared {
        name: String,
        first_file: String,
        first_line: u32,
        file: String,
        line: u32,
    },

    #[error("{message} ({file}:{line})")]
    SourceInclusion {
        message: String,
        file: String,
        line: u32,
    },

    #[error("Maximum execution depth of {limit} reached ({file}:{line})")]
    MaxDepth {
        limit: usize,
        file: String,
        line: u32,
    },

    /// Raised by `@error`; the message is the evaluated directive argument.
    #[error("{message}")]
    UserDefined { message: String },

    /// An error from nested execution (inline include or macro call),
    /// already carrying its own location.
    #[error("{message}")]
    Propagated { message: String },

    /// Filesystem failures from the file-level helpers.
    #[error("{0}")]
    Runtime(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
