pub mod api;
pub mod engine;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod reader;
pub mod scope;
pub mod value;

pub use api::{expand_file, expand_string, expand_string_with_vars};
pub use engine::{
    default_builtins, BuiltinFn, Engine, EngineError, EngineOptions, EngineResult, Execution,
    IncludeRecord,
};
pub use expr::{EvalHost, ExprError};
pub use lexer::SyntaxError;
pub use reader::{
    content_digest, file_label, ContentCache, NoCache, PathInfo, ReadError, Reader, RepoInfo,
};
pub use scope::Scope;
pub use value::{FunctionRef, Value};
