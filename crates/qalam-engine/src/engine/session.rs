// crates/qalam-engine/src/engine/session.rs

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::parser::Statement;
use crate::value::Value;

/// A registered macro: declaration site, parameters and body.
#[derive(Debug, Clone)]
pub(crate) struct MacroDef {
    pub file: Rc<str>,
    pub path: Rc<str>,
    pub line: u32,
    pub params: Vec<String>,
    pub body: Rc<[Statement]>,
}

impl MacroDef {
    /// Bind arguments by position. Missing parameters become null, extra
    /// arguments are dropped.
    pub fn bind(&self, args: Vec<Value>) -> HashMap<String, Value> {
        let mut frame = HashMap::new();
        let mut args = args.into_iter();
        for param in &self.params {
            frame.insert(param.clone(), args.next().unwrap_or(Value::Null));
        }
        frame
    }
}

/// Where an inclusion happened, kept for duplicate-content diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct Site {
    pub locator: String,
    pub file: Rc<str>,
    pub line: u32,
}

/// One resolved inclusion, reported so callers can pin versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRecord {
    pub locator: String,
    pub digest: String,
    pub remote: bool,
}

/// Mutable state of a single document run: the global store, the macro
/// registry, inclusion tracking and recursion depth. A fresh session is
/// created per `execute`, so nothing leaks between runs.
#[derive(Debug)]
pub(crate) struct Session {
    pub globals: HashMap<String, Value>,
    pub macros: HashMap<String, MacroDef>,
    pub included: HashSet<String>,
    pub seen_content: HashMap<String, Site>,
    pub includes: Vec<IncludeRecord>,
    pub depth: usize,
}

impl Session {
    pub fn new(library: &HashMap<String, Value>, vars: &HashMap<String, Value>) -> Self {
        let mut globals = library.clone();
        for (name, value) in vars {
            globals.insert(name.clone(), value.clone());
        }
        Session {
            globals,
            macros: HashMap::new(),
            included: HashSet::new(),
            seen_content: HashMap::new(),
            includes: Vec::new(),
            depth: 0,
        }
    }

    pub fn into_execution(self, output: String) -> Execution {
        Execution {
            output,
            globals: self.globals,
            includes: self.includes,
        }
    }
}

/// Result of a full document run.
#[derive(Debug)]
pub struct Execution {
    pub output: String,
    /// Final global store, including builtin and macro bindings.
    pub globals: HashMap<String, Value>,
    /// Every source actually included, in inclusion order.
    pub includes: Vec<IncludeRecord>,
}
