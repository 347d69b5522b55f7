// crates/qalam-engine/src/scope.rs

use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Local bindings visible to expressions: the reserved location variables
/// plus a chain of frames holding macro parameters and loop bookkeeping.
/// Cloning is cheap; the frame chain is shared, and a fresh scope at the
/// current line is produced for every executed statement.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Rc<Vec<Rc<HashMap<String, Value>>>>,
    file: Rc<str>,
    path: Rc<str>,
    line: u32,
    inline: bool,
}

impl Scope {
    pub fn new(file: &str, path: &str) -> Self {
        Scope {
            frames: Rc::new(Vec::new()),
            file: Rc::from(file),
            path: Rc::from(path),
            line: 0,
            inline: false,
        }
    }

    /// Short file name used in diagnostics (`__FILE__`).
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Full locator of the current source (`__PATH__`).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// True inside `@{...}` captures, where markers are suppressed.
    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// The same bindings, repositioned at `line`.
    pub fn at_line(&self, line: u32) -> Scope {
        Scope {
            line,
            ..self.clone()
        }
    }

    pub fn as_inline(&self) -> Scope {
        Scope {
            inline: true,
            ..self.clone()
        }
    }

    /// Push a new innermost frame (macro parameters, loop variables).
    pub fn with_frame(&self, frame: HashMap<String, Value>) -> Scope {
        let mut frames = (*self.frames).clone();
        frames.push(Rc::new(frame));
        Scope {
            frames: Rc::new(frames),
            ..self.clone()
        }
    }

    /// Look up a local binding. Reserved location variables shadow frames,
    /// frames shadow each other innermost-first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "__FILE__" => return Some(Value::Str(self.file.to_string())),
            "__PATH__" => return Some(Value::Str(self.path.to_string())),
            "__LINE__" => return Some(Value::Number(self.line as f64)),
            "__INLINE__" => return Some(Value::Bool(self.inline)),
            _ => {}
        }
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Some(v.clone());
            }
        }
        None
    }

    pub fn is_bound(&self, name: &str) -> bool {
        matches!(name, "__FILE__" | "__PATH__" | "__LINE__" | "__INLINE__")
            || self.frames.iter().any(|frame| frame.contains_key(name))
    }
}
