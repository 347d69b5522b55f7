// crates/qalam-engine/src/engine/mod.rs

mod builtins;
mod errors;
mod output;
mod session;

#[cfg(test)]
mod tests;

pub use builtins::{default_builtins, BuiltinFn};
pub use errors::{EngineError, EngineResult};
pub use session::{Execution, IncludeRecord};

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use colored::Colorize;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::expr::{
    evaluate, evaluate_str, parse_macro_call, parse_macro_declaration, EvalHost, ExprError,
};
use crate::parser::{parse, Conditional, Loop, LoopKind, Statement};
use crate::reader::{content_digest, ContentCache, NoCache, PathInfo, Reader};
use crate::scope::Scope;
use crate::value::{FunctionRef, Value};

use output::OutputBuffer;
use session::{MacroDef, Session, Site};

lazy_static! {
    static ref SCHEME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").unwrap();
}

/// Knobs for a built engine. `Default` matches the command line defaults.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Emit `#line` markers when output switches source files.
    pub line_markers: bool,
    /// Warn when the same content is included again without `once`.
    pub duplicate_warnings: bool,
    /// Inclusion and macro recursion limit.
    pub max_depth: usize,
    /// Rewrite relative locators found inside remote sources to sibling
    /// remote locators.
    pub remote_relative: bool,
    /// Locator patterns whose content bypasses the cache.
    pub cache_exclude: Vec<Regex>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            line_markers: false,
            duplicate_warnings: true,
            max_depth: 256,
            remote_relative: false,
            cache_exclude: Vec::new(),
        }
    }
}

/// The immutable half of the preprocessor: readers, cache, options and the
/// starting library of callables. One engine can run many documents; all
/// per-run state lives in a session created by `execute`.
pub struct Engine {
    options: EngineOptions,
    readers: Vec<Box<dyn Reader>>,
    cache: Box<dyn ContentCache>,
    builtins: HashMap<String, BuiltinFn>,
    library: HashMap<String, Value>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let builtins = default_builtins();
        let mut library = HashMap::new();
        for name in builtins.keys() {
            library.insert(
                name.clone(),
                Value::Function(FunctionRef::Builtin(name.clone())),
            );
        }
        library.insert(
            "include".to_string(),
            Value::Function(FunctionRef::Builtin("include".to_string())),
        );
        Engine {
            options,
            readers: Vec::new(),
            cache: Box::new(NoCache),
            builtins,
            library,
        }
    }

    /// Register a reader. Earlier registrations win when several support
    /// the same locator.
    pub fn add_reader(&mut self, reader: Box<dyn Reader>) -> &mut Self {
        self.readers.push(reader);
        self
    }

    pub fn set_cache(&mut self, cache: Box<dyn ContentCache>) -> &mut Self {
        self.cache = cache;
        self
    }

    /// Preset a global for every subsequent run.
    pub fn define(&mut self, name: &str, value: Value) -> &mut Self {
        self.library.insert(name.to_string(), value);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run one document. `path` is the display locator of the source; the
    /// top level is always labeled `main` in diagnostics.
    pub fn execute(&self, source: &str, path: &str) -> EngineResult<Execution> {
        self.execute_with_vars(source, path, &HashMap::new())
    }

    pub fn execute_with_vars(
        &self,
        source: &str,
        path: &str,
        vars: &HashMap<String, Value>,
    ) -> EngineResult<Execution> {
        let statements = parse(source, "main")?;
        let mut session = Session::new(&self.library, vars);
        let mut out = OutputBuffer::new(self.options.line_markers);
        let scope = Scope::new("main", path);
        Exec {
            engine: self,
            session: &mut session,
        }
        .run_block(&statements, &scope, &mut out)?;
        Ok(session.into_execution(out.finish()))
    }
}

/// One executing document: the engine plus the run's mutable session. The
/// output buffer travels separately so inline captures can run against a
/// fresh buffer over the same state.
struct Exec<'e> {
    engine: &'e Engine,
    session: &'e mut Session,
}

impl<'e> Exec<'e> {
    fn run_block(
        &mut self,
        statements: &[Statement],
        scope: &Scope,
        out: &mut OutputBuffer,
    ) -> EngineResult<()> {
        for statement in statements {
            self.run_statement(statement, scope, out)?;
        }
        Ok(())
    }

    fn run_statement(
        &mut self,
        statement: &Statement,
        scope: &Scope,
        out: &mut OutputBuffer,
    ) -> EngineResult<()> {
        match statement {
            Statement::Output {
                line,
                value,
                literal,
            } => {
                let at = scope.at_line(*line);
                if *literal {
                    out.emit(&at, value);
                } else {
                    let result = self.eval(value, &at)?;
                    out.emit(&at, &result.to_output_string());
                }
            }
            Statement::Set {
                line,
                variable,
                value,
            } => {
                let at = scope.at_line(*line);
                let result = self.eval(value, &at)?;
                self.session.globals.insert(variable.clone(), result);
            }
            Statement::Error { line, value } => {
                let at = scope.at_line(*line);
                let message = self.eval(value, &at)?.to_output_string();
                return Err(EngineError::UserDefined { message });
            }
            Statement::Warning { line, value } => {
                let at = scope.at_line(*line);
                let message = self.eval(value, &at)?.to_output_string();
                self.warn(&message);
            }
            Statement::Conditional(cond) => {
                self.run_conditional(cond, scope, out)?;
            }
            Statement::MacroDecl {
                line,
                declaration,
                body,
            } => self.declare_macro(*line, declaration, body, scope)?,
            Statement::Loop(stmt) => self.run_loop(stmt, scope, out)?,
            Statement::Include { line, value, once } => {
                self.run_include(*line, value, *once, scope, out)?
            }
        }
        Ok(())
    }

    /// Returns whether a branch fired, so an elseif chain stops at the
    /// first truthy test.
    fn run_conditional(
        &mut self,
        cond: &Conditional,
        scope: &Scope,
        out: &mut OutputBuffer,
    ) -> EngineResult<bool> {
        let at = scope.at_line(cond.line);
        if self.eval(&cond.test, &at)?.is_truthy() {
            self.run_block(&cond.consequent, scope, out)?;
            return Ok(true);
        }
        for elseif in &cond.elseifs {
            if self.run_conditional(elseif, scope, out)? {
                return Ok(true);
            }
        }
        if let Some(alternate) = &cond.alternate {
            self.run_block(alternate, scope, out)?;
        }
        Ok(false)
    }

    fn run_loop(&mut self, stmt: &Loop, scope: &Scope, out: &mut OutputBuffer) -> EngineResult<()> {
        let at = scope.at_line(stmt.line);
        let mut index: u64 = 0;
        loop {
            // Both forms re-evaluate the condition before every pass, so
            // `@set` on a control variable takes effect mid-loop.
            match stmt.kind {
                LoopKind::While => {
                    if !self.eval(&stmt.condition, &at)?.is_truthy() {
                        break;
                    }
                }
                LoopKind::Repeat => {
                    let target = self.eval(&stmt.condition, &at)?.as_number();
                    if !((index as f64) < target) {
                        break;
                    }
                }
            }
            let mut counters = BTreeMap::new();
            counters.insert("index".to_string(), Value::Number(index as f64));
            if stmt.kind == LoopKind::Repeat {
                counters.insert("iteration".to_string(), Value::Number((index + 1) as f64));
            }
            let mut frame = HashMap::new();
            frame.insert("loop".to_string(), Value::Object(counters));
            let inner = scope.with_frame(frame);
            self.run_block(&stmt.body, &inner, out)?;
            index += 1;
        }
        Ok(())
    }

    fn declare_macro(
        &mut self,
        line: u32,
        declaration: &str,
        body: &[Statement],
        scope: &Scope,
    ) -> EngineResult<()> {
        let at = scope.at_line(line);
        let (name, params) =
            parse_macro_declaration(declaration).map_err(|err| self.locate(err, &at))?;
        if let Some(first) = self.session.macros.get(&name) {
            return Err(EngineError::MacroAlreadyDeclared {
                name,
                first_file: first.file.to_string(),
                first_line: first.line,
                file: at.file().to_string(),
                line,
            });
        }
        let def = MacroDef {
            file: Rc::from(at.file()),
            path: Rc::from(at.path()),
            line,
            params,
            body: body.to_vec().into(),
        };
        self.session.macros.insert(name.clone(), def);
        self.session
            .globals
            .insert(name.clone(), Value::Function(FunctionRef::Macro(name)));
        Ok(())
    }

    /// Run a macro body into `out`. The body sees only its parameter frame
    /// and is positioned at the declaration site, so markers and
    /// diagnostics point into the file that declared it.
    fn expand_macro(
        &mut self,
        name: &str,
        args: Vec<Value>,
        at: &Scope,
        out: &mut OutputBuffer,
    ) -> EngineResult<()> {
        let Some(def) = self.session.macros.get(name).cloned() else {
            return Err(EngineError::Expression {
                message: format!("Function \"{name}\" is not defined"),
                file: at.file().to_string(),
                line: at.line(),
            });
        };
        let mut inner = Scope::new(&def.file, &def.path).with_frame(def.bind(args));
        if at.is_inline() {
            inner = inner.as_inline();
        }
        self.enter(at)?;
        let result = self.run_block(&def.body, &inner, out);
        self.leave();
        result
    }

    fn run_include(
        &mut self,
        line: u32,
        value: &str,
        once: bool,
        scope: &Scope,
        out: &mut OutputBuffer,
    ) -> EngineResult<()> {
        let at = scope.at_line(line);
        let is_macro = |name: &str| self.session.macros.contains_key(name);
        if let Some((name, arg_exprs)) = parse_macro_call(value, is_macro) {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for expr in &arg_exprs {
                let arg = evaluate(expr, &at, self).map_err(|err| self.locate(err, &at))?;
                args.push(arg);
            }
            return self.expand_macro(&name, args, &at, out);
        }
        let locator = self.eval(value, &at)?.to_output_string();
        self.include_source(&locator, once, &at, out)
    }

    fn include_source(
        &mut self,
        locator: &str,
        once: bool,
        at: &Scope,
        out: &mut OutputBuffer,
    ) -> EngineResult<()> {
        let locator = self.resolve(locator, at);
        let reader = self.find_reader(&locator, at)?;
        let info = reader
            .parse_path(&locator)
            .map_err(|err| self.inclusion_error(err.to_string(), at))?;
        if once && self.session.included.contains(&info.path) {
            debug!("skipping once include of {}", info.path);
            return Ok(());
        }
        let content = self.fetch(reader, &info, at)?;
        let digest = content_digest(&content);
        if once {
            if let Some(prior) = self.session.seen_content.get(&digest) {
                debug!(
                    "skipping once include of {}, same content as {}",
                    info.path, prior.locator
                );
                self.session.included.insert(info.path.clone());
                return Ok(());
            }
        } else if self.engine.options.duplicate_warnings && !at.is_inline() {
            if let Some(prior) = self.session.seen_content.get(&digest) {
                self.warn(&format!(
                    "Content of \"{}\" was already included from \"{}\" at {}:{} ({}:{})",
                    info.path,
                    prior.locator,
                    prior.file,
                    prior.line,
                    at.file(),
                    at.line()
                ));
            }
        }
        self.session.included.insert(info.path.clone());
        self.session
            .seen_content
            .entry(digest.clone())
            .or_insert_with(|| Site {
                locator: info.path.clone(),
                file: Rc::from(at.file()),
                line: at.line(),
            });
        self.session.includes.push(IncludeRecord {
            locator: info.path.clone(),
            digest,
            remote: info.remote,
        });
        let statements = parse(&content, &info.file)?;
        let mut child = Scope::new(&info.file, &info.path);
        if let Some(repo) = &info.repo {
            let mut frame = HashMap::new();
            frame.insert(
                "__REPO_PREFIX__".to_string(),
                Value::Str(repo.prefix.clone()),
            );
            frame.insert(
                "__REPO_REF__".to_string(),
                Value::Str(repo.reference.clone()),
            );
            child = child.with_frame(frame);
        }
        if at.is_inline() {
            child = child.as_inline();
        }
        self.enter(at)?;
        let result = self.run_block(&statements, &child, out);
        self.leave();
        result
    }

    /// Rewrite a relative locator under the remote-relative policy: inside
    /// a remote source, `lib/x` resolves against the including repository
    /// instead of the local filesystem.
    fn resolve(&self, locator: &str, at: &Scope) -> String {
        if !self.engine.options.remote_relative || is_qualified(locator) {
            return locator.to_string();
        }
        let Some(Value::Str(prefix)) = at.lookup("__REPO_PREFIX__") else {
            return locator.to_string();
        };
        let mut resolved = format!("{}/{}", prefix.trim_end_matches('/'), locator);
        if let Some(Value::Str(reference)) = at.lookup("__REPO_REF__") {
            if !reference.is_empty() {
                resolved.push('@');
                resolved.push_str(&reference);
            }
        }
        debug!("resolved relative include {locator} as {resolved}");
        resolved
    }

    fn find_reader(&self, locator: &str, at: &Scope) -> EngineResult<&'e dyn Reader> {
        for reader in &self.engine.readers {
            if reader.supports(locator) {
                return Ok(reader.as_ref());
            }
        }
        Err(self.inclusion_error(format!("Source \"{locator}\" is not supported"), at))
    }

    fn fetch(&mut self, reader: &dyn Reader, info: &PathInfo, at: &Scope) -> EngineResult<String> {
        let cacheable = info.remote && !self.cache_excluded(&info.path);
        if cacheable {
            if let Some(content) = self.engine.cache.get(&info.path) {
                debug!("cache hit for {}", info.path);
                return Ok(normalize_newline(content));
            }
        }
        let content = reader
            .read(info)
            .map_err(|err| self.inclusion_error(err.to_string(), at))?;
        let content = normalize_newline(content);
        if cacheable {
            self.engine.cache.put(&info.path, &content);
        }
        Ok(content)
    }

    fn cache_excluded(&self, locator: &str) -> bool {
        self.engine
            .options
            .cache_exclude
            .iter()
            .any(|pattern| pattern.is_match(locator))
    }

    fn enter(&mut self, at: &Scope) -> EngineResult<()> {
        if self.session.depth >= self.engine.options.max_depth {
            return Err(EngineError::MaxDepth {
                limit: self.engine.options.max_depth,
                file: at.file().to_string(),
                line: at.line(),
            });
        }
        self.session.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.session.depth -= 1;
    }

    /// Capture include output as a string for the `include()` builtin.
    fn call_inline_include(
        &mut self,
        args: Vec<Value>,
        scope: &Scope,
    ) -> Result<Value, ExprError> {
        let [locator] = args.as_slice() else {
            return Err(ExprError::BadCall(
                "include() takes a single locator argument".to_string(),
            ));
        };
        let locator = locator.to_output_string();
        let mut buffer = OutputBuffer::new(false);
        let at = scope.as_inline();
        self.include_source(&locator, false, &at, &mut buffer)
            .map_err(|err| ExprError::Nested(err.to_string()))?;
        Ok(Value::Str(trim_newline(buffer.finish())))
    }

    fn call_inline_macro(
        &mut self,
        name: &str,
        args: Vec<Value>,
        scope: &Scope,
    ) -> Result<Value, ExprError> {
        let mut buffer = OutputBuffer::new(false);
        let at = scope.as_inline();
        self.expand_macro(name, args, &at, &mut buffer)
            .map_err(|err| ExprError::Nested(err.to_string()))?;
        Ok(Value::Str(trim_newline(buffer.finish())))
    }

    fn eval(&mut self, input: &str, at: &Scope) -> EngineResult<Value> {
        evaluate_str(input, at, self).map_err(|err| self.locate(err, at))
    }

    /// Attach the current site to an expression error. Errors from nested
    /// execution already carry their own site and pass through untouched.
    fn locate(&self, err: ExprError, at: &Scope) -> EngineError {
        match err {
            ExprError::Nested(message) => EngineError::Propagated { message },
            other => EngineError::Expression {
                message: other.to_string(),
                file: at.file().to_string(),
                line: at.line(),
            },
        }
    }

    fn inclusion_error(&self, message: String, at: &Scope) -> EngineError {
        EngineError::SourceInclusion {
            message,
            file: at.file().to_string(),
            line: at.line(),
        }
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
        eprintln!("{} {message}", "warning:".yellow().bold());
    }
}

impl<'e> EvalHost for Exec<'e> {
    fn global(&self, name: &str) -> Option<Value> {
        self.session.globals.get(name).cloned()
    }

    fn is_global(&self, name: &str) -> bool {
        self.session.globals.contains_key(name)
    }

    fn call(
        &mut self,
        func: &FunctionRef,
        args: Vec<Value>,
        scope: &Scope,
    ) -> Result<Value, ExprError> {
        match func {
            FunctionRef::Builtin(name) if name == "include" => {
                self.call_inline_include(args, scope)
            }
            FunctionRef::Builtin(name) => match self.engine.builtins.get(name.as_str()) {
                Some(builtin) => builtin(&args),
                None => Err(ExprError::UndefinedFunction(name.clone())),
            },
            FunctionRef::Macro(name) => self.call_inline_macro(name, args, scope),
        }
    }
}

fn is_qualified(locator: &str) -> bool {
    locator.starts_with('/') || SCHEME_RE.is_match(locator)
}

fn normalize_newline(mut content: String) -> String {
    if !content.ends_with('\n') {
        content.push('\n');
    }
    content
}

/// Inline captures drop exactly one trailing line terminator.
fn trim_newline(mut text: String) -> String {
    if text.ends_with("\r\n") {
        text.truncate(text.len() - 2);
    } else if text.ends_with('\n') {
        text.pop();
    }
    text
}
