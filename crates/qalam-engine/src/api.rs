// crates/qalam-engine/src/api.rs

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::engine::{Engine, EngineError, EngineResult};
use crate::value::Value;

/// Expand a document already in memory. `path` labels it in markers and
/// `__PATH__`; diagnostics call the top level `main`.
pub fn expand_string(source: &str, path: &str, engine: &Engine) -> EngineResult<String> {
    Ok(engine.execute(source, path)?.output)
}

pub fn expand_string_with_vars(
    source: &str,
    path: &str,
    vars: &HashMap<String, Value>,
    engine: &Engine,
) -> EngineResult<String> {
    Ok(engine.execute_with_vars(source, path, vars)?.output)
}

/// Expand `input_file` into `output_file`, creating parent directories as
/// needed.
pub fn expand_file(input_file: &Path, output_file: &Path, engine: &Engine) -> EngineResult<()> {
    let source = fs::read_to_string(input_file)
        .map_err(|e| EngineError::Runtime(format!("Cannot read {input_file:?}: {e}")))?;
    let path = input_file.to_string_lossy();
    let expanded = expand_string(&source, &path, engine)?;
    if let Some(parent) = output_file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| EngineError::Runtime(format!("Cannot create dir {parent:?}: {e}")))?;
    }
    fs::write(output_file, expanded.as_bytes())
        .map_err(|e| EngineError::Runtime(format!("Cannot write {output_file:?}: {e}")))?;
    Ok(())
}
