// crates/qalam-engine/src/engine/tests/test_api.rs

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use super::test_utils::engine_with;
use crate::engine::{Engine, EngineOptions};
use crate::value::Value;
use crate::{expand_file, expand_string, expand_string_with_vars};

#[test]
fn test_expand_string_runs_a_document() {
    let engine = engine_with(&[("lib/header.txt", "included\n")]);
    let source = "@set who \"world\"\nhello @{who}\n@include \"lib/header.txt\"\n";
    assert_eq!(
        expand_string(source, "main", &engine).unwrap(),
        "hello world\nincluded\n"
    );
}

#[test]
fn test_expand_string_with_vars_seeds_globals() {
    let engine = Engine::new(EngineOptions::default());
    let mut vars = HashMap::new();
    vars.insert("release".to_string(), Value::Str("0.3.0".to_string()));
    assert_eq!(
        expand_string_with_vars("version @{release}\n", "main", &vars, &engine).unwrap(),
        "version 0.3.0\n"
    );
}

#[test]
fn test_expand_file_writes_the_expanded_output() {
    let engine = Engine::new(EngineOptions::default());
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.in");
    fs::write(&input, "@set title \"home\"\n<h1>@{upper(title)}</h1>\n").unwrap();
    // The output parent does not exist yet; expand_file creates it.
    let output = dir.path().join("site/page.html");
    expand_file(&input, &output, &engine).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "<h1>HOME</h1>\n");
}

#[test]
fn test_expand_file_labels_the_source_with_its_path() {
    let engine = Engine::new(EngineOptions::default());
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.in");
    fs::write(&input, "@{__PATH__}\n").unwrap();
    let output = dir.path().join("doc.out");
    expand_file(&input, &output, &engine).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!("{}\n", input.display())
    );
}

#[test]
fn test_expand_file_reports_unreadable_input() {
    let engine = Engine::new(EngineOptions::default());
    let err = expand_file(Path::new("no-such.in"), Path::new("unused.out"), &engine).unwrap_err();
    assert!(err.to_string().starts_with("Cannot read"), "{err}");
}
