// crates/qalam-cli/src/pipeline/mod.rs

use crate::options::{ConfigError, Options};
use crate::{try_read, try_source, try_write};
use colored::Colorize;
use qalam_engine::{Engine, EngineError, EngineOptions, Execution, Value};
use qalam_sources::{
    pins, snapshot, AzureReader, BitbucketReader, FileReader, GitLocalReader, GithubReader,
    HttpReader, RedbCache, SourceError,
};
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod error_macros;


const CACHE_FILE: &str = "qalam-cache.redb";

// Field type spelled through an alias: a field written literally as
// `Backtrace` makes thiserror's derive emit the unstable `provide()` API,
// which does not compile on stable. These fields are plain stored values
// formatted by Display.
type StoredBacktrace = Backtrace;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read file {path:?}: {source} (at {backtrace})")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
        backtrace: StoredBacktrace,
    },

    #[error("Failed to write file {path:?}: {source} (at {backtrace})")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
        backtrace: StoredBacktrace,
    },

    #[error("{source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("{source}")]
    EngineError {
        #[from]
        source: EngineError,
    },

    #[error("{source} (at {backtrace})")]
    SourceError {
        source: SourceError,
        backtrace: StoredBacktrace,
    },
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::ReadError {
            path: PathBuf::from("<stdio>"),
            source: err,
            backtrace: Backtrace::capture(),
        }
    }
}

pub fn read_input(path: &Path) -> Result<String, PipelineError> {
    if is_stdio_path(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        try_read!(path)
    }
}

pub fn write_output(path: &Path, content: &[u8]) -> Result<(), PipelineError> {
    if is_stdio_path(path) {
        io::stdout().write_all(content)?;
        io::stdout().flush()?;
        Ok(())
    } else {
        try_write!(path, content)
    }
}

pub fn is_stdio_path(path: &Path) -> bool {
    path.to_str() == Some("-")
}

/// Engine configured per the resolved options: scheme readers first,
/// the catch-all file reader last.
fn build_engine(options: &Options) -> Result<Engine, PipelineError> {
    let mut engine = Engine::new(EngineOptions {
        line_markers: options.line_markers,
        duplicate_warnings: options.duplicate_warnings,
        max_depth: options.max_depth,
        remote_relative: options.remote_relative,
        cache_exclude: options.cache_exclude.clone(),
    });
    engine
        .add_reader(Box::new(try_source!(HttpReader::new(options.timeout))?))
        .add_reader(Box::new(try_source!(GithubReader::new(options.timeout))?));
    if let Some(url) = &options.bitbucket_url {
        engine.add_reader(Box::new(try_source!(BitbucketReader::new(
            url.clone(),
            options.timeout
        ))?));
    }
    engine
        .add_reader(Box::new(try_source!(AzureReader::new(
            options.azure_url.clone(),
            options.timeout
        ))?))
        .add_reader(Box::new(GitLocalReader::new()))
        .add_reader(Box::new(FileReader::new(&options.base_dir)));
    if let Some(dir) = &options.cache_dir {
        let cache = try_source!(RedbCache::open(dir.join(CACHE_FILE)))?;
        engine.set_cache(Box::new(cache));
    }
    Ok(engine)
}

fn refresh_pins(pin_path: &Path, execution: &Execution) -> Result<(), PipelineError> {
    let current = pins::collect(execution);
    if pin_path.exists() {
        let pinned = try_source!(pins::load(pin_path))?;
        for change in pins::changed(&pinned, &current) {
            eprintln!(
                "{} \"{}\" changed since it was pinned ({} is now {})",
                "warning:".yellow().bold(),
                change.locator,
                short_digest(&change.pinned),
                short_digest(&change.current),
            );
        }
    }
    try_source!(pins::save(pin_path, &current))?;
    Ok(())
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

pub fn run_pipeline(options: Options) -> Result<(), PipelineError> {
    let source = read_input(&options.file)?;
    let path = options.file.to_string_lossy().into_owned();

    let engine = build_engine(&options)?;
    let vars: HashMap<String, Value> = options.defines.iter().cloned().collect();
    let execution = engine.execute_with_vars(&source, &path, &vars)?;

    write_output(&options.output, execution.output.as_bytes())?;

    if let Some(pin_path) = &options.pin_file {
        refresh_pins(pin_path, &execution)?;
    }
    if let Some(snapshot_path) = &options.snapshot_file {
        try_source!(snapshot::save(snapshot_path, &execution.globals))?;
    }
    Ok(())
}
