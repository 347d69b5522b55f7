// crates/qalam-cli/src/options.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use qalam_engine::Value;

const DEFAULT_MAX_DEPTH: usize = 256;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AZURE_URL: &str = "https://dev.azure.com";
const DEFAULT_CONFIG_FILE: &str = "qalam.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Define must look like name=value, got \"{0}\"")]
    Define(String),

    #[error("Bad cache-exclude pattern \"{pattern}\": {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Configuration that can be loaded from a TOML file
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub line_markers: Option<bool>,
    pub duplicate_warnings: Option<bool>,
    pub max_depth: Option<usize>,
    pub base_dir: Option<String>,
    pub timeout: Option<u64>,

    pub cache_dir: Option<String>,
    pub cache_exclude: Option<Vec<String>>,
    pub remote_relative: Option<bool>,

    pub pin_file: Option<String>,
    pub snapshot_file: Option<String>,

    pub bitbucket_url: Option<String>,
    pub azure_url: Option<String>,

    /// Variables preset for the run; `-D` flags override them.
    #[serde(default)]
    pub defines: BTreeMap<String, toml::Value>,
}

#[derive(Parser, Debug)]
#[command(
    name = "qalam",
    about = "Expand directive-driven text templates",
    version
)]
pub struct Args {
    /// Template to expand (use "-" for stdin)
    #[arg(help = "Template to expand. Use - for stdin")]
    pub file: PathBuf,

    /// Where the expanded text goes
    #[arg(
        short = 'o',
        long,
        default_value = "-",
        help = "Output file. Use - for stdout"
    )]
    pub output: PathBuf,

    /// Preset a variable for the run
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME=VALUE",
        help = "Preset a variable. The value is parsed as JSON, falling back to a plain string"
    )]
    pub defines: Vec<String>,

    /// Interleave #line markers in the output
    #[arg(long, help = "Mark source switches with #line directives")]
    pub line_markers: bool,

    /// Silence duplicate-content warnings
    #[arg(long, help = "Do not warn when identical content is included twice")]
    pub no_duplicate_warnings: bool,

    /// Include and macro recursion limit
    #[arg(long, value_name = "N", help = "Maximum include/macro recursion depth")]
    pub max_depth: Option<usize>,

    /// Base directory for relative file includes
    #[arg(long, value_name = "DIR", help = "Directory relative includes resolve against")]
    pub base_dir: Option<PathBuf>,

    /// HTTP timeout for the remote readers
    #[arg(long, value_name = "SECS", help = "Timeout for remote fetches, in seconds")]
    pub timeout: Option<u64>,

    /// Directory holding the content cache
    #[arg(long, value_name = "DIR", help = "Cache remote content in this directory")]
    pub cache_dir: Option<PathBuf>,

    /// Locator pattern that bypasses the cache
    #[arg(
        long = "cache-exclude",
        value_name = "PATTERN",
        help = "Never cache locators matching this regex (repeatable)"
    )]
    pub cache_exclude: Vec<String>,

    /// Resolve relative includes of remote templates remotely
    #[arg(
        long,
        help = "Rewrite relative includes found in remote templates to the same remote tree"
    )]
    pub remote_relative: bool,

    /// Pin file refreshed after the run
    #[arg(long, value_name = "FILE", help = "Write remote include versions here after the run")]
    pub pin_file: Option<PathBuf>,

    /// Snapshot of the global store written after the run
    #[arg(long, value_name = "FILE", help = "Write the final variable store here as JSON")]
    pub snapshot_file: Option<PathBuf>,

    /// Bitbucket Server base URL
    #[arg(
        long,
        value_name = "URL",
        help = "Bitbucket Server base URL; enables bitbucket: locators"
    )]
    pub bitbucket_url: Option<String>,

    /// Azure DevOps base URL
    #[arg(long, value_name = "URL", help = "Azure DevOps base URL for azure: locators")]
    pub azure_url: Option<String>,

    /// Config file path
    #[arg(long, help = "Path to config file")]
    config: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn from_default_location() -> Result<Option<Self>, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        log::debug!("using config from {path:?}");
        Ok(Some(Self::from_file(path)?))
    }
}

/// Fully resolved run configuration: flags win over the config file,
/// which wins over the built-in defaults.
#[derive(Debug)]
pub struct Options {
    pub file: PathBuf,
    pub output: PathBuf,
    pub defines: Vec<(String, Value)>,
    pub line_markers: bool,
    pub duplicate_warnings: bool,
    pub max_depth: usize,
    pub base_dir: PathBuf,
    pub timeout: Duration,
    pub cache_dir: Option<PathBuf>,
    pub cache_exclude: Vec<Regex>,
    pub remote_relative: bool,
    pub pin_file: Option<PathBuf>,
    pub snapshot_file: Option<PathBuf>,
    pub bitbucket_url: Option<String>,
    pub azure_url: String,
}

impl Options {
    pub fn from_args_and_config(args: Args) -> Result<Self, ConfigError> {
        let config = match args.config.as_ref() {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::from_default_location()?.unwrap_or_default(),
        };

        // Config defines first so -D flags shadow them downstream.
        let mut defines = Vec::new();
        for (name, value) in &config.defines {
            defines.push((name.clone(), toml_value(value)));
        }
        for spec in &args.defines {
            defines.push(parse_define(spec)?);
        }

        let patterns = if args.cache_exclude.is_empty() {
            config.cache_exclude.unwrap_or_default()
        } else {
            args.cache_exclude
        };
        let mut cache_exclude = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let compiled = Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            cache_exclude.push(compiled);
        }

        Ok(Self {
            file: args.file,
            output: args.output,
            defines,
            line_markers: args.line_markers || config.line_markers.unwrap_or(false),
            duplicate_warnings: if args.no_duplicate_warnings {
                false
            } else {
                config.duplicate_warnings.unwrap_or(true)
            },
            max_depth: args
                .max_depth
                .or(config.max_depth)
                .unwrap_or(DEFAULT_MAX_DEPTH),
            base_dir: args
                .base_dir
                .or(config.base_dir.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(".")),
            timeout: Duration::from_secs(
                args.timeout.or(config.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            cache_dir: args.cache_dir.or(config.cache_dir.map(PathBuf::from)),
            cache_exclude,
            remote_relative: args.remote_relative || config.remote_relative.unwrap_or(false),
            pin_file: args.pin_file.or(config.pin_file.map(PathBuf::from)),
            snapshot_file: args
                .snapshot_file
                .or(config.snapshot_file.map(PathBuf::from)),
            bitbucket_url: args.bitbucket_url.or(config.bitbucket_url),
            azure_url: args
                .azure_url
                .or(config.azure_url)
                .unwrap_or_else(|| DEFAULT_AZURE_URL.to_string()),
        })
    }
}

/// `name=value`, the value read as JSON with a plain-string fallback.
fn parse_define(spec: &str) -> Result<(String, Value), ConfigError> {
    let Some((name, raw)) = spec.split_once('=') else {
        return Err(ConfigError::Define(spec.to_string()));
    };
    if name.is_empty() {
        return Err(ConfigError::Define(spec.to_string()));
    }
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::Str(raw.to_string()),
    };
    Ok((name.to_string(), value))
}

fn toml_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(n) => Value::Number(*n as f64),
        toml::Value::Float(n) => Value::Number(*n),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_value).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(name, value)| (name.clone(), toml_value(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["qalam", "in.txt"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defines_parse_as_json_with_string_fallback() {
        assert_eq!(
            parse_define("count=3").unwrap(),
            ("count".to_string(), Value::Number(3.0))
        );
        assert_eq!(
            parse_define("flag=true").unwrap(),
            ("flag".to_string(), Value::Bool(true))
        );
        assert_eq!(
            parse_define("name=qalam").unwrap(),
            ("name".to_string(), Value::Str("qalam".to_string()))
        );
        assert_eq!(
            parse_define("name=\"3\"").unwrap(),
            ("name".to_string(), Value::Str("3".to_string()))
        );
        assert!(parse_define("no_equals").is_err());
        assert!(parse_define("=3").is_err());
    }

    #[test]
    fn test_defaults_without_flags_or_config() {
        let options = Options::from_args_and_config(args(&["--config", "/dev/null"])).unwrap();
        assert_eq!(options.max_depth, 256);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.base_dir, PathBuf::from("."));
        assert!(options.duplicate_warnings);
        assert!(!options.line_markers);
        assert!(options.bitbucket_url.is_none());
        assert_eq!(options.azure_url, "https://dev.azure.com");
        assert_eq!(options.output, PathBuf::from("-"));
    }

    #[test]
    fn test_flags_win_over_the_config_file() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("qalam.toml");
        fs::write(
            &config,
            "max_depth = 16\nbase_dir = \"tpl\"\nline_markers = true\n\n[defines]\nname = \"from-config\"\ncount = 3\n",
        )
        .unwrap();

        let options = Options::from_args_and_config(args(&[
            "--config",
            config.to_str().unwrap(),
            "--max-depth",
            "8",
            "-D",
            "name=from-flag",
        ]))
        .unwrap();

        assert_eq!(options.max_depth, 8);
        assert_eq!(options.base_dir, PathBuf::from("tpl"));
        assert!(options.line_markers);
        // Later entries shadow earlier ones once collected into globals.
        assert_eq!(
            options.defines,
            vec![
                ("count".to_string(), Value::Number(3.0)),
                ("name".to_string(), Value::Str("from-config".to_string())),
                ("name".to_string(), Value::Str("from-flag".to_string())),
            ]
        );
    }

    #[test]
    fn test_no_duplicate_warnings_overrides_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("qalam.toml");
        fs::write(&config, "duplicate_warnings = true\n").unwrap();

        let options = Options::from_args_and_config(args(&[
            "--config",
            config.to_str().unwrap(),
            "--no-duplicate-warnings",
        ]))
        .unwrap();
        assert!(!options.duplicate_warnings);
    }

    #[test]
    fn test_cache_exclude_patterns_compile() {
        let options =
            Options::from_args_and_config(args(&["--cache-exclude", r"\.txt$"])).unwrap();
        assert_eq!(options.cache_exclude.len(), 1);
        assert!(options.cache_exclude[0].is_match("lib.txt"));

        let err = Options::from_args_and_config(args(&["--cache-exclude", "("])).unwrap_err();
        assert!(err.to_string().contains("cache-exclude"), "{err}");
    }

    #[test]
    fn test_bad_config_toml_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("qalam.toml");
        fs::write(&config, "max_depth = \"not a number\"\n").unwrap();

        let err =
            Options::from_args_and_config(args(&["--config", config.to_str().unwrap()]))
                .unwrap_err();
        assert!(err.to_string().contains("TOML"), "{err}");
    }
}
