pub mod options;
pub mod pipeline;

pub use options::{Args, ConfigError, FileConfig, Options};
pub use pipeline::{run_pipeline, PipelineError};
