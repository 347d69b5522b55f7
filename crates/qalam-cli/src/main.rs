// crates/qalam-cli/src/main.rs
use clap::Parser;
use qalam_cli::{run_pipeline, Args, Options, PipelineError};

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = Options::from_args_and_config(args)
        .map_err(PipelineError::from)
        .and_then(run_pipeline);
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
