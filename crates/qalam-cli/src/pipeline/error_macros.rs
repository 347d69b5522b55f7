// crates/qalam-cli/src/pipeline/error_macros.rs

#[macro_export]
macro_rules! try_read {
    ($path:expr) => {
        std::fs::read_to_string($path).map_err(|e| PipelineError::ReadError {
            path: $path.to_path_buf(),
            source: e,
            backtrace: Backtrace::capture(),
        })
    };
}

#[macro_export]
macro_rules! try_write {
    ($path:expr, $content:expr) => {{
        let path = $path;
        // Ensure the parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PipelineError::WriteError {
                    path: parent.to_path_buf(),
                    source: e,
                    backtrace: Backtrace::capture(),
                })?;
            }
        }
        std::fs::write(path, $content).map_err(|e| PipelineError::WriteError {
            path: path.to_path_buf(),
            source: e,
            backtrace: Backtrace::capture(),
        })
    }};
}

#[macro_export]
macro_rules! try_source {
    ($result:expr) => {
        $result.map_err(|e| PipelineError::SourceError {
            source: e,
            backtrace: Backtrace::capture(),
        })
    };
}
