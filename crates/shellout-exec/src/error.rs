//! Error types for shellout-exec.

/// Errors produced by shell execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// An output logging value is not one of `NONE`, `BUFFER`, `STREAM`.
    ///
    /// Hosts are expected to validate modes when loading configuration, so
    /// hitting this at run time is a programming error on their side.
    #[error("Unrecognized output_logging: {value}")]
    UnrecognizedOutputLogging { value: String },

    /// The pipe that merges the child's stdout and stderr cannot be created.
    #[error("cannot create output pipe: {source}")]
    Pipe { source: std::io::Error },

    /// The OS refused to start the shell (bad working directory, missing
    /// interpreter, permission denied). Distinct from a nonzero exit code.
    #[error("cannot spawn shell: {source}")]
    Spawn { source: std::io::Error },

    /// Reading the child's combined output failed mid-stream.
    #[error("cannot read command output: {source}")]
    OutputRead { source: std::io::Error },

    /// Waiting for the child process failed.
    #[error("cannot wait for command: {source}")]
    Wait { source: std::io::Error },
}
