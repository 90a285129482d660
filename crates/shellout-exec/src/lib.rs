#![forbid(unsafe_code)]
//! Shell step execution for pipeline hosts.

pub mod error;
pub mod execute;
pub mod logging;

pub use error::ExecError;
pub use execute::{
    execute_script_file, execute_shell_command, ExecOptions, ExecOutput, OutputLogging,
};
pub use logging::{LogSink, StderrSink};
