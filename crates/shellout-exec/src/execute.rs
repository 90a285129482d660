//! Shell command execution with selectable output handling.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, PipeReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::error::ExecError;
use crate::logging::LogSink;

/// How the child's combined stdout/stderr stream is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLogging {
    /// Discard all output; nothing is captured or logged.
    None,
    /// Capture output in memory and log it once after the process exits.
    #[default]
    Buffer,
    /// Log each line as it is produced and accumulate the full text.
    Stream,
}

impl std::str::FromStr for OutputLogging {
    type Err = ExecError;

    /// Parse a mode name as it appears in step files: `NONE`, `BUFFER`, `STREAM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "BUFFER" => Ok(Self::Buffer),
            "STREAM" => Ok(Self::Stream),
            other => Err(ExecError::UnrecognizedOutputLogging {
                value: other.to_owned(),
            }),
        }
    }
}

impl std::fmt::Display for OutputLogging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Buffer => "BUFFER",
            Self::Stream => "STREAM",
        };
        f.write_str(name)
    }
}

/// Optional overrides for a single execution.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// When set, the child's environment is exactly this mapping. The
    /// inherited environment is not merged in; callers wanting a superset
    /// must construct it themselves. When `None` the child inherits the
    /// caller's environment unmodified.
    pub env: Option<BTreeMap<String, String>>,
    /// Working directory for the child. Must exist, else the spawn fails.
    /// When `None` the child inherits the caller's current directory.
    pub cwd: Option<PathBuf>,
    /// Emit a `Running command: ...` info line before spawning.
    pub log_shell_command: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            env: None,
            cwd: None,
            log_shell_command: true,
        }
    }
}

/// Captured output and exit status of a completed execution.
#[derive(Debug)]
pub struct ExecOutput {
    /// The combined stdout/stderr text. Empty under [`OutputLogging::None`].
    pub output: String,
    /// The child's actual termination status. A child killed by signal N
    /// reports `-N` on Unix.
    pub exit_code: i32,
}

impl ExecOutput {
    /// Whether the child exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `shell_command` through the system shell and return its combined
/// stdout/stderr together with the exit code.
///
/// The command string is passed to the shell as a script body (`sh -c` on
/// Unix, `cmd /C` on Windows), so pipes, redirection, variable expansion and
/// control flow work as they would interactively. An empty command is a
/// no-op script that succeeds with empty output.
///
/// # Errors
/// Returns an error if the shell cannot be spawned (bad working directory,
/// missing interpreter, permission denied) or the output pipe cannot be
/// created or read. A nonzero exit code is **not** an error; check
/// [`ExecOutput::exit_code`] instead.
pub fn execute_shell_command(
    shell_command: &str,
    output_logging: OutputLogging,
    log: &dyn LogSink,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    if options.log_shell_command {
        log.info(&format!("Running command: {shell_command}"));
    }
    run(shell_invocation(shell_command), output_logging, log, options)
}

/// Run an on-disk shell script through the system shell.
///
/// Same modes and environment handling as [`execute_shell_command`]. A
/// missing script path is reported by the shell itself through the exit
/// code, not as a spawn failure.
///
/// # Errors
/// Same conditions as [`execute_shell_command`].
pub fn execute_script_file(
    script_path: &Path,
    output_logging: OutputLogging,
    log: &dyn LogSink,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    if options.log_shell_command {
        log.info(&format!("Running script file: {}", script_path.display()));
    }
    run(script_invocation(script_path), output_logging, log, options)
}

#[cfg(not(windows))]
fn shell_invocation(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[cfg(windows)]
fn shell_invocation(script: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(script);
    cmd
}

#[cfg(not(windows))]
fn script_invocation(path: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg(path);
    cmd
}

#[cfg(windows)]
fn script_invocation(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(path);
    cmd
}

fn run(
    mut cmd: Command,
    output_logging: OutputLogging,
    log: &dyn LogSink,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    if let Some(env) = &options.env {
        cmd.env_clear();
        cmd.envs(env);
    }
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::null());

    match output_logging {
        OutputLogging::None => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            let status = cmd.status().map_err(|source| ExecError::Spawn { source })?;
            Ok(ExecOutput {
                output: String::new(),
                exit_code: exit_code(status),
            })
        }
        OutputLogging::Buffer => {
            let (mut reader, mut child) = spawn_merged(cmd)?;
            let mut raw = Vec::new();
            reader
                .read_to_end(&mut raw)
                .map_err(|source| ExecError::OutputRead { source })?;
            let status = child.wait().map_err(|source| ExecError::Wait { source })?;
            let output = String::from_utf8_lossy(&raw).into_owned();
            if !output.is_empty() {
                log.info(&output);
            }
            Ok(ExecOutput {
                output,
                exit_code: exit_code(status),
            })
        }
        OutputLogging::Stream => {
            let (reader, mut child) = spawn_merged(cmd)?;
            let mut output = String::new();
            for chunk in BufReader::new(reader).split(b'\n') {
                let chunk = chunk.map_err(|source| ExecError::OutputRead { source })?;
                let line = String::from_utf8_lossy(&chunk);
                log.info(&line);
                output.push_str(&line);
                output.push('\n');
            }
            let status = child.wait().map_err(|source| ExecError::Wait { source })?;
            Ok(ExecOutput {
                output,
                exit_code: exit_code(status),
            })
        }
    }
}

/// Spawn `cmd` with stdout and stderr merged into a single pipe.
///
/// The parent's copies of the write end must be released before reading,
/// or the reader never sees end-of-file.
fn spawn_merged(mut cmd: Command) -> Result<(PipeReader, Child), ExecError> {
    let (reader, writer) = std::io::pipe().map_err(|source| ExecError::Pipe { source })?;
    let writer_clone = writer
        .try_clone()
        .map_err(|source| ExecError::Pipe { source })?;
    cmd.stdout(writer).stderr(writer_clone);
    let child = cmd.spawn().map_err(|source| ExecError::Spawn { source })?;
    // Both write ends now live only in the child.
    drop(cmd);
    Ok((reader, child))
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
