#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use shellout_config::StepFile;
use shellout_exec::{ExecOptions, OutputLogging, StderrSink};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "shellout", about = "Run pipeline shell steps with captured output")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run an ad-hoc shell command
    Exec {
        /// The command, passed to the system shell as a script
        command: String,
        /// Output handling: NONE, BUFFER, or STREAM
        #[arg(long, default_value = "STREAM")]
        output_logging: String,
        /// Environment entry KEY=VALUE (repeatable)
        #[arg(long)]
        env: Vec<String>,
        /// Pass only --env entries instead of overlaying them on the host environment
        #[arg(long)]
        no_inherit_env: bool,
        /// Working directory for the command
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Do not log the command line before running
        #[arg(long)]
        no_log_command: bool,
    },
    /// Run an on-disk shell script
    Script {
        /// Path to the script file
        path: PathBuf,
        /// Output handling: NONE, BUFFER, or STREAM
        #[arg(long, default_value = "STREAM")]
        output_logging: String,
        /// Environment entry KEY=VALUE (repeatable)
        #[arg(long)]
        env: Vec<String>,
        /// Pass only --env entries instead of overlaying them on the host environment
        #[arg(long)]
        no_inherit_env: bool,
        /// Working directory for the script
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Do not log the script path before running
        #[arg(long)]
        no_log_command: bool,
    },
    /// Run a named step from a step file
    Run {
        /// Step name
        step: String,
        /// Path to the step file
        #[arg(long, default_value = "shellout.toml")]
        file: PathBuf,
    },
    /// List the steps in a step file
    List {
        /// Path to the step file
        #[arg(long, default_value = "shellout.toml")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Exec {
            command,
            output_logging,
            env,
            no_inherit_env,
            cwd,
            no_log_command,
        } => cmd_exec(
            &command,
            &output_logging,
            &env,
            no_inherit_env,
            cwd,
            no_log_command,
        ),
        Command::Script {
            path,
            output_logging,
            env,
            no_inherit_env,
            cwd,
            no_log_command,
        } => cmd_script(
            &path,
            &output_logging,
            &env,
            no_inherit_env,
            cwd,
            no_log_command,
        ),
        Command::Run { step, file } => cmd_run(&step, &file),
        Command::List { file } => cmd_list(&file),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn cmd_exec(
    command: &str,
    output_logging: &str,
    env: &[String],
    no_inherit_env: bool,
    cwd: Option<PathBuf>,
    no_log_command: bool,
) -> CliResult {
    let mode = OutputLogging::from_str(output_logging)?;
    let options = ExecOptions {
        env: build_env(env, no_inherit_env)?,
        cwd,
        log_shell_command: !no_log_command,
    };

    let result = shellout_exec::execute_shell_command(command, mode, &StderrSink, &options)?;

    if !result.success() {
        process::exit(result.exit_code);
    }
    Ok(())
}

fn cmd_script(
    path: &Path,
    output_logging: &str,
    env: &[String],
    no_inherit_env: bool,
    cwd: Option<PathBuf>,
    no_log_command: bool,
) -> CliResult {
    let mode = OutputLogging::from_str(output_logging)?;
    let options = ExecOptions {
        env: build_env(env, no_inherit_env)?,
        cwd,
        log_shell_command: !no_log_command,
    };

    let result = shellout_exec::execute_script_file(path, mode, &StderrSink, &options)?;

    if !result.success() {
        process::exit(result.exit_code);
    }
    Ok(())
}

fn cmd_run(step: &str, file: &Path) -> CliResult {
    let steps = StepFile::from_path(&step_file(file)?)?;
    let resolved = steps.resolve(step)?;

    let result = shellout_exec::execute_shell_command(
        &resolved.command,
        resolved.output_logging,
        &StderrSink,
        &resolved.options,
    )?;

    if result.success() {
        eprintln!("    Finished step `{step}`");
        Ok(())
    } else {
        eprintln!("    Step `{step}` exited with code {}", result.exit_code);
        process::exit(result.exit_code);
    }
}

fn cmd_list(file: &Path) -> CliResult {
    let steps = StepFile::from_path(&step_file(file)?)?;

    if steps.steps.is_empty() {
        eprintln!("No steps defined");
        return Ok(());
    }
    eprintln!("Available steps:");
    for (name, step) in &steps.steps {
        eprintln!("  {name}: {}", step.command);
    }
    Ok(())
}

/// Resolve the step file path, with a hint when it is absent.
fn step_file(file: &Path) -> Result<PathBuf, Box<dyn Error>> {
    if file.exists() {
        return Ok(file.to_path_buf());
    }
    Err(format!(
        "no {} found — pass --file to point at a step file",
        file.display()
    )
    .into())
}

/// Build the child environment from `--env` entries.
///
/// No entries and no `--no-inherit-env` means plain inheritance. Entries
/// are overlaid on the host environment unless `--no-inherit-env` makes
/// them the child's entire environment.
fn build_env(
    entries: &[String],
    no_inherit_env: bool,
) -> Result<Option<BTreeMap<String, String>>, Box<dyn Error>> {
    if entries.is_empty() && !no_inherit_env {
        return Ok(None);
    }

    let mut map: BTreeMap<String, String> = if no_inherit_env {
        BTreeMap::new()
    } else {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    };

    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(format!("invalid --env entry \"{entry}\" — expected KEY=VALUE").into());
        };
        map.insert(key.to_owned(), value.to_owned());
    }
    Ok(Some(map))
}
