use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use shellout_exec::{ExecError, ExecOptions, OutputLogging};

/// The `shellout.toml` step file.
///
/// Declares named shell steps for a pipeline host, each with its own
/// output handling, environment, and working directory:
///
/// ```toml
/// [defaults]
/// output_logging = "STREAM"
///
/// [steps.transform]
/// command = "dbt run --profiles-dir ."
/// cwd = "pipelines/transform"
///
/// [steps.transform.env]
/// DBT_TARGET = "prod"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StepFile {
    /// File-level fallbacks applied to steps that leave a field unset.
    #[serde(default)]
    pub defaults: Defaults,
    /// Steps by name.
    #[serde(default)]
    pub steps: BTreeMap<String, Step>,
}

/// File-level defaults for optional step fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    /// Output handling mode name (`NONE`, `BUFFER`, `STREAM`).
    pub output_logging: Option<String>,
    /// Whether steps log their command line before running.
    pub log_shell_command: Option<bool>,
}

/// One named step.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// The shell command to run.
    pub command: String,
    /// Output handling mode name; falls back to `[defaults]`, then `BUFFER`.
    pub output_logging: Option<String>,
    /// Working directory for the step.
    pub cwd: Option<PathBuf>,
    /// Environment entries for the step.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Overlay `env` on the host environment (default) instead of passing
    /// `env` as the child's entire environment.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
    /// Whether to log the command line; falls back to `[defaults]`, then true.
    pub log_shell_command: Option<bool>,
}

fn default_inherit_env() -> bool {
    true
}

/// A step resolved against the file-level defaults, ready to execute.
#[derive(Debug)]
pub struct ResolvedStep {
    /// The shell command to run.
    pub command: String,
    /// The resolved output handling mode.
    pub output_logging: OutputLogging,
    /// Execution overrides derived from the step's env/cwd settings.
    pub options: ExecOptions,
}

impl StepFile {
    /// Read and parse a `shellout.toml` from the given path.
    ///
    /// Every `output_logging` value in the file is validated here, so an
    /// unrecognized mode fails the load before any step runs.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or names an unrecognized output logging mode.
    pub fn from_path(path: &Path) -> Result<Self, StepFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| StepFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: StepFile = toml::from_str(&content).map_err(|source| StepFileError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), StepFileError> {
        if let Some(mode) = &self.defaults.output_logging {
            OutputLogging::from_str(mode)
                .map_err(|source| StepFileError::InvalidDefaultMode { source })?;
        }
        for (name, step) in &self.steps {
            if let Some(mode) = &step.output_logging {
                OutputLogging::from_str(mode).map_err(|source| StepFileError::InvalidMode {
                    step: name.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Resolve the named step against the file-level defaults.
    ///
    /// With `inherit_env = true` (the default) the step's `env` table is
    /// overlaid on the host environment and the superset becomes the child's
    /// environment; an empty table leaves inheritance to the OS. With
    /// `inherit_env = false` the table is the child's entire environment.
    ///
    /// # Errors
    /// Returns an error if no step has that name or its mode is unrecognized.
    pub fn resolve(&self, name: &str) -> Result<ResolvedStep, StepFileError> {
        let Some(step) = self.steps.get(name) else {
            return Err(StepFileError::UnknownStep {
                name: name.to_owned(),
                available: self.available_steps(),
            });
        };

        let mode_name = step
            .output_logging
            .as_ref()
            .or(self.defaults.output_logging.as_ref());
        let output_logging = match mode_name {
            Some(mode) => {
                OutputLogging::from_str(mode).map_err(|source| StepFileError::InvalidMode {
                    step: name.to_owned(),
                    source,
                })?
            }
            None => OutputLogging::default(),
        };

        let env = if step.inherit_env {
            if step.env.is_empty() {
                None
            } else {
                let mut merged: BTreeMap<String, String> = std::env::vars_os()
                    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                    .collect();
                merged.extend(step.env.clone());
                Some(merged)
            }
        } else {
            Some(step.env.clone())
        };

        let log_shell_command = step
            .log_shell_command
            .or(self.defaults.log_shell_command)
            .unwrap_or(true);

        Ok(ResolvedStep {
            command: step.command.clone(),
            output_logging,
            options: ExecOptions {
                env,
                cwd: step.cwd.clone(),
                log_shell_command,
            },
        })
    }

    fn available_steps(&self) -> String {
        if self.steps.is_empty() {
            "(none)".to_owned()
        } else {
            self.steps
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Errors produced when loading or resolving a step file.
#[derive(Debug, thiserror::Error)]
pub enum StepFileError {
    /// The file cannot be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The file is not valid TOML.
    #[error("invalid shellout.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    /// `[defaults]` names an unrecognized output logging mode.
    #[error("invalid output_logging in [defaults]: {source}")]
    InvalidDefaultMode { source: ExecError },

    /// A step names an unrecognized output logging mode.
    #[error("invalid output_logging for step \"{step}\": {source}")]
    InvalidMode { step: String, source: ExecError },

    /// No step has the requested name.
    #[error("no step named \"{name}\" — available steps: {available}")]
    UnknownStep { name: String, available: String },
}
