//! Parse and validate `shellout.toml` step files.

pub mod stepfile;

pub use stepfile::{ResolvedStep, Step, StepFile, StepFileError};
