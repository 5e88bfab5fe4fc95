//! Errors reported by the command-line tools.

use jetbind_core::JetError;
use jetbind_sys::LoadError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The binding reported an error.
    #[error(transparent)]
    Jet(#[from] JetError),

    /// A native engine library could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Writing JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Creating the scratch directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A code argument was neither a number nor a known name.
    #[error("unrecognized status code '{0}'")]
    UnknownCode(String),

    /// The `--format` value is not supported.
    #[error("unknown output format '{0}' (expected text or json)")]
    UnknownFormat(String),

    /// The self-test ran but at least one check failed.
    #[error("self-test failed: {failed} of {total} checks did not pass")]
    SelfTestFailed {
        /// Failed checks.
        failed: usize,
        /// All checks.
        total: usize,
    },
}
