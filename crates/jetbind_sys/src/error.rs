//! Errors raised while loading a native engine library.

use thiserror::Error;

/// Result type for library loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while loading a native engine library.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The library could not be loaded.
    #[error("failed to load engine library '{path}': {source}")]
    Library {
        /// Path or name that was loaded.
        path: String,
        /// Underlying loader error.
        source: libloading::Error,
    },

    /// A required entry point is missing from the library.
    #[error("engine library '{path}' does not export '{symbol}': {source}")]
    Symbol {
        /// Path or name of the library.
        path: String,
        /// Name of the missing entry point.
        symbol: &'static str,
        /// Underlying loader error.
        source: libloading::Error,
    },
}
