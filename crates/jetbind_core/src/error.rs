//! Error types for jetbind core.

use thiserror::Error;

use crate::resource::ResourceKind;
use crate::status::ErrorKind;

/// Result type for core operations.
pub type JetResult<T> = Result<T, JetError>;

/// Errors that can occur in jetbind core operations.
#[derive(Debug, Error)]
pub enum JetError {
    /// The engine reported a failure.
    #[error("{operation} failed: {kind}: {}", .kind.description())]
    Native {
        /// Classified error.
        kind: ErrorKind,
        /// Raw code returned by the engine.
        code: i32,
        /// Engine entry point that failed.
        operation: &'static str,
    },

    /// The wrapper was never allocated.
    #[error("{kind} handle has not been allocated")]
    InvalidHandle {
        /// Kind of handle.
        kind: ResourceKind,
    },

    /// The wrapper has already been released.
    #[error("{kind} handle has already been released")]
    AlreadyDisposed {
        /// Kind of handle.
        kind: ResourceKind,
    },

    /// The wrapper already holds a handle.
    #[error("{kind} handle is already allocated")]
    AlreadyAllocated {
        /// Kind of handle.
        kind: ResourceKind,
    },

    /// A size, offset or count is out of range.
    #[error("{parameter} out of range: {message}")]
    OutOfRange {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Description of the violation.
        message: String,
    },

    /// An argument is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The engine library could not be loaded.
    #[error("engine load failed: {message}")]
    Load {
        /// Description of the failure.
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the failure.
        message: String,
    },
}

impl JetError {
    /// Creates a native failure error.
    pub fn native(kind: ErrorKind, operation: &'static str) -> Self {
        Self::Native {
            kind,
            code: kind.code(),
            operation,
        }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::OutOfRange {
            parameter,
            message: message.into(),
        }
    }

    /// Creates an out-of-range error for a value that does not fit the
    /// engine's 32-bit field.
    pub fn overflow(parameter: &'static str, value: usize) -> Self {
        Self::out_of_range(
            parameter,
            format!("overflow: {value} does not fit in 32 bits"),
        )
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns the classified engine error, if this is a native failure.
    pub fn native_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Native { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns true if this is the given native failure.
    pub fn is_native(&self, kind: ErrorKind) -> bool {
        self.native_kind() == Some(kind)
    }
}

impl From<jetbind_sys::LoadError> for JetError {
    fn from(err: jetbind_sys::LoadError) -> Self {
        Self::Load {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_carries_code() {
        let err = JetError::native(ErrorKind::KeyDuplicate, "JetUpdate");
        match &err {
            JetError::Native { code, .. } => assert_eq!(*code, -1605),
            other => panic!("unexpected: {other}"),
        }
        assert!(err.is_native(ErrorKind::KeyDuplicate));
        assert_eq!(
            err.to_string(),
            "JetUpdate failed: KeyDuplicate (-1605): the key violates a unique index"
        );
    }

    #[test]
    fn unknown_code_keeps_raw_value() {
        let err = JetError::native(ErrorKind::Unknown(-4242), "JetSeek");
        match err {
            JetError::Native { code, .. } => assert_eq!(code, -4242),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn overflow_message() {
        let err = JetError::overflow("capacity", usize::MAX);
        assert!(err.to_string().starts_with("capacity out of range: overflow"));
        assert_eq!(err.native_kind(), None);
    }

    #[test]
    fn lifecycle_messages_name_kind() {
        let err = JetError::AlreadyDisposed {
            kind: ResourceKind::Session,
        };
        assert_eq!(err.to_string(), "session handle has already been released");
    }
}
