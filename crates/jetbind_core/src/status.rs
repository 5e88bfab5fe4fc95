//! Classification of engine status codes.
//!
//! Every engine entry point returns a signed 32-bit code. The sign decides
//! the class: zero is success, positive values are warnings and negative
//! values are errors. Named conditions are recognized; anything else is
//! carried through with its raw value so classification never fails.

use std::fmt;

use jetbind_sys::codes::*;

use crate::error::{JetError, JetResult};

macro_rules! named_codes {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident {
            $($variant:ident = $code:expr => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[doc = $text]
                $variant,
            )*
            /// A code with no named variant; carries the raw value.
            $fallback(i32),
        }

        impl $name {
            /// Returns the numeric code for this condition.
            pub const fn code(self) -> i32 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::$fallback(code) => code,
                }
            }

            /// Maps a raw code to its named condition, falling back to
            #[doc = concat!("`", stringify!($fallback), "`.")]
            pub const fn from_code(code: i32) -> Self {
                match code {
                    $(c if c == $code => Self::$variant,)*
                    other => Self::$fallback(other),
                }
            }

            /// Short human-readable description.
            pub const fn description(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                    Self::$fallback(_) => "unrecognized status code",
                }
            }

            /// Name of the condition, or `None` for the fallback variant.
            pub const fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some(stringify!($variant)),)*
                    Self::$fallback(_) => None,
                }
            }

            /// Every named condition, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => write!(f, "{name} ({})", self.code()),
                    None => write!(f, "code {}", self.code()),
                }
            }
        }
    };
}

named_codes! {
    /// A non-fatal condition reported alongside a successful call.
    Warning, fallback = Other {
        UniqueKey = JET_wrnUniqueKey => "the key was not unique",
        ColumnNull = JET_wrnColumnNull => "the column value is null",
        BufferTruncated = JET_wrnBufferTruncated => "the output buffer was too small; data was truncated",
        DatabaseAttached = JET_wrnDatabaseAttached => "the database is already attached",
        SeekNotEqual = JET_wrnSeekNotEqual => "the cursor landed on a record that does not match the key exactly",
        ColumnSetNull = JET_wrnColumnSetNull => "the column was set to null",
        ColumnMaxTruncated = JET_wrnColumnMaxTruncated => "the column value was truncated to its maximum length",
        CopyLongValue = JET_wrnCopyLongValue => "a long value was copied",
        ColumnSkipped = JET_wrnColumnSkipped => "the column was skipped",
        ColumnNotLocal = JET_wrnColumnNotLocal => "the column value is not stored in the record",
        ColumnPresent = JET_wrnColumnPresent => "the column is present",
        ColumnSingleValue = JET_wrnColumnSingleValue => "the column holds a single value",
        ColumnDefault = JET_wrnColumnDefault => "the column holds its default value",
    }
}

named_codes! {
    /// A failure reported by the engine.
    ErrorKind, fallback = Unknown {
        TermInProgress = JET_errTermInProgress => "termination is in progress",
        InvalidParameter = JET_errInvalidParameter => "a parameter was invalid",
        InvalidDatabaseId = JET_errInvalidDatabaseId => "the database id is invalid",
        OutOfMemory = JET_errOutOfMemory => "the engine ran out of memory",
        RecordDeleted = JET_errRecordDeleted => "the record was deleted",
        DiskIo = JET_errDiskIO => "a disk I/O error occurred",
        NotInitialized = JET_errNotInitialized => "the instance has not been initialized",
        AlreadyInitialized = JET_errAlreadyInitialized => "the instance is already initialized",
        InvalidBufferSize = JET_errInvalidBufferSize => "a buffer size was invalid",
        NotInTransaction = JET_errNotInTransaction => "the session has no active transaction",
        TooManyActiveUsers = JET_errTooManyActiveUsers => "sessions are still active",
        InstanceNameInUse = JET_errInstanceNameInUse => "the instance name is already in use",
        WriteConflict = JET_errWriteConflict => "a write conflict was detected",
        InvalidSessionId = JET_errInvalidSesid => "the session handle is invalid",
        InvalidInstance = JET_errInvalidInstance => "the instance handle is invalid",
        DatabaseDuplicate = JET_errDatabaseDuplicate => "the database already exists",
        DatabaseInUse = JET_errDatabaseInUse => "the database is in use",
        DatabaseNotFound = JET_errDatabaseNotFound => "the database was not found",
        TableLocked = JET_errTableLocked => "the table is locked",
        TableDuplicate = JET_errTableDuplicate => "the table already exists",
        TableInUse = JET_errTableInUse => "the table is in use",
        ObjectNotFound = JET_errObjectNotFound => "the object was not found",
        InvalidTableId = JET_errInvalidTableId => "the table id is invalid",
        IndexHasPrimary = JET_errIndexHasPrimary => "the table already has a primary index",
        IndexDuplicate = JET_errIndexDuplicate => "the index already exists",
        IndexNotFound = JET_errIndexNotFound => "the index was not found",
        ColumnTooBig = JET_errColumnTooBig => "the column value is too big",
        ColumnNotFound = JET_errColumnNotFound => "the column was not found",
        ColumnDuplicate = JET_errColumnDuplicate => "the column already exists",
        BadColumnId = JET_errBadColumnId => "the column id is invalid",
        BadItagSequence = JET_errBadItagSequence => "the multi-value sequence number is invalid",
        MultiValuedDuplicate = JET_errMultiValuedDuplicate => "duplicate value in a unique multi-valued column",
        RecordNotFound = JET_errRecordNotFound => "no record matches the key",
        NoCurrentRecord = JET_errNoCurrentRecord => "the cursor is not positioned on a record",
        KeyDuplicate = JET_errKeyDuplicate => "the key violates a unique index",
        AlreadyPrepared = JET_errAlreadyPrepared => "an update is already prepared",
        KeyNotMade = JET_errKeyNotMade => "no search key has been made",
        UpdateNotPrepared = JET_errUpdateNotPrepared => "no update has been prepared",
        PermissionDenied = JET_errPermissionDenied => "the database or cursor is read-only",
        FileNotFound = JET_errFileNotFound => "the file was not found",
        SessionSharingViolation = JET_errSessionSharingViolation => "the session is in use by another thread",
        SessionContextAlreadySet = JET_errSessionContextAlreadySet => "the session context is already set",
        SessionContextNotSetByThisThread = JET_errSessionContextNotSetByThisThread => "the session context was not set by this thread",
        SessionInUse = JET_errSessionInUse => "the session still has open resources",
    }
}

/// Classified outcome of an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The call succeeded.
    Success,
    /// The call succeeded with a warning.
    Warning(Warning),
    /// The call failed.
    Error(ErrorKind),
}

impl Status {
    /// Returns the numeric code this status was classified from.
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => JET_errSuccess,
            Self::Warning(w) => w.code(),
            Self::Error(e) => e.code(),
        }
    }

    /// Returns true for [`Status::Success`].
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for [`Status::Warning`].
    pub const fn is_warning(self) -> bool {
        matches!(self, Self::Warning(_))
    }

    /// Returns true for [`Status::Error`].
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the warning, if any.
    pub const fn warning(self) -> Option<Warning> {
        match self {
            Self::Warning(w) => Some(w),
            _ => None,
        }
    }

    /// Returns the error kind, if any.
    pub const fn error(self) -> Option<ErrorKind> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Warning(w) => write!(f, "warning {w}"),
            Self::Error(e) => write!(f, "error {e}"),
        }
    }
}

/// Classifies a raw engine code.
pub const fn classify(code: i32) -> Status {
    if code == JET_errSuccess {
        Status::Success
    } else if code > 0 {
        Status::Warning(Warning::from_code(code))
    } else {
        Status::Error(ErrorKind::from_code(code))
    }
}

/// Converts a raw engine code into a result.
///
/// Errors become [`JetError::Native`] tagged with `operation`. Warnings are
/// logged at debug level and returned so callers that care can inspect them.
pub fn check(code: i32, operation: &'static str) -> JetResult<Option<Warning>> {
    match classify(code) {
        Status::Success => Ok(None),
        Status::Warning(warning) => {
            tracing::debug!(operation, %warning, "engine returned a warning");
            Ok(Some(warning))
        }
        Status::Error(kind) => Err(JetError::native(kind, operation)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sign_decides_class() {
        assert_eq!(classify(0), Status::Success);
        assert_eq!(classify(1006), Status::Warning(Warning::BufferTruncated));
        assert_eq!(classify(-1603), Status::Error(ErrorKind::NoCurrentRecord));
        assert_eq!(classify(7), Status::Warning(Warning::Other(7)));
        assert_eq!(classify(-7), Status::Error(ErrorKind::Unknown(-7)));
    }

    #[test]
    fn named_variants_round_trip() {
        for w in Warning::ALL {
            assert!(w.code() > 0, "{w:?}");
            assert_eq!(Warning::from_code(w.code()), *w);
        }
        for e in ErrorKind::ALL {
            assert!(e.code() < 0, "{e:?}");
            assert_eq!(ErrorKind::from_code(e.code()), *e);
        }
    }

    #[test]
    fn named_codes_are_distinct() {
        let mut codes: Vec<i32> = ErrorKind::ALL.iter().map(|e| e.code()).collect();
        codes.extend(Warning::ALL.iter().map(|w| w.code()));
        let before = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), before);
    }

    #[test]
    fn check_passes_warnings_through() {
        assert_eq!(check(0, "op").unwrap(), None);
        assert_eq!(check(1004, "op").unwrap(), Some(Warning::ColumnNull));
        let err = check(-1507, "JetRetrieveColumns").unwrap_err();
        assert_eq!(err.native_kind(), Some(ErrorKind::ColumnNotFound));
        assert!(err.to_string().contains("JetRetrieveColumns"));
    }

    #[test]
    fn display_names_known_codes() {
        assert_eq!(ErrorKind::KeyDuplicate.to_string(), "KeyDuplicate (-1605)");
        assert_eq!(Warning::Other(42).to_string(), "code 42");
        assert_eq!(classify(0).to_string(), "success");
    }

    proptest! {
        #[test]
        fn classify_is_total_and_preserves_code(code in any::<i32>()) {
            let status = classify(code);
            prop_assert_eq!(status.code(), code);
            prop_assert_eq!(status.is_error(), code < 0);
            prop_assert_eq!(status.is_warning(), code > 0);
        }
    }
}
