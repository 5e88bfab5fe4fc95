//! Option flags ("grbits") and engine enumerations.

use std::ops::{BitOr, BitOrAssign};

/// Defines a transparent `u32` option-flag set with named bits.
macro_rules! define_grbit {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$fmeta:meta])* $flag:ident = $value:expr,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// No options.
            pub const NONE: Self = Self(0);
            $(
                $(#[$fmeta])*
                pub const $flag: Self = Self($value);
            )*

            /// Returns the raw bits handed to the engine.
            #[inline]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Returns true if every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns true if no bit is set.
            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

define_grbit!(
    /// Options for instance initialization.
    InitGrbit {}
);

define_grbit!(
    /// Options for instance termination.
    TermGrbit {
        /// Clean shutdown, waiting for background work.
        COMPLETE = 0x1,
        /// Dirty shutdown; open sessions are abandoned.
        ABRUPT = 0x2,
    }
);

define_grbit!(
    /// Options for ending a session.
    EndSessionGrbit {}
);

define_grbit!(
    /// Options for database creation.
    CreateDatabaseGrbit {
        /// Replace an existing database file.
        OVERWRITE_EXISTING = 0x200,
    }
);

define_grbit!(
    /// Options for attaching a database.
    AttachDatabaseGrbit {
        /// Attach read-only.
        READ_ONLY = 0x1,
        /// Delete indexes found to be corrupt.
        DELETE_CORRUPT_INDEXES = 0x10,
    }
);

define_grbit!(
    /// Options for opening a database.
    OpenDatabaseGrbit {
        /// Open read-only.
        READ_ONLY = 0x1,
        /// Open exclusively.
        EXCLUSIVE = 0x2,
    }
);

define_grbit!(
    /// Options for closing a database.
    CloseDatabaseGrbit {}
);

define_grbit!(
    /// Options for committing a transaction.
    CommitGrbit {
        /// Do not wait for the log to be flushed.
        LAZY_FLUSH = 0x1,
        /// Wait for the last level-0 commit to be flushed.
        WAIT_LAST_LEVEL0_COMMIT = 0x2,
    }
);

define_grbit!(
    /// Options for rolling back a transaction.
    RollbackGrbit {
        /// Roll back every nesting level.
        ROLLBACK_ALL = 0x1,
    }
);

define_grbit!(
    /// Options for opening a table.
    OpenTableGrbit {
        /// Deny other cursors write access.
        DENY_WRITE = 0x1,
        /// Deny other cursors read access.
        DENY_READ = 0x2,
        /// Open read-only.
        READ_ONLY = 0x4,
        /// Open for updates.
        UPDATABLE = 0x8,
        /// Permit schema changes on a fixed-DDL table.
        PERMIT_DDL = 0x10,
        /// Do not cache the table's pages.
        NO_CACHE = 0x20,
        /// Pre-read the table.
        PREREAD = 0x40,
        /// Hint for sequential scans.
        SEQUENTIAL = 0x8000,
    }
);

define_grbit!(
    /// Column definition options.
    ColumnGrbit {
        /// Fixed-size column.
        FIXED = 0x1,
        /// Tagged (sparse) column.
        TAGGED = 0x2,
        /// Null values are rejected.
        NOT_NULL = 0x4,
        /// Version column.
        VERSION = 0x8,
        /// Auto-increment column.
        AUTOINCREMENT = 0x10,
        /// Updatable column.
        UPDATABLE = 0x20,
        /// Multi-valued column (implies tagged).
        MULTI_VALUED = 0x400,
        /// Escrow-update column.
        ESCROW_UPDATE = 0x800,
        /// Unversioned column.
        UNVERSIONED = 0x1000,
    }
);

define_grbit!(
    /// Index creation options.
    CreateIndexGrbit {
        /// Keys must be unique.
        UNIQUE = 0x1,
        /// Primary (clustered) index.
        PRIMARY = 0x2,
        /// Null key segments are rejected.
        DISALLOW_NULL = 0x4,
        /// Records with an all-null key are not indexed.
        IGNORE_NULL = 0x8,
        /// Records with any null key segment are not indexed.
        IGNORE_ANY_NULL = 0x20,
        /// Records whose first key segment is null are not indexed.
        IGNORE_FIRST_NULL = 0x40,
        /// Create the index without flushing.
        LAZY_FLUSH = 0x80,
        /// Create an empty index without scanning existing records.
        EMPTY = 0x100,
        /// Unversioned index creation.
        UNVERSIONED = 0x200,
        /// Nulls sort after values.
        SORT_NULLS_HIGH = 0x400,
    }
);

define_grbit!(
    /// Key construction options.
    MakeKeyGrbit {
        /// Start a new key.
        NEW_KEY = 0x1,
        /// String prefix limit.
        STR_LIMIT = 0x2,
        /// Substring limit.
        SUB_STR_LIMIT = 0x4,
        /// The data is an already normalized key.
        NORMALIZED_KEY = 0x8,
        /// The segment is zero-length rather than null.
        KEY_DATA_ZERO_LENGTH = 0x10,
        /// Full column start limit.
        FULL_COLUMN_START_LIMIT = 0x100,
        /// Full column end limit.
        FULL_COLUMN_END_LIMIT = 0x200,
        /// Partial column start limit.
        PARTIAL_COLUMN_START_LIMIT = 0x400,
        /// Partial column end limit.
        PARTIAL_COLUMN_END_LIMIT = 0x800,
    }
);

define_grbit!(
    /// Seek options. Exactly one comparison bit is expected.
    SeekGrbit {
        /// Equal to the key.
        EQ = 0x1,
        /// Less than the key.
        LT = 0x2,
        /// Less than or equal to the key.
        LE = 0x4,
        /// Greater than or equal to the key.
        GE = 0x8,
        /// Greater than the key.
        GT = 0x10,
        /// Also set an index range.
        SET_INDEX_RANGE = 0x20,
    }
);

define_grbit!(
    /// Cursor movement options.
    MoveGrbit {
        /// Skip records with a duplicate key.
        MOVE_KEY_NE = 0x1,
    }
);

define_grbit!(
    /// Column retrieval options.
    RetrieveGrbit {
        /// Read from the copy buffer of a prepared update.
        RETRIEVE_COPY = 0x1,
        /// Read from the current index entry.
        RETRIEVE_FROM_INDEX = 0x2,
        /// Read from the primary bookmark.
        RETRIEVE_FROM_PRIMARY_BOOKMARK = 0x4,
        /// Retrieve the tag sequence.
        RETRIEVE_TAG = 0x8,
        /// Retrieve null values.
        RETRIEVE_NULL = 0x10,
        /// Ignore default values.
        RETRIEVE_IGNORE_DEFAULT = 0x20,
    }
);

define_grbit!(
    /// Column set options.
    SetGrbit {
        /// Append to a long value.
        APPEND_LV = 0x1,
        /// Overwrite part of a long value at the given offset.
        OVERWRITE_LV = 0x4,
        /// Resize a long value.
        SIZE_LV = 0x8,
        /// Store a zero-length value rather than null.
        ZERO_LENGTH = 0x20,
        /// Force the long value out of the record.
        SEPARATE_LV = 0x40,
        /// Reject duplicate values in a multi-valued column.
        UNIQUE_MULTI_VALUES = 0x80,
        /// Reject normalized duplicate values in a multi-valued column.
        UNIQUE_NORMALIZED_MULTI_VALUES = 0x100,
        /// Revert the column to its default value.
        REVERT_TO_DEFAULT_VALUE = 0x200,
        /// Force the long value into the record.
        INTRINSIC_LV = 0x400,
    }
);

/// Column data types (`JET_coltyp`).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Invalid type.
    Nil = 0,
    /// Boolean (1 byte).
    Bit = 1,
    /// Unsigned 8-bit integer.
    UnsignedByte = 2,
    /// Signed 16-bit integer.
    Short = 3,
    /// Signed 32-bit integer.
    Long = 4,
    /// Signed 64-bit currency value.
    Currency = 5,
    /// 32-bit float.
    IeeeSingle = 6,
    /// 64-bit float.
    IeeeDouble = 7,
    /// 64-bit date/time.
    DateTime = 8,
    /// Variable-length binary, up to 255 bytes.
    Binary = 9,
    /// Variable-length text, up to 255 bytes.
    Text = 10,
    /// Long binary value.
    LongBinary = 11,
    /// Long text value.
    LongText = 12,
    /// Unsigned 32-bit integer.
    UnsignedLong = 14,
    /// Signed 64-bit integer.
    LongLong = 15,
    /// 16-byte GUID.
    Guid = 16,
    /// Unsigned 16-bit integer.
    UnsignedShort = 17,
}

impl ColumnType {
    /// Converts a raw engine value.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Nil,
            1 => Self::Bit,
            2 => Self::UnsignedByte,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Currency,
            6 => Self::IeeeSingle,
            7 => Self::IeeeDouble,
            8 => Self::DateTime,
            9 => Self::Binary,
            10 => Self::Text,
            11 => Self::LongBinary,
            12 => Self::LongText,
            14 => Self::UnsignedLong,
            15 => Self::LongLong,
            16 => Self::Guid,
            17 => Self::UnsignedShort,
            _ => return None,
        })
    }

    /// Size of a fixed-size value of this type, or `None` for variable types.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Bit | Self::UnsignedByte => Some(1),
            Self::Short | Self::UnsignedShort => Some(2),
            Self::Long | Self::UnsignedLong | Self::IeeeSingle => Some(4),
            Self::Currency | Self::IeeeDouble | Self::DateTime | Self::LongLong => Some(8),
            Self::Guid => Some(16),
            Self::Nil | Self::Binary | Self::Text | Self::LongBinary | Self::LongText => None,
        }
    }

    /// Returns true for long-value types.
    pub const fn is_long_value(self) -> bool {
        matches!(self, Self::LongBinary | Self::LongText)
    }

    /// Returns true for text types.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text | Self::LongText)
    }
}

/// Update preparation mode (`JET_prep`).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prep {
    /// Insert a new record.
    Insert = 0,
    /// Replace the current record without taking a write lock.
    ReplaceNoLock = 1,
    /// Replace the current record.
    Replace = 2,
    /// Cancel the prepared update.
    Cancel = 3,
    /// Insert a copy of the current record.
    InsertCopy = 5,
}

impl Prep {
    /// Converts a raw engine value.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Insert,
            1 => Self::ReplaceNoLock,
            2 => Self::Replace,
            3 => Self::Cancel,
            5 => Self::InsertCopy,
            _ => return None,
        })
    }
}

/// System parameter identifiers (`JET_param`).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    /// Directory for the checkpoint file.
    SystemPath = 0,
    /// Path of the temporary database.
    TempPath = 1,
    /// Directory for transaction log files.
    LogFilePath = 2,
    /// Three-letter base name of log and checkpoint files.
    BaseName = 3,
    /// Event log source name.
    EventSource = 4,
    /// Maximum number of sessions.
    MaxSessions = 5,
    /// Maximum number of open tables.
    MaxOpenTables = 6,
    /// Maximum number of open cursors.
    MaxCursors = 8,
    /// Maximum number of version store pages.
    MaxVerPages = 9,
    /// Maximum number of temporary tables.
    MaxTemporaryTables = 10,
    /// Log file size in kilobytes.
    LogFileSize = 11,
    /// Log buffer count.
    LogBuffers = 12,
    /// Circular logging on (1) or off (0).
    CircularLog = 17,
    /// Maximum database cache size in pages.
    CacheSizeMax = 23,
    /// Crash recovery, `"On"` or `"Off"`.
    Recovery = 34,
    /// Database page size in bytes.
    DatabasePageSize = 64,
    /// Create missing directories for configured paths.
    CreatePathIfNotExist = 100,
}

impl Param {
    /// Converts a raw engine value.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::SystemPath,
            1 => Self::TempPath,
            2 => Self::LogFilePath,
            3 => Self::BaseName,
            4 => Self::EventSource,
            5 => Self::MaxSessions,
            6 => Self::MaxOpenTables,
            8 => Self::MaxCursors,
            9 => Self::MaxVerPages,
            10 => Self::MaxTemporaryTables,
            11 => Self::LogFileSize,
            12 => Self::LogBuffers,
            17 => Self::CircularLog,
            23 => Self::CacheSizeMax,
            34 => Self::Recovery,
            64 => Self::DatabasePageSize,
            100 => Self::CreatePathIfNotExist,
            _ => return None,
        })
    }

    /// Returns true if the parameter takes a string value.
    pub const fn is_string(self) -> bool {
        matches!(
            self,
            Self::SystemPath
                | Self::TempPath
                | Self::LogFilePath
                | Self::BaseName
                | Self::EventSource
                | Self::Recovery
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grbit_combination() {
        let grbit = ColumnGrbit::TAGGED | ColumnGrbit::MULTI_VALUED;
        assert!(grbit.contains(ColumnGrbit::TAGGED));
        assert!(grbit.contains(ColumnGrbit::MULTI_VALUED));
        assert!(!grbit.contains(ColumnGrbit::FIXED));
        assert_eq!(grbit.bits(), 0x402);
        assert!(SetGrbit::NONE.is_empty());
    }

    #[test]
    fn grbit_or_assign() {
        let mut grbit = RetrieveGrbit::NONE;
        grbit |= RetrieveGrbit::RETRIEVE_COPY;
        assert_eq!(grbit, RetrieveGrbit::RETRIEVE_COPY);
    }

    #[test]
    fn column_type_raw_values() {
        for raw in 0..=20 {
            if let Some(coltyp) = ColumnType::from_raw(raw) {
                assert_eq!(coltyp as u32, raw);
            }
        }
        assert_eq!(ColumnType::from_raw(13), None);
        assert_eq!(ColumnType::Long.fixed_size(), Some(4));
        assert_eq!(ColumnType::LongBinary.fixed_size(), None);
        assert!(ColumnType::LongText.is_long_value());
        assert!(ColumnType::Text.is_text());
    }

    #[test]
    fn param_raw_values() {
        assert_eq!(Param::from_raw(34), Some(Param::Recovery));
        assert_eq!(Param::from_raw(7), None);
        assert!(Param::Recovery.is_string());
        assert!(!Param::MaxSessions.is_string());
    }

    #[test]
    fn prep_raw_values() {
        assert_eq!(Prep::from_raw(2), Some(Prep::Replace));
        assert_eq!(Prep::from_raw(4), None);
    }
}
