//! Status codes returned by engine entry points.
//!
//! Zero is success, positive values are warnings and negative values are
//! errors. The names follow the engine's own header so they can be matched
//! against engine documentation.

#![allow(non_upper_case_globals)]

/// The operation succeeded.
pub const JET_errSuccess: i32 = 0;

// Warnings

/// The key was not unique.
pub const JET_wrnUniqueKey: i32 = 345;
/// The column value is null.
pub const JET_wrnColumnNull: i32 = 1004;
/// The output buffer was too small; data was truncated.
pub const JET_wrnBufferTruncated: i32 = 1006;
/// The database is already attached.
pub const JET_wrnDatabaseAttached: i32 = 1007;
/// A seek landed on a record that does not match the key exactly.
pub const JET_wrnSeekNotEqual: i32 = 1039;
/// The column was set to null.
pub const JET_wrnColumnSetNull: i32 = 1068;
/// The column value was truncated to its maximum length.
pub const JET_wrnColumnMaxTruncated: i32 = 1512;
/// A long value was copied rather than referenced.
pub const JET_wrnCopyLongValue: i32 = 1520;
/// The column was skipped.
pub const JET_wrnColumnSkipped: i32 = 1531;
/// The column value is not stored locally in the record.
pub const JET_wrnColumnNotLocal: i32 = 1532;
/// The column is present in the record.
pub const JET_wrnColumnPresent: i32 = 1533;
/// The column holds a single value.
pub const JET_wrnColumnSingleValue: i32 = 1537;
/// The column holds its default value.
pub const JET_wrnColumnDefault: i32 = 1538;

// Errors

/// Termination is in progress.
pub const JET_errTermInProgress: i32 = -1000;
/// A parameter was invalid.
pub const JET_errInvalidParameter: i32 = -1003;
/// The database id is invalid.
pub const JET_errInvalidDatabaseId: i32 = -1010;
/// The engine ran out of memory.
pub const JET_errOutOfMemory: i32 = -1011;
/// The record was deleted.
pub const JET_errRecordDeleted: i32 = -1017;
/// A disk I/O error occurred.
pub const JET_errDiskIO: i32 = -1022;
/// The instance has not been initialized.
pub const JET_errNotInitialized: i32 = -1029;
/// The instance is already initialized.
pub const JET_errAlreadyInitialized: i32 = -1030;
/// A buffer size was invalid.
pub const JET_errInvalidBufferSize: i32 = -1047;
/// The session has no active transaction.
pub const JET_errNotInTransaction: i32 = -1054;
/// Too many active users (sessions still open at termination).
pub const JET_errTooManyActiveUsers: i32 = -1059;
/// The instance name is already in use.
pub const JET_errInstanceNameInUse: i32 = -1086;
/// A write conflict was detected.
pub const JET_errWriteConflict: i32 = -1102;
/// The session handle is invalid.
pub const JET_errInvalidSesid: i32 = -1104;
/// The instance handle is invalid.
pub const JET_errInvalidInstance: i32 = -1115;
/// The database already exists.
pub const JET_errDatabaseDuplicate: i32 = -1201;
/// The database is in use.
pub const JET_errDatabaseInUse: i32 = -1202;
/// The database was not found.
pub const JET_errDatabaseNotFound: i32 = -1203;
/// The table is locked.
pub const JET_errTableLocked: i32 = -1302;
/// The table already exists.
pub const JET_errTableDuplicate: i32 = -1303;
/// The table is in use.
pub const JET_errTableInUse: i32 = -1304;
/// The object was not found.
pub const JET_errObjectNotFound: i32 = -1305;
/// The table id is invalid.
pub const JET_errInvalidTableId: i32 = -1310;
/// The table already has a primary index.
pub const JET_errIndexHasPrimary: i32 = -1401;
/// The index already exists.
pub const JET_errIndexDuplicate: i32 = -1403;
/// The index was not found.
pub const JET_errIndexNotFound: i32 = -1404;
/// The column value is too big.
pub const JET_errColumnTooBig: i32 = -1506;
/// The column was not found.
pub const JET_errColumnNotFound: i32 = -1507;
/// The column already exists.
pub const JET_errColumnDuplicate: i32 = -1508;
/// The column id is invalid.
pub const JET_errBadColumnId: i32 = -1517;
/// The multi-value sequence number is invalid.
pub const JET_errBadItagSequence: i32 = -1518;
/// A duplicate value was added to a unique multi-valued column.
pub const JET_errMultiValuedDuplicate: i32 = -1525;
/// No record matches the key.
pub const JET_errRecordNotFound: i32 = -1601;
/// The cursor is not positioned on a record.
pub const JET_errNoCurrentRecord: i32 = -1603;
/// The key violates a unique index.
pub const JET_errKeyDuplicate: i32 = -1605;
/// An update is already prepared.
pub const JET_errAlreadyPrepared: i32 = -1607;
/// No key has been made.
pub const JET_errKeyNotMade: i32 = -1608;
/// No update has been prepared.
pub const JET_errUpdateNotPrepared: i32 = -1609;
/// The database or cursor is read-only.
pub const JET_errPermissionDenied: i32 = -1809;
/// The file was not found.
pub const JET_errFileNotFound: i32 = -1811;
/// The session is being used by another thread.
pub const JET_errSessionSharingViolation: i32 = -1910;
/// The session context is already set.
pub const JET_errSessionContextAlreadySet: i32 = -1912;
/// The session context was not set by this thread.
pub const JET_errSessionContextNotSetByThisThread: i32 = -1913;
/// The session is in use and cannot be terminated.
pub const JET_errSessionInUse: i32 = -1914;
