//! # jetbind sys
//!
//! Raw ABI surface of the Jet ISAM engine.
//!
//! This crate provides:
//! - Opaque handle newtypes (instance, session, database, table, column)
//! - Status code constants as returned by every engine entry point
//! - Option flag ("grbit") types and engine enumerations
//! - Fixed-layout `#[repr(C)]` parameter records
//! - The [`JetApi`] trait: the flat call surface every engine implements
//! - [`DynamicApi`]: an implementation that forwards to a native engine
//!   library loaded at run time
//!
//! Nothing in this crate interprets status codes or enforces handle
//! lifetimes; that is the job of `jetbind_core`.

#![warn(missing_docs)]

mod api;
pub mod codes;
mod dynamic;
mod error;
mod grbit;
mod handles;
mod records;

pub use api::JetApi;
pub use dynamic::{DynamicApi, DEFAULT_LIBRARY};
pub use error::{LoadError, LoadResult};
pub use grbit::{
    AttachDatabaseGrbit, CloseDatabaseGrbit, ColumnGrbit, ColumnType, CommitGrbit,
    CreateDatabaseGrbit, CreateIndexGrbit, EndSessionGrbit, InitGrbit, MakeKeyGrbit, MoveGrbit,
    OpenDatabaseGrbit, OpenTableGrbit, Param, Prep, RetrieveGrbit, RollbackGrbit, SeekGrbit,
    SetGrbit, TermGrbit,
};
pub use handles::{ColumnId, DatabaseId, InstanceHandle, SessionHandle, TableHandle};
pub use records::{NativeColumnDef, NativeRetrieveColumn, NativeSetColumn};

/// Row count passed to [`JetApi::move_cursor`] to move to the first record.
pub const MOVE_FIRST: i32 = i32::MIN;

/// Row count passed to [`JetApi::move_cursor`] to move to the next record.
pub const MOVE_NEXT: i32 = 1;

/// Row count passed to [`JetApi::move_cursor`] to move to the previous record.
pub const MOVE_PREVIOUS: i32 = -1;

/// Row count passed to [`JetApi::move_cursor`] to move to the last record.
pub const MOVE_LAST: i32 = i32::MAX;

/// Size in bytes of the largest bookmark the engine produces.
pub const MAX_BOOKMARK_SIZE: usize = 256;
