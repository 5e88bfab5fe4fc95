//! The flat engine call surface.

use std::ffi::CStr;

use crate::grbit::{
    AttachDatabaseGrbit, CloseDatabaseGrbit, CommitGrbit, CreateDatabaseGrbit, CreateIndexGrbit,
    EndSessionGrbit, InitGrbit, MakeKeyGrbit, MoveGrbit, OpenDatabaseGrbit, OpenTableGrbit, Param,
    Prep, RollbackGrbit, SeekGrbit, TermGrbit,
};
use crate::handles::{ColumnId, DatabaseId, InstanceHandle, SessionHandle, TableHandle};
use crate::records::{NativeColumnDef, NativeRetrieveColumn, NativeSetColumn};

/// The engine's flat function-call ABI.
///
/// Every method maps one-to-one onto an engine entry point and returns the
/// engine's raw status code: zero for success, positive for a warning,
/// negative for an error. Output handles are written through `&mut`
/// parameters only when the call succeeds.
///
/// Implementations do not validate handle lifetimes or buffer sizes beyond
/// what the engine itself does. Callers are expected to go through
/// `jetbind_core`, which enforces both.
///
/// # Implementors
///
/// - [`crate::DynamicApi`] - forwards to a native engine library
/// - `jetbind_sim::SimEngine` - in-memory engine for tests and tooling
pub trait JetApi: Send + Sync {
    /// Allocates a new instance (`JetCreateInstance2`).
    fn create_instance(
        &self,
        name: &CStr,
        display_name: Option<&CStr>,
        instance: &mut InstanceHandle,
    ) -> i32;

    /// Initializes an instance (`JetInit2`).
    fn init(&self, instance: &mut InstanceHandle, grbit: InitGrbit) -> i32;

    /// Shuts an instance down and frees it (`JetTerm2`).
    fn term(&self, instance: InstanceHandle, grbit: TermGrbit) -> i32;

    /// Sets a system parameter (`JetSetSystemParameter`).
    ///
    /// `instance` may be [`InstanceHandle::NIL`] for process-wide parameters.
    fn set_system_parameter(
        &self,
        instance: InstanceHandle,
        session: SessionHandle,
        param: Param,
        value: usize,
        text: Option<&CStr>,
    ) -> i32;

    /// Reads a system parameter (`JetGetSystemParameter`).
    ///
    /// Integer parameters are written to `value`; string parameters are
    /// written NUL-terminated into `text`.
    fn get_system_parameter(
        &self,
        instance: InstanceHandle,
        session: SessionHandle,
        param: Param,
        value: &mut usize,
        text: &mut [u8],
    ) -> i32;

    /// Begins a session (`JetBeginSession`).
    fn begin_session(&self, instance: InstanceHandle, session: &mut SessionHandle) -> i32;

    /// Ends a session (`JetEndSession`).
    fn end_session(&self, session: SessionHandle, grbit: EndSessionGrbit) -> i32;

    /// Associates the session with the calling thread under `context`
    /// (`JetSetSessionContext`).
    fn set_session_context(&self, session: SessionHandle, context: usize) -> i32;

    /// Removes the association made by `set_session_context`
    /// (`JetResetSessionContext`).
    fn reset_session_context(&self, session: SessionHandle) -> i32;

    /// Creates, attaches and opens a database (`JetCreateDatabase`).
    fn create_database(
        &self,
        session: SessionHandle,
        path: &CStr,
        grbit: CreateDatabaseGrbit,
        database: &mut DatabaseId,
    ) -> i32;

    /// Attaches an existing database file (`JetAttachDatabase`).
    fn attach_database(&self, session: SessionHandle, path: &CStr, grbit: AttachDatabaseGrbit)
        -> i32;

    /// Opens an attached database for the session (`JetOpenDatabase`).
    fn open_database(
        &self,
        session: SessionHandle,
        path: &CStr,
        grbit: OpenDatabaseGrbit,
        database: &mut DatabaseId,
    ) -> i32;

    /// Closes a database opened by the session (`JetCloseDatabase`).
    fn close_database(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        grbit: CloseDatabaseGrbit,
    ) -> i32;

    /// Detaches a database file, or every database when `path` is `None`
    /// (`JetDetachDatabase`).
    fn detach_database(&self, session: SessionHandle, path: Option<&CStr>) -> i32;

    /// Begins a (possibly nested) transaction (`JetBeginTransaction`).
    fn begin_transaction(&self, session: SessionHandle) -> i32;

    /// Commits the innermost transaction (`JetCommitTransaction`).
    fn commit_transaction(&self, session: SessionHandle, grbit: CommitGrbit) -> i32;

    /// Rolls back the innermost transaction (`JetRollback`).
    fn rollback(&self, session: SessionHandle, grbit: RollbackGrbit) -> i32;

    /// Creates a table and opens a cursor on it (`JetCreateTable`).
    fn create_table(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        name: &CStr,
        pages: u32,
        density: u32,
        table: &mut TableHandle,
    ) -> i32;

    /// Opens a cursor on a table (`JetOpenTable`).
    fn open_table(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        name: &CStr,
        grbit: OpenTableGrbit,
        table: &mut TableHandle,
    ) -> i32;

    /// Closes a cursor (`JetCloseTable`).
    fn close_table(&self, session: SessionHandle, table: TableHandle) -> i32;

    /// Deletes a table (`JetDeleteTable`).
    fn delete_table(&self, session: SessionHandle, database: DatabaseId, name: &CStr) -> i32;

    /// Adds a column to a table (`JetAddColumn`).
    fn add_column(
        &self,
        session: SessionHandle,
        table: TableHandle,
        name: &CStr,
        definition: &NativeColumnDef,
        default_value: &[u8],
        column: &mut ColumnId,
    ) -> i32;

    /// Creates an index (`JetCreateIndex`).
    ///
    /// `key` is the engine's key description: a sequence of `+column` or
    /// `-column` segments, each NUL-terminated, followed by an extra NUL.
    fn create_index(
        &self,
        session: SessionHandle,
        table: TableHandle,
        name: &CStr,
        grbit: CreateIndexGrbit,
        key: &[u8],
        density: u32,
    ) -> i32;

    /// Selects the cursor's current index; `None` selects the primary index
    /// (`JetSetCurrentIndex`).
    fn set_current_index(&self, session: SessionHandle, table: TableHandle, index: Option<&CStr>)
        -> i32;

    /// Adds one key segment to the cursor's search key (`JetMakeKey`).
    fn make_key(&self, session: SessionHandle, table: TableHandle, data: &[u8], grbit: MakeKeyGrbit)
        -> i32;

    /// Positions the cursor using the search key (`JetSeek`).
    fn seek(&self, session: SessionHandle, table: TableHandle, grbit: SeekGrbit) -> i32;

    /// Moves the cursor (`JetMove`). See [`crate::MOVE_FIRST`] and friends.
    fn move_cursor(&self, session: SessionHandle, table: TableHandle, rows: i32, grbit: MoveGrbit)
        -> i32;

    /// Copies the bookmark of the current record into `bookmark`
    /// (`JetGetBookmark`).
    fn get_bookmark(
        &self,
        session: SessionHandle,
        table: TableHandle,
        bookmark: &mut [u8],
        actual: &mut u32,
    ) -> i32;

    /// Positions the cursor on the record with the given bookmark
    /// (`JetGotoBookmark`).
    fn goto_bookmark(&self, session: SessionHandle, table: TableHandle, bookmark: &[u8]) -> i32;

    /// Prepares an insert or replace, or cancels one (`JetPrepareUpdate`).
    fn prepare_update(&self, session: SessionHandle, table: TableHandle, prep: Prep) -> i32;

    /// Applies the prepared update, returning the bookmark of the record
    /// (`JetUpdate`).
    fn update(
        &self,
        session: SessionHandle,
        table: TableHandle,
        bookmark: &mut [u8],
        actual: &mut u32,
    ) -> i32;

    /// Deletes the current record (`JetDelete`).
    fn delete(&self, session: SessionHandle, table: TableHandle) -> i32;

    /// Retrieves several column values in one call (`JetRetrieveColumns`).
    ///
    /// # Safety
    ///
    /// `columns` must point to `count` initialized records, and each
    /// record's `data` must be valid for writes of `data_len` bytes (or be
    /// null with `data_len == 0`) for the duration of the call.
    unsafe fn retrieve_columns(
        &self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeRetrieveColumn,
        count: u32,
    ) -> i32;

    /// Sets several column values in one call (`JetSetColumns`).
    ///
    /// # Safety
    ///
    /// `columns` must point to `count` initialized records, and each
    /// record's `data` must be valid for reads of `data_len` bytes (or be
    /// null with `data_len == 0`) for the duration of the call.
    unsafe fn set_columns(
        &self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeSetColumn,
        count: u32,
    ) -> i32;
}
