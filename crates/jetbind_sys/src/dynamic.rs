//! [`JetApi`] implementation backed by a native engine library.
//!
//! The library is opened with `libloading` and every entry point is resolved
//! up front, so a missing export is reported at load time rather than on
//! first use.

use std::ffi::{c_char, c_void, CStr, OsStr};
use std::fmt;
use std::ptr;

use libloading::{Library, Symbol};

use crate::api::JetApi;
use crate::codes::JET_errInvalidParameter;
use crate::error::{LoadError, LoadResult};
use crate::grbit::{
    AttachDatabaseGrbit, CloseDatabaseGrbit, CommitGrbit, CreateDatabaseGrbit, CreateIndexGrbit,
    EndSessionGrbit, InitGrbit, MakeKeyGrbit, MoveGrbit, OpenDatabaseGrbit, OpenTableGrbit, Param,
    Prep, RollbackGrbit, SeekGrbit, TermGrbit,
};
use crate::handles::{ColumnId, DatabaseId, InstanceHandle, SessionHandle, TableHandle};
use crate::records::{NativeColumnDef, NativeRetrieveColumn, NativeSetColumn};

/// Name of the engine library loaded by [`DynamicApi::load_default`].
pub const DEFAULT_LIBRARY: &str = "esent.dll";

type Instance = InstanceHandle;
type Sesid = SessionHandle;
type Tableid = TableHandle;
type Dbid = DatabaseId;

macro_rules! entry_points {
    ($($field:ident = $symbol:literal: fn($($arg:ty),* $(,)?);)*) => {
        struct EntryPoints {
            $($field: unsafe extern "system" fn($($arg),*) -> i32,)*
        }

        impl EntryPoints {
            unsafe fn load(lib: &Library, path: &str) -> LoadResult<Self> {
                Ok(Self {
                    $($field: resolve(lib, path, $symbol)?,)*
                })
            }
        }
    };
}

entry_points! {
    create_instance = "JetCreateInstance2A": fn(*mut Instance, *const c_char, *const c_char, u32);
    init = "JetInit2": fn(*mut Instance, u32);
    term = "JetTerm2": fn(Instance, u32);
    set_system_parameter = "JetSetSystemParameterA":
        fn(*mut Instance, Sesid, u32, usize, *const c_char);
    get_system_parameter = "JetGetSystemParameterA":
        fn(Instance, Sesid, u32, *mut usize, *mut c_char, u32);
    begin_session = "JetBeginSessionA":
        fn(Instance, *mut Sesid, *const c_char, *const c_char);
    end_session = "JetEndSession": fn(Sesid, u32);
    set_session_context = "JetSetSessionContext": fn(Sesid, usize);
    reset_session_context = "JetResetSessionContext": fn(Sesid);
    create_database = "JetCreateDatabaseA":
        fn(Sesid, *const c_char, *const c_char, *mut Dbid, u32);
    attach_database = "JetAttachDatabaseA": fn(Sesid, *const c_char, u32);
    open_database = "JetOpenDatabaseA":
        fn(Sesid, *const c_char, *const c_char, *mut Dbid, u32);
    close_database = "JetCloseDatabase": fn(Sesid, Dbid, u32);
    detach_database = "JetDetachDatabaseA": fn(Sesid, *const c_char);
    begin_transaction = "JetBeginTransaction": fn(Sesid);
    commit_transaction = "JetCommitTransaction": fn(Sesid, u32);
    rollback = "JetRollback": fn(Sesid, u32);
    create_table = "JetCreateTableA":
        fn(Sesid, Dbid, *const c_char, u32, u32, *mut Tableid);
    open_table = "JetOpenTableA":
        fn(Sesid, Dbid, *const c_char, *const c_void, u32, u32, *mut Tableid);
    close_table = "JetCloseTable": fn(Sesid, Tableid);
    delete_table = "JetDeleteTableA": fn(Sesid, Dbid, *const c_char);
    add_column = "JetAddColumnA": fn(
        Sesid,
        Tableid,
        *const c_char,
        *const NativeColumnDef,
        *const c_void,
        u32,
        *mut ColumnId,
    );
    create_index = "JetCreateIndexA":
        fn(Sesid, Tableid, *const c_char, u32, *const c_char, u32, u32);
    set_current_index = "JetSetCurrentIndexA": fn(Sesid, Tableid, *const c_char);
    make_key = "JetMakeKey": fn(Sesid, Tableid, *const c_void, u32, u32);
    seek = "JetSeek": fn(Sesid, Tableid, u32);
    move_cursor = "JetMove": fn(Sesid, Tableid, i32, u32);
    get_bookmark = "JetGetBookmark": fn(Sesid, Tableid, *mut c_void, u32, *mut u32);
    goto_bookmark = "JetGotoBookmark": fn(Sesid, Tableid, *const c_void, u32);
    prepare_update = "JetPrepareUpdate": fn(Sesid, Tableid, u32);
    update = "JetUpdate": fn(Sesid, Tableid, *mut c_void, u32, *mut u32);
    delete = "JetDelete": fn(Sesid, Tableid);
    retrieve_columns = "JetRetrieveColumns":
        fn(Sesid, Tableid, *mut NativeRetrieveColumn, u32);
    set_columns = "JetSetColumns": fn(Sesid, Tableid, *mut NativeSetColumn, u32);
}

unsafe fn resolve<T: Copy>(lib: &Library, path: &str, symbol: &'static str) -> LoadResult<T> {
    let sym: Symbol<T> = lib.get::<T>(symbol.as_bytes()).map_err(|source| LoadError::Symbol {
        path: path.to_string(),
        symbol,
        source,
    })?;
    Ok(*sym)
}

fn opt_ptr(value: Option<&CStr>) -> *const c_char {
    value.map_or(ptr::null(), CStr::as_ptr)
}

fn byte_ptr(data: &[u8]) -> *const c_void {
    if data.is_empty() {
        ptr::null()
    } else {
        data.as_ptr().cast()
    }
}

/// Forwards every [`JetApi`] call to a dynamically loaded engine library.
///
/// The library stays loaded for the lifetime of this value, which keeps
/// every resolved entry point valid.
pub struct DynamicApi {
    fns: EntryPoints,
    path: String,
    _lib: Library,
}

impl fmt::Debug for DynamicApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicApi").field("path", &self.path).finish_non_exhaustive()
    }
}

impl DynamicApi {
    /// Loads the engine library at `path` and resolves all entry points.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialization routines, and the library
    /// must export the engine ABI with the signatures this crate declares.
    pub unsafe fn load(path: impl AsRef<OsStr>) -> LoadResult<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().into_owned();
        let lib = Library::new(path_ref).map_err(|source| LoadError::Library {
            path: path_str.clone(),
            source,
        })?;
        let fns = EntryPoints::load(&lib, &path_str)?;
        tracing::debug!(library = %path_str, "engine library loaded");
        Ok(Self {
            fns,
            path: path_str,
            _lib: lib,
        })
    }

    /// Loads [`DEFAULT_LIBRARY`] from the system search path.
    ///
    /// # Safety
    ///
    /// Same requirements as [`DynamicApi::load`].
    pub unsafe fn load_default() -> LoadResult<Self> {
        Self::load(DEFAULT_LIBRARY)
    }

    /// Path or name the library was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Narrows a buffer length, bailing out of the calling method with
/// `JET_errInvalidParameter` when it does not fit the engine's 32-bit size.
macro_rules! narrow {
    ($len:expr) => {
        match u32::try_from($len) {
            Ok(n) => n,
            Err(_) => return JET_errInvalidParameter,
        }
    };
}

impl JetApi for DynamicApi {
    fn create_instance(
        &self,
        name: &CStr,
        display_name: Option<&CStr>,
        instance: &mut InstanceHandle,
    ) -> i32 {
        unsafe { (self.fns.create_instance)(instance, name.as_ptr(), opt_ptr(display_name), 0) }
    }

    fn init(&self, instance: &mut InstanceHandle, grbit: InitGrbit) -> i32 {
        unsafe { (self.fns.init)(instance, grbit.bits()) }
    }

    fn term(&self, instance: InstanceHandle, grbit: TermGrbit) -> i32 {
        unsafe { (self.fns.term)(instance, grbit.bits()) }
    }

    fn set_system_parameter(
        &self,
        instance: InstanceHandle,
        session: SessionHandle,
        param: Param,
        value: usize,
        text: Option<&CStr>,
    ) -> i32 {
        let mut instance = instance;
        let target: *mut InstanceHandle = if instance.is_nil() {
            ptr::null_mut()
        } else {
            &mut instance
        };
        unsafe {
            (self.fns.set_system_parameter)(target, session, param as u32, value, opt_ptr(text))
        }
    }

    fn get_system_parameter(
        &self,
        instance: InstanceHandle,
        session: SessionHandle,
        param: Param,
        value: &mut usize,
        text: &mut [u8],
    ) -> i32 {
        let len = narrow!(text.len());
        let out = if text.is_empty() {
            ptr::null_mut()
        } else {
            text.as_mut_ptr().cast()
        };
        unsafe { (self.fns.get_system_parameter)(instance, session, param as u32, value, out, len) }
    }

    fn begin_session(&self, instance: InstanceHandle, session: &mut SessionHandle) -> i32 {
        unsafe { (self.fns.begin_session)(instance, session, ptr::null(), ptr::null()) }
    }

    fn end_session(&self, session: SessionHandle, grbit: EndSessionGrbit) -> i32 {
        unsafe { (self.fns.end_session)(session, grbit.bits()) }
    }

    fn set_session_context(&self, session: SessionHandle, context: usize) -> i32 {
        unsafe { (self.fns.set_session_context)(session, context) }
    }

    fn reset_session_context(&self, session: SessionHandle) -> i32 {
        unsafe { (self.fns.reset_session_context)(session) }
    }

    fn create_database(
        &self,
        session: SessionHandle,
        path: &CStr,
        grbit: CreateDatabaseGrbit,
        database: &mut DatabaseId,
    ) -> i32 {
        unsafe {
            (self.fns.create_database)(session, path.as_ptr(), ptr::null(), database, grbit.bits())
        }
    }

    fn attach_database(
        &self,
        session: SessionHandle,
        path: &CStr,
        grbit: AttachDatabaseGrbit,
    ) -> i32 {
        unsafe { (self.fns.attach_database)(session, path.as_ptr(), grbit.bits()) }
    }

    fn open_database(
        &self,
        session: SessionHandle,
        path: &CStr,
        grbit: OpenDatabaseGrbit,
        database: &mut DatabaseId,
    ) -> i32 {
        unsafe {
            (self.fns.open_database)(session, path.as_ptr(), ptr::null(), database, grbit.bits())
        }
    }

    fn close_database(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        grbit: CloseDatabaseGrbit,
    ) -> i32 {
        unsafe { (self.fns.close_database)(session, database, grbit.bits()) }
    }

    fn detach_database(&self, session: SessionHandle, path: Option<&CStr>) -> i32 {
        unsafe { (self.fns.detach_database)(session, opt_ptr(path)) }
    }

    fn begin_transaction(&self, session: SessionHandle) -> i32 {
        unsafe { (self.fns.begin_transaction)(session) }
    }

    fn commit_transaction(&self, session: SessionHandle, grbit: CommitGrbit) -> i32 {
        unsafe { (self.fns.commit_transaction)(session, grbit.bits()) }
    }

    fn rollback(&self, session: SessionHandle, grbit: RollbackGrbit) -> i32 {
        unsafe { (self.fns.rollback)(session, grbit.bits()) }
    }

    fn create_table(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        name: &CStr,
        pages: u32,
        density: u32,
        table: &mut TableHandle,
    ) -> i32 {
        unsafe { (self.fns.create_table)(session, database, name.as_ptr(), pages, density, table) }
    }

    fn open_table(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        name: &CStr,
        grbit: OpenTableGrbit,
        table: &mut TableHandle,
    ) -> i32 {
        unsafe {
            (self.fns.open_table)(
                session,
                database,
                name.as_ptr(),
                ptr::null(),
                0,
                grbit.bits(),
                table,
            )
        }
    }

    fn close_table(&self, session: SessionHandle, table: TableHandle) -> i32 {
        unsafe { (self.fns.close_table)(session, table) }
    }

    fn delete_table(&self, session: SessionHandle, database: DatabaseId, name: &CStr) -> i32 {
        unsafe { (self.fns.delete_table)(session, database, name.as_ptr()) }
    }

    fn add_column(
        &self,
        session: SessionHandle,
        table: TableHandle,
        name: &CStr,
        definition: &NativeColumnDef,
        default_value: &[u8],
        column: &mut ColumnId,
    ) -> i32 {
        let len = narrow!(default_value.len());
        unsafe {
            (self.fns.add_column)(
                session,
                table,
                name.as_ptr(),
                definition,
                byte_ptr(default_value),
                len,
                column,
            )
        }
    }

    fn create_index(
        &self,
        session: SessionHandle,
        table: TableHandle,
        name: &CStr,
        grbit: CreateIndexGrbit,
        key: &[u8],
        density: u32,
    ) -> i32 {
        let len = narrow!(key.len());
        unsafe {
            (self.fns.create_index)(
                session,
                table,
                name.as_ptr(),
                grbit.bits(),
                byte_ptr(key).cast(),
                len,
                density,
            )
        }
    }

    fn set_current_index(
        &self,
        session: SessionHandle,
        table: TableHandle,
        index: Option<&CStr>,
    ) -> i32 {
        unsafe { (self.fns.set_current_index)(session, table, opt_ptr(index)) }
    }

    fn make_key(
        &self,
        session: SessionHandle,
        table: TableHandle,
        data: &[u8],
        grbit: MakeKeyGrbit,
    ) -> i32 {
        let len = narrow!(data.len());
        unsafe { (self.fns.make_key)(session, table, byte_ptr(data), len, grbit.bits()) }
    }

    fn seek(&self, session: SessionHandle, table: TableHandle, grbit: SeekGrbit) -> i32 {
        unsafe { (self.fns.seek)(session, table, grbit.bits()) }
    }

    fn move_cursor(
        &self,
        session: SessionHandle,
        table: TableHandle,
        rows: i32,
        grbit: MoveGrbit,
    ) -> i32 {
        unsafe { (self.fns.move_cursor)(session, table, rows, grbit.bits()) }
    }

    fn get_bookmark(
        &self,
        session: SessionHandle,
        table: TableHandle,
        bookmark: &mut [u8],
        actual: &mut u32,
    ) -> i32 {
        let len = narrow!(bookmark.len());
        unsafe {
            (self.fns.get_bookmark)(session, table, bookmark.as_mut_ptr().cast(), len, actual)
        }
    }

    fn goto_bookmark(&self, session: SessionHandle, table: TableHandle, bookmark: &[u8]) -> i32 {
        let len = narrow!(bookmark.len());
        unsafe { (self.fns.goto_bookmark)(session, table, byte_ptr(bookmark), len) }
    }

    fn prepare_update(&self, session: SessionHandle, table: TableHandle, prep: Prep) -> i32 {
        unsafe { (self.fns.prepare_update)(session, table, prep as u32) }
    }

    fn update(
        &self,
        session: SessionHandle,
        table: TableHandle,
        bookmark: &mut [u8],
        actual: &mut u32,
    ) -> i32 {
        let len = narrow!(bookmark.len());
        unsafe { (self.fns.update)(session, table, bookmark.as_mut_ptr().cast(), len, actual) }
    }

    fn delete(&self, session: SessionHandle, table: TableHandle) -> i32 {
        unsafe { (self.fns.delete)(session, table) }
    }

    unsafe fn retrieve_columns(
        &self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeRetrieveColumn,
        count: u32,
    ) -> i32 {
        (self.fns.retrieve_columns)(session, table, columns, count)
    }

    unsafe fn set_columns(
        &self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeSetColumn,
        count: u32,
    ) -> i32 {
        (self.fns.set_columns)(session, table, columns, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_reports_path() {
        let err = unsafe { DynamicApi::load("definitely-not-an-engine-library.so") }.unwrap_err();
        match &err {
            LoadError::Library { path, .. } => {
                assert_eq!(path, "definitely-not-an-engine-library.so");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("definitely-not-an-engine-library.so"));
    }

    #[test]
    fn empty_slices_become_null() {
        assert!(byte_ptr(&[]).is_null());
        assert!(!byte_ptr(&[1]).is_null());
        assert!(opt_ptr(None).is_null());
    }
}
