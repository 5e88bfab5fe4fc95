//! [`SimEngine`]: the [`JetApi`] implementation.

use std::ffi::CStr;
use std::path::PathBuf;

use parking_lot::{Mutex, MutexGuard};

use jetbind_sys::codes::*;
use jetbind_sys::{
    AttachDatabaseGrbit, CloseDatabaseGrbit, ColumnId, CommitGrbit, CreateDatabaseGrbit,
    CreateIndexGrbit, DatabaseId, EndSessionGrbit, InitGrbit, InstanceHandle, JetApi,
    MakeKeyGrbit, MoveGrbit, NativeColumnDef, NativeRetrieveColumn, NativeSetColumn,
    OpenDatabaseGrbit, OpenTableGrbit, Param, Prep, RollbackGrbit, SeekGrbit, SessionHandle,
    TableHandle, TermGrbit,
};

use crate::state::{EngineState, ParamSlot, SimResult};
use crate::stats::{SimStats, Violation};

/// An in-memory engine that speaks the same call surface as the native
/// library.
///
/// All state lives behind one lock, so the engine can be shared between
/// threads as an `Arc<dyn JetApi>`. Database files are marker files on disk
/// with their contents held in memory for the life of the engine, which is
/// enough for attach/detach and reopen scenarios within one process.
///
/// Besides engine semantics, the simulator keeps:
/// - [`SimStats`] call counters
/// - a list of release-order [`Violation`]s
/// - a count of open handles, for leak assertions
#[derive(Debug, Default)]
pub struct SimEngine {
    state: Mutex<EngineState>,
}

impl SimEngine {
    /// Creates an engine with no instances.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state and counts the call.
    fn call(&self) -> MutexGuard<'_, EngineState> {
        let mut state = self.state.lock();
        state.stats.calls += 1;
        state
    }

    /// Returns a snapshot of the call counters.
    pub fn stats(&self) -> SimStats {
        self.state.lock().stats
    }

    /// Returns every release-order violation seen so far.
    pub fn violations(&self) -> Vec<Violation> {
        self.state.lock().violations.clone()
    }

    /// Forgets recorded violations.
    pub fn clear_violations(&self) {
        self.state.lock().violations.clear();
    }

    /// Number of live instances, sessions, open databases and cursors.
    pub fn open_handle_count(&self) -> usize {
        self.state.lock().open_handle_count()
    }
}

fn code(result: SimResult) -> i32 {
    match result {
        Ok(()) => JET_errSuccess,
        Err(code) => code,
    }
}

fn code_with<T>(result: SimResult<T>, out: &mut T) -> i32 {
    match result {
        Ok(value) => {
            *out = value;
            JET_errSuccess
        }
        Err(code) => code,
    }
}

fn warning(result: SimResult<i32>) -> i32 {
    match result {
        Ok(code) | Err(code) => code,
    }
}

fn text(value: &CStr) -> SimResult<&str> {
    value.to_str().map_err(|_| JET_errInvalidParameter)
}

fn path(value: &CStr) -> PathBuf {
    PathBuf::from(value.to_string_lossy().into_owned())
}

impl JetApi for SimEngine {
    fn create_instance(
        &self,
        name: &CStr,
        _display_name: Option<&CStr>,
        instance: &mut InstanceHandle,
    ) -> i32 {
        let mut state = self.call();
        code_with(text(name).and_then(|n| state.create_instance(n)), instance)
    }

    fn init(&self, instance: &mut InstanceHandle, _grbit: InitGrbit) -> i32 {
        code(self.call().init(*instance))
    }

    fn term(&self, instance: InstanceHandle, grbit: TermGrbit) -> i32 {
        code(self.call().term(instance, grbit))
    }

    fn set_system_parameter(
        &self,
        instance: InstanceHandle,
        _session: SessionHandle,
        param: Param,
        value: usize,
        text_value: Option<&CStr>,
    ) -> i32 {
        let mut state = self.call();
        let result = match text_value.map(text).transpose() {
            Ok(t) => state.set_parameter(instance, param, value, t),
            Err(code) => Err(code),
        };
        code(result)
    }

    fn get_system_parameter(
        &self,
        instance: InstanceHandle,
        _session: SessionHandle,
        param: Param,
        value: &mut usize,
        text_out: &mut [u8],
    ) -> i32 {
        let state = self.call();
        match state.parameter(instance, param) {
            Ok(ParamSlot::Integer(v)) => {
                *value = v;
                JET_errSuccess
            }
            Ok(ParamSlot::Text(t)) => {
                let bytes = t.as_bytes();
                if text_out.len() <= bytes.len() {
                    return JET_errInvalidBufferSize;
                }
                text_out[..bytes.len()].copy_from_slice(bytes);
                text_out[bytes.len()] = 0;
                *value = 0;
                JET_errSuccess
            }
            Err(code) => code,
        }
    }

    fn begin_session(&self, instance: InstanceHandle, session: &mut SessionHandle) -> i32 {
        code_with(self.call().begin_session(instance), session)
    }

    fn end_session(&self, session: SessionHandle, _grbit: EndSessionGrbit) -> i32 {
        code(self.call().end_session(session))
    }

    fn set_session_context(&self, session: SessionHandle, context: usize) -> i32 {
        code(self.call().set_context(session, context))
    }

    fn reset_session_context(&self, session: SessionHandle) -> i32 {
        code(self.call().reset_context(session))
    }

    fn create_database(
        &self,
        session: SessionHandle,
        path_value: &CStr,
        grbit: CreateDatabaseGrbit,
        database: &mut DatabaseId,
    ) -> i32 {
        let result = self
            .call()
            .create_database(session, path(path_value), grbit)
            .map(DatabaseId);
        code_with(result, database)
    }

    fn attach_database(
        &self,
        session: SessionHandle,
        path_value: &CStr,
        grbit: AttachDatabaseGrbit,
    ) -> i32 {
        warning(self.call().attach_database(session, path(path_value), grbit))
    }

    fn open_database(
        &self,
        session: SessionHandle,
        path_value: &CStr,
        grbit: OpenDatabaseGrbit,
        database: &mut DatabaseId,
    ) -> i32 {
        let result = self
            .call()
            .open_database(session, path(path_value), grbit)
            .map(DatabaseId);
        code_with(result, database)
    }

    fn close_database(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        _grbit: CloseDatabaseGrbit,
    ) -> i32 {
        code(self.call().close_database(session, database.0))
    }

    fn detach_database(&self, session: SessionHandle, path_value: Option<&CStr>) -> i32 {
        code(self.call().detach_database(session, path_value.map(path)))
    }

    fn begin_transaction(&self, session: SessionHandle) -> i32 {
        code(self.call().begin_transaction(session))
    }

    fn commit_transaction(&self, session: SessionHandle, _grbit: CommitGrbit) -> i32 {
        code(self.call().commit(session))
    }

    fn rollback(&self, session: SessionHandle, grbit: RollbackGrbit) -> i32 {
        code(
            self.call()
                .rollback(session, grbit.contains(RollbackGrbit::ROLLBACK_ALL)),
        )
    }

    fn create_table(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        name: &CStr,
        _pages: u32,
        _density: u32,
        table: &mut TableHandle,
    ) -> i32 {
        let mut state = self.call();
        code_with(
            text(name).and_then(|n| state.create_table(session, database.0, n)),
            table,
        )
    }

    fn open_table(
        &self,
        session: SessionHandle,
        database: DatabaseId,
        name: &CStr,
        grbit: OpenTableGrbit,
        table: &mut TableHandle,
    ) -> i32 {
        let mut state = self.call();
        code_with(
            text(name).and_then(|n| state.open_table(session, database.0, n, grbit)),
            table,
        )
    }

    fn close_table(&self, session: SessionHandle, table: TableHandle) -> i32 {
        code(self.call().close_table(session, table))
    }

    fn delete_table(&self, session: SessionHandle, database: DatabaseId, name: &CStr) -> i32 {
        let mut state = self.call();
        code(text(name).and_then(|n| state.delete_table(session, database.0, n)))
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
        let mut state = self.call();
        let result = text(name)
            .and_then(|n| state.add_column(session, table, n, definition, default_value))
            .map(ColumnId);
        code_with(result, column)
    }

    fn create_index(
        &self,
        session: SessionHandle,
        table: TableHandle,
        name: &CStr,
        grbit: CreateIndexGrbit,
        key: &[u8],
        _density: u32,
    ) -> i32 {
        let mut state = self.call();
        code(text(name).and_then(|n| state.create_index(session, table, n, grbit, key)))
    }

    fn set_current_index(
        &self,
        session: SessionHandle,
        table: TableHandle,
        index: Option<&CStr>,
    ) -> i32 {
        let mut state = self.call();
        let result = match index.map(text).transpose() {
            Ok(name) => state.set_current_index(session, table, name),
            Err(code) => Err(code),
        };
        code(result)
    }

    fn make_key(
        &self,
        session: SessionHandle,
        table: TableHandle,
        data: &[u8],
        grbit: MakeKeyGrbit,
    ) -> i32 {
        code(self.call().make_key(session, table, data, grbit))
    }

    fn seek(&self, session: SessionHandle, table: TableHandle, grbit: SeekGrbit) -> i32 {
        warning(self.call().seek(session, table, grbit))
    }

    fn move_cursor(
        &self,
        session: SessionHandle,
        table: TableHandle,
        rows: i32,
        _grbit: MoveGrbit,
    ) -> i32 {
        code(self.call().move_cursor(session, table, rows))
    }

    fn get_bookmark(
        &self,
        session: SessionHandle,
        table: TableHandle,
        bookmark: &mut [u8],
        actual: &mut u32,
    ) -> i32 {
        code(self.call().get_bookmark(session, table, bookmark, actual))
    }

    fn goto_bookmark(&self, session: SessionHandle, table: TableHandle, bookmark: &[u8]) -> i32 {
        code(self.call().goto_bookmark(session, table, bookmark))
    }

    fn prepare_update(&self, session: SessionHandle, table: TableHandle, prep: Prep) -> i32 {
        code(self.call().prepare_update(session, table, prep))
    }

    fn update(
        &self,
        session: SessionHandle,
        table: TableHandle,
        bookmark: &mut [u8],
        actual: &mut u32,
    ) -> i32 {
        code(self.call().update(session, table, bookmark, actual))
    }

    fn delete(&self, session: SessionHandle, table: TableHandle) -> i32 {
        code(self.call().delete(session, table))
    }

    unsafe fn retrieve_columns(
        &self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeRetrieveColumn,
        count: u32,
    ) -> i32 {
        // SAFETY: the caller upholds the trait contract, which is the
        // contract of the state method.
        code(unsafe { self.call().retrieve_columns(session, table, columns, count) })
    }

    unsafe fn set_columns(
        &self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeSetColumn,
        count: u32,
    ) -> i32 {
        // SAFETY: as for `retrieve_columns`.
        code(unsafe { self.call().set_columns(session, table, columns, count) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetbind_sys::{ColumnGrbit, ColumnType, RetrieveGrbit, SetGrbit, MOVE_FIRST, MOVE_NEXT};
    use std::ffi::CString;

    struct Fixture {
        engine: SimEngine,
        session: SessionHandle,
        table: TableHandle,
        _dir: tempfile::TempDir,
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn fixture() -> Fixture {
        let engine = SimEngine::new();
        let mut instance = InstanceHandle::NIL;
        assert_eq!(engine.create_instance(&c("fx"), None, &mut instance), 0);
        assert_eq!(engine.init(&mut instance, InitGrbit::NONE), 0);
        let mut session = SessionHandle::NIL;
        assert_eq!(engine.begin_session(instance, &mut session), 0);
        let dir = tempfile::tempdir().unwrap();
        let path = c(dir.path().join("fx.edb").to_str().unwrap());
        let mut dbid = DatabaseId::NIL;
        assert_eq!(
            engine.create_database(session, &path, CreateDatabaseGrbit::NONE, &mut dbid),
            0
        );
        let mut table = TableHandle::NIL;
        assert_eq!(engine.create_table(session, dbid, &c("t"), 0, 100, &mut table), 0);
        Fixture {
            engine,
            session,
            table,
            _dir: dir,
        }
    }

    fn column(fx: &Fixture, name: &str, coltyp: ColumnType, grbit: ColumnGrbit) -> ColumnId {
        let def = NativeColumnDef {
            coltyp: coltyp as u32,
            grbit: grbit.bits(),
            ..NativeColumnDef::default()
        };
        let mut id = ColumnId::default();
        assert_eq!(
            fx.engine
                .add_column(fx.session, fx.table, &c(name), &def, &[], &mut id),
            0
        );
        id
    }

    fn set(fx: &Fixture, records: &mut [NativeSetColumn]) -> i32 {
        unsafe {
            fx.engine
                .set_columns(fx.session, fx.table, records.as_mut_ptr(), records.len() as u32)
        }
    }

    fn retrieve(fx: &Fixture, records: &mut [NativeRetrieveColumn]) -> i32 {
        unsafe {
            fx.engine.retrieve_columns(
                fx.session,
                fx.table,
                records.as_mut_ptr(),
                records.len() as u32,
            )
        }
    }

    fn set_record(column: ColumnId, data: &[u8]) -> NativeSetColumn {
        NativeSetColumn {
            column_id: column,
            data: data.as_ptr().cast(),
            data_len: data.len() as u32,
            itag_sequence: 1,
            ..NativeSetColumn::default()
        }
    }

    fn save(fx: &Fixture) -> Vec<u8> {
        let mut bookmark = [0u8; 16];
        let mut actual = 0;
        assert_eq!(
            fx.engine
                .update(fx.session, fx.table, &mut bookmark, &mut actual),
            0
        );
        bookmark[..actual as usize].to_vec()
    }

    #[test]
    fn retrieve_reports_truncation_and_full_size() {
        let fx = fixture();
        let col = column(&fx, "v", ColumnType::LongBinary, ColumnGrbit::NONE);
        assert_eq!(fx.engine.prepare_update(fx.session, fx.table, Prep::Insert), 0);
        let value = b"0123456789";
        assert_eq!(set(&fx, &mut [set_record(col, value)]), 0);
        save(&fx);
        assert_eq!(
            fx.engine
                .move_cursor(fx.session, fx.table, MOVE_FIRST, MoveGrbit::NONE),
            0
        );

        let mut small = [0u8; 4];
        let probe = NativeRetrieveColumn {
            column_id: col,
            data: small.as_mut_ptr().cast(),
            data_len: 4,
            itag_sequence: 1,
            ..NativeRetrieveColumn::default()
        };
        let offset = NativeRetrieveColumn {
            column_id: col,
            long_value_offset: 7,
            itag_sequence: 1,
            ..NativeRetrieveColumn::default()
        };
        let mut records = [probe, offset];
        assert_eq!(retrieve(&fx, &mut records), 0);
        assert_eq!(records[0].err, JET_wrnBufferTruncated);
        assert_eq!(records[0].actual_len, 10);
        assert_eq!(&small, b"0123");
        // Sizes are measured from the long-value offset.
        assert_eq!(records[1].actual_len, 3);
        assert_eq!(records[1].err, JET_wrnBufferTruncated);
    }

    #[test]
    fn multi_values_and_wildcard() {
        let fx = fixture();
        let tags = column(&fx, "tags", ColumnType::Binary, ColumnGrbit::MULTI_VALUED);
        assert_eq!(fx.engine.prepare_update(fx.session, fx.table, Prep::Insert), 0);
        let mut records = [
            NativeSetColumn {
                itag_sequence: 0,
                ..set_record(tags, b"a")
            },
            NativeSetColumn {
                itag_sequence: 0,
                ..set_record(tags, b"b")
            },
            NativeSetColumn {
                itag_sequence: 0,
                grbit: SetGrbit::UNIQUE_MULTI_VALUES.bits(),
                ..set_record(tags, b"a")
            },
            set_record(ColumnId(999), b"x"),
        ];
        assert_eq!(set(&fx, &mut records), 0);
        assert_eq!(records[0].err, 0);
        assert_eq!(records[2].err, JET_errMultiValuedDuplicate);
        assert_eq!(records[3].err, JET_errColumnNotFound);

        let count = NativeRetrieveColumn {
            column_id: tags,
            grbit: RetrieveGrbit::RETRIEVE_COPY.bits(),
            itag_sequence: 0,
            ..NativeRetrieveColumn::default()
        };
        let wildcard = NativeRetrieveColumn {
            column_id: ColumnId::ALL_TAGGED,
            grbit: RetrieveGrbit::RETRIEVE_COPY.bits(),
            itag_sequence: 2,
            ..NativeRetrieveColumn::default()
        };
        let mut records = [count, wildcard];
        assert_eq!(retrieve(&fx, &mut records), 0);
        assert_eq!(records[0].itag_sequence, 2);
        assert_eq!(records[1].next_tagged, tags);
        assert_eq!(records[1].actual_len, 1);
    }

    #[test]
    fn fixed_columns_check_sizes_and_nulls() {
        let fx = fixture();
        let id = column(&fx, "id", ColumnType::Long, ColumnGrbit::NONE);
        assert_eq!(fx.engine.prepare_update(fx.session, fx.table, Prep::Insert), 0);
        let mut records = [
            set_record(id, &[1, 2]),
            NativeSetColumn {
                itag_sequence: 2,
                ..set_record(id, &7i32.to_le_bytes())
            },
        ];
        assert_eq!(set(&fx, &mut records), 0);
        assert_eq!(records[0].err, JET_errInvalidBufferSize);
        assert_eq!(records[1].err, JET_errBadItagSequence);
        save(&fx);

        assert_eq!(
            fx.engine
                .move_cursor(fx.session, fx.table, MOVE_FIRST, MoveGrbit::NONE),
            0
        );
        let mut null = [NativeRetrieveColumn {
            column_id: id,
            itag_sequence: 1,
            ..NativeRetrieveColumn::default()
        }];
        assert_eq!(retrieve(&fx, &mut null), 0);
        assert_eq!(null[0].err, JET_wrnColumnNull);
        assert_eq!(
            fx.engine
                .move_cursor(fx.session, fx.table, MOVE_NEXT, MoveGrbit::NONE),
            JET_errNoCurrentRecord
        );
    }

    #[test]
    fn set_without_update_fails_the_batch() {
        let fx = fixture();
        let id = column(&fx, "id", ColumnType::Long, ColumnGrbit::NONE);
        let value = 1i32.to_le_bytes();
        assert_eq!(set(&fx, &mut [set_record(id, &value)]), JET_errUpdateNotPrepared);
        let mut bookmark = [0u8; 8];
        let mut actual = 0;
        assert_eq!(
            fx.engine
                .update(fx.session, fx.table, &mut bookmark, &mut actual),
            JET_errUpdateNotPrepared
        );
    }

    #[test]
    fn every_call_is_counted() {
        let fx = fixture();
        let before = fx.engine.stats().calls;
        fx.engine.close_table(fx.session, TableHandle(424242));
        fx.engine.close_table(fx.session, fx.table);
        assert_eq!(fx.engine.stats().calls, before + 2);
    }

    #[test]
    fn session_end_with_cursor_is_a_violation() {
        let fx = fixture();
        assert_eq!(
            fx.engine.end_session(fx.session, EndSessionGrbit::NONE),
            JET_errSessionInUse
        );
        let violations = fx.engine.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].kind,
            crate::ViolationKind::EndSessionWithOpenCursors
        );
        // Ending again finds nothing and records nothing new.
        assert_eq!(
            fx.engine.end_session(fx.session, EndSessionGrbit::NONE),
            JET_errInvalidSesid
        );
        assert_eq!(fx.engine.violations().len(), 1);
    }

    #[test]
    fn text_parameters_are_nul_terminated() {
        let engine = SimEngine::new();
        let mut instance = InstanceHandle::NIL;
        engine.create_instance(&c("p"), None, &mut instance);
        assert_eq!(
            engine.set_system_parameter(
                instance,
                SessionHandle::NIL,
                Param::BaseName,
                0,
                Some(&c("abc"))
            ),
            0
        );
        let mut value = 0;
        let mut small = [0u8; 3];
        assert_eq!(
            engine.get_system_parameter(instance, SessionHandle::NIL, Param::BaseName, &mut value, &mut small),
            JET_errInvalidBufferSize
        );
        let mut text = [0xffu8; 8];
        assert_eq!(
            engine.get_system_parameter(instance, SessionHandle::NIL, Param::BaseName, &mut value, &mut text),
            0
        );
        assert_eq!(&text[..4], b"abc\0");
    }
}
