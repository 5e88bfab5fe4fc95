//! Table cursors: table DDL, navigation and record updates.

use std::collections::HashMap;
use std::path::PathBuf;

use jetbind_sys::codes::*;
use jetbind_sys::{
    CreateIndexGrbit, MakeKeyGrbit, NativeColumnDef, OpenTableGrbit, Prep, SeekGrbit,
    SessionHandle, TableHandle,
};
use tracing::{debug, trace};

use crate::state::{DatabaseFile, EngineState, SimResult, Undo};
use crate::table::{self, normalize, Position, Row, TableData};

/// An update being built on a cursor.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub prep: Prep,
    /// Record being replaced; `None` for inserts.
    pub target: Option<u64>,
    pub row: Row,
}

#[derive(Debug, Clone)]
pub(crate) struct CursorState {
    pub session: usize,
    pub dbid: u32,
    pub path: PathBuf,
    /// Lower-cased table name.
    pub table: String,
    pub read_only: bool,
    pub position: Position,
    /// Current index; `None` orders by the primary index if there is one.
    pub index: Option<String>,
    /// Normalized search key segments; `None` until a key is started.
    pub key: Option<Vec<Option<Vec<u8>>>>,
    pub pending: Option<Pending>,
}

pub(crate) fn table_of<'a>(
    files: &'a HashMap<PathBuf, DatabaseFile>,
    cursor: &CursorState,
) -> SimResult<&'a TableData> {
    files
        .get(&cursor.path)
        .and_then(|f| f.tables.get(&cursor.table))
        .ok_or(JET_errObjectNotFound)
}

fn table_of_mut<'a>(
    files: &'a mut HashMap<PathBuf, DatabaseFile>,
    cursor: &CursorState,
) -> SimResult<&'a mut TableData> {
    files
        .get_mut(&cursor.path)
        .and_then(|f| f.tables.get_mut(&cursor.table))
        .ok_or(JET_errObjectNotFound)
}

/// The record the cursor is on, or the error for why there is none.
pub(crate) fn current_row<'a>(table: &'a TableData, cursor: &CursorState) -> SimResult<(u64, &'a Row)> {
    let bookmark = cursor.position.bookmark().ok_or(JET_errNoCurrentRecord)?;
    table
        .rows
        .get(&bookmark)
        .map(|row| (bookmark, row))
        .ok_or(JET_errRecordDeleted)
}

impl EngineState {
    fn open_cursor(
        &mut self,
        session: SessionHandle,
        dbid: u32,
        path: PathBuf,
        table: String,
        read_only: bool,
    ) -> TableHandle {
        let id = self.allocate_handle();
        self.cursors.insert(
            id,
            CursorState {
                session: session.0,
                dbid,
                path,
                table,
                read_only,
                position: Position::BeforeFirst,
                index: None,
                key: None,
                pending: None,
            },
        );
        TableHandle(id)
    }

    pub fn create_table(&mut self, session: SessionHandle, dbid: u32, name: &str) -> SimResult<TableHandle> {
        let database = self.database(session, dbid)?.clone();
        if name.is_empty() {
            return Err(JET_errInvalidParameter);
        }
        let key = name.to_ascii_lowercase();
        let file = self
            .files
            .get_mut(&database.path)
            .ok_or(JET_errDatabaseNotFound)?;
        if file.tables.contains_key(&key) {
            return Err(JET_errTableDuplicate);
        }
        file.tables.insert(key.clone(), TableData::default());
        debug!(table = name, path = %database.path.display(), "table created");
        Ok(self.open_cursor(session, dbid, database.path, key, database.read_only))
    }

    pub fn open_table(
        &mut self,
        session: SessionHandle,
        dbid: u32,
        name: &str,
        grbit: OpenTableGrbit,
    ) -> SimResult<TableHandle> {
        let database = self.database(session, dbid)?.clone();
        let key = name.to_ascii_lowercase();
        let exists = self
            .files
            .get(&database.path)
            .is_some_and(|f| f.tables.contains_key(&key));
        if !exists {
            return Err(JET_errObjectNotFound);
        }
        let read_only = database.read_only || grbit.contains(OpenTableGrbit::READ_ONLY);
        Ok(self.open_cursor(session, dbid, database.path, key, read_only))
    }

    pub fn close_table(&mut self, session: SessionHandle, table: TableHandle) -> SimResult {
        self.check_cursor(session, table)?;
        self.cursors.remove(&table.0);
        Ok(())
    }

    pub fn delete_table(&mut self, session: SessionHandle, dbid: u32, name: &str) -> SimResult {
        let database = self.database(session, dbid)?.clone();
        let key = name.to_ascii_lowercase();
        if self
            .cursors
            .values()
            .any(|c| c.path == database.path && c.table == key)
        {
            return Err(JET_errTableInUse);
        }
        let file = self
            .files
            .get_mut(&database.path)
            .ok_or(JET_errDatabaseNotFound)?;
        file.tables.remove(&key).ok_or(JET_errObjectNotFound)?;
        debug!(table = name, "table deleted");
        Ok(())
    }

    pub fn add_column(
        &mut self,
        session: SessionHandle,
        table: TableHandle,
        name: &str,
        definition: &NativeColumnDef,
        default_value: &[u8],
    ) -> SimResult<u32> {
        self.check_cursor(session, table)?;
        let cursor = &self.cursors[&table.0];
        table_of_mut(&mut self.files, cursor)?.add_column(name, definition, default_value)
    }

    pub fn create_index(
        &mut self,
        session: SessionHandle,
        table: TableHandle,
        name: &str,
        grbit: CreateIndexGrbit,
        key: &[u8],
    ) -> SimResult {
        self.check_cursor(session, table)?;
        let cursor = &self.cursors[&table.0];
        table_of_mut(&mut self.files, cursor)?.create_index(name, grbit, key)
    }

    pub fn set_current_index(&mut self, session: SessionHandle, table: TableHandle, name: Option<&str>) -> SimResult {
        self.check_cursor(session, table)?;
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let data = table_of(&self.files, cursor)?;
        if let Some(name) = name {
            if !data.index_exists(name) {
                return Err(JET_errIndexNotFound);
            }
        }
        cursor.index = name.map(str::to_string);
        let keys = data.sorted_keys(data.ordering(cursor.index.as_deref()));
        cursor.position = keys
            .first()
            .cloned()
            .map_or(Position::BeforeFirst, Position::On);
        cursor.key = None;
        Ok(())
    }

    pub fn make_key(&mut self, session: SessionHandle, table: TableHandle, data: &[u8], grbit: MakeKeyGrbit) -> SimResult {
        self.check_cursor(session, table)?;
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let table_data = table_of(&self.files, cursor)?;
        if grbit.contains(MakeKeyGrbit::NEW_KEY) {
            cursor.key = Some(Vec::new());
        }
        let Some(key) = cursor.key.as_mut() else {
            return Err(JET_errKeyNotMade);
        };
        let index = table_data.ordering(cursor.index.as_deref());
        let column_type = table_data.segment_type(index, key.len())?;
        let value = if data.is_empty() && !grbit.contains(MakeKeyGrbit::KEY_DATA_ZERO_LENGTH) {
            None
        } else {
            Some(normalize(column_type, data))
        };
        key.push(value);
        Ok(())
    }

    pub fn seek(&mut self, session: SessionHandle, table: TableHandle, grbit: SeekGrbit) -> SimResult<i32> {
        self.check_cursor(session, table)?;
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let data = table_of(&self.files, cursor)?;
        let key = match &cursor.key {
            Some(key) if !key.is_empty() => key,
            _ => return Err(JET_errKeyNotMade),
        };
        let index = data.ordering(cursor.index.as_deref());
        let search = data.search_segments(index, key);
        let (found, exact) = table::seek(&data.sorted_keys(index), &search, grbit)?;
        trace!(bookmark = found.bookmark, exact, "seek");
        cursor.position = Position::On(found);
        Ok(if exact { JET_errSuccess } else { JET_wrnSeekNotEqual })
    }

    pub fn move_cursor(&mut self, session: SessionHandle, table: TableHandle, rows: i32) -> SimResult {
        self.check_cursor(session, table)?;
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let data = table_of(&self.files, cursor)?;
        let index = data.ordering(cursor.index.as_deref());
        let from = data.refresh(index, &cursor.position);
        match table::step(&data.sorted_keys(index), &from, rows) {
            Ok(position) => {
                cursor.position = position;
                Ok(())
            }
            Err(position) => {
                cursor.position = position;
                Err(JET_errNoCurrentRecord)
            }
        }
    }

    pub fn get_bookmark(&self, session: SessionHandle, table: TableHandle, out: &mut [u8], actual: &mut u32) -> SimResult {
        self.check_cursor(session, table)?;
        let cursor = &self.cursors[&table.0];
        let (bookmark, _) = current_row(table_of(&self.files, cursor)?, cursor)?;
        write_bookmark(bookmark, out, actual)
    }

    pub fn goto_bookmark(&mut self, session: SessionHandle, table: TableHandle, bookmark: &[u8]) -> SimResult {
        self.check_cursor(session, table)?;
        let Ok(bytes) = <[u8; 8]>::try_from(bookmark) else {
            return Err(JET_errInvalidParameter);
        };
        let bookmark = u64::from_be_bytes(bytes);
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let data = table_of(&self.files, cursor)?;
        let row = data.rows.get(&bookmark).ok_or(JET_errRecordDeleted)?;
        let index = data.ordering(cursor.index.as_deref());
        cursor.position = Position::On(data.sort_key(index, bookmark, row));
        Ok(())
    }

    pub fn prepare_update(&mut self, session: SessionHandle, table: TableHandle, prep: Prep) -> SimResult {
        self.check_cursor(session, table)?;
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        if prep == Prep::Cancel {
            return match cursor.pending.take() {
                Some(_) => Ok(()),
                None => Err(JET_errUpdateNotPrepared),
            };
        }
        if cursor.pending.is_some() {
            return Err(JET_errAlreadyPrepared);
        }
        if cursor.read_only {
            return Err(JET_errPermissionDenied);
        }
        let data = table_of_mut(&mut self.files, cursor)?;
        let pending = match prep {
            Prep::Insert => Pending {
                prep,
                target: None,
                row: data.new_row(),
            },
            Prep::InsertCopy => {
                let (_, row) = current_row(data, cursor)?;
                Pending {
                    prep,
                    target: None,
                    row: row.clone(),
                }
            }
            Prep::Replace | Prep::ReplaceNoLock => {
                let (bookmark, row) = current_row(data, cursor)?;
                Pending {
                    prep,
                    target: Some(bookmark),
                    row: row.clone(),
                }
            }
            Prep::Cancel => return Err(JET_errInvalidParameter),
        };
        cursor.pending = Some(pending);
        Ok(())
    }

    pub fn update(&mut self, session: SessionHandle, table: TableHandle, out: &mut [u8], actual: &mut u32) -> SimResult {
        self.check_cursor(session, table)?;
        if !out.is_empty() && out.len() < 8 {
            return Err(JET_errInvalidBufferSize);
        }
        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let Some(pending) = cursor.pending.as_ref() else {
            return Err(JET_errUpdateNotPrepared);
        };
        let data = table_of_mut(&mut self.files, cursor)?;
        if let Some(target) = pending.target {
            if !data.rows.contains_key(&target) {
                return Err(JET_errRecordDeleted);
            }
        }
        // A rejected record leaves the update prepared.
        data.check_unique(&pending.row, pending.target)?;

        let Some(pending) = cursor.pending.take() else {
            return Err(JET_errUpdateNotPrepared);
        };
        let (bookmark, previous) = match pending.target {
            Some(bookmark) => {
                self.stats.records_replaced += 1;
                (bookmark, data.rows.insert(bookmark, pending.row))
            }
            None => {
                let bookmark = data.allocate_bookmark();
                data.rows.insert(bookmark, pending.row);
                self.stats.records_inserted += 1;
                (bookmark, None)
            }
        };
        if let Some(state) = self.sessions.get_mut(&session.0) {
            state.record(Undo {
                path: cursor.path.clone(),
                table: cursor.table.clone(),
                bookmark,
                previous,
            });
        }
        trace!(bookmark, prep = ?pending.prep, "record written");
        if out.is_empty() {
            *actual = 0;
            Ok(())
        } else {
            write_bookmark(bookmark, out, actual)
        }
    }

    pub fn delete(&mut self, session: SessionHandle, table: TableHandle) -> SimResult {
        self.check_cursor(session, table)?;
        let Some(cursor) = self.cursors.get(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        if cursor.read_only {
            return Err(JET_errPermissionDenied);
        }
        let data = table_of_mut(&mut self.files, cursor)?;
        let bookmark = current_row(data, cursor)?.0;
        let previous = data.rows.remove(&bookmark);
        self.stats.records_deleted += 1;
        if let Some(state) = self.sessions.get_mut(&session.0) {
            state.record(Undo {
                path: cursor.path.clone(),
                table: cursor.table.clone(),
                bookmark,
                previous,
            });
        }
        Ok(())
    }
}

fn write_bookmark(bookmark: u64, out: &mut [u8], actual: &mut u32) -> SimResult {
    let bytes = bookmark.to_be_bytes();
    if out.len() < bytes.len() {
        return Err(JET_errInvalidBufferSize);
    }
    out[..bytes.len()].copy_from_slice(&bytes);
    *actual = bytes.len() as u32;
    Ok(())
}
