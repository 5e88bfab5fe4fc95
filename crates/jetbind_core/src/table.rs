//! Table cursors.
//!
//! A [`Table`] is a cursor: a position in one table, an optional current
//! index and a search key. Column reads and writes go through the bulk
//! marshaler; the single-column helpers are thin wrappers over one-element
//! batches.

use std::ffi::CString;
use std::marker::PhantomData;

use jetbind_sys::{
    ColumnId, DatabaseId, JetApi, MakeKeyGrbit, MoveGrbit, OpenTableGrbit, Prep, RetrieveGrbit,
    SeekGrbit, SessionHandle, SetGrbit, TableHandle, MAX_BOOKMARK_SIZE, MOVE_FIRST, MOVE_LAST,
    MOVE_NEXT, MOVE_PREVIOUS,
};

use crate::columns::{RetrieveColumn, RetrievedColumn, SetColumn, SetColumnResult};
use crate::config::to_cstring;
use crate::database::Database;
use crate::error::{JetError, JetResult};
use crate::marshal;
use crate::resource::{HandleKind, Resource, ResourceKind};
use crate::schema::{ColumnDefinition, IndexDefinition};
use crate::session::SessionBound;
use crate::status::{self, ErrorKind, Warning};
use crate::update::Update;

/// A cursor, addressed by its session and table id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle {
    /// Session that owns the cursor.
    pub session: SessionHandle,
    /// Cursor id.
    pub table: TableHandle,
}

/// How a cursor is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOpen {
    /// Create the table first.
    Create {
        /// Initial size in pages.
        pages: u32,
        /// Page density in percent.
        density: u32,
    },
    /// Open an existing table.
    Open(OpenTableGrbit),
}

/// Allocation parameters for [`TableKind`].
#[derive(Debug, Clone)]
pub struct TableParams {
    /// Owning session.
    pub session: SessionHandle,
    /// Database holding the table.
    pub database: DatabaseId,
    /// Table name.
    pub name: CString,
    /// Create or open.
    pub mode: TableOpen,
}

/// Handle kind for table cursors.
#[derive(Debug)]
pub struct TableKind;

impl HandleKind for TableKind {
    type Handle = CursorHandle;
    type Params = TableParams;

    const KIND: ResourceKind = ResourceKind::Table;
    const ALLOCATE_OPERATION: &'static str = "JetOpenTable";
    const RELEASE_OPERATION: &'static str = "JetCloseTable";

    fn allocate(api: &dyn JetApi, params: &TableParams) -> (i32, CursorHandle) {
        let mut table = TableHandle::NIL;
        let code = match params.mode {
            TableOpen::Create { pages, density } => api.create_table(
                params.session,
                params.database,
                &params.name,
                pages,
                density,
                &mut table,
            ),
            TableOpen::Open(grbit) => api.open_table(
                params.session,
                params.database,
                &params.name,
                grbit,
                &mut table,
            ),
        };
        (
            code,
            CursorHandle {
                session: params.session,
                table,
            },
        )
    }

    fn release(api: &dyn JetApi, handle: CursorHandle) -> i32 {
        api.close_table(handle.session, handle.table)
    }
}

/// A cursor on a table. Closed on drop.
#[derive(Debug)]
pub struct Table<'d> {
    resource: Resource<TableKind>,
    name: String,
    _database: SessionBound<'d>,
}

impl<'d> Table<'d> {
    pub(crate) fn open_with(database: &'d Database<'_>, name: &str, mode: TableOpen) -> JetResult<Self> {
        let handle = database.handle()?;
        let params = TableParams {
            session: handle.session,
            database: handle.database,
            name: to_cstring("table name", name)?,
            mode,
        };
        let mut resource = Resource::new(database.api().clone());
        resource.allocate(&params)?;
        Ok(Self {
            resource,
            name: name.to_string(),
            _database: PhantomData,
        })
    }

    /// The native cursor.
    pub fn cursor(&self) -> JetResult<CursorHandle> {
        self.resource.ensure_usable()
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn api(&self) -> &dyn JetApi {
        self.resource.api().as_ref()
    }

    /// Adds a column and returns its id.
    pub fn add_column(&self, name: &str, definition: &ColumnDefinition) -> JetResult<ColumnId> {
        let cursor = self.cursor()?;
        let name_c = to_cstring("column name", name)?;
        let mut column = ColumnId::default();
        let code = self.api().add_column(
            cursor.session,
            cursor.table,
            &name_c,
            &definition.to_native(),
            &definition.default_value,
            &mut column,
        );
        status::check(code, "JetAddColumn")?;
        tracing::debug!(table = %self.name, column = name, id = %column, "column added");
        Ok(column)
    }

    /// Creates an index.
    pub fn create_index(&self, name: &str, definition: &IndexDefinition) -> JetResult<()> {
        let cursor = self.cursor()?;
        let name = to_cstring("index name", name)?;
        let key = definition.key()?;
        let code = self.api().create_index(
            cursor.session,
            cursor.table,
            &name,
            definition.grbit,
            &key,
            definition.density,
        );
        status::check(code, "JetCreateIndex").map(|_| ())
    }

    /// Switches the cursor to `index`, or to the primary index for `None`.
    pub fn set_current_index(&self, index: Option<&str>) -> JetResult<()> {
        let cursor = self.cursor()?;
        let index = index.map(|i| to_cstring("index name", i)).transpose()?;
        let code = self
            .api()
            .set_current_index(cursor.session, cursor.table, index.as_deref());
        status::check(code, "JetSetCurrentIndex").map(|_| ())
    }

    /// Adds a segment to the search key.
    pub fn make_key(&self, data: &[u8], grbit: MakeKeyGrbit) -> JetResult<()> {
        let cursor = self.cursor()?;
        let code = self.api().make_key(cursor.session, cursor.table, data, grbit);
        status::check(code, "JetMakeKey").map(|_| ())
    }

    /// Positions the cursor with the search key.
    ///
    /// Returns [`Warning::SeekNotEqual`] when an inequality seek landed on
    /// a record whose key differs from the search key.
    pub fn seek(&self, grbit: SeekGrbit) -> JetResult<Option<Warning>> {
        let cursor = self.cursor()?;
        let code = self.api().seek(cursor.session, cursor.table, grbit);
        status::check(code, "JetSeek")
    }

    /// Like [`Table::seek`], but reports "no matching record" as `false`.
    pub fn try_seek(&self, grbit: SeekGrbit) -> JetResult<bool> {
        match self.seek(grbit) {
            Ok(_) => Ok(true),
            Err(err) if err.is_native(ErrorKind::RecordNotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Moves the cursor by `rows`, or to an end with
    /// [`MOVE_FIRST`]/[`MOVE_LAST`].
    pub fn move_to(&self, rows: i32) -> JetResult<()> {
        let cursor = self.cursor()?;
        let code = self
            .api()
            .move_cursor(cursor.session, cursor.table, rows, MoveGrbit::NONE);
        status::check(code, "JetMove").map(|_| ())
    }

    /// Like [`Table::move_to`], but reports running off either end as
    /// `false`.
    pub fn try_move(&self, rows: i32) -> JetResult<bool> {
        match self.move_to(rows) {
            Ok(()) => Ok(true),
            Err(err) if err.is_native(ErrorKind::NoCurrentRecord) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Moves to the first record; `false` if the table is empty.
    pub fn move_first(&self) -> JetResult<bool> {
        self.try_move(MOVE_FIRST)
    }

    /// Moves to the last record; `false` if the table is empty.
    pub fn move_last(&self) -> JetResult<bool> {
        self.try_move(MOVE_LAST)
    }

    /// Moves to the next record; `false` past the end.
    pub fn try_move_next(&self) -> JetResult<bool> {
        self.try_move(MOVE_NEXT)
    }

    /// Moves to the previous record; `false` before the start.
    pub fn try_move_previous(&self) -> JetResult<bool> {
        self.try_move(MOVE_PREVIOUS)
    }

    /// Returns the bookmark of the current record.
    pub fn bookmark(&self) -> JetResult<Vec<u8>> {
        let cursor = self.cursor()?;
        let mut buf = vec![0u8; MAX_BOOKMARK_SIZE];
        let mut actual = 0u32;
        let code = self
            .api()
            .get_bookmark(cursor.session, cursor.table, &mut buf, &mut actual);
        status::check(code, "JetGetBookmark")?;
        buf.truncate(actual as usize);
        Ok(buf)
    }

    /// Positions the cursor on the record with `bookmark`.
    pub fn goto_bookmark(&self, bookmark: &[u8]) -> JetResult<()> {
        let cursor = self.cursor()?;
        let code = self.api().goto_bookmark(cursor.session, cursor.table, bookmark);
        status::check(code, "JetGotoBookmark").map(|_| ())
    }

    /// Deletes the current record.
    pub fn delete(&self) -> JetResult<()> {
        let cursor = self.cursor()?;
        let code = self.api().delete(cursor.session, cursor.table);
        status::check(code, "JetDelete").map(|_| ())
    }

    /// Reads a batch of columns from the current record.
    pub fn retrieve_columns(
        &self,
        columns: &mut [RetrieveColumn<'_>],
    ) -> JetResult<Vec<RetrievedColumn>> {
        marshal::retrieve_columns(self.api(), self.cursor()?, columns)
    }

    /// Writes a batch of columns into the prepared update.
    pub fn set_columns(&self, columns: &[SetColumn<'_>]) -> JetResult<Vec<SetColumnResult>> {
        marshal::set_columns(self.api(), self.cursor()?, columns)
    }

    /// Reads one column value, growing the buffer until it fits.
    ///
    /// Returns `None` when the column is null.
    pub fn retrieve_column(
        &self,
        column: ColumnId,
        grbit: RetrieveGrbit,
    ) -> JetResult<Option<Vec<u8>>> {
        self.retrieve_value(column, 1, grbit)
    }

    /// Reads value number `itag_sequence` (1-based) of a column.
    pub fn retrieve_value(
        &self,
        column: ColumnId,
        itag_sequence: usize,
        grbit: RetrieveGrbit,
    ) -> JetResult<Option<Vec<u8>>> {
        let mut buf = vec![0u8; 64];
        loop {
            let capacity = buf.len();
            let mut batch = [RetrieveColumn::new(column, &mut buf)
                .with_grbit(grbit)
                .with_itag_sequence(itag_sequence)];
            let result = single(self.retrieve_columns(&mut batch)?)?;
            if let Some(kind) = result.error() {
                return Err(JetError::native(kind, "JetRetrieveColumns"));
            }
            if result.is_null() {
                return Ok(None);
            }
            if result.actual_size() > capacity {
                buf.resize(result.actual_size(), 0);
                continue;
            }
            buf.truncate(result.actual_size());
            return Ok(Some(buf));
        }
    }

    /// Number of values stored in a column of the current record.
    pub fn value_count(&self, column: ColumnId, grbit: RetrieveGrbit) -> JetResult<usize> {
        let mut batch = [RetrieveColumn::value_count(column).with_grbit(grbit)];
        let result = single(self.retrieve_columns(&mut batch)?)?;
        if let Some(kind) = result.error() {
            return Err(JetError::native(kind, "JetRetrieveColumns"));
        }
        Ok(result.itag_sequence())
    }

    /// Reads every value of a multi-valued column.
    pub fn retrieve_values(&self, column: ColumnId, grbit: RetrieveGrbit) -> JetResult<Vec<Vec<u8>>> {
        let count = self.value_count(column, grbit)?;
        let mut values = Vec::with_capacity(count);
        for itag in 1..=count {
            if let Some(value) = self.retrieve_value(column, itag, grbit)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Writes one column value into the prepared update.
    pub fn set_column(&self, column: ColumnId, data: &[u8], grbit: SetGrbit) -> JetResult<()> {
        let result = single(self.set_columns(&[SetColumn::new(column, data).with_grbit(grbit)])?)?;
        match result.error() {
            Some(kind) => Err(JetError::native(kind, "JetSetColumns")),
            None => Ok(()),
        }
    }

    /// Prepares an insert or replace on this cursor.
    pub fn prepare_update(&self, prep: Prep) -> JetResult<Update<'_>> {
        Update::prepare(self, prep)
    }

    /// Prepares an insert.
    pub fn insert(&self) -> JetResult<Update<'_>> {
        self.prepare_update(Prep::Insert)
    }

    /// Prepares a replace of the current record.
    pub fn replace(&self) -> JetResult<Update<'_>> {
        self.prepare_update(Prep::Replace)
    }

    pub(crate) fn api_arc(&self) -> &std::sync::Arc<dyn JetApi> {
        self.resource.api()
    }

    /// Closes the cursor now.
    pub fn close(mut self) {
        self.resource.release();
    }
}

impl Drop for Table<'_> {
    fn drop(&mut self) {
        self.resource.release();
    }
}

fn single<T: Copy>(results: Vec<T>) -> JetResult<T> {
    results
        .first()
        .copied()
        .ok_or_else(|| JetError::out_of_range("columns", "engine returned no result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use jetbind_sim::SimEngine;
    use jetbind_sys::{ColumnType, CreateDatabaseGrbit};
    use std::sync::Arc;

    struct Fixture {
        dir: tempfile::TempDir,
        instance: Instance,
    }

    fn fixture(name: &str) -> Fixture {
        let engine = Arc::new(SimEngine::new());
        Fixture {
            dir: tempfile::tempdir().unwrap(),
            instance: Instance::with_name(engine, name).unwrap(),
        }
    }

    fn insert(table: &Table<'_>, id: ColumnId, name: ColumnId, n: i32, text: &str) -> Vec<u8> {
        let update = table.insert().unwrap();
        update
            .set_columns(&[
                SetColumn::new(id, &n.to_le_bytes()),
                SetColumn::new(name, text.as_bytes()),
            ])
            .unwrap();
        update.save().unwrap()
    }

    #[test]
    fn insert_navigate_and_read() {
        let fx = fixture("nav");
        let session = fx.instance.begin_session().unwrap();
        let db = session
            .create_database(fx.dir.path().join("nav.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("people").unwrap();
        let id = table
            .add_column("id", &ColumnDefinition::new(ColumnType::Long))
            .unwrap();
        let name = table
            .add_column("name", &ColumnDefinition::new(ColumnType::LongText))
            .unwrap();
        table
            .create_index("by_id", &IndexDefinition::new().ascending("id").primary())
            .unwrap();

        assert!(!table.move_first().unwrap());

        insert(&table, id, name, 3, "carol");
        let bob = insert(&table, id, name, 2, "bob");
        insert(&table, id, name, 1, "alice");

        assert!(table.move_first().unwrap());
        assert_eq!(
            table.retrieve_column(name, RetrieveGrbit::NONE).unwrap(),
            Some(b"alice".to_vec())
        );
        assert!(table.try_move_next().unwrap());
        assert!(table.try_move_next().unwrap());
        assert!(!table.try_move_next().unwrap());

        table.goto_bookmark(&bob).unwrap();
        assert_eq!(
            table.retrieve_column(name, RetrieveGrbit::NONE).unwrap(),
            Some(b"bob".to_vec())
        );

        table.make_key(&2i32.to_le_bytes(), MakeKeyGrbit::NEW_KEY).unwrap();
        assert_eq!(table.seek(SeekGrbit::EQ).unwrap(), None);
        assert_eq!(table.bookmark().unwrap(), bob);

        table.make_key(&5i32.to_le_bytes(), MakeKeyGrbit::NEW_KEY).unwrap();
        assert!(!table.try_seek(SeekGrbit::EQ).unwrap());
    }

    #[test]
    fn retrieve_column_grows_buffer() {
        let fx = fixture("grow");
        let session = fx.instance.begin_session().unwrap();
        let db = session
            .create_database(fx.dir.path().join("grow.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("blobs").unwrap();
        let blob = table
            .add_column("blob", &ColumnDefinition::new(ColumnType::LongBinary))
            .unwrap();

        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let update = table.insert().unwrap();
        update.set_column(blob, &data, SetGrbit::NONE).unwrap();
        update.save().unwrap();

        assert!(table.move_first().unwrap());
        assert_eq!(
            table.retrieve_column(blob, RetrieveGrbit::NONE).unwrap(),
            Some(data)
        );
    }

    #[test]
    fn multi_valued_columns() {
        let fx = fixture("multi");
        let session = fx.instance.begin_session().unwrap();
        let db = session
            .create_database(fx.dir.path().join("multi.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("tags").unwrap();
        let tags = table
            .add_column(
                "tags",
                &ColumnDefinition::new(ColumnType::Binary).multi_valued(),
            )
            .unwrap();

        let update = table.insert().unwrap();
        update
            .set_columns(&[
                SetColumn::append_value(tags, b"red"),
                SetColumn::append_value(tags, b"green"),
            ])
            .unwrap();
        update.save().unwrap();

        assert!(table.move_first().unwrap());
        assert_eq!(table.value_count(tags, RetrieveGrbit::NONE).unwrap(), 2);
        assert_eq!(
            table.retrieve_values(tags, RetrieveGrbit::NONE).unwrap(),
            vec![b"red".to_vec(), b"green".to_vec()]
        );
    }

    #[test]
    fn delete_moves_off_record() {
        let fx = fixture("delete");
        let session = fx.instance.begin_session().unwrap();
        let db = session
            .create_database(fx.dir.path().join("del.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("t").unwrap();
        let id = table
            .add_column("id", &ColumnDefinition::new(ColumnType::Long))
            .unwrap();
        let update = table.insert().unwrap();
        update.set_column(id, &1i32.to_le_bytes(), SetGrbit::NONE).unwrap();
        update.save().unwrap();

        assert!(table.move_first().unwrap());
        table.delete().unwrap();
        let err = table.retrieve_column(id, RetrieveGrbit::NONE).unwrap_err();
        assert!(err.is_native(ErrorKind::RecordDeleted) || err.is_native(ErrorKind::NoCurrentRecord));
        assert!(!table.move_first().unwrap());
    }

    #[test]
    fn null_column_reads_as_none() {
        let fx = fixture("nulls");
        let session = fx.instance.begin_session().unwrap();
        let db = session
            .create_database(fx.dir.path().join("n.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("t").unwrap();
        let a = table
            .add_column("a", &ColumnDefinition::new(ColumnType::Binary))
            .unwrap();
        let b = table
            .add_column("b", &ColumnDefinition::new(ColumnType::Binary))
            .unwrap();
        let update = table.insert().unwrap();
        update.set_column(a, b"x", SetGrbit::NONE).unwrap();
        update.save().unwrap();

        assert!(table.move_first().unwrap());
        assert_eq!(table.retrieve_column(b, RetrieveGrbit::NONE).unwrap(), None);
    }
}
