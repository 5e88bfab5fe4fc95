//! Test fixtures for jetbind.
//!
//! Every fixture runs the binding against a fresh [`SimEngine`] whose
//! database files live in a temporary directory removed on drop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jetbind_core::{
    ColumnDefinition, IndexDefinition, Instance, InstanceConfig, JetError, JetResult, Session,
    SetColumn, Table,
};
use jetbind_sim::{SimEngine, Violation};
use jetbind_sys::{ColumnId, ColumnType, CreateDatabaseGrbit, JetApi, RetrieveGrbit};
use tempfile::TempDir;

/// A simulated engine plus a scratch directory for its database files.
pub struct TestEngine {
    engine: Arc<SimEngine>,
    temp_dir: TempDir,
}

impl TestEngine {
    /// Creates a fresh engine and directory.
    pub fn new() -> Self {
        Self {
            engine: Arc::new(SimEngine::new()),
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// The simulated engine, for diagnostics.
    pub fn sim(&self) -> &SimEngine {
        &self.engine
    }

    /// The engine as the binding sees it.
    pub fn api(&self) -> Arc<dyn JetApi> {
        self.engine.clone()
    }

    /// The scratch directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of a database file inside the scratch directory.
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Instance configuration that keeps every file in the scratch
    /// directory.
    pub fn config(&self, name: &str) -> InstanceConfig {
        InstanceConfig::new(name).directory(self.path())
    }

    /// Creates and initializes an instance.
    pub fn instance(&self, name: &str) -> Instance {
        Instance::new(self.api(), &self.config(name)).expect("Failed to create instance")
    }

    /// Release-order violations recorded so far.
    pub fn violations(&self) -> Vec<Violation> {
        self.engine.violations()
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` with a session on a fresh instance.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine, &Session<'_>) -> R,
{
    let engine = TestEngine::new();
    let instance = engine.instance("testkit");
    let session = instance.begin_session().expect("Failed to begin session");
    f(&engine, &session)
}

/// Runs `f` with a cursor on an empty table using the [`SampleColumns`]
/// schema.
pub fn with_sample_table<F, R>(f: F) -> R
where
    F: FnOnce(&Table<'_>, &SampleColumns) -> R,
{
    with_session(|engine, session| {
        let db = session
            .create_database(engine.database_path("sample.edb"), CreateDatabaseGrbit::NONE)
            .expect("Failed to create database");
        let table = db.create_table("sample").expect("Failed to create table");
        let columns = SampleColumns::create(&table).expect("Failed to create columns");
        f(&table, &columns)
    })
}

/// Column ids of the sample schema.
///
/// `id` is a fixed 4-byte integer with a unique primary index, `name` a
/// short text column, `payload` a long binary value and `tags` a
/// multi-valued binary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleColumns {
    /// Record id (`Long`, primary key).
    pub id: ColumnId,
    /// Display name (`Text`).
    pub name: ColumnId,
    /// Opaque payload (`LongBinary`).
    pub payload: ColumnId,
    /// Tags (`Binary`, multi-valued).
    pub tags: ColumnId,
}

impl SampleColumns {
    /// Adds the sample columns and primary index to `table`.
    pub fn create(table: &Table<'_>) -> JetResult<Self> {
        let columns = Self {
            id: table.add_column("id", &ColumnDefinition::new(ColumnType::Long).fixed())?,
            name: table.add_column("name", &ColumnDefinition::new(ColumnType::Text))?,
            payload: table.add_column("payload", &ColumnDefinition::new(ColumnType::LongBinary))?,
            tags: table.add_column(
                "tags",
                &ColumnDefinition::new(ColumnType::Binary).multi_valued(),
            )?,
        };
        table.create_index(
            "primary",
            &IndexDefinition::new().ascending("id").primary(),
        )?;
        Ok(columns)
    }

    /// All four ids in schema order.
    pub fn all(&self) -> [ColumnId; 4] {
        [self.id, self.name, self.payload, self.tags]
    }
}

/// One record of the sample table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleRecord {
    /// Primary key.
    pub id: i32,
    /// Name; empty reads back from a null column.
    pub name: String,
    /// Payload; empty reads back from a null column.
    pub payload: Vec<u8>,
    /// Tag values, in insertion order. Must be non-empty values.
    pub tags: Vec<Vec<u8>>,
}

impl SampleRecord {
    /// A deterministic record for `id`.
    pub fn numbered(id: i32) -> Self {
        let seed = id.unsigned_abs() as usize;
        Self {
            id,
            name: format!("record {id}"),
            payload: (0..seed % 512).map(|i| ((i + seed) % 251) as u8).collect(),
            tags: (0..seed % 4).map(|t| format!("tag{t}").into_bytes()).collect(),
        }
    }

    /// Inserts the record and returns its bookmark.
    pub fn insert(&self, table: &Table<'_>, columns: &SampleColumns) -> JetResult<Vec<u8>> {
        let id = self.id.to_le_bytes();
        let mut batch = vec![
            SetColumn::new(columns.id, &id),
            SetColumn::new(columns.name, self.name.as_bytes()),
            SetColumn::new(columns.payload, &self.payload),
        ];
        batch.extend(
            self.tags
                .iter()
                .map(|tag| SetColumn::append_value(columns.tags, tag)),
        );

        let update = table.insert()?;
        let results = update.set_columns(&batch)?;
        if let Some((result, kind)) = results
            .iter()
            .find_map(|r| r.error().map(|kind| (r, kind)))
        {
            return Err(JetError::invalid_argument(format!(
                "column {} rejected: {kind}",
                result.column_id()
            )));
        }
        update.save()
    }

    /// Reads the record under the cursor.
    pub fn read(table: &Table<'_>, columns: &SampleColumns) -> JetResult<Self> {
        let id = table
            .retrieve_column(columns.id, RetrieveGrbit::NONE)?
            .and_then(|bytes| <[u8; 4]>::try_from(bytes.as_slice()).ok())
            .map(i32::from_le_bytes)
            .ok_or_else(|| JetError::invalid_argument("record has no id"))?;
        let name = table
            .retrieve_column(columns.name, RetrieveGrbit::NONE)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let payload = table
            .retrieve_column(columns.payload, RetrieveGrbit::NONE)?
            .unwrap_or_default();
        let tags = table.retrieve_values(columns.tags, RetrieveGrbit::NONE)?;
        Ok(Self {
            id,
            name,
            payload,
            tags,
        })
    }
}

/// Inserts a record built from parts and returns its bookmark.
pub fn insert_sample(
    table: &Table<'_>,
    columns: &SampleColumns,
    id: i32,
    name: &str,
    payload: &[u8],
    tags: &[&[u8]],
) -> JetResult<Vec<u8>> {
    SampleRecord {
        id,
        name: name.to_string(),
        payload: payload.to_vec(),
        tags: tags.iter().map(|t| t.to_vec()).collect(),
    }
    .insert(table, columns)
}

/// Pre-built data sets.
pub mod scenarios {
    use super::*;

    /// Inserts records `0..count` and returns their bookmarks in id order.
    pub fn populate(
        table: &Table<'_>,
        columns: &SampleColumns,
        count: usize,
    ) -> JetResult<Vec<Vec<u8>>> {
        (0..count)
            .map(|i| {
                let id = i32::try_from(i)
                    .map_err(|_| JetError::out_of_range("count", "ids must fit in an i32"))?;
                SampleRecord::numbered(id).insert(table, columns)
            })
            .collect()
    }

    /// Reads every record in index order.
    pub fn read_all(table: &Table<'_>, columns: &SampleColumns) -> JetResult<Vec<SampleRecord>> {
        let mut records = Vec::new();
        let mut more = table.move_first()?;
        while more {
            records.push(SampleRecord::read(table, columns)?);
            more = table.try_move_next()?;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_starts_clean() {
        let engine = TestEngine::new();
        assert!(engine.path().exists());
        assert_eq!(engine.sim().open_handle_count(), 0);
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn sample_record_round_trip() {
        with_sample_table(|table, columns| {
            let record = SampleRecord::numbered(7);
            record.insert(table, columns).unwrap();

            assert!(table.move_first().unwrap());
            assert_eq!(SampleRecord::read(table, columns).unwrap(), record);
        });
    }

    #[test]
    fn populated_table_reads_in_key_order() {
        with_sample_table(|table, columns| {
            let bookmarks = scenarios::populate(table, columns, 20).unwrap();
            assert_eq!(bookmarks.len(), 20);

            let records = scenarios::read_all(table, columns).unwrap();
            let ids: Vec<i32> = records.iter().map(|r| r.id).collect();
            assert_eq!(ids, (0..20).collect::<Vec<_>>());
        });
    }

    #[test]
    fn fixtures_release_everything() {
        let engine = TestEngine::new();
        {
            let instance = engine.instance("release");
            let session = instance.begin_session().unwrap();
            let db = session
                .create_database(engine.database_path("r.edb"), CreateDatabaseGrbit::NONE)
                .unwrap();
            let table = db.create_table("t").unwrap();
            SampleColumns::create(&table).unwrap();
        }
        assert_eq!(engine.sim().open_handle_count(), 0);
        assert!(engine.violations().is_empty());
    }
}
