//! Benchmark utilities.
//!
//! Every benchmark runs against the simulated engine, so the numbers
//! measure the binding's own overhead: validation, marshaling and status
//! classification.

use std::sync::Arc;

use jetbind_core::{ColumnDefinition, Instance, InstanceConfig, Session, SetColumn, Table};
use jetbind_sim::SimEngine;
use jetbind_sys::{ColumnId, ColumnType, CreateDatabaseGrbit};
use tempfile::TempDir;

/// A simulated engine with a scratch directory.
pub struct BenchEngine {
    /// The engine.
    pub engine: Arc<SimEngine>,
    /// Directory for database files.
    pub dir: TempDir,
}

impl BenchEngine {
    /// Creates a fresh engine.
    pub fn new() -> Self {
        Self {
            engine: Arc::new(SimEngine::new()),
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Configuration for an instance writing into the scratch directory.
    pub fn config(&self, name: &str) -> InstanceConfig {
        InstanceConfig::new(name).directory(self.dir.path())
    }

    /// Creates an instance.
    pub fn instance(&self, name: &str) -> Instance {
        Instance::new(self.engine.clone(), &self.config(name)).expect("Failed to create instance")
    }
}

impl Default for BenchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic data of `size` bytes.
pub fn pattern_data(size: usize, seed: usize) -> Vec<u8> {
    (0..size).map(|i| ((i + seed) % 251) as u8).collect()
}

/// Runs `f` on a table with `width` binary columns and `rows` records,
/// each value `value_size` bytes. The cursor is on the first record.
pub fn with_wide_table<F, R>(width: usize, rows: usize, value_size: usize, f: F) -> R
where
    F: FnOnce(&Session<'_>, &Table<'_>, &[ColumnId]) -> R,
{
    let bench = BenchEngine::new();
    let instance = bench.instance("bench");
    let session = instance.begin_session().expect("Failed to begin session");
    let db = session
        .create_database(bench.dir.path().join("bench.edb"), CreateDatabaseGrbit::NONE)
        .expect("Failed to create database");
    let table = db.create_table("wide").expect("Failed to create table");

    let column_type = if value_size > 255 {
        ColumnType::LongBinary
    } else {
        ColumnType::Binary
    };
    let columns: Vec<ColumnId> = (0..width)
        .map(|i| {
            table
                .add_column(&format!("c{i}"), &ColumnDefinition::new(column_type))
                .expect("Failed to add column")
        })
        .collect();

    let values: Vec<Vec<u8>> = (0..width).map(|i| pattern_data(value_size, i)).collect();
    for _ in 0..rows {
        let batch: Vec<SetColumn<'_>> = columns
            .iter()
            .zip(&values)
            .map(|(column, value)| SetColumn::new(*column, value))
            .collect();
        let update = table.insert().expect("Failed to prepare insert");
        update.set_columns(&batch).expect("Failed to set columns");
        update.save().expect("Failed to save record");
    }
    if rows > 0 {
        table.move_first().expect("Failed to move to first record");
    }

    f(&session, &table, &columns)
}
