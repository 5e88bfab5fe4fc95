//! Selftest command implementation.
//!
//! Runs a short scripted workload through the scoped wrappers and checks
//! the results, then checks that every handle was released in order.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use jetbind_core::{
    total_leaks, ColumnDefinition, IndexDefinition, Instance, InstanceConfig, JetError,
    JetResult, RetrieveColumn, Session, SetColumn, Table,
};
use jetbind_sim::SimEngine;
use jetbind_sys::{
    ColumnId, ColumnType, CommitGrbit, CreateDatabaseGrbit, DynamicApi, JetApi, MakeKeyGrbit,
    RetrieveGrbit, SeekGrbit,
};
use serde::Serialize;

use super::OutputFormat;
use crate::error::{CliError, CliResult};

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Check name.
    pub name: &'static str,
    /// Whether the check passed.
    pub passed: bool,
    /// What was observed, or why the check failed.
    pub detail: String,
}

impl CheckResult {
    fn from_result(name: &'static str, result: JetResult<String>) -> Self {
        match result {
            Ok(detail) => Self {
                name,
                passed: true,
                detail,
            },
            Err(e) => Self {
                name,
                passed: false,
                detail: e.to_string(),
            },
        }
    }

    fn observed(name: &'static str, passed: bool, detail: String) -> Self {
        Self {
            name,
            passed,
            detail,
        }
    }
}

/// Full self-test report.
#[derive(Debug, Serialize)]
pub struct SelftestReport {
    /// `simulator` or the path of the native library.
    pub engine: String,
    /// Records the workload inserted.
    pub records: usize,
    /// Checks in the order they ran.
    pub checks: Vec<CheckResult>,
    /// Engine calls made, when running on the simulator.
    pub engine_calls: Option<u64>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
}

impl SelftestReport {
    /// Number of failed checks.
    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Column ids of the self-test table.
#[derive(Debug, Clone, Copy)]
struct Columns {
    id: ColumnId,
    name: ColumnId,
    tags: ColumnId,
}

impl Columns {
    fn create(table: &Table<'_>) -> JetResult<Self> {
        let columns = Self {
            id: table.add_column("id", &ColumnDefinition::new(ColumnType::Long).fixed())?,
            name: table.add_column("name", &ColumnDefinition::new(ColumnType::Text))?,
            tags: table.add_column(
                "tags",
                &ColumnDefinition::new(ColumnType::Binary).multi_valued(),
            )?,
        };
        table.create_index("primary", &IndexDefinition::new().ascending("id").primary())?;
        Ok(columns)
    }
}

fn record_id(index: usize) -> JetResult<i32> {
    i32::try_from(index).map_err(|_| JetError::out_of_range("records", "ids must fit in an i32"))
}

fn record_name(id: i32) -> String {
    format!("record {id}")
}

fn tag_count(id: i32) -> usize {
    id.unsigned_abs() as usize % 3
}

fn insert_one(table: &Table<'_>, columns: &Columns, id: i32) -> JetResult<()> {
    let id_bytes = id.to_le_bytes();
    let name = record_name(id);
    let tags: Vec<Vec<u8>> = (0..tag_count(id))
        .map(|t| format!("tag{t}").into_bytes())
        .collect();

    let mut batch = vec![
        SetColumn::new(columns.id, &id_bytes),
        SetColumn::new(columns.name, name.as_bytes()),
    ];
    batch.extend(tags.iter().map(|t| SetColumn::append_value(columns.tags, t)));

    let update = table.insert()?;
    for result in update.set_columns(&batch)? {
        if let Some(kind) = result.error() {
            return Err(JetError::native(kind, "JetSetColumns"));
        }
    }
    update.save()?;
    Ok(())
}

fn insert_records(
    session: &Session<'_>,
    table: &Table<'_>,
    columns: &Columns,
    records: usize,
) -> JetResult<String> {
    let tx = session.begin_transaction()?;
    for index in 0..records {
        insert_one(table, columns, record_id(index)?)?;
    }
    tx.commit(CommitGrbit::NONE)?;
    Ok(format!("inserted {records} records in one transaction"))
}

fn verify_records(table: &Table<'_>, columns: &Columns, records: usize) -> JetResult<String> {
    let mut id_buf = [0u8; 4];
    let mut name_buf = [0u8; 64];
    let mut seen = 0usize;

    let mut more = table.move_first()?;
    while more {
        let expected = record_id(seen)?;
        let mut batch = [
            RetrieveColumn::new(columns.id, &mut id_buf),
            RetrieveColumn::new(columns.name, &mut name_buf),
            RetrieveColumn::value_count(columns.tags),
        ];
        let results = table.retrieve_columns(&mut batch)?;

        if let Some(kind) = results.iter().find_map(|r| r.error()) {
            return Err(JetError::native(kind, "JetRetrieveColumns"));
        }
        let id = i32::from_le_bytes(id_buf);
        let name_len = results[1].written(name_buf.len());
        let name = String::from_utf8_lossy(&name_buf[..name_len]);
        let tags = results[2].itag_sequence();
        if id != expected || name != record_name(expected) || tags != tag_count(expected) {
            return Err(JetError::invalid_argument(format!(
                "record {seen}: read id {id}, name {name:?}, {tags} tags"
            )));
        }

        seen += 1;
        more = table.try_move_next()?;
    }

    if seen != records {
        return Err(JetError::invalid_argument(format!(
            "expected {records} records, found {seen}"
        )));
    }
    Ok(format!("{seen} records read back with one call each"))
}

fn check_truncation(table: &Table<'_>, columns: &Columns) -> JetResult<String> {
    if !table.move_first()? {
        return Ok("skipped: table is empty".to_string());
    }
    let mut small = [0u8; 3];
    let mut batch = [RetrieveColumn::new(columns.name, &mut small)];
    let results = table.retrieve_columns(&mut batch)?;
    let result = &results[0];
    let full = record_name(0).len();
    if !result.is_truncated() || result.actual_size() != full {
        return Err(JetError::invalid_argument(format!(
            "expected a truncation warning with actual size {full}, got {} ({})",
            result.status(),
            result.actual_size()
        )));
    }
    Ok(format!("3-byte buffer reported actual size {full}"))
}

fn check_seek(table: &Table<'_>, columns: &Columns, records: usize) -> JetResult<String> {
    if records == 0 {
        return Ok("skipped: table is empty".to_string());
    }
    let target = record_id(records / 2)?;
    table.make_key(&target.to_le_bytes(), MakeKeyGrbit::NEW_KEY)?;
    table.seek(SeekGrbit::EQ)?;

    let found = table
        .retrieve_column(columns.id, RetrieveGrbit::NONE)?
        .and_then(|bytes| <[u8; 4]>::try_from(bytes.as_slice()).ok())
        .map(i32::from_le_bytes);
    if found != Some(target) {
        return Err(JetError::invalid_argument(format!(
            "seek to {target} landed on {found:?}"
        )));
    }
    Ok(format!("seek found record {target}"))
}

fn check_rollback(
    session: &Session<'_>,
    table: &Table<'_>,
    columns: &Columns,
    records: usize,
) -> JetResult<String> {
    let extra = record_id(records)?;
    let tx = session.begin_transaction()?;
    insert_one(table, columns, extra)?;
    tx.rollback()?;

    let mut count = 0usize;
    let mut more = table.move_first()?;
    while more {
        count += 1;
        more = table.try_move_next()?;
    }
    if count != records {
        return Err(JetError::invalid_argument(format!(
            "rolled-back insert is still visible: {count} records"
        )));
    }
    Ok("rolled-back insert is not visible".to_string())
}

/// Runs the workload against `api` with database files under `dir`.
///
/// Every wrapper is dropped before this returns.
pub fn run_workload(api: Arc<dyn JetApi>, dir: &Path, records: usize) -> JetResult<Vec<CheckResult>> {
    let config = InstanceConfig::new("jetbind-selftest")
        .directory(dir)
        .create_path_if_not_exist(true);
    let instance = Instance::new(api, &config)?;
    let session = instance.begin_session()?;
    let db = session.create_database(dir.join("selftest.edb"), CreateDatabaseGrbit::NONE)?;
    let table = db.create_table("records")?;
    let columns = Columns::create(&table)?;

    let mut checks = vec![CheckResult::from_result(
        "insert",
        insert_records(&session, &table, &columns, records),
    )];
    checks.push(CheckResult::from_result(
        "bulk retrieve",
        verify_records(&table, &columns, records),
    ));
    checks.push(CheckResult::from_result(
        "truncation",
        check_truncation(&table, &columns),
    ));
    checks.push(CheckResult::from_result(
        "seek",
        check_seek(&table, &columns, records),
    ));
    checks.push(CheckResult::from_result(
        "rollback",
        check_rollback(&session, &table, &columns, records),
    ));
    Ok(checks)
}

#[allow(unsafe_code)]
fn load_library(path: &Path) -> CliResult<Arc<dyn JetApi>> {
    // SAFETY: the user named this library as a Jet-family engine.
    let api = unsafe { DynamicApi::load(path)? };
    Ok(Arc::new(api))
}

/// Builds the full report: the workload plus handle hygiene checks.
pub fn check(records: usize, library: Option<&Path>) -> CliResult<SelftestReport> {
    let dir = tempfile::tempdir()?;
    let sim = Arc::new(SimEngine::new());
    let (api, engine): (Arc<dyn JetApi>, String) = match library {
        Some(path) => (load_library(path)?, path.display().to_string()),
        None => {
            let api: Arc<dyn JetApi> = sim.clone();
            (api, "simulator".to_string())
        }
    };

    let leaks_before = total_leaks();
    let start = Instant::now();
    let mut checks = run_workload(api, dir.path(), records)?;
    let duration_ms = start.elapsed().as_millis();

    let leaked = total_leaks().saturating_sub(leaks_before);
    checks.push(CheckResult::observed(
        "no leaked handles",
        leaked == 0,
        format!("{leaked} handle(s) dropped without release"),
    ));

    let engine_calls = if library.is_none() {
        let violations = sim.violations();
        checks.push(CheckResult::observed(
            "release order",
            violations.is_empty(),
            match violations.first() {
                Some(v) => format!("{} violation(s), first: {v}", violations.len()),
                None => "every handle released before its parent".to_string(),
            },
        ));
        let open = sim.open_handle_count();
        checks.push(CheckResult::observed(
            "no open handles",
            open == 0,
            format!("{open} handle(s) still open in the engine"),
        ));
        Some(sim.stats().calls)
    } else {
        None
    };

    Ok(SelftestReport {
        engine,
        records,
        checks,
        engine_calls,
        duration_ms,
    })
}

/// Runs the selftest command.
pub fn run(records: usize, library: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    tracing::info!(records, "running self-test");
    let report = check(records, library)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_text(&report),
    }

    match report.failures() {
        0 => Ok(()),
        failed => Err(CliError::SelfTestFailed {
            failed,
            total: report.checks.len(),
        }),
    }
}

fn print_text(report: &SelftestReport) {
    println!("jetbind self-test");
    println!("=================");
    println!();
    println!("Engine:   {}", report.engine);
    println!("Records:  {}", report.records);
    if let Some(calls) = report.engine_calls {
        println!("Calls:    {calls}");
    }
    println!("Duration: {} ms", report.duration_ms);
    println!();
    for check in &report.checks {
        let mark = if check.passed { "✓" } else { "✗" };
        println!("{mark} {:<18} {}", check.name, check.detail);
    }
    println!();
    if report.failures() == 0 {
        println!("✓ All {} checks passed", report.checks.len());
    } else {
        println!("✗ {} of {} checks failed", report.failures(), report.checks.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulator_passes_every_check() {
        let report = check(50, None).unwrap();
        assert_eq!(report.failures(), 0, "{:#?}", report.checks);
        assert_eq!(report.checks.len(), 8);
        assert!(report.engine_calls.unwrap() > 50);
    }

    #[test]
    fn empty_workload_skips_record_checks() {
        let report = check(0, None).unwrap();
        assert_eq!(report.failures(), 0, "{:#?}", report.checks);
        let seek = report.checks.iter().find(|c| c.name == "seek").unwrap();
        assert!(seek.detail.starts_with("skipped"));
    }

    #[test]
    fn missing_library_is_a_load_error() {
        let err = check(1, Some(Path::new("/nonexistent/libjet.so"))).unwrap_err();
        assert!(matches!(err, CliError::Load(_)));
    }
}
