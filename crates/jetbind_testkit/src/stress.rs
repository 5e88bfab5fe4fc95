//! Stress runs against the simulated engine.
//!
//! These exercise the binding under many records and many concurrent
//! sessions, counting failures instead of stopping at the first one.

use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use jetbind_core::{Instance, JetError, JetResult, RetrieveColumn, Session, Table};
use jetbind_sys::{CommitGrbit, CreateDatabaseGrbit, OpenDatabaseGrbit, OpenTableGrbit};

use crate::fixtures::{scenarios, SampleColumns, SampleRecord, TestEngine};

/// Per-record outcome of one stress run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressReport {
    /// Records written or read without error.
    pub records_ok: usize,
    /// Records lost to a failed batch, or committed but not visible.
    pub records_failed: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl StressReport {
    fn since(start: Instant, records_ok: usize, records_failed: usize) -> Self {
        Self {
            records_ok,
            records_failed,
            elapsed: start.elapsed(),
        }
    }

    /// True when no record failed.
    pub fn is_clean(&self) -> bool {
        self.records_failed == 0
    }

    /// Records handled per second, or `None` for a run too short to time.
    pub fn records_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| (self.records_ok + self.records_failed) as f64 / secs)
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Records written per session.
    pub records: usize,
    /// Concurrent sessions, one thread each.
    pub sessions: usize,
    /// Records inserted per transaction.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            records: 1_000,
            sessions: 4,
            batch_size: 50,
        }
    }
}

/// Inserts `config.records` records through one cursor, one transaction
/// per batch.
pub fn stress_sequential_inserts(
    session: &Session<'_>,
    table: &Table<'_>,
    columns: &SampleColumns,
    config: &StressConfig,
) -> StressReport {
    let start = Instant::now();
    let (ok, failed) = insert_range(session, table, columns, 0, config);
    StressReport::since(start, ok, failed)
}

/// Reads every column of every record with one bulk call per record.
pub fn stress_bulk_reads(table: &Table<'_>, columns: &SampleColumns) -> StressReport {
    let mut id = [0u8; 4];
    let mut name = [0u8; 64];
    let mut payload = [0u8; 256];
    let mut tags = [0u8; 32];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut more = table.move_first().unwrap_or(false);
    while more {
        let mut batch = [
            RetrieveColumn::new(columns.id, &mut id),
            RetrieveColumn::new(columns.name, &mut name),
            RetrieveColumn::new(columns.payload, &mut payload),
            RetrieveColumn::new(columns.tags, &mut tags),
        ];
        match table.retrieve_columns(&mut batch) {
            Ok(results) if results.iter().all(|r| r.error().is_none()) => successful += 1,
            _ => failed += 1,
        }
        more = table.try_move_next().unwrap_or(false);
    }

    StressReport::since(start, successful, failed)
}

/// Runs `config.sessions` sessions on separate threads, each inserting its
/// own id range into a shared table, then checks that every committed
/// record is visible.
pub fn stress_concurrent_sessions(config: &StressConfig) -> JetResult<StressReport> {
    let engine = TestEngine::new();
    let instance = engine.instance("stress");
    let path = engine.database_path("stress.edb");

    let setup = instance.begin_session()?;
    let db = setup.create_database(&path, CreateDatabaseGrbit::NONE)?;
    let columns = {
        let table = db.create_table("sample")?;
        SampleColumns::create(&table)?
    };

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for worker in 0..config.sessions {
            let (instance, path, successful, failed) = (&instance, &path, &successful, &failed);
            scope.spawn(move || {
                let (ok, err) = run_worker(instance, path, &columns, worker, config)
                    .unwrap_or((0, config.records));
                successful.fetch_add(ok, Ordering::Relaxed);
                failed.fetch_add(err, Ordering::Relaxed);
            });
        }
    });

    let elapsed = start.elapsed();
    let table = db.open_table("sample", OpenTableGrbit::NONE)?;
    let visible = scenarios::read_all(&table, &columns)?.len();
    let committed = successful.into_inner();
    Ok(StressReport {
        records_ok: visible.min(committed),
        records_failed: failed.into_inner() + committed.saturating_sub(visible),
        elapsed,
    })
}

fn run_worker(
    instance: &Instance,
    path: &Path,
    columns: &SampleColumns,
    worker: usize,
    config: &StressConfig,
) -> JetResult<(usize, usize)> {
    let session = instance.begin_session()?;
    let db = session.open_database(path, OpenDatabaseGrbit::NONE)?;
    let table = db.open_table("sample", OpenTableGrbit::NONE)?;
    Ok(insert_range(
        &session,
        &table,
        columns,
        worker * config.records,
        config,
    ))
}

fn insert_range(
    session: &Session<'_>,
    table: &Table<'_>,
    columns: &SampleColumns,
    first: usize,
    config: &StressConfig,
) -> (usize, usize) {
    let mut successful = 0usize;
    let mut failed = 0usize;
    let batch_size = config.batch_size.max(1);
    let end = first + config.records;

    let mut next = first;
    while next < end {
        let batch = next..end.min(next + batch_size);
        let count = batch.len();
        match insert_batch(session, table, columns, batch) {
            Ok(()) => successful += count,
            Err(_) => failed += count,
        }
        next += count;
    }
    (successful, failed)
}

fn insert_batch(
    session: &Session<'_>,
    table: &Table<'_>,
    columns: &SampleColumns,
    ids: Range<usize>,
) -> JetResult<()> {
    let tx = session.begin_transaction()?;
    for id in ids {
        let id = i32::try_from(id).map_err(|_| JetError::overflow("id", id))?;
        SampleRecord::numbered(id).insert(table, columns)?;
    }
    tx.commit(CommitGrbit::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::with_session;

    #[test]
    fn sequential_inserts_then_bulk_reads() {
        with_session(|engine, session| {
            let db = session
                .create_database(engine.database_path("seq.edb"), CreateDatabaseGrbit::NONE)
                .unwrap();
            let table = db.create_table("sample").unwrap();
            let columns = SampleColumns::create(&table).unwrap();
            let config = StressConfig {
                records: 200,
                sessions: 1,
                batch_size: 16,
            };

            let writes = stress_sequential_inserts(session, &table, &columns, &config);
            assert_eq!(writes.records_ok, 200);
            assert!(writes.is_clean());

            let reads = stress_bulk_reads(&table, &columns);
            assert_eq!(reads.records_ok, 200);
            assert!(reads.is_clean());
        });
    }

    #[test]
    fn concurrent_sessions_commit_everything() {
        let config = StressConfig {
            records: 100,
            sessions: 4,
            batch_size: 10,
        };
        let result = stress_concurrent_sessions(&config).unwrap();
        assert_eq!(result.records_ok, 400);
        assert!(result.is_clean());
    }

    #[test]
    fn throughput_needs_elapsed_time() {
        let instant = StressReport {
            records_ok: 10,
            records_failed: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(instant.records_per_second(), None);

        let timed = StressReport {
            records_ok: 30,
            records_failed: 10,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(timed.records_per_second(), Some(20.0));
        assert!(!timed.is_clean());
    }
}
