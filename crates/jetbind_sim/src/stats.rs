//! Call counters and lifecycle violation records.

use std::fmt;

/// Counters kept by [`crate::SimEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Every entry point call, successful or not.
    pub calls: u64,
    /// Bulk retrieve calls that reached the column loop.
    pub retrieve_batches: u64,
    /// Records processed by bulk retrieve calls.
    pub retrieved_columns: u64,
    /// Bulk set calls that reached the column loop.
    pub set_batches: u64,
    /// Records processed by bulk set calls.
    pub set_columns: u64,
    /// Records inserted by updates.
    pub records_inserted: u64,
    /// Records replaced by updates.
    pub records_replaced: u64,
    /// Records deleted.
    pub records_deleted: u64,
}

/// What kind of out-of-order release the engine saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// An instance was terminated while sessions were still open.
    TermWithActiveSessions,
    /// A session was ended while it still had open cursors.
    EndSessionWithOpenCursors,
    /// A session was ended inside a transaction.
    EndSessionInTransaction,
    /// A database was closed while cursors on it were still open.
    CloseDatabaseWithOpenCursors,
}

/// A release-order violation. The engine recovers (it tears the dependent
/// handles down itself) but records what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Kind of violation.
    pub kind: ViolationKind,
    /// Human-readable detail naming the handles involved.
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}
