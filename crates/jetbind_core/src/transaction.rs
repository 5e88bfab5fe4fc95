//! Transactions.

use std::cell::{Cell, RefCell};
use std::mem;

use jetbind_sys::{CommitGrbit, JetApi, RollbackGrbit, SessionHandle};

use crate::error::{JetError, JetResult};
use crate::resource::{HandleKind, Resource, ResourceKind};
use crate::session::Session;
use crate::status::{self, classify, Status};

/// Handle kind for one transaction level. The "handle" is the session the
/// level was begun on.
#[derive(Debug)]
pub struct TransactionKind;

impl HandleKind for TransactionKind {
    type Handle = SessionHandle;
    type Params = SessionHandle;

    const KIND: ResourceKind = ResourceKind::Transaction;
    const ALLOCATE_OPERATION: &'static str = "JetBeginTransaction";
    const RELEASE_OPERATION: &'static str = "JetRollback";

    fn allocate(api: &dyn JetApi, session: &SessionHandle) -> (i32, SessionHandle) {
        (api.begin_transaction(*session), *session)
    }

    fn release(api: &dyn JetApi, session: SessionHandle) -> i32 {
        api.rollback(session, RollbackGrbit::NONE)
    }
}

/// The stack of transaction levels a session has open, innermost last.
///
/// Each level gets an id unique within the session, so a stale
/// [`Transaction`] can never act on a level opened after its own ended.
#[derive(Debug, Default)]
pub(crate) struct TransactionLevels {
    open: RefCell<Vec<u64>>,
    next: Cell<u64>,
}

impl TransactionLevels {
    fn push(&self) -> u64 {
        let id = self.next.get() + 1;
        self.next.set(id);
        self.open.borrow_mut().push(id);
        id
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.open.borrow().iter().position(|level| *level == id)
    }

    fn is_innermost(&self, id: u64) -> bool {
        self.open.borrow().last() == Some(&id)
    }

    fn truncate(&self, len: usize) {
        self.open.borrow_mut().truncate(len);
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.borrow().len()
    }

    fn check_innermost(&self, id: u64, action: &str) -> JetResult<()> {
        if self.is_innermost(id) {
            return Ok(());
        }
        match self.position(id) {
            Some(index) => Err(JetError::invalid_argument(format!(
                "cannot {action} transaction level {} while {} nested level(s) are open",
                index + 1,
                self.depth() - index - 1
            ))),
            None => Err(JetError::invalid_argument(format!(
                "cannot {action} a transaction level that an enclosing level already rolled back"
            ))),
        }
    }
}

/// An open transaction level. Rolled back on drop unless committed.
///
/// Commit, rollback and suspend act only on the innermost open level and
/// fail with [`JetError::InvalidArgument`] on any other. Dropping a level
/// rolls back that level and every level nested inside it.
#[derive(Debug)]
#[must_use = "a transaction is rolled back when dropped; call commit to keep its changes"]
pub struct Transaction<'s> {
    resource: Resource<TransactionKind>,
    id: u64,
    levels: &'s TransactionLevels,
}

impl<'s> Transaction<'s> {
    pub(crate) fn begin(session: &'s Session<'_>) -> JetResult<Self> {
        let handle = session.handle()?;
        let mut resource = Resource::new(session.api_arc().clone());
        resource.allocate(&handle)?;
        let levels = session.levels();
        Ok(Self {
            resource,
            id: levels.push(),
            levels,
        })
    }

    /// 1-based nesting level of this transaction.
    pub fn level(&self) -> usize {
        self.levels.position(self.id).map_or(0, |index| index + 1)
    }

    /// Commits this level into its parent, or durably if it is the
    /// outermost one.
    ///
    /// If the engine refuses the commit, the level is rolled back when the
    /// transaction is dropped on return.
    pub fn commit(mut self, grbit: CommitGrbit) -> JetResult<()> {
        self.levels.check_innermost(self.id, "commit")?;
        let session = self.resource.ensure_usable()?;
        let code = self.resource.api().commit_transaction(session, grbit);
        status::check(code, "JetCommitTransaction")?;
        self.resource.mark_released();
        self.levels.truncate(self.levels.depth() - 1);
        Ok(())
    }

    /// Rolls back this level now, reporting any engine error.
    pub fn rollback(mut self) -> JetResult<()> {
        self.levels.check_innermost(self.id, "roll back")?;
        let session = self.resource.ensure_usable()?;
        let code = self.resource.api().rollback(session, RollbackGrbit::NONE);
        self.resource.mark_released();
        self.levels.truncate(self.levels.depth() - 1);
        status::check(code, "JetRollback").map(|_| ())
    }

    /// Parks this level so the session can move to another thread.
    ///
    /// The level stays open in the engine. To continue it elsewhere, bind
    /// the session to a context with [`Session::set_context`] before
    /// beginning the transaction, reset the context on this thread, move
    /// the session and the returned value together, set the same context
    /// on the new thread and call [`Session::resume_transaction`].
    pub fn suspend(mut self) -> JetResult<SuspendedTransaction> {
        self.levels.check_innermost(self.id, "suspend")?;
        let session = self.resource.ensure_usable()?;
        let unallocated = Resource::new(self.resource.api().clone());
        let resource = mem::replace(&mut self.resource, unallocated);
        tracing::debug!(?session, id = self.id, "transaction suspended");
        Ok(SuspendedTransaction {
            resource,
            session,
            id: self.id,
        })
    }

    pub(crate) fn resume(
        session: &'s Session<'_>,
        suspended: SuspendedTransaction,
    ) -> JetResult<Self> {
        if session.handle()? != suspended.session {
            return Err(JetError::invalid_argument(
                "suspended transaction belongs to another session",
            ));
        }
        let levels = session.levels();
        levels.check_innermost(suspended.id, "resume")?;
        tracing::debug!(session = ?suspended.session, id = suspended.id, "transaction resumed");
        Ok(Self {
            resource: suspended.resource,
            id: suspended.id,
            levels,
        })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let Ok(session) = self.resource.ensure_usable() else {
            return;
        };
        let Some(index) = self.levels.position(self.id) else {
            // An enclosing level was dropped first and took this one with it.
            self.resource.mark_released();
            return;
        };
        for _ in index + 1..self.levels.depth() {
            let code = self.resource.api().rollback(session, RollbackGrbit::NONE);
            if let Status::Error(error) = classify(code) {
                tracing::warn!(?session, %error, "failed to roll back nested level");
            }
        }
        self.resource.release();
        self.levels.truncate(index);
    }
}

/// A transaction level detached from its session borrow, to be carried to
/// another thread together with the session.
///
/// Dropping it without resuming leaves the level open in the engine and is
/// reported as a leaked transaction handle.
#[derive(Debug)]
#[must_use = "a suspended transaction stays open until it is resumed"]
pub struct SuspendedTransaction {
    resource: Resource<TransactionKind>,
    session: SessionHandle,
    id: u64,
}

impl SuspendedTransaction {
    /// The session the transaction was begun on.
    pub fn session(&self) -> SessionHandle {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::SuspendedTransaction;
    use crate::error::JetError;
    use crate::instance::Instance;
    use crate::schema::ColumnDefinition;
    use crate::table::Table;
    use jetbind_sim::SimEngine;
    use jetbind_sys::{
        ColumnId, ColumnType, CommitGrbit, CreateDatabaseGrbit, OpenDatabaseGrbit, OpenTableGrbit,
        RetrieveGrbit, SetGrbit,
    };
    use std::sync::Arc;

    #[test]
    fn commit_keeps_and_drop_discards() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine, "txn").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let session = instance.begin_session().unwrap();
        let db = session
            .create_database(dir.path().join("t.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("t").unwrap();
        let col = table
            .add_column("v", &ColumnDefinition::new(ColumnType::Binary))
            .unwrap();

        let txn = session.begin_transaction().unwrap();
        let update = table.insert().unwrap();
        update.set_column(col, b"kept", SetGrbit::NONE).unwrap();
        update.save().unwrap();
        txn.commit(CommitGrbit::NONE).unwrap();

        {
            let _txn = session.begin_transaction().unwrap();
            let update = table.insert().unwrap();
            update.set_column(col, b"dropped", SetGrbit::NONE).unwrap();
            update.save().unwrap();
        }

        assert!(table.move_first().unwrap());
        assert_eq!(
            table.retrieve_column(col, RetrieveGrbit::NONE).unwrap(),
            Some(b"kept".to_vec())
        );
        assert!(!table.try_move_next().unwrap());
    }

    #[test]
    fn nested_levels() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine, "nested").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let session = instance.begin_session().unwrap();
        let db = session
            .create_database(dir.path().join("n.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("t").unwrap();
        let col = table
            .add_column("v", &ColumnDefinition::new(ColumnType::Binary))
            .unwrap();

        let outer = session.begin_transaction().unwrap();
        let update = table.insert().unwrap();
        update.set_column(col, b"outer", SetGrbit::NONE).unwrap();
        update.save().unwrap();

        let inner = session.begin_transaction().unwrap();
        let update = table.insert().unwrap();
        update.set_column(col, b"inner", SetGrbit::NONE).unwrap();
        update.save().unwrap();
        inner.rollback().unwrap();

        outer.commit(CommitGrbit::NONE).unwrap();

        assert!(table.move_first().unwrap());
        assert_eq!(
            table.retrieve_column(col, RetrieveGrbit::NONE).unwrap(),
            Some(b"outer".to_vec())
        );
        assert!(!table.try_move_next().unwrap());
    }

    fn insert(table: &Table<'_>, col: ColumnId, value: &[u8]) {
        let update = table.insert().unwrap();
        update.set_column(col, value, SetGrbit::NONE).unwrap();
        update.save().unwrap();
    }

    fn values(table: &Table<'_>, col: ColumnId) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut more = table.move_first().unwrap();
        while more {
            out.push(table.retrieve_column(col, RetrieveGrbit::NONE).unwrap().unwrap());
            more = table.try_move_next().unwrap();
        }
        out
    }

    #[test]
    fn outer_commit_with_open_inner_is_rejected() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine.clone(), "order").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let session = instance.begin_session().unwrap();
        let db = session
            .create_database(dir.path().join("o.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("t").unwrap();
        let col = table
            .add_column("v", &ColumnDefinition::new(ColumnType::Binary))
            .unwrap();

        let outer = session.begin_transaction().unwrap();
        insert(&table, col, b"outer");
        let inner = session.begin_transaction().unwrap();
        insert(&table, col, b"inner");
        assert_eq!((outer.level(), inner.level()), (1, 2));
        assert_eq!(session.transaction_depth(), 2);

        let err = outer.commit(CommitGrbit::NONE).unwrap_err();
        assert!(matches!(err, JetError::InvalidArgument { .. }), "{err:?}");
        // The refused outer level was dropped and took the inner one with it.
        assert_eq!(session.transaction_depth(), 0);
        assert_eq!(inner.level(), 0);
        let err = inner.commit(CommitGrbit::NONE).unwrap_err();
        assert!(matches!(err, JetError::InvalidArgument { .. }), "{err:?}");

        assert!(values(&table, col).is_empty());
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn rollback_of_outer_level_is_rejected() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine.clone(), "outer-rollback").unwrap();
        let session = instance.begin_session().unwrap();

        let outer = session.begin_transaction().unwrap();
        let inner = session.begin_transaction().unwrap();
        assert!(matches!(
            outer.rollback(),
            Err(JetError::InvalidArgument { .. })
        ));
        assert!(matches!(
            inner.rollback(),
            Err(JetError::InvalidArgument { .. })
        ));
        assert_eq!(session.transaction_depth(), 0);
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn stale_level_never_touches_later_levels() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine.clone(), "stale").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let session = instance.begin_session().unwrap();
        let db = session
            .create_database(dir.path().join("s.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("t").unwrap();
        let col = table
            .add_column("v", &ColumnDefinition::new(ColumnType::Binary))
            .unwrap();

        let outer = session.begin_transaction().unwrap();
        let stale = session.begin_transaction().unwrap();
        drop(outer);
        assert_eq!(session.transaction_depth(), 0);

        let fresh = session.begin_transaction().unwrap();
        let nested = session.begin_transaction().unwrap();
        insert(&table, col, b"kept");
        // Same depth as `nested`, but its own level ended with `outer`.
        drop(stale);
        assert_eq!(session.transaction_depth(), 2);
        nested.commit(CommitGrbit::NONE).unwrap();
        fresh.commit(CommitGrbit::NONE).unwrap();

        assert_eq!(values(&table, col), vec![b"kept".to_vec()]);
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn suspend_requires_innermost_level() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine, "suspend-outer").unwrap();
        let session = instance.begin_session().unwrap();

        let outer = session.begin_transaction().unwrap();
        let _inner = session.begin_transaction().unwrap();
        assert!(matches!(
            outer.suspend(),
            Err(JetError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn suspended_transaction_commits_on_another_thread() {
        const CONTEXT: usize = 0x5eed;

        fn assert_send<T: Send>() {}
        assert_send::<SuspendedTransaction>();

        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine.clone(), "handoff").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.edb");
        let session = instance.begin_session().unwrap();
        let col = {
            let db = session
                .create_database(&path, CreateDatabaseGrbit::NONE)
                .unwrap();
            let table = db.create_table("t").unwrap();
            table
                .add_column("v", &ColumnDefinition::new(ColumnType::Binary))
                .unwrap()
        };

        session.set_context(CONTEXT).unwrap();
        let tx = session.begin_transaction().unwrap();
        {
            let db = session.open_database(&path, OpenDatabaseGrbit::NONE).unwrap();
            let table = db.open_table("t", OpenTableGrbit::NONE).unwrap();
            insert(&table, col, b"moved");
        }
        let parked = tx.suspend().unwrap();
        assert_eq!(parked.session(), session.handle().unwrap());
        assert_eq!(session.transaction_depth(), 1);
        session.reset_context().unwrap();

        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let session = session;
                    session.set_context(CONTEXT).unwrap();
                    let tx = session.resume_transaction(parked).unwrap();
                    assert_eq!(tx.level(), 1);
                    tx.commit(CommitGrbit::NONE).unwrap();
                    assert_eq!(session.transaction_depth(), 0);
                    session.reset_context().unwrap();

                    let db = session.open_database(&path, OpenDatabaseGrbit::NONE).unwrap();
                    let table = db.open_table("t", OpenTableGrbit::NONE).unwrap();
                            assert_eq!(values(&table, col), vec![b"moved".to_vec()]);
                })
                .join()
                .unwrap();
        });
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn resume_on_another_session_is_rejected() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine, "wrong-session").unwrap();
        let session = instance.begin_session().unwrap();
        let other = instance.begin_session().unwrap();

        let parked = session.begin_transaction().unwrap().suspend().unwrap();
        let err = other.resume_transaction(parked).unwrap_err();
        assert!(matches!(err, JetError::InvalidArgument { .. }), "{err:?}");
        assert_eq!(other.transaction_depth(), 0);
    }
}
