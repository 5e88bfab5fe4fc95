//! Sessions.

use std::cell::Cell;
use std::marker::PhantomData;
use std::path::Path;

use jetbind_sys::{
    AttachDatabaseGrbit, CreateDatabaseGrbit, EndSessionGrbit, InstanceHandle, JetApi,
    OpenDatabaseGrbit, SessionHandle,
};

use crate::config::to_cstring;
use crate::database::{Database, DatabaseOpen};
use crate::error::{JetError, JetResult};
use crate::instance::Instance;
use crate::resource::{HandleKind, Resource, ResourceKind};
use crate::status;
use crate::transaction::{SuspendedTransaction, Transaction, TransactionLevels};

/// Handle kind for sessions.
#[derive(Debug)]
pub struct SessionKind;

impl HandleKind for SessionKind {
    type Handle = SessionHandle;
    type Params = InstanceHandle;

    const KIND: ResourceKind = ResourceKind::Session;
    const ALLOCATE_OPERATION: &'static str = "JetBeginSession";
    const RELEASE_OPERATION: &'static str = "JetEndSession";

    fn allocate(api: &dyn JetApi, instance: &InstanceHandle) -> (i32, SessionHandle) {
        let mut session = SessionHandle::NIL;
        let code = api.begin_session(*instance, &mut session);
        (code, session)
    }

    fn release(api: &dyn JetApi, handle: SessionHandle) -> i32 {
        api.end_session(handle, EndSessionGrbit::NONE)
    }
}

/// Marker for values bound to one session: ties them to the session's
/// borrow and keeps them on the session's thread.
pub(crate) type SessionBound<'s> = PhantomData<&'s Cell<()>>;

/// A session on an instance.
///
/// Sessions can move between threads but cannot be shared: the engine
/// expects one thread at a time per session. Databases, cursors and
/// transactions borrow the session, so they are always released first.
#[derive(Debug)]
pub struct Session<'i> {
    resource: Resource<SessionKind>,
    levels: TransactionLevels,
    _instance: PhantomData<&'i Instance>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'i> Session<'i> {
    pub(crate) fn begin(instance: &'i Instance) -> JetResult<Self> {
        let handle = instance.handle()?;
        let mut resource = Resource::new(instance.api().clone());
        resource.allocate(&handle)?;
        Ok(Self {
            resource,
            levels: TransactionLevels::default(),
            _instance: PhantomData,
            _not_sync: PhantomData,
        })
    }

    /// The native handle.
    pub fn handle(&self) -> JetResult<SessionHandle> {
        self.resource.ensure_usable()
    }

    pub(crate) fn api(&self) -> &dyn JetApi {
        self.resource.api().as_ref()
    }

    pub(crate) fn levels(&self) -> &TransactionLevels {
        &self.levels
    }

    pub(crate) fn api_arc(&self) -> &std::sync::Arc<dyn JetApi> {
        self.resource.api()
    }

    /// Binds the session to the calling thread under `context`, so that a
    /// transaction begun on another thread can continue here.
    pub fn set_context(&self, context: usize) -> JetResult<()> {
        if context == 0 {
            return Err(JetError::invalid_argument("session context must be non-zero"));
        }
        let code = self.api().set_session_context(self.handle()?, context);
        status::check(code, "JetSetSessionContext").map(|_| ())
    }

    /// Undoes [`Session::set_context`]. Must be called on the thread that
    /// set the context.
    pub fn reset_context(&self) -> JetResult<()> {
        let code = self.api().reset_session_context(self.handle()?);
        status::check(code, "JetResetSessionContext").map(|_| ())
    }

    /// Begins a transaction, nested inside any that is already open.
    pub fn begin_transaction(&self) -> JetResult<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Number of transaction levels open through this session.
    pub fn transaction_depth(&self) -> usize {
        self.levels.depth()
    }

    /// Picks up a transaction parked with [`Transaction::suspend`].
    ///
    /// Fails with [`JetError::InvalidArgument`] if it was begun on another
    /// session or a level nested inside it is still open.
    pub fn resume_transaction(
        &self,
        suspended: SuspendedTransaction,
    ) -> JetResult<Transaction<'_>> {
        Transaction::resume(self, suspended)
    }

    /// Creates a database file, attaches it and opens it.
    pub fn create_database(
        &self,
        path: impl AsRef<Path>,
        grbit: CreateDatabaseGrbit,
    ) -> JetResult<Database<'_>> {
        Database::open_with(self, path.as_ref(), DatabaseOpen::Create(grbit))
    }

    /// Attaches an existing database file and opens it.
    pub fn attach_database(
        &self,
        path: impl AsRef<Path>,
        grbit: AttachDatabaseGrbit,
    ) -> JetResult<Database<'_>> {
        let open = if grbit.contains(AttachDatabaseGrbit::READ_ONLY) {
            OpenDatabaseGrbit::READ_ONLY
        } else {
            OpenDatabaseGrbit::NONE
        };
        Database::open_with(
            self,
            path.as_ref(),
            DatabaseOpen::Attach {
                attach: grbit,
                open,
            },
        )
    }

    /// Opens a database that is already attached to the instance.
    pub fn open_database(
        &self,
        path: impl AsRef<Path>,
        grbit: OpenDatabaseGrbit,
    ) -> JetResult<Database<'_>> {
        Database::open_with(self, path.as_ref(), DatabaseOpen::Open(grbit))
    }

    /// Detaches a database file from the instance.
    pub fn detach_database(&self, path: impl AsRef<Path>) -> JetResult<()> {
        let path = to_cstring("path", &path.as_ref().to_string_lossy())?;
        let code = self.api().detach_database(self.handle()?, Some(&path));
        status::check(code, "JetDetachDatabase").map(|_| ())
    }

    /// Ends the session now.
    pub fn end(mut self) {
        self.resource.release();
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.resource.release();
    }
}
