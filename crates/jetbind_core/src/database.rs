//! Open databases.

use std::ffi::CString;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use jetbind_sys::{
    AttachDatabaseGrbit, CloseDatabaseGrbit, CreateDatabaseGrbit, DatabaseId, JetApi,
    OpenDatabaseGrbit, OpenTableGrbit, SessionHandle,
};

use crate::config::to_cstring;
use crate::error::JetResult;
use crate::resource::{HandleKind, Resource, ResourceKind};
use crate::session::{Session, SessionBound};
use crate::status;
use crate::table::{Table, TableOpen};

/// A database opened by one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHandle {
    /// Session that opened the database.
    pub session: SessionHandle,
    /// Per-session database id.
    pub database: DatabaseId,
}

/// How a database is brought into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOpen {
    /// Create a new file; the engine attaches and opens it.
    Create(CreateDatabaseGrbit),
    /// Attach an existing file, then open it.
    Attach {
        /// Attach options.
        attach: AttachDatabaseGrbit,
        /// Open options.
        open: OpenDatabaseGrbit,
    },
    /// Open a file that is already attached.
    Open(OpenDatabaseGrbit),
}

/// Allocation parameters for [`DatabaseKind`].
#[derive(Debug, Clone)]
pub struct DatabaseParams {
    /// Owning session.
    pub session: SessionHandle,
    /// Database file path.
    pub path: CString,
    /// Open mode.
    pub mode: DatabaseOpen,
}

/// Handle kind for open databases.
#[derive(Debug)]
pub struct DatabaseKind;

impl HandleKind for DatabaseKind {
    type Handle = DatabaseHandle;
    type Params = DatabaseParams;

    const KIND: ResourceKind = ResourceKind::Database;
    const ALLOCATE_OPERATION: &'static str = "JetOpenDatabase";
    const RELEASE_OPERATION: &'static str = "JetCloseDatabase";

    fn allocate(api: &dyn JetApi, params: &DatabaseParams) -> (i32, DatabaseHandle) {
        let mut database = DatabaseId::NIL;
        let code = match params.mode {
            DatabaseOpen::Create(grbit) => {
                api.create_database(params.session, &params.path, grbit, &mut database)
            }
            DatabaseOpen::Attach { attach, open } => {
                let code = api.attach_database(params.session, &params.path, attach);
                if code < 0 {
                    code
                } else {
                    let code = api.open_database(params.session, &params.path, open, &mut database);
                    if code < 0 {
                        api.detach_database(params.session, Some(&params.path));
                    }
                    code
                }
            }
            DatabaseOpen::Open(grbit) => {
                api.open_database(params.session, &params.path, grbit, &mut database)
            }
        };
        (
            code,
            DatabaseHandle {
                session: params.session,
                database,
            },
        )
    }

    fn release(api: &dyn JetApi, handle: DatabaseHandle) -> i32 {
        api.close_database(handle.session, handle.database, CloseDatabaseGrbit::NONE)
    }
}

/// A database opened in a session. Closed on drop.
#[derive(Debug)]
pub struct Database<'s> {
    resource: Resource<DatabaseKind>,
    path: PathBuf,
    _session: SessionBound<'s>,
}

impl<'s> Database<'s> {
    pub(crate) fn open_with(session: &'s Session<'_>, path: &Path, mode: DatabaseOpen) -> JetResult<Self> {
        let params = DatabaseParams {
            session: session.handle()?,
            path: to_cstring("path", &path.to_string_lossy())?,
            mode,
        };
        let mut resource = Resource::new(session.api_arc().clone());
        resource.allocate(&params)?;
        tracing::debug!(path = %path.display(), ?mode, "database opened");
        Ok(Self {
            resource,
            path: path.to_path_buf(),
            _session: PhantomData,
        })
    }

    /// The native handle pair.
    pub fn handle(&self) -> JetResult<DatabaseHandle> {
        self.resource.ensure_usable()
    }

    /// The database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn api(&self) -> &std::sync::Arc<dyn JetApi> {
        self.resource.api()
    }

    /// Creates a table and opens a cursor on it.
    pub fn create_table(&self, name: &str) -> JetResult<Table<'_>> {
        self.create_table_with(name, 0, 100)
    }

    /// Creates a table with an initial size in pages and a page density.
    pub fn create_table_with(&self, name: &str, pages: u32, density: u32) -> JetResult<Table<'_>> {
        Table::open_with(self, name, TableOpen::Create { pages, density })
    }

    /// Opens a cursor on an existing table.
    pub fn open_table(&self, name: &str, grbit: OpenTableGrbit) -> JetResult<Table<'_>> {
        Table::open_with(self, name, TableOpen::Open(grbit))
    }

    /// Deletes a table. No cursor may be open on it.
    pub fn delete_table(&self, name: &str) -> JetResult<()> {
        let handle = self.handle()?;
        let name = to_cstring("table name", name)?;
        let code = self.api().delete_table(handle.session, handle.database, &name);
        status::check(code, "JetDeleteTable").map(|_| ())
    }

    /// Closes the database now.
    pub fn close(mut self) {
        self.resource.release();
    }
}

impl Drop for Database<'_> {
    fn drop(&mut self) {
        self.resource.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use crate::status::ErrorKind;
    use jetbind_sim::SimEngine;
    use std::sync::Arc;

    #[test]
    fn table_ddl() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine.clone(), "ddl").unwrap();
        let session = instance.begin_session().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let db = session
            .create_database(dir.path().join("ddl.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();

        let table = db.create_table("things").unwrap();
        assert_eq!(table.name(), "things");
        let err = db.create_table("things").unwrap_err();
        assert!(err.is_native(ErrorKind::TableDuplicate));

        // Deleting an open table fails; after closing it succeeds.
        assert!(db.delete_table("things").is_err());
        table.close();
        db.delete_table("things").unwrap();
        let err = db.open_table("things", OpenTableGrbit::NONE).unwrap_err();
        assert!(err.is_native(ErrorKind::ObjectNotFound));
    }

    #[test]
    fn create_twice_is_duplicate() {
        let engine = Arc::new(SimEngine::new());
        let instance = Instance::with_name(engine, "twice").unwrap();
        let session = instance.begin_session().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.edb");
        let first = session
            .create_database(&path, CreateDatabaseGrbit::NONE)
            .unwrap();
        first.close();
        let err = session
            .create_database(&path, CreateDatabaseGrbit::NONE)
            .unwrap_err();
        assert!(err.is_native(ErrorKind::DatabaseDuplicate));
        let db = session
            .create_database(&path, CreateDatabaseGrbit::OVERWRITE_EXISTING)
            .unwrap();
        assert_eq!(db.path(), path.as_path());
    }
}
