//! Engine-wide bookkeeping: instances, sessions, attached files and
//! transactions.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};

use jetbind_sys::codes::*;
use jetbind_sys::{
    AttachDatabaseGrbit, CreateDatabaseGrbit, InstanceHandle, OpenDatabaseGrbit, Param,
    SessionHandle, TableHandle, TermGrbit,
};
use tracing::{debug, warn};

use crate::cursor::CursorState;
use crate::stats::{SimStats, Violation, ViolationKind};
use crate::table::{Row, TableData};

/// Result of one simulated call: the error code on failure.
pub(crate) type SimResult<T = ()> = Result<T, i32>;

/// Written to disk when a database is created so that attach can tell a
/// database file from a missing one.
const FILE_MARKER: &[u8] = b"jetbind-sim database\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParamSlot {
    Integer(usize),
    Text(String),
}

fn default_param(param: Param) -> ParamSlot {
    match param {
        Param::SystemPath | Param::TempPath | Param::LogFilePath | Param::EventSource => {
            ParamSlot::Text(String::new())
        }
        Param::BaseName => ParamSlot::Text("edb".into()),
        Param::Recovery => ParamSlot::Text("on".into()),
        Param::MaxSessions => ParamSlot::Integer(128),
        Param::MaxOpenTables => ParamSlot::Integer(300),
        Param::MaxCursors => ParamSlot::Integer(1024),
        Param::MaxVerPages => ParamSlot::Integer(64),
        Param::MaxTemporaryTables => ParamSlot::Integer(20),
        Param::LogFileSize => ParamSlot::Integer(5120),
        Param::LogBuffers => ParamSlot::Integer(126),
        Param::CircularLog | Param::CacheSizeMax | Param::CreatePathIfNotExist => {
            ParamSlot::Integer(0)
        }
        Param::DatabasePageSize => ParamSlot::Integer(8192),
    }
}

#[derive(Debug)]
pub(crate) struct InstanceState {
    name: String,
    initialized: bool,
    params: BTreeMap<Param, ParamSlot>,
    /// Attached database files and whether they were attached read-only.
    attached: HashMap<PathBuf, bool>,
}

#[derive(Debug, Default)]
pub(crate) struct DatabaseFile {
    /// Tables by lower-cased name.
    pub tables: BTreeMap<String, TableData>,
}

#[derive(Debug, Clone)]
pub(crate) struct OpenDatabase {
    pub path: PathBuf,
    pub read_only: bool,
}

/// Who may use a session while a transaction is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Thread(ThreadId),
    Context(usize),
}

#[derive(Debug, Clone, Copy)]
struct Context {
    value: usize,
    thread: ThreadId,
}

/// A change to undo if the enclosing transaction level rolls back.
#[derive(Debug)]
pub(crate) struct Undo {
    pub path: PathBuf,
    pub table: String,
    pub bookmark: u64,
    /// Record before the change; `None` if the change was an insert.
    pub previous: Option<Row>,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    instance: usize,
    pub databases: BTreeMap<u32, OpenDatabase>,
    next_dbid: u32,
    levels: Vec<Vec<Undo>>,
    owner: Option<Owner>,
    context: Option<Context>,
}

impl SessionState {
    /// Fails if the calling thread may not use the session right now.
    fn check_thread(&self) -> SimResult<Owner> {
        let current = thread::current().id();
        let caller = match self.context {
            Some(ctx) if ctx.thread != current => return Err(JET_errSessionSharingViolation),
            Some(ctx) => Owner::Context(ctx.value),
            None => Owner::Thread(current),
        };
        match self.owner {
            Some(owner) if owner != caller => Err(JET_errSessionSharingViolation),
            _ => Ok(caller),
        }
    }

    pub fn in_transaction(&self) -> bool {
        !self.levels.is_empty()
    }

    pub fn record(&mut self, undo: Undo) {
        if let Some(level) = self.levels.last_mut() {
            level.push(undo);
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub stats: SimStats,
    pub violations: Vec<Violation>,
    next_handle: usize,
    global_params: BTreeMap<Param, ParamSlot>,
    instances: HashMap<usize, InstanceState>,
    pub sessions: HashMap<usize, SessionState>,
    pub cursors: HashMap<usize, CursorState>,
    pub files: HashMap<PathBuf, DatabaseFile>,
}

impl EngineState {
    pub fn allocate_handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn open_handle_count(&self) -> usize {
        self.instances.len()
            + self.sessions.len()
            + self
                .sessions
                .values()
                .map(|s| s.databases.len())
                .sum::<usize>()
            + self.cursors.len()
    }

    fn violation(&mut self, kind: ViolationKind, detail: String) {
        warn!(?kind, %detail, "lifecycle violation");
        self.violations.push(Violation { kind, detail });
    }

    // Instances

    pub fn create_instance(&mut self, name: &str) -> SimResult<InstanceHandle> {
        if name.is_empty() {
            return Err(JET_errInvalidParameter);
        }
        if self.instances.values().any(|i| i.name == name) {
            return Err(JET_errInstanceNameInUse);
        }
        let id = self.allocate_handle();
        self.instances.insert(
            id,
            InstanceState {
                name: name.to_string(),
                initialized: false,
                params: BTreeMap::new(),
                attached: HashMap::new(),
            },
        );
        debug!(instance = id, name, "instance created");
        Ok(InstanceHandle(id))
    }

    pub fn init(&mut self, instance: InstanceHandle) -> SimResult {
        let state = self
            .instances
            .get_mut(&instance.0)
            .ok_or(JET_errInvalidInstance)?;
        if state.initialized {
            return Err(JET_errAlreadyInitialized);
        }
        if state.params.get(&Param::CreatePathIfNotExist) == Some(&ParamSlot::Integer(1)) {
            for param in [Param::SystemPath, Param::LogFilePath] {
                if let Some(ParamSlot::Text(dir)) = state.params.get(&param) {
                    if !dir.is_empty() {
                        std::fs::create_dir_all(dir).map_err(|_| JET_errDiskIO)?;
                    }
                }
            }
        }
        state.initialized = true;
        debug!(instance = instance.0, "instance initialized");
        Ok(())
    }

    pub fn term(&mut self, instance: InstanceHandle, grbit: TermGrbit) -> SimResult {
        if !self.instances.contains_key(&instance.0) {
            return Err(JET_errInvalidInstance);
        }
        let sessions: Vec<usize> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.instance == instance.0)
            .map(|(id, _)| *id)
            .collect();
        let busy = !sessions.is_empty() && !grbit.contains(TermGrbit::ABRUPT);
        if busy {
            self.violation(
                ViolationKind::TermWithActiveSessions,
                format!("instance {} terminated with {} open session(s)", instance.0, sessions.len()),
            );
        }
        for session in sessions {
            self.tear_down_session(session);
        }
        self.instances.remove(&instance.0);
        debug!(instance = instance.0, "instance terminated");
        if busy {
            Err(JET_errTooManyActiveUsers)
        } else {
            Ok(())
        }
    }

    pub fn set_parameter(
        &mut self,
        instance: InstanceHandle,
        param: Param,
        value: usize,
        text: Option<&str>,
    ) -> SimResult {
        let slot = if param.is_string() {
            let text = text.ok_or(JET_errInvalidParameter)?;
            if param == Param::BaseName && text.len() != 3 {
                return Err(JET_errInvalidParameter);
            }
            ParamSlot::Text(text.to_string())
        } else {
            ParamSlot::Integer(value)
        };
        let params = if instance.is_nil() {
            &mut self.global_params
        } else {
            &mut self
                .instances
                .get_mut(&instance.0)
                .ok_or(JET_errInvalidInstance)?
                .params
        };
        params.insert(param, slot);
        Ok(())
    }

    pub fn parameter(&self, instance: InstanceHandle, param: Param) -> SimResult<ParamSlot> {
        let local = if instance.is_nil() {
            None
        } else {
            let state = self
                .instances
                .get(&instance.0)
                .ok_or(JET_errInvalidInstance)?;
            state.params.get(&param)
        };
        Ok(local
            .or_else(|| self.global_params.get(&param))
            .cloned()
            .unwrap_or_else(|| default_param(param)))
    }

    // Sessions

    pub fn begin_session(&mut self, instance: InstanceHandle) -> SimResult<SessionHandle> {
        let state = self
            .instances
            .get(&instance.0)
            .ok_or(JET_errInvalidInstance)?;
        if !state.initialized {
            return Err(JET_errNotInitialized);
        }
        let id = self.allocate_handle();
        self.sessions.insert(
            id,
            SessionState {
                instance: instance.0,
                databases: BTreeMap::new(),
                next_dbid: 1,
                levels: Vec::new(),
                owner: None,
                context: None,
            },
        );
        debug!(session = id, instance = instance.0, "session begun");
        Ok(SessionHandle(id))
    }

    /// Looks up a session the calling thread may use.
    pub fn session(&self, session: SessionHandle) -> SimResult<&SessionState> {
        let state = self.sessions.get(&session.0).ok_or(JET_errInvalidSesid)?;
        state.check_thread()?;
        Ok(state)
    }

    fn session_mut(&mut self, session: SessionHandle) -> SimResult<&mut SessionState> {
        let state = self
            .sessions
            .get_mut(&session.0)
            .ok_or(JET_errInvalidSesid)?;
        state.check_thread()?;
        Ok(state)
    }

    pub fn end_session(&mut self, session: SessionHandle) -> SimResult {
        let state = self.session(session)?;
        let cursors = self
            .cursors
            .values()
            .filter(|c| c.session == session.0)
            .count();
        let in_transaction = state.in_transaction();
        let mut busy = false;
        if cursors > 0 {
            busy = true;
            self.violation(
                ViolationKind::EndSessionWithOpenCursors,
                format!("session {} ended with {cursors} open cursor(s)", session.0),
            );
        }
        if in_transaction {
            busy = true;
            self.violation(
                ViolationKind::EndSessionInTransaction,
                format!("session {} ended inside a transaction", session.0),
            );
        }
        self.tear_down_session(session.0);
        debug!(session = session.0, "session ended");
        if busy {
            Err(JET_errSessionInUse)
        } else {
            Ok(())
        }
    }

    fn tear_down_session(&mut self, session: usize) {
        self.cursors.retain(|_, c| c.session != session);
        if let Some(mut state) = self.sessions.remove(&session) {
            while let Some(level) = state.levels.pop() {
                self.undo(level);
            }
        }
    }

    pub fn set_context(&mut self, session: SessionHandle, value: usize) -> SimResult {
        let state = self
            .sessions
            .get_mut(&session.0)
            .ok_or(JET_errInvalidSesid)?;
        if state.context.is_some() {
            return Err(JET_errSessionContextAlreadySet);
        }
        state.context = Some(Context {
            value,
            thread: thread::current().id(),
        });
        Ok(())
    }

    pub fn reset_context(&mut self, session: SessionHandle) -> SimResult {
        let state = self
            .sessions
            .get_mut(&session.0)
            .ok_or(JET_errInvalidSesid)?;
        match state.context {
            Some(ctx) if ctx.thread == thread::current().id() => {
                state.context = None;
                Ok(())
            }
            _ => Err(JET_errSessionContextNotSetByThisThread),
        }
    }

    // Transactions

    pub fn begin_transaction(&mut self, session: SessionHandle) -> SimResult {
        let state = self.session_mut(session)?;
        let caller = state.check_thread()?;
        if state.levels.is_empty() {
            state.owner = Some(caller);
        }
        state.levels.push(Vec::new());
        Ok(())
    }

    pub fn commit(&mut self, session: SessionHandle) -> SimResult {
        let state = self.session_mut(session)?;
        let level = state.levels.pop().ok_or(JET_errNotInTransaction)?;
        match state.levels.last_mut() {
            Some(parent) => parent.extend(level),
            None => state.owner = None,
        }
        Ok(())
    }

    pub fn rollback(&mut self, session: SessionHandle, all: bool) -> SimResult {
        let state = self.session_mut(session)?;
        if state.levels.is_empty() {
            return Err(JET_errNotInTransaction);
        }
        let levels: Vec<Vec<Undo>> = if all {
            state.levels.drain(..).rev().collect()
        } else {
            state.levels.pop().into_iter().collect()
        };
        if state.levels.is_empty() {
            state.owner = None;
        }
        for level in levels {
            self.undo(level);
        }
        Ok(())
    }

    fn undo(&mut self, level: Vec<Undo>) {
        for undo in level.into_iter().rev() {
            let Some(table) = self
                .files
                .get_mut(&undo.path)
                .and_then(|f| f.tables.get_mut(&undo.table))
            else {
                continue;
            };
            match undo.previous {
                Some(row) => {
                    table.rows.insert(undo.bookmark, row);
                }
                None => {
                    table.rows.remove(&undo.bookmark);
                }
            }
        }
    }

    // Databases

    fn instance_of(&self, session: SessionHandle) -> SimResult<usize> {
        Ok(self.session(session)?.instance)
    }

    fn open_anywhere(&self, instance: usize, path: &Path) -> bool {
        self.sessions
            .values()
            .filter(|s| s.instance == instance)
            .any(|s| s.databases.values().any(|d| d.path == path))
    }

    fn attached_elsewhere(&self, instance: usize, path: &Path) -> bool {
        self.instances
            .iter()
            .any(|(id, i)| *id != instance && i.attached.contains_key(path))
    }

    fn open_for(&mut self, session: SessionHandle, path: PathBuf, read_only: bool) -> SimResult<u32> {
        let state = self.session_mut(session)?;
        let dbid = state.next_dbid;
        state.next_dbid += 1;
        state
            .databases
            .insert(dbid, OpenDatabase { path, read_only });
        Ok(dbid)
    }

    pub fn create_database(
        &mut self,
        session: SessionHandle,
        path: PathBuf,
        grbit: CreateDatabaseGrbit,
    ) -> SimResult<u32> {
        let instance = self.instance_of(session)?;
        let overwrite = grbit.contains(CreateDatabaseGrbit::OVERWRITE_EXISTING);
        if self.attached_elsewhere(instance, &path) {
            return Err(JET_errDatabaseInUse);
        }
        let attached = self
            .instances
            .get(&instance)
            .is_some_and(|i| i.attached.contains_key(&path));
        if attached || path.exists() {
            if !overwrite {
                return Err(JET_errDatabaseDuplicate);
            }
            if self.open_anywhere(instance, &path) {
                return Err(JET_errDatabaseInUse);
            }
        }
        std::fs::write(&path, FILE_MARKER).map_err(|_| JET_errDiskIO)?;
        self.files.insert(path.clone(), DatabaseFile::default());
        if let Some(state) = self.instances.get_mut(&instance) {
            state.attached.insert(path.clone(), false);
        }
        debug!(path = %path.display(), "database created");
        self.open_for(session, path, false)
    }

    pub fn attach_database(
        &mut self,
        session: SessionHandle,
        path: PathBuf,
        grbit: AttachDatabaseGrbit,
    ) -> SimResult<i32> {
        let instance = self.instance_of(session)?;
        if self
            .instances
            .get(&instance)
            .is_some_and(|i| i.attached.contains_key(&path))
        {
            return Ok(JET_wrnDatabaseAttached);
        }
        if self.attached_elsewhere(instance, &path) {
            return Err(JET_errDatabaseInUse);
        }
        match std::fs::read(&path) {
            Ok(bytes) if bytes == FILE_MARKER => {}
            Ok(_) => return Err(JET_errDiskIO),
            Err(_) => return Err(JET_errFileNotFound),
        }
        self.files.entry(path.clone()).or_default();
        if let Some(state) = self.instances.get_mut(&instance) {
            state
                .attached
                .insert(path.clone(), grbit.contains(AttachDatabaseGrbit::READ_ONLY));
        }
        debug!(path = %path.display(), "database attached");
        Ok(JET_errSuccess)
    }

    pub fn open_database(
        &mut self,
        session: SessionHandle,
        path: PathBuf,
        grbit: OpenDatabaseGrbit,
    ) -> SimResult<u32> {
        let instance = self.instance_of(session)?;
        let attached_read_only = *self
            .instances
            .get(&instance)
            .and_then(|i| i.attached.get(&path))
            .ok_or(JET_errDatabaseNotFound)?;
        let read_only = attached_read_only || grbit.contains(OpenDatabaseGrbit::READ_ONLY);
        self.open_for(session, path, read_only)
    }

    pub fn close_database(&mut self, session: SessionHandle, dbid: u32) -> SimResult {
        let state = self.session(session)?;
        if !state.databases.contains_key(&dbid) {
            return Err(JET_errInvalidDatabaseId);
        }
        let before = self.cursors.len();
        self.cursors
            .retain(|_, c| !(c.session == session.0 && c.dbid == dbid));
        let closed = before - self.cursors.len();
        if let Some(state) = self.sessions.get_mut(&session.0) {
            state.databases.remove(&dbid);
        }
        if closed > 0 {
            self.violation(
                ViolationKind::CloseDatabaseWithOpenCursors,
                format!("database {dbid} of session {} closed with {closed} open cursor(s)", session.0),
            );
            return Err(JET_errTableInUse);
        }
        Ok(())
    }

    pub fn detach_database(&mut self, session: SessionHandle, path: Option<PathBuf>) -> SimResult {
        let instance = self.instance_of(session)?;
        let targets: Vec<PathBuf> = match path {
            Some(path) => {
                let attached = self
                    .instances
                    .get(&instance)
                    .is_some_and(|i| i.attached.contains_key(&path));
                if !attached {
                    return Err(JET_errDatabaseNotFound);
                }
                if self.open_anywhere(instance, &path) {
                    return Err(JET_errDatabaseInUse);
                }
                vec![path]
            }
            None => self
                .instances
                .get(&instance)
                .map(|i| i.attached.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .filter(|p| !self.open_anywhere(instance, p))
                .collect(),
        };
        if let Some(state) = self.instances.get_mut(&instance) {
            for path in &targets {
                state.attached.remove(path);
            }
        }
        Ok(())
    }

    /// Resolves a database id opened by the session.
    pub fn database(&self, session: SessionHandle, dbid: u32) -> SimResult<&OpenDatabase> {
        self.session(session)?
            .databases
            .get(&dbid)
            .ok_or(JET_errInvalidDatabaseId)
    }

    /// Validates that `table` is a cursor of `session` usable from this
    /// thread.
    pub fn check_cursor(&self, session: SessionHandle, table: TableHandle) -> SimResult {
        self.session(session)?;
        match self.cursors.get(&table.0) {
            Some(cursor) if cursor.session == session.0 => Ok(()),
            _ => Err(JET_errInvalidTableId),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> (EngineState, SessionHandle) {
        let mut state = EngineState::default();
        let instance = state.create_instance("state").unwrap();
        state.init(instance).unwrap();
        let session = state.begin_session(instance).unwrap();
        (state, session)
    }

    #[test]
    fn parameters_fall_back_to_global_then_default() {
        let mut state = EngineState::default();
        let instance = state.create_instance("params").unwrap();
        assert_eq!(
            state.parameter(instance, Param::MaxSessions),
            Ok(ParamSlot::Integer(128))
        );
        state
            .set_parameter(InstanceHandle::NIL, Param::MaxSessions, 4, None)
            .unwrap();
        assert_eq!(state.parameter(instance, Param::MaxSessions), Ok(ParamSlot::Integer(4)));
        state
            .set_parameter(instance, Param::MaxSessions, 9, None)
            .unwrap();
        assert_eq!(state.parameter(instance, Param::MaxSessions), Ok(ParamSlot::Integer(9)));
        assert_eq!(
            state.set_parameter(instance, Param::BaseName, 0, None),
            Err(JET_errInvalidParameter)
        );
    }

    #[test]
    fn nested_commit_folds_into_parent() {
        let (mut state, session) = ready();
        state.begin_transaction(session).unwrap();
        state.begin_transaction(session).unwrap();
        state.commit(session).unwrap();
        assert!(state.sessions[&session.0].in_transaction());
        state.rollback(session, false).unwrap();
        assert!(!state.sessions[&session.0].in_transaction());
        assert_eq!(state.commit(session), Err(JET_errNotInTransaction));
    }

    #[test]
    fn transaction_is_bound_to_its_thread() {
        let (mut state, session) = ready();
        state.begin_transaction(session).unwrap();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(
                    state.session(session).err(),
                    Some(JET_errSessionSharingViolation)
                );
            });
        });
    }

    #[test]
    fn context_hands_a_transaction_over() {
        let (mut state, session) = ready();
        state.set_context(session, 42).unwrap();
        assert_eq!(state.set_context(session, 42), Err(JET_errSessionContextAlreadySet));
        state.begin_transaction(session).unwrap();
        state.reset_context(session).unwrap();

        // Without the context, the owning thread is locked out.
        assert_eq!(state.begin_transaction(session), Err(JET_errSessionSharingViolation));

        std::thread::scope(|s| {
            s.spawn(|| {
                state.set_context(session, 42).unwrap();
                state.commit(session).unwrap();
                state.reset_context(session).unwrap();
            });
        });
        assert!(!state.sessions[&session.0].in_transaction());
    }

    #[test]
    fn reset_from_other_thread_is_rejected() {
        let (mut state, session) = ready();
        state.set_context(session, 1).unwrap();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(
                    state.reset_context(session),
                    Err(JET_errSessionContextNotSetByThisThread)
                );
            });
        });
    }

    #[test]
    fn attach_requires_a_database_file() {
        let (mut state, session) = ready();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.edb");
        assert_eq!(
            state.attach_database(session, missing, AttachDatabaseGrbit::NONE),
            Err(JET_errFileNotFound)
        );

        let path = dir.path().join("db.edb");
        let dbid = state
            .create_database(session, path.clone(), CreateDatabaseGrbit::NONE)
            .unwrap();
        assert_eq!(
            state.attach_database(session, path.clone(), AttachDatabaseGrbit::NONE),
            Ok(JET_wrnDatabaseAttached)
        );
        assert_eq!(
            state.detach_database(session, Some(path.clone())),
            Err(JET_errDatabaseInUse)
        );
        state.close_database(session, dbid).unwrap();
        state.detach_database(session, Some(path.clone())).unwrap();
        assert_eq!(
            state.open_database(session, path, OpenDatabaseGrbit::NONE),
            Err(JET_errDatabaseNotFound)
        );
    }
}
