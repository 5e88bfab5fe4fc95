//! Handle lifecycle against the simulated engine: state transitions of
//! every handle kind and release ordering.

use std::ffi::CString;

use jetbind_core::{
    leak_count, DatabaseKind, DatabaseOpen, DatabaseParams, HandleKind, InstanceKind, JetError,
    Resource, ResourceKind, ResourceState, SessionKind, TableKind, TableOpen, TableParams,
    TransactionKind, UpdateKind, UpdateParams,
};
use jetbind_sim::ViolationKind;
use jetbind_sys::{CreateDatabaseGrbit, Prep};
use jetbind_testkit::TestEngine;

/// Raw resources for instance → session → database → cursor, allocated in
/// order.
struct Chain {
    instance: Resource<InstanceKind>,
    session: Resource<SessionKind>,
    database: Resource<DatabaseKind>,
    cursor: Resource<TableKind>,
}

fn allocate_chain(engine: &TestEngine, name: &str) -> Chain {
    let api = engine.api();
    let mut instance = Resource::<InstanceKind>::new(api.clone());
    let instance_handle = instance.allocate(&engine.config(name)).unwrap();

    let mut session = Resource::<SessionKind>::new(api.clone());
    let session_handle = session.allocate(&instance_handle).unwrap();

    let path = engine.database_path(&format!("{name}.edb"));
    let mut database = Resource::<DatabaseKind>::new(api.clone());
    let database_handle = database
        .allocate(&DatabaseParams {
            session: session_handle,
            path: CString::new(path.to_string_lossy().into_owned()).unwrap(),
            mode: DatabaseOpen::Create(CreateDatabaseGrbit::NONE),
        })
        .unwrap();

    let mut cursor = Resource::<TableKind>::new(api);
    cursor
        .allocate(&TableParams {
            session: session_handle,
            database: database_handle.database,
            name: CString::new("items").unwrap(),
            mode: TableOpen::Create {
                pages: 0,
                density: 0,
            },
        })
        .unwrap();

    Chain {
        instance,
        session,
        database,
        cursor,
    }
}

fn assert_disposed<K: HandleKind>(resource: &Resource<K>) {
    assert_eq!(resource.state(), ResourceState::Released);
    assert!(matches!(
        resource.ensure_usable(),
        Err(JetError::AlreadyDisposed { kind }) if kind == K::KIND
    ));
}

#[test]
fn nested_release_in_order_is_clean() {
    let engine = TestEngine::new();
    let mut chain = allocate_chain(&engine, "ordered");
    assert_eq!(engine.sim().open_handle_count(), 4);

    chain.cursor.release();
    chain.database.release();
    chain.session.release();
    chain.instance.release();

    assert_disposed(&chain.cursor);
    assert_disposed(&chain.database);
    assert_disposed(&chain.session);
    assert_disposed(&chain.instance);
    assert_eq!(engine.sim().open_handle_count(), 0);
    assert!(engine.violations().is_empty());
}

#[test]
fn reversed_release_is_flagged_as_misuse() {
    let engine = TestEngine::new();
    let mut chain = allocate_chain(&engine, "reversed");

    // Session before its cursor: the engine tears the cursor down itself
    // and records the violation.
    chain.session.release();
    chain.cursor.release();
    chain.database.release();
    chain.instance.release();

    // Every wrapper still ends up released.
    assert_disposed(&chain.session);
    assert_disposed(&chain.cursor);
    assert_disposed(&chain.database);
    assert_disposed(&chain.instance);

    let violations = engine.violations();
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert_eq!(violations[0].kind, ViolationKind::EndSessionWithOpenCursors);
    assert_eq!(engine.sim().open_handle_count(), 0);
}

#[test]
fn terminating_with_live_session_is_flagged() {
    let engine = TestEngine::new();
    let mut chain = allocate_chain(&engine, "term");

    chain.instance.release();
    chain.cursor.release();
    chain.database.release();
    chain.session.release();

    let kinds: Vec<_> = engine.violations().iter().map(|v| v.kind).collect();
    assert_eq!(kinds, vec![ViolationKind::TermWithActiveSessions]);
    assert_eq!(engine.sim().open_handle_count(), 0);
}

#[test]
fn scoped_wrappers_never_violate_ordering() {
    let engine = TestEngine::new();
    {
        let instance = engine.instance("scoped");
        let session = instance.begin_session().unwrap();
        let db = session
            .create_database(engine.database_path("scoped.edb"), CreateDatabaseGrbit::NONE)
            .unwrap();
        let table = db.create_table("items").unwrap();
        let _tx = session.begin_transaction().unwrap();
        let _update = table.insert().unwrap();
        // Everything above is dropped in reverse declaration order.
    }
    assert!(engine.violations().is_empty());
    assert_eq!(engine.sim().open_handle_count(), 0);
}

#[test]
fn release_before_allocate_is_noop_for_every_kind() {
    let engine = TestEngine::new();
    let api = engine.api();

    let mut instance = Resource::<InstanceKind>::new(api.clone());
    let mut session = Resource::<SessionKind>::new(api.clone());
    let mut database = Resource::<DatabaseKind>::new(api.clone());
    let mut cursor = Resource::<TableKind>::new(api.clone());
    let mut transaction = Resource::<TransactionKind>::new(api.clone());
    let mut update = Resource::<UpdateKind>::new(api);

    instance.release();
    session.release();
    database.release();
    cursor.release();
    transaction.release();
    update.release();

    for state in [
        instance.state(),
        session.state(),
        database.state(),
        cursor.state(),
        transaction.state(),
        update.state(),
    ] {
        assert_eq!(state, ResourceState::Unallocated);
    }
    assert_eq!(engine.sim().stats().calls, 0);
}

#[test]
fn double_allocate_fails_fast_for_every_kind() {
    let engine = TestEngine::new();
    let mut chain = allocate_chain(&engine, "double");
    let api = engine.api();
    let session = chain.session.ensure_usable().unwrap();
    let cursor = chain.cursor.ensure_usable().unwrap();

    let mut transaction = Resource::<TransactionKind>::new(api.clone());
    transaction.allocate(&session).unwrap();
    let mut update = Resource::<UpdateKind>::new(api);
    update
        .allocate(&UpdateParams {
            cursor,
            prep: Prep::Insert,
        })
        .unwrap();

    let calls = engine.sim().stats().calls;
    let instance_handle = chain.instance.ensure_usable().unwrap();
    let errors = [
        chain.instance.allocate(&engine.config("again")).err(),
        chain.session.allocate(&instance_handle).err(),
        transaction.allocate(&session).err(),
        update
            .allocate(&UpdateParams {
                cursor,
                prep: Prep::Insert,
            })
            .err(),
    ];
    for (error, kind) in errors.into_iter().zip([
        ResourceKind::Instance,
        ResourceKind::Session,
        ResourceKind::Transaction,
        ResourceKind::Update,
    ]) {
        assert!(
            matches!(error, Some(JetError::AlreadyAllocated { kind: k }) if k == kind),
            "{kind}: {error:?}"
        );
    }
    assert_eq!(engine.sim().stats().calls, calls);

    update.release();
    transaction.release();
    chain.cursor.release();
    chain.database.release();
    chain.session.release();
    chain.instance.release();
    assert!(engine.violations().is_empty());
}

#[test]
fn leaked_handles_are_reported_not_released() {
    let engine = TestEngine::new();
    let before = leak_count(ResourceKind::Table);
    let chain = allocate_chain(&engine, "leak");
    let calls = engine.sim().stats().calls;

    let Chain {
        instance,
        session,
        database,
        cursor,
    } = chain;
    drop(cursor);

    assert!(leak_count(ResourceKind::Table) > before);
    assert_eq!(engine.sim().stats().calls, calls);
    // The engine still holds the cursor.
    assert_eq!(engine.sim().open_handle_count(), 4);

    drop((database, session, instance));
}
