//! Lifecycle of native engine handles.
//!
//! A [`Resource`] owns at most one native handle and moves through three
//! states:
//!
//! ```text
//! Unallocated --allocate--> Allocated --release--> Released
//! ```
//!
//! `Released` is terminal. Misuse (allocating twice, using a released
//! wrapper) is rejected before the engine is called. Dropping a wrapper
//! that still holds a handle never calls the engine: the handle is reported
//! as leaked instead. Deterministic release is the job of the scoped
//! wrappers built on top of this type.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jetbind_sys::JetApi;

use crate::error::{JetError, JetResult};
use crate::status::{self, classify, Status};

/// The kinds of native handle the binding manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// An engine instance.
    Instance,
    /// A session.
    Session,
    /// An open database.
    Database,
    /// A table cursor.
    Table,
    /// A transaction level.
    Transaction,
    /// A prepared record update.
    Update,
}

impl ResourceKind {
    /// Every kind, in nesting order from outermost to innermost.
    pub const ALL: [Self; 6] = [
        Self::Instance,
        Self::Session,
        Self::Database,
        Self::Table,
        Self::Transaction,
        Self::Update,
    ];

    /// Lower-case name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Session => "session",
            Self::Database => "database",
            Self::Table => "table",
            Self::Transaction => "transaction",
            Self::Update => "update",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes how one kind of handle is obtained from and returned to the
/// engine.
pub trait HandleKind {
    /// The native handle (or handle tuple) held while allocated.
    type Handle: Copy + fmt::Debug;
    /// Inputs needed to allocate a handle.
    type Params;

    /// Which kind this is.
    const KIND: ResourceKind;
    /// Engine entry point named in allocation errors.
    const ALLOCATE_OPERATION: &'static str;
    /// Engine entry point named in release diagnostics.
    const RELEASE_OPERATION: &'static str;

    /// Performs the native allocation.
    ///
    /// Returns the engine code and the handle. The handle is only looked at
    /// when the code is not an error.
    fn allocate(api: &dyn JetApi, params: &Self::Params) -> (i32, Self::Handle);

    /// Performs the native release and returns the engine code.
    fn release(api: &dyn JetApi, handle: Self::Handle) -> i32;
}

/// Observable state of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No handle has been allocated yet.
    Unallocated,
    /// A handle is held.
    Allocated,
    /// The handle was released; the wrapper cannot be reused.
    Released,
}

enum State<H> {
    Unallocated,
    Allocated(H),
    Released,
}

/// Owns at most one native handle of kind `K`.
pub struct Resource<K: HandleKind> {
    api: Arc<dyn JetApi>,
    state: State<K::Handle>,
}

static LEAKS: [AtomicU64; 6] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

/// Number of `kind` handles dropped without being released, process-wide.
pub fn leak_count(kind: ResourceKind) -> u64 {
    LEAKS[kind.index()].load(Ordering::Relaxed)
}

/// Number of handles of any kind dropped without being released.
pub fn total_leaks() -> u64 {
    ResourceKind::ALL.iter().map(|k| leak_count(*k)).sum()
}

impl<K: HandleKind> Resource<K> {
    /// Creates an unallocated wrapper bound to `api`.
    pub fn new(api: Arc<dyn JetApi>) -> Self {
        Self {
            api,
            state: State::Unallocated,
        }
    }

    /// Allocates the native handle.
    ///
    /// Fails with [`JetError::AlreadyAllocated`] or
    /// [`JetError::AlreadyDisposed`] without calling the engine when the
    /// wrapper is not unallocated. On an engine error the wrapper stays
    /// unallocated. Warnings count as success.
    pub fn allocate(&mut self, params: &K::Params) -> JetResult<K::Handle> {
        match self.state {
            State::Allocated(_) => {
                return Err(JetError::AlreadyAllocated { kind: K::KIND });
            }
            State::Released => {
                return Err(JetError::AlreadyDisposed { kind: K::KIND });
            }
            State::Unallocated => {}
        }

        let (code, handle) = K::allocate(self.api.as_ref(), params);
        status::check(code, K::ALLOCATE_OPERATION)?;
        tracing::debug!(kind = %K::KIND, ?handle, "handle allocated");
        self.state = State::Allocated(handle);
        Ok(handle)
    }

    /// Releases the native handle.
    ///
    /// Does nothing unless the wrapper is allocated. A failing release is
    /// logged and the wrapper still ends up released; the engine treats the
    /// handle as gone either way.
    pub fn release(&mut self) {
        let State::Allocated(handle) = self.state else {
            return;
        };
        let code = K::release(self.api.as_ref(), handle);
        self.state = State::Released;
        match classify(code) {
            Status::Success => {
                tracing::debug!(kind = %K::KIND, ?handle, "handle released");
            }
            Status::Warning(warning) => {
                tracing::debug!(kind = %K::KIND, ?handle, %warning, "handle released with warning");
            }
            Status::Error(error) => {
                tracing::warn!(
                    kind = %K::KIND,
                    ?handle,
                    operation = K::RELEASE_OPERATION,
                    %error,
                    "failed to release handle"
                );
            }
        }
    }

    /// Returns the handle if the wrapper is allocated.
    pub fn ensure_usable(&self) -> JetResult<K::Handle> {
        match self.state {
            State::Allocated(handle) => Ok(handle),
            State::Unallocated => Err(JetError::InvalidHandle { kind: K::KIND }),
            State::Released => Err(JetError::AlreadyDisposed { kind: K::KIND }),
        }
    }

    /// Marks the handle released after a consuming engine call (commit,
    /// save, terminate) already gave it back.
    pub(crate) fn mark_released(&mut self) {
        if let State::Allocated(handle) = self.state {
            tracing::debug!(kind = %K::KIND, ?handle, "handle consumed");
            self.state = State::Released;
        }
    }

    /// Current state.
    pub fn state(&self) -> ResourceState {
        match self.state {
            State::Unallocated => ResourceState::Unallocated,
            State::Allocated(_) => ResourceState::Allocated,
            State::Released => ResourceState::Released,
        }
    }

    /// Returns true while a handle is held.
    pub fn is_allocated(&self) -> bool {
        matches!(self.state, State::Allocated(_))
    }

    /// The engine this wrapper talks to.
    pub fn api(&self) -> &Arc<dyn JetApi> {
        &self.api
    }
}

impl<K: HandleKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Resource");
        s.field("kind", &K::KIND);
        match &self.state {
            State::Allocated(handle) => s.field("handle", handle),
            State::Unallocated => s.field("state", &ResourceState::Unallocated),
            State::Released => s.field("state", &ResourceState::Released),
        };
        s.finish()
    }
}

impl<K: HandleKind> Drop for Resource<K> {
    fn drop(&mut self) {
        if let State::Allocated(handle) = self.state {
            LEAKS[K::KIND.index()].fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                kind = %K::KIND,
                ?handle,
                "handle dropped without release; leaking it"
            );
        }
    }
}
