//! # jetbind sim
//!
//! An in-memory engine implementing the [`jetbind_sys::JetApi`] call
//! surface, so that bindings, tools and tests run without the native
//! library.
//!
//! The simulator models what the binding relies on:
//! - Instances with system parameters, sessions and per-session database ids
//! - Database files (marker files on disk, contents in memory)
//! - Tables with fixed, variable and tagged columns; multi-valued columns
//! - Primary and secondary indexes with normalized keys, seek and move
//! - Prepared updates, bookmarks and nested transactions with rollback
//! - Bulk retrieve/set with per-record status, truncation and long-value
//!   offsets
//! - Session thread affinity and session contexts
//!
//! It also records release-order [`Violation`]s (for example terminating an
//! instance that still has sessions) so tests can assert that wrappers tear
//! handles down in the right order.
//!
//! ```
//! use std::sync::Arc;
//! use jetbind_sim::SimEngine;
//! use jetbind_sys::JetApi;
//!
//! let engine = Arc::new(SimEngine::new());
//! let api: Arc<dyn JetApi> = engine.clone();
//! # drop(api);
//! assert_eq!(engine.open_handle_count(), 0);
//! ```

#![warn(missing_docs)]

mod columns;
mod cursor;
mod engine;
mod state;
mod stats;
mod table;

pub use engine::SimEngine;
pub use stats::{SimStats, Violation, ViolationKind};
