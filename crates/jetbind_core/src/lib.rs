//! # jetbind core
//!
//! Safe access to a Jet-family ISAM engine through its flat call surface.
//!
//! This crate provides:
//! - Status classification of every engine return code
//! - A handle lifecycle state machine with leak reporting
//! - The bulk column marshaler (`retrieve_columns` / `set_columns`)
//! - Scoped wrappers (instance, session, database, table cursor,
//!   transaction, prepared update) whose borrows enforce release order
//! - Instance configuration loadable from JSON
//!
//! ```no_run
//! use std::sync::Arc;
//! use jetbind_core::{Instance, InstanceConfig};
//! use jetbind_sys::{CreateDatabaseGrbit, DynamicApi};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(unsafe { DynamicApi::load_default()? });
//! let instance = Instance::new(api, &InstanceConfig::new("app"))?;
//! let session = instance.begin_session()?;
//! let db = session.create_database("app.edb", CreateDatabaseGrbit::NONE)?;
//! let table = db.create_table("items")?;
//! # drop(table);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod columns;
mod config;
mod database;
mod error;
mod instance;
#[allow(unsafe_code)]
mod marshal;
pub mod resource;
mod schema;
mod session;
pub mod status;
mod table;
mod transaction;
mod update;

pub use columns::{RetrieveColumn, RetrievedColumn, SetColumn, SetColumnResult};
pub use config::{InstanceConfig, ParamValue};
pub use database::{Database, DatabaseHandle, DatabaseKind, DatabaseOpen, DatabaseParams};
pub use error::{JetError, JetResult};
pub use instance::{Instance, InstanceKind};
pub use marshal::{retrieve_columns, set_columns};
pub use resource::{leak_count, total_leaks, HandleKind, Resource, ResourceKind, ResourceState};
pub use schema::{
    ColumnDefinition, IndexDefinition, SortOrder, CODE_PAGE_ASCII, CODE_PAGE_UNICODE,
};
pub use session::{Session, SessionKind};
pub use status::{check, classify, ErrorKind, Status, Warning};
pub use table::{CursorHandle, Table, TableKind, TableOpen, TableParams};
pub use transaction::{SuspendedTransaction, Transaction, TransactionKind};
pub use update::{Update, UpdateKind, UpdateParams};

/// Crate version, as reported by the command-line tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
