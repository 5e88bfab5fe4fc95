//! # jetbind Testkit
//!
//! Test utilities for jetbind.
//!
//! This crate provides:
//! - Fixtures that run the binding against the simulated engine in a
//!   temporary directory
//! - A sample table schema covering fixed, long and multi-valued columns
//! - Property-based test generators using proptest
//! - Multi-session stress runs

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

pub use fixtures::*;
pub use generators::*;
pub use stress::*;

/// Re-export commonly used types for convenience.
pub mod prelude {
    pub use crate::fixtures::{
        insert_sample, with_sample_table, with_session, SampleColumns, SampleRecord, TestEngine,
    };
    pub use crate::generators::*;
    pub use jetbind_core::{
        ColumnDefinition, IndexDefinition, Instance, RetrieveColumn, RetrievedColumn, SetColumn,
        SetColumnResult, Status, Table, Warning,
    };
    pub use jetbind_sim::SimEngine;
    pub use jetbind_sys::{ColumnId, RetrieveGrbit, SetGrbit};
}
