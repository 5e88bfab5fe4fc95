//! Fixed-layout parameter records exchanged with the engine.
//!
//! Field order and widths match the engine ABI exactly. Output fields are
//! written by the engine in place; everything else is input.

use std::ffi::c_void;

use crate::handles::ColumnId;

/// One entry of a bulk column retrieval (`JET_RETRIEVECOLUMN`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeRetrieveColumn {
    /// Column to retrieve, or [`ColumnId::ALL_TAGGED`].
    pub column_id: ColumnId,
    /// Start of the output buffer. May be null when `data_len` is zero.
    pub data: *mut c_void,
    /// Size of the output buffer in bytes. The engine never writes more.
    pub data_len: u32,
    /// Output: size of the complete value, which may exceed `data_len`.
    pub actual_len: u32,
    /// Retrieval options.
    pub grbit: u32,
    /// Offset of the first byte to retrieve from a long value.
    pub long_value_offset: u32,
    /// 1-based sequence number of the value in a multi-valued column.
    /// Zero requests the instance count, which the engine writes back here.
    pub itag_sequence: u32,
    /// Output: column the value came from when enumerating all tagged columns.
    pub next_tagged: ColumnId,
    /// Output: per-column status code.
    pub err: i32,
}

impl Default for NativeRetrieveColumn {
    fn default() -> Self {
        Self {
            column_id: ColumnId::default(),
            data: std::ptr::null_mut(),
            data_len: 0,
            actual_len: 0,
            grbit: 0,
            long_value_offset: 0,
            itag_sequence: 0,
            next_tagged: ColumnId::default(),
            err: 0,
        }
    }
}

/// One entry of a bulk column update (`JET_SETCOLUMN`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeSetColumn {
    /// Column to set.
    pub column_id: ColumnId,
    /// Start of the input data. May be null when `data_len` is zero.
    pub data: *const c_void,
    /// Size of the input data in bytes.
    pub data_len: u32,
    /// Set options.
    pub grbit: u32,
    /// Offset within a long value for overwrite operations.
    pub long_value_offset: u32,
    /// 1-based sequence number of the value to replace; zero appends.
    pub itag_sequence: u32,
    /// Output: per-column status code.
    pub err: i32,
}

impl Default for NativeSetColumn {
    fn default() -> Self {
        Self {
            column_id: ColumnId::default(),
            data: std::ptr::null(),
            data_len: 0,
            grbit: 0,
            long_value_offset: 0,
            itag_sequence: 0,
            err: 0,
        }
    }
}

/// Column definition passed to `add_column` (`JET_COLUMNDEF`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeColumnDef {
    /// Size of this structure in bytes.
    pub cb_struct: u32,
    /// Output: assigned column id.
    pub column_id: ColumnId,
    /// Column type (`ColumnType` as `u32`).
    pub coltyp: u32,
    /// Reserved country code.
    pub country: u16,
    /// Language id for text columns.
    pub langid: u16,
    /// Code page for text columns.
    pub cp: u16,
    /// Reserved collation.
    pub collate: u16,
    /// Maximum value length in bytes; zero means the type's default.
    pub cb_max: u32,
    /// Column options (`ColumnGrbit` bits).
    pub grbit: u32,
}

impl Default for NativeColumnDef {
    fn default() -> Self {
        Self {
            cb_struct: std::mem::size_of::<Self>() as u32,
            column_id: ColumnId::default(),
            coltyp: 0,
            country: 0,
            langid: 0x409,
            cp: 1252,
            collate: 0,
            cb_max: 0,
            grbit: 0,
        }
    }
}

// The engine is told the record size through `cb_struct`, so the layout is
// part of the ABI.
const _: () = assert!(std::mem::size_of::<NativeColumnDef>() == 28);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn retrieve_record_layout() {
        // u32, pointer, six u32 and one i32, padded to pointer alignment.
        let ptr = size_of::<*mut c_void>();
        let expected = if ptr == 8 { 48 } else { 36 };
        assert_eq!(size_of::<NativeRetrieveColumn>(), expected);
        assert_eq!(align_of::<NativeRetrieveColumn>(), align_of::<*mut c_void>());
    }

    #[test]
    fn set_record_layout() {
        let ptr = size_of::<*const c_void>();
        let expected = if ptr == 8 { 40 } else { 28 };
        assert_eq!(size_of::<NativeSetColumn>(), expected);
    }

    #[test]
    fn column_def_default_size() {
        let def = NativeColumnDef::default();
        assert_eq!(def.cb_struct as usize, size_of::<NativeColumnDef>());
        assert_eq!(def.coltyp, 0);
    }

    #[test]
    fn defaults_are_null() {
        assert!(NativeRetrieveColumn::default().data.is_null());
        assert!(NativeSetColumn::default().data.is_null());
    }
}
