//! Conversion of column batches to and from the engine's native record
//! arrays.
//!
//! Each direction runs the same four steps: validate the descriptors,
//! translate them into one native record each, make a single engine call,
//! and project the native output fields into fresh result values. Nothing
//! reaches the engine if validation or translation fails.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;

use jetbind_sys::{JetApi, NativeRetrieveColumn, NativeSetColumn};

use crate::columns::{RetrieveColumn, RetrievedColumn, SetColumn, SetColumnResult};
use crate::error::{JetError, JetResult};
use crate::status;
use crate::table::CursorHandle;

/// Reads a batch of columns from the cursor's current record.
///
/// Per-column outcomes (null, truncation, unknown column) are reported on
/// the matching result; only a batch-level engine error fails the call.
pub fn retrieve_columns(
    api: &dyn JetApi,
    cursor: CursorHandle,
    columns: &mut [RetrieveColumn<'_>],
) -> JetResult<Vec<RetrievedColumn>> {
    validate_retrieve(columns)?;
    let mut batch = translate_retrieve(columns)?;
    let count = narrow("columns", batch.records.len())?;

    tracing::trace!(count, ?cursor, "submitting retrieve batch");
    // SAFETY: `records` holds `count` initialized entries. Every non-null
    // `data` pointer comes from a buffer that `batch` keeps mutably
    // borrowed, and `data_len` never exceeds that buffer's length.
    let code = unsafe {
        api.retrieve_columns(
            cursor.session,
            cursor.table,
            batch.records.as_mut_ptr(),
            count,
        )
    };
    status::check(code, "JetRetrieveColumns")?;

    Ok(batch.records.iter().map(project_retrieve).collect())
}

/// Writes a batch of columns into the cursor's prepared update.
///
/// Per-column failures are reported on the matching result; only a
/// batch-level engine error fails the call.
pub fn set_columns(
    api: &dyn JetApi,
    cursor: CursorHandle,
    columns: &[SetColumn<'_>],
) -> JetResult<Vec<SetColumnResult>> {
    validate_set(columns)?;
    let mut batch = translate_set(columns)?;
    let count = narrow("columns", batch.records.len())?;

    tracing::trace!(count, ?cursor, "submitting set batch");
    // SAFETY: `records` holds `count` initialized entries. Every non-null
    // `data` pointer comes from a slice that `batch` keeps borrowed, and
    // `data_len` never exceeds that slice's length.
    let code = unsafe {
        api.set_columns(
            cursor.session,
            cursor.table,
            batch.records.as_mut_ptr(),
            count,
        )
    };
    status::check(code, "JetSetColumns")?;

    Ok(batch.records.iter().map(project_set).collect())
}

#[derive(Debug)]
struct RetrieveBatch<'a> {
    records: Vec<NativeRetrieveColumn>,
    _buffers: PhantomData<&'a mut [u8]>,
}

#[derive(Debug)]
struct SetBatch<'a> {
    records: Vec<NativeSetColumn>,
    _data: PhantomData<&'a [u8]>,
}

fn validate_retrieve(columns: &[RetrieveColumn<'_>]) -> JetResult<()> {
    if columns.is_empty() {
        return Err(JetError::out_of_range(
            "columns",
            "at least one column is required",
        ));
    }
    for (index, column) in columns.iter().enumerate() {
        let len = column.buffer_len();
        if column.capacity > len {
            return Err(JetError::out_of_range(
                "capacity",
                format!(
                    "column {index}: capacity {} exceeds buffer length {len}",
                    column.capacity
                ),
            ));
        }
    }
    Ok(())
}

fn validate_set(columns: &[SetColumn<'_>]) -> JetResult<()> {
    if columns.is_empty() {
        return Err(JetError::out_of_range(
            "columns",
            "at least one column is required",
        ));
    }
    for (index, column) in columns.iter().enumerate() {
        let len = column.data_len();
        if column.size > len {
            return Err(JetError::out_of_range(
                "size",
                format!(
                    "column {index}: size {} exceeds data length {len}",
                    column.size
                ),
            ));
        }
    }
    Ok(())
}

fn narrow(parameter: &'static str, value: usize) -> JetResult<u32> {
    u32::try_from(value).map_err(|_| JetError::overflow(parameter, value))
}

fn translate_retrieve<'a>(columns: &'a mut [RetrieveColumn<'_>]) -> JetResult<RetrieveBatch<'a>> {
    let mut records = Vec::with_capacity(columns.len());
    for column in columns.iter_mut() {
        let data_len = narrow("capacity", column.capacity)?;
        let long_value_offset = narrow("long_value_offset", column.long_value_offset)?;
        let itag_sequence = narrow("itag_sequence", column.itag_sequence)?;
        let data: *mut c_void = match column.buffer.as_deref_mut() {
            Some(buf) if !buf.is_empty() => buf.as_mut_ptr().cast(),
            _ => ptr::null_mut(),
        };
        records.push(NativeRetrieveColumn {
            column_id: column.column_id,
            data,
            data_len,
            grbit: column.grbit.bits(),
            long_value_offset,
            itag_sequence,
            ..NativeRetrieveColumn::default()
        });
    }
    Ok(RetrieveBatch {
        records,
        _buffers: PhantomData,
    })
}

fn translate_set<'a>(columns: &'a [SetColumn<'_>]) -> JetResult<SetBatch<'a>> {
    let mut records = Vec::with_capacity(columns.len());
    for column in columns {
        let data_len = narrow("size", column.size)?;
        let long_value_offset = narrow("long_value_offset", column.long_value_offset)?;
        let itag_sequence = narrow("itag_sequence", column.itag_sequence)?;
        let data: *const c_void = match column.data {
            Some(bytes) if !bytes.is_empty() => bytes.as_ptr().cast(),
            _ => ptr::null(),
        };
        records.push(NativeSetColumn {
            column_id: column.column_id,
            data,
            data_len,
            grbit: column.grbit.bits(),
            long_value_offset,
            itag_sequence,
            err: 0,
        });
    }
    Ok(SetBatch {
        records,
        _data: PhantomData,
    })
}

fn project_retrieve(record: &NativeRetrieveColumn) -> RetrievedColumn {
    RetrievedColumn::new(
        record.column_id,
        record.actual_len as usize,
        record.next_tagged,
        record.itag_sequence as usize,
        record.err,
    )
}

fn project_set(record: &NativeSetColumn) -> SetColumnResult {
    SetColumnResult::new(record.column_id, record.err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ErrorKind, Warning};
    use jetbind_sys::{ColumnId, SessionHandle, TableHandle};

    #[test]
    fn empty_batches_are_rejected() {
        assert!(matches!(
            validate_retrieve(&[]),
            Err(JetError::OutOfRange {
                parameter: "columns",
                ..
            })
        ));
        assert!(matches!(
            validate_set(&[]),
            Err(JetError::OutOfRange {
                parameter: "columns",
                ..
            })
        ));
    }

    #[test]
    fn capacity_beyond_buffer_names_index() {
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        let columns = [
            RetrieveColumn::new(ColumnId(1), &mut a),
            RetrieveColumn::new(ColumnId(2), &mut b).with_capacity(5),
        ];
        let err = validate_retrieve(&columns).unwrap_err();
        assert!(err.to_string().contains("column 1"), "{err}");
    }

    #[test]
    fn absent_buffer_has_zero_length() {
        let probe = [RetrieveColumn::size_probe(ColumnId(1)).with_capacity(1)];
        assert!(validate_retrieve(&probe).is_err());
        let probe = [RetrieveColumn::size_probe(ColumnId(1))];
        assert!(validate_retrieve(&probe).is_ok());
    }

    #[test]
    fn size_beyond_data_is_rejected() {
        let data = [1u8, 2];
        let columns = [SetColumn::new(ColumnId(1), &data).with_size(3)];
        assert!(validate_set(&columns).is_err());
    }

    #[test]
    fn translation_preserves_order_and_fields() {
        let mut a = [0u8; 8];
        let mut columns = vec![
            RetrieveColumn::new(ColumnId(7), &mut a)
                .with_long_value_offset(3)
                .with_itag_sequence(2),
            RetrieveColumn::value_count(ColumnId::ALL_TAGGED),
        ];
        let batch = translate_retrieve(&mut columns).unwrap();
        assert_eq!(batch.records.len(), 2);

        let first = &batch.records[0];
        assert_eq!(first.column_id, ColumnId(7));
        assert_eq!(first.data_len, 8);
        assert_eq!(first.long_value_offset, 3);
        assert_eq!(first.itag_sequence, 2);
        assert!(!first.data.is_null());

        let second = &batch.records[1];
        assert_eq!(second.column_id, ColumnId::ALL_TAGGED);
        assert_eq!(second.itag_sequence, 0);
        assert!(second.data.is_null());
    }

    #[test]
    fn empty_buffer_becomes_null_pointer() {
        let mut empty: [u8; 0] = [];
        let mut columns = vec![RetrieveColumn::new(ColumnId(1), &mut empty)];
        let batch = translate_retrieve(&mut columns).unwrap();
        assert!(batch.records[0].data.is_null());
        assert_eq!(batch.records[0].data_len, 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_values_overflow() {
        let mut columns = vec![RetrieveColumn::size_probe(ColumnId(1))
            .with_long_value_offset(u32::MAX as usize + 1)];
        let err = translate_retrieve(&mut columns).unwrap_err();
        assert!(matches!(
            err,
            JetError::OutOfRange {
                parameter: "long_value_offset",
                ..
            }
        ));

        let columns = [SetColumn::null(ColumnId(1)).with_itag_sequence(usize::MAX)];
        assert!(translate_set(&columns).is_err());
    }

    #[test]
    fn projection_copies_native_outputs() {
        let record = NativeRetrieveColumn {
            column_id: ColumnId(5),
            actual_len: 99,
            next_tagged: ColumnId(260),
            itag_sequence: 3,
            err: 1006,
            ..NativeRetrieveColumn::default()
        };
        let result = project_retrieve(&record);
        assert_eq!(result.column_id(), ColumnId(5));
        assert_eq!(result.actual_size(), 99);
        assert_eq!(result.next_tagged(), ColumnId(260));
        assert_eq!(result.itag_sequence(), 3);
        assert_eq!(result.warning(), Some(Warning::BufferTruncated));

        let record = NativeSetColumn {
            column_id: ColumnId(6),
            err: -1507,
            ..NativeSetColumn::default()
        };
        assert_eq!(project_set(&record).error(), Some(ErrorKind::ColumnNotFound));
    }

    #[test]
    fn validation_failure_never_reaches_engine() {
        let engine = jetbind_sim::SimEngine::new();
        let cursor = CursorHandle {
            session: SessionHandle(1),
            table: TableHandle(1),
        };
        let err = retrieve_columns(&engine, cursor, &mut []).unwrap_err();
        assert!(matches!(err, JetError::OutOfRange { .. }));
        let err = set_columns(&engine, cursor, &[]).unwrap_err();
        assert!(matches!(err, JetError::OutOfRange { .. }));
        assert_eq!(engine.stats().calls, 0);
    }
}
