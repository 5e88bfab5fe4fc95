//! Bulk column retrieval and update over native record arrays.

use std::slice;

use jetbind_sys::codes::*;
use jetbind_sys::{
    ColumnId, NativeRetrieveColumn, NativeSetColumn, RetrieveGrbit, SessionHandle, SetGrbit,
    TableHandle,
};

use crate::cursor::{current_row, table_of};
use crate::state::{EngineState, SimResult};
use crate::table::{ColumnDef, Row, TableData, FIRST_TAGGED};

impl EngineState {
    /// # Safety
    ///
    /// Same contract as [`jetbind_sys::JetApi::retrieve_columns`].
    pub unsafe fn retrieve_columns(
        &mut self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeRetrieveColumn,
        count: u32,
    ) -> SimResult {
        self.check_cursor(session, table)?;
        if count == 0 {
            return Ok(());
        }
        if columns.is_null() {
            return Err(JET_errInvalidParameter);
        }
        // SAFETY: the caller guarantees `count` initialized records.
        let records = unsafe { slice::from_raw_parts_mut(columns, count as usize) };

        let cursor = &self.cursors[&table.0];
        let data = table_of(&self.files, cursor)?;
        let current = current_row(data, cursor).map(|(_, row)| row);
        let pending = cursor.pending.as_ref().map(|p| &p.row);

        for record in records.iter_mut() {
            let source = if RetrieveGrbit(record.grbit).contains(RetrieveGrbit::RETRIEVE_COPY) {
                pending.ok_or(JET_errUpdateNotPrepared)?
            } else {
                current?
            };
            // SAFETY: forwarded from the caller.
            unsafe { retrieve_one(data, source, record) };
        }

        self.stats.retrieve_batches += 1;
        self.stats.retrieved_columns += u64::from(count);
        Ok(())
    }

    /// # Safety
    ///
    /// Same contract as [`jetbind_sys::JetApi::set_columns`].
    pub unsafe fn set_columns(
        &mut self,
        session: SessionHandle,
        table: TableHandle,
        columns: *mut NativeSetColumn,
        count: u32,
    ) -> SimResult {
        self.check_cursor(session, table)?;
        if count == 0 {
            return Ok(());
        }
        if columns.is_null() {
            return Err(JET_errInvalidParameter);
        }
        // SAFETY: the caller guarantees `count` initialized records.
        let records = unsafe { slice::from_raw_parts_mut(columns, count as usize) };

        let Some(cursor) = self.cursors.get_mut(&table.0) else {
            return Err(JET_errInvalidTableId);
        };
        let data = table_of(&self.files, cursor)?;
        let Some(pending) = cursor.pending.as_mut() else {
            return Err(JET_errUpdateNotPrepared);
        };

        for record in records.iter_mut() {
            // SAFETY: forwarded from the caller.
            let bytes = unsafe { input(record) };
            record.err = match set_one(data, &mut pending.row, record, bytes) {
                Ok(()) => JET_errSuccess,
                Err(code) => code,
            };
        }

        self.stats.set_batches += 1;
        self.stats.set_columns += u64::from(count);
        Ok(())
    }
}

/// Fills one retrieve record from `row`.
///
/// # Safety
///
/// `record.data` must be null or valid for writes of `record.data_len`
/// bytes.
unsafe fn retrieve_one(table: &TableData, row: &Row, record: &mut NativeRetrieveColumn) {
    record.err = JET_errSuccess;
    record.actual_len = 0;
    record.next_tagged = ColumnId::ALL_TAGGED;

    if record.column_id.is_all_tagged() {
        let tagged: Vec<(u32, &Vec<u8>)> = row
            .range(FIRST_TAGGED..)
            .flat_map(|(id, values)| values.iter().map(move |v| (*id, v)))
            .collect();
        if record.itag_sequence == 0 {
            record.itag_sequence = tagged.len() as u32;
            return;
        }
        match tagged.get(record.itag_sequence as usize - 1) {
            Some((id, value)) => {
                record.next_tagged = ColumnId(*id);
                // SAFETY: forwarded from the caller.
                unsafe { copy_out(value, record) };
            }
            None => record.err = JET_wrnColumnNull,
        }
        return;
    }

    if table.column(record.column_id.0).is_none() {
        record.err = JET_errColumnNotFound;
        return;
    }
    let values = row
        .get(&record.column_id.0)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if record.itag_sequence == 0 {
        record.itag_sequence = values.len() as u32;
        return;
    }
    match values.get(record.itag_sequence as usize - 1) {
        // SAFETY: forwarded from the caller.
        Some(value) => unsafe { copy_out(value, record) },
        None => record.err = JET_wrnColumnNull,
    }
}

/// Copies the part of `value` after the long-value offset into the record's
/// buffer, reporting the full remaining length.
///
/// # Safety
///
/// `record.data` must be null or valid for writes of `record.data_len`
/// bytes.
unsafe fn copy_out(value: &[u8], record: &mut NativeRetrieveColumn) {
    let offset = (record.long_value_offset as usize).min(value.len());
    let available = &value[offset..];
    let written = available.len().min(record.data_len as usize);
    if written > 0 && !record.data.is_null() {
        // SAFETY: `written <= data_len` and the caller guarantees the buffer.
        unsafe {
            std::ptr::copy_nonoverlapping(available.as_ptr(), record.data.cast::<u8>(), written);
        }
    }
    record.actual_len = available.len() as u32;
    if available.len() > record.data_len as usize {
        record.err = JET_wrnBufferTruncated;
    }
}

/// The bytes a set record supplies, or `None` for a null value.
///
/// # Safety
///
/// `record.data` must be null or valid for reads of `record.data_len`
/// bytes.
unsafe fn input<'a>(record: &NativeSetColumn) -> Option<&'a [u8]> {
    let zero_length = SetGrbit(record.grbit).contains(SetGrbit::ZERO_LENGTH);
    if record.data_len == 0 || record.data.is_null() {
        return zero_length.then_some(&[][..]);
    }
    // SAFETY: the caller guarantees `data_len` readable bytes.
    Some(unsafe { slice::from_raw_parts(record.data.cast::<u8>(), record.data_len as usize) })
}

fn set_one(table: &TableData, row: &mut Row, record: &NativeSetColumn, bytes: Option<&[u8]>) -> SimResult {
    let column = table
        .column(record.column_id.0)
        .ok_or(JET_errColumnNotFound)?;
    let itag = record.itag_sequence as usize;
    let multi = column.is_multi_valued();
    if !multi && itag > 1 {
        return Err(JET_errBadItagSequence);
    }
    let mut values = row.get(&column.id).cloned().unwrap_or_default();
    // Index of the value being written; `None` appends.
    let slot = match itag {
        0 if multi => None,
        0 => Some(0),
        n if n <= values.len() => Some(n - 1),
        _ => None,
    };

    match bytes {
        None => {
            if let Some(slot) = slot.filter(|s| *s < values.len()) {
                values.remove(slot);
            }
        }
        Some(bytes) => {
            let value = merge(slot.and_then(|s| values.get(s)), bytes, record)?;
            check_size(column, &value)?;
            if multi && SetGrbit(record.grbit).contains(SetGrbit::UNIQUE_MULTI_VALUES) {
                let duplicate = values
                    .iter()
                    .enumerate()
                    .any(|(i, v)| Some(i) != slot && *v == value);
                if duplicate {
                    return Err(JET_errMultiValuedDuplicate);
                }
            }
            match slot {
                Some(slot) if slot < values.len() => values[slot] = value,
                _ => values.push(value),
            }
        }
    }

    if values.is_empty() {
        row.remove(&column.id);
    } else {
        row.insert(column.id, values);
    }
    Ok(())
}

/// Combines new bytes with the existing value for long-value appends and
/// overwrites.
fn merge(existing: Option<&Vec<u8>>, bytes: &[u8], record: &NativeSetColumn) -> SimResult<Vec<u8>> {
    let grbit = SetGrbit(record.grbit);
    if grbit.contains(SetGrbit::APPEND_LV) {
        let mut value = existing.cloned().unwrap_or_default();
        value.extend_from_slice(bytes);
        Ok(value)
    } else if grbit.contains(SetGrbit::OVERWRITE_LV) {
        let mut value = existing.cloned().unwrap_or_default();
        let offset = record.long_value_offset as usize;
        if offset > value.len() {
            return Err(JET_errInvalidParameter);
        }
        let end = offset + bytes.len();
        if end > value.len() {
            value.resize(end, 0);
        }
        value[offset..end].copy_from_slice(bytes);
        Ok(value)
    } else {
        Ok(bytes.to_vec())
    }
}

fn check_size(column: &ColumnDef, value: &[u8]) -> SimResult {
    if let Some(size) = column.column_type.fixed_size() {
        if value.len() != size {
            return Err(JET_errInvalidBufferSize);
        }
    }
    match column.limit() {
        Some(limit) if value.len() > limit => Err(JET_errColumnTooBig),
        _ => Ok(()),
    }
}
