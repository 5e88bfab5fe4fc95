//! Column descriptors and per-column results for bulk get/set.
//!
//! Descriptors borrow the caller's buffers for the duration of one batch.
//! Results are plain values that outlive the batch; index *i* of the result
//! vector always describes descriptor *i*.

use jetbind_sys::{ColumnId, RetrieveGrbit, SetGrbit};

use crate::status::{classify, ErrorKind, Status, Warning};

/// One column to read in a bulk retrieval.
#[derive(Debug)]
pub struct RetrieveColumn<'a> {
    /// Column to read, or [`ColumnId::ALL_TAGGED`] to walk tagged columns.
    pub column_id: ColumnId,
    /// Destination buffer. `None` requests only the size.
    pub buffer: Option<&'a mut [u8]>,
    /// Number of bytes of `buffer` the engine may write. Must not exceed
    /// the buffer length.
    pub capacity: usize,
    /// Retrieval options.
    pub grbit: RetrieveGrbit,
    /// First byte of a long value to return.
    pub long_value_offset: usize,
    /// 1-based value number for multi-valued columns; 0 asks for the count.
    pub itag_sequence: usize,
}

impl<'a> RetrieveColumn<'a> {
    /// Reads the first value of `column_id` into all of `buffer`.
    pub fn new(column_id: ColumnId, buffer: &'a mut [u8]) -> Self {
        let capacity = buffer.len();
        Self {
            column_id,
            buffer: Some(buffer),
            capacity,
            grbit: RetrieveGrbit::NONE,
            long_value_offset: 0,
            itag_sequence: 1,
        }
    }

    /// Asks for the size of the first value without copying any data.
    pub fn size_probe(column_id: ColumnId) -> Self {
        Self {
            column_id,
            buffer: None,
            capacity: 0,
            grbit: RetrieveGrbit::NONE,
            long_value_offset: 0,
            itag_sequence: 1,
        }
    }

    /// Asks for the number of values stored in a multi-valued column.
    pub fn value_count(column_id: ColumnId) -> Self {
        Self {
            itag_sequence: 0,
            ..Self::size_probe(column_id)
        }
    }

    /// Limits the bytes the engine may write.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets retrieval options.
    #[must_use]
    pub fn with_grbit(mut self, grbit: RetrieveGrbit) -> Self {
        self.grbit = grbit;
        self
    }

    /// Starts the copy at `offset` bytes into a long value.
    #[must_use]
    pub fn with_long_value_offset(mut self, offset: usize) -> Self {
        self.long_value_offset = offset;
        self
    }

    /// Selects which value of a multi-valued column to read.
    #[must_use]
    pub fn with_itag_sequence(mut self, itag_sequence: usize) -> Self {
        self.itag_sequence = itag_sequence;
        self
    }

    pub(crate) fn buffer_len(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len())
    }
}

/// One column to write in a bulk update.
#[derive(Debug, Clone, Copy)]
pub struct SetColumn<'a> {
    /// Column to write.
    pub column_id: ColumnId,
    /// Source bytes. `None` (or a zero size) sets the column to null unless
    /// [`SetGrbit::ZERO_LENGTH`] is given.
    pub data: Option<&'a [u8]>,
    /// Number of bytes of `data` to write. Must not exceed the data length.
    pub size: usize,
    /// Set options.
    pub grbit: SetGrbit,
    /// Offset within a long value for [`SetGrbit::OVERWRITE_LV`].
    pub long_value_offset: usize,
    /// 1-based value number to replace; 0 adds a new value.
    pub itag_sequence: usize,
}

impl<'a> SetColumn<'a> {
    /// Writes all of `data` as the first value of `column_id`.
    pub fn new(column_id: ColumnId, data: &'a [u8]) -> Self {
        Self {
            column_id,
            data: Some(data),
            size: data.len(),
            grbit: SetGrbit::NONE,
            long_value_offset: 0,
            itag_sequence: 1,
        }
    }

    /// Sets `column_id` to null.
    pub fn null(column_id: ColumnId) -> Self {
        Self {
            column_id,
            data: None,
            size: 0,
            grbit: SetGrbit::NONE,
            long_value_offset: 0,
            itag_sequence: 1,
        }
    }

    /// Adds `data` as a new value of a multi-valued column.
    pub fn append_value(column_id: ColumnId, data: &'a [u8]) -> Self {
        Self {
            itag_sequence: 0,
            ..Self::new(column_id, data)
        }
    }

    /// Writes only the first `size` bytes of the data.
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets options.
    #[must_use]
    pub fn with_grbit(mut self, grbit: SetGrbit) -> Self {
        self.grbit = grbit;
        self
    }

    /// Sets the long-value offset.
    #[must_use]
    pub fn with_long_value_offset(mut self, offset: usize) -> Self {
        self.long_value_offset = offset;
        self
    }

    /// Selects which value of a multi-valued column to replace.
    #[must_use]
    pub fn with_itag_sequence(mut self, itag_sequence: usize) -> Self {
        self.itag_sequence = itag_sequence;
        self
    }

    pub(crate) fn data_len(&self) -> usize {
        self.data.map_or(0, <[u8]>::len)
    }
}

/// Outcome of one column in a bulk retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievedColumn {
    column_id: ColumnId,
    actual_size: usize,
    next_tagged: ColumnId,
    itag_sequence: usize,
    code: i32,
    status: Status,
}

impl RetrievedColumn {
    pub(crate) fn new(
        column_id: ColumnId,
        actual_size: usize,
        next_tagged: ColumnId,
        itag_sequence: usize,
        code: i32,
    ) -> Self {
        Self {
            column_id,
            actual_size,
            next_tagged,
            itag_sequence,
            code,
            status: classify(code),
        }
    }

    /// Column the descriptor asked for.
    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    /// Full size of the value in bytes. May exceed the buffer capacity, in
    /// which case only `capacity` bytes were written.
    pub fn actual_size(&self) -> usize {
        self.actual_size
    }

    /// Column the value came from when walking [`ColumnId::ALL_TAGGED`].
    pub fn next_tagged(&self) -> ColumnId {
        self.next_tagged
    }

    /// Sequence number reported back; the value count for a zero-sequence
    /// request.
    pub fn itag_sequence(&self) -> usize {
        self.itag_sequence
    }

    /// Raw per-column code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Classified per-column code.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The per-column warning, if any.
    pub fn warning(&self) -> Option<Warning> {
        self.status.warning()
    }

    /// The per-column error, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.status.error()
    }

    /// True when the column holds no value.
    pub fn is_null(&self) -> bool {
        self.warning() == Some(Warning::ColumnNull)
    }

    /// True when the buffer was too small for the value.
    pub fn is_truncated(&self) -> bool {
        self.warning() == Some(Warning::BufferTruncated)
    }

    /// Number of bytes actually written into a buffer of `capacity` bytes.
    pub fn written(&self, capacity: usize) -> usize {
        if self.status.is_error() || self.is_null() {
            0
        } else {
            self.actual_size.min(capacity)
        }
    }
}

/// Outcome of one column in a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetColumnResult {
    column_id: ColumnId,
    code: i32,
    status: Status,
}

impl SetColumnResult {
    pub(crate) fn new(column_id: ColumnId, code: i32) -> Self {
        Self {
            column_id,
            code,
            status: classify(code),
        }
    }

    /// Column the descriptor wrote.
    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    /// Raw per-column code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Classified per-column code.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The per-column error, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.status.error()
    }
}
