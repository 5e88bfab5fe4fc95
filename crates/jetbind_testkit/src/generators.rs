//! Property-based test generators using proptest.
//!
//! Strategies produce sample records and descriptor batch shapes that the
//! simulated engine accepts.

use jetbind_sys::ColumnId;
use proptest::prelude::*;

use crate::fixtures::{SampleColumns, SampleRecord};

/// Strategy for record ids.
pub fn record_id_strategy() -> impl Strategy<Value = i32> {
    any::<i32>()
}

/// Strategy for names that fit the sample `Text` column.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 _-]{0,64}").expect("Invalid regex")
}

/// Strategy for long-value payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// Strategy for multi-valued tag lists. Tags are never empty, since an
/// empty value would be stored as null.
pub fn tags_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..32), 0..6)
}

/// Strategy for whole sample records.
pub fn sample_record_strategy() -> impl Strategy<Value = SampleRecord> {
    (
        record_id_strategy(),
        name_strategy(),
        payload_strategy(),
        tags_strategy(),
    )
        .prop_map(|(id, name, payload, tags)| SampleRecord {
            id,
            name,
            payload,
            tags,
        })
}

/// Strategy for sets of records with distinct ids.
pub fn distinct_records_strategy(max: usize) -> impl Strategy<Value = Vec<SampleRecord>> {
    prop::collection::vec(sample_record_strategy(), 1..=max.max(1)).prop_map(|mut records| {
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        records
    })
}

/// Shape of one retrieve descriptor, independent of any buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveShape {
    /// Which sample column to read (index into [`SampleColumns::all`]).
    pub column: usize,
    /// Buffer length and capacity.
    pub capacity: usize,
    /// Long-value offset.
    pub offset: usize,
    /// 1-based value number; 0 asks for the count.
    pub itag: usize,
}

impl RetrieveShape {
    /// The column this shape reads.
    pub fn column_id(&self, columns: &SampleColumns) -> ColumnId {
        columns.all()[self.column % 4]
    }
}

/// Strategy for one retrieve descriptor shape.
pub fn retrieve_shape_strategy() -> impl Strategy<Value = RetrieveShape> {
    (0usize..4, 0usize..600, 0usize..64, 0usize..4).prop_map(|(column, capacity, offset, itag)| {
        RetrieveShape {
            column,
            capacity,
            offset,
            itag,
        }
    })
}

/// Strategy for a batch of retrieve descriptor shapes.
pub fn retrieve_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<RetrieveShape>> {
    prop::collection::vec(retrieve_shape_strategy(), 1..=max_len.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn names_fit_text_column(name in name_strategy()) {
            prop_assert!(name.len() <= 255);
        }

        #[test]
        fn distinct_records_have_unique_ids(records in distinct_records_strategy(20)) {
            prop_assert!(!records.is_empty());
            prop_assert!(records.windows(2).all(|w| w[0].id < w[1].id));
        }

        #[test]
        fn tags_are_never_empty(tags in tags_strategy()) {
            prop_assert!(tags.iter().all(|t| !t.is_empty()));
        }

        #[test]
        fn batches_are_never_empty(batch in retrieve_batch_strategy(8)) {
            prop_assert!((1..=8).contains(&batch.len()));
        }
    }
}
