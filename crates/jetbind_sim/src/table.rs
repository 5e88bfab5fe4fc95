//! Table storage: column catalog, indexes, rows and key ordering.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use jetbind_sys::codes::*;
use jetbind_sys::{ColumnGrbit, ColumnType, CreateIndexGrbit, NativeColumnDef, SeekGrbit};

/// Values of one record: column id to the column's values in sequence
/// order. Absent columns are null.
pub(crate) type Row = BTreeMap<u32, Vec<Vec<u8>>>;

const FIRST_FIXED: u32 = 1;
const FIRST_VARIABLE: u32 = 128;
pub(crate) const FIRST_TAGGED: u32 = 256;

/// Largest value of a short (non long-value) variable column.
const SHORT_VALUE_MAX: usize = 255;

#[derive(Debug, Clone)]
pub(crate) struct ColumnDef {
    pub id: u32,
    pub name: String,
    pub column_type: ColumnType,
    pub grbit: ColumnGrbit,
    pub max_size: u32,
    pub default_value: Vec<u8>,
    next_autoinc: i64,
}

impl ColumnDef {
    pub fn is_multi_valued(&self) -> bool {
        self.grbit.contains(ColumnGrbit::MULTI_VALUED)
    }

    /// Maximum stored length, if any.
    pub fn limit(&self) -> Option<usize> {
        if self.max_size > 0 {
            Some(self.max_size as usize)
        } else if self.column_type.is_long_value() {
            None
        } else if let Some(size) = self.column_type.fixed_size() {
            Some(size)
        } else {
            Some(SHORT_VALUE_MAX)
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct IndexDef {
    pub name: String,
    /// Column id and descending flag per key segment.
    pub segments: Vec<(u32, bool)>,
    pub unique: bool,
    pub primary: bool,
}

/// One normalized key segment. Descending segments compare in reverse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Segment {
    Asc(Option<Vec<u8>>),
    Desc(Reverse<Option<Vec<u8>>>),
}

impl Segment {
    fn new(value: Option<Vec<u8>>, descending: bool) -> Self {
        if descending {
            Self::Desc(Reverse(value))
        } else {
            Self::Asc(value)
        }
    }
}

/// Position of a record in an index: its key segments, then its bookmark
/// to break ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SortKey {
    pub segments: Vec<Segment>,
    pub bookmark: u64,
}

/// Where a cursor is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Position {
    BeforeFirst,
    /// On a record. The key is remembered so that the cursor can still
    /// move after the record is deleted.
    On(SortKey),
    AfterLast,
}

impl Position {
    pub fn bookmark(&self) -> Option<u64> {
        match self {
            Self::On(key) => Some(key.bookmark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TableData {
    pub columns: BTreeMap<u32, ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub rows: BTreeMap<u64, Row>,
    next_bookmark: u64,
    next_fixed: u32,
    next_variable: u32,
    next_tagged: u32,
}

impl Default for TableData {
    fn default() -> Self {
        Self {
            columns: BTreeMap::new(),
            indexes: Vec::new(),
            rows: BTreeMap::new(),
            next_bookmark: 1,
            next_fixed: FIRST_FIXED,
            next_variable: FIRST_VARIABLE,
            next_tagged: FIRST_TAGGED,
        }
    }
}

impl TableData {
    pub fn column(&self, id: u32) -> Option<&ColumnDef> {
        self.columns.get(&id)
    }

    fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn add_column(
        &mut self,
        name: &str,
        def: &NativeColumnDef,
        default_value: &[u8],
    ) -> Result<u32, i32> {
        if name.is_empty() {
            return Err(JET_errInvalidParameter);
        }
        if self.column_by_name(name).is_some() {
            return Err(JET_errColumnDuplicate);
        }
        let Some(column_type) = ColumnType::from_raw(def.coltyp) else {
            return Err(JET_errInvalidParameter);
        };
        if column_type == ColumnType::Nil {
            return Err(JET_errInvalidParameter);
        }
        let grbit = ColumnGrbit(def.grbit);
        if let Some(size) = column_type.fixed_size() {
            if !default_value.is_empty() && default_value.len() != size {
                return Err(JET_errInvalidBufferSize);
            }
        }

        let tagged = grbit.contains(ColumnGrbit::TAGGED)
            || grbit.contains(ColumnGrbit::MULTI_VALUED)
            || column_type.is_long_value();
        let fixed = !tagged
            && (grbit.contains(ColumnGrbit::FIXED) || column_type.fixed_size().is_some());
        let counter = if tagged {
            &mut self.next_tagged
        } else if fixed {
            &mut self.next_fixed
        } else {
            &mut self.next_variable
        };
        let id = *counter;
        *counter += 1;

        self.columns.insert(
            id,
            ColumnDef {
                id,
                name: name.to_string(),
                column_type,
                grbit,
                max_size: def.cb_max,
                default_value: default_value.to_vec(),
                next_autoinc: 1,
            },
        );
        Ok(id)
    }

    /// Parses a `+col\0-col\0\0` key description and adds the index.
    pub fn create_index(&mut self, name: &str, grbit: CreateIndexGrbit, key: &[u8]) -> Result<(), i32> {
        if name.is_empty() {
            return Err(JET_errInvalidParameter);
        }
        if self
            .indexes
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(name))
        {
            return Err(JET_errIndexDuplicate);
        }
        let primary = grbit.contains(CreateIndexGrbit::PRIMARY);
        if primary && self.indexes.iter().any(|i| i.primary) {
            return Err(JET_errIndexHasPrimary);
        }

        let mut segments = Vec::new();
        for part in key.split(|b| *b == 0) {
            if part.is_empty() {
                break;
            }
            let (descending, column) = match part[0] {
                b'-' => (true, &part[1..]),
                b'+' => (false, &part[1..]),
                _ => (false, part),
            };
            let column = std::str::from_utf8(column).map_err(|_| JET_errInvalidParameter)?;
            let Some(def) = self.column_by_name(column) else {
                return Err(JET_errColumnNotFound);
            };
            segments.push((def.id, descending));
        }
        if segments.is_empty() {
            return Err(JET_errInvalidParameter);
        }

        let index = IndexDef {
            name: name.to_string(),
            segments,
            unique: primary || grbit.contains(CreateIndexGrbit::UNIQUE),
            primary,
        };
        if index.unique {
            let mut seen = std::collections::BTreeSet::new();
            for (bookmark, row) in &self.rows {
                if !seen.insert(self.sort_key(Some(&index), *bookmark, row).segments) {
                    return Err(JET_errKeyDuplicate);
                }
            }
        }
        self.indexes.push(index);
        Ok(())
    }

    pub fn index_exists(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// The index records are ordered by: the named one, else the primary
    /// index, else none (bookmark order).
    pub fn ordering(&self, current: Option<&str>) -> Option<&IndexDef> {
        match current {
            Some(name) => self.indexes.iter().find(|i| i.name.eq_ignore_ascii_case(name)),
            None => self.indexes.iter().find(|i| i.primary),
        }
    }

    /// Column type of key segment `position`, or `None` for bookmark order.
    pub fn segment_type(&self, index: Option<&IndexDef>, position: usize) -> Result<Option<ColumnType>, i32> {
        match index {
            None if position == 0 => Ok(None),
            None => Err(JET_errInvalidParameter),
            Some(index) => {
                let (column, _) = index.segments.get(position).ok_or(JET_errInvalidParameter)?;
                Ok(self.column(*column).map(|c| c.column_type))
            }
        }
    }

    pub fn sort_key(&self, index: Option<&IndexDef>, bookmark: u64, row: &Row) -> SortKey {
        let segments = match index {
            None => vec![Segment::Asc(Some(bookmark.to_be_bytes().to_vec()))],
            Some(index) => index
                .segments
                .iter()
                .map(|(column, descending)| {
                    let value = row
                        .get(column)
                        .and_then(|values| values.first())
                        .map(|v| normalize(self.column(*column).map(|c| c.column_type), v));
                    Segment::new(value, *descending)
                })
                .collect(),
        };
        SortKey { segments, bookmark }
    }

    /// Every record's key under `index`, sorted.
    pub fn sorted_keys(&self, index: Option<&IndexDef>) -> Vec<SortKey> {
        let mut keys: Vec<SortKey> = self
            .rows
            .iter()
            .map(|(bookmark, row)| self.sort_key(index, *bookmark, row))
            .collect();
        keys.sort();
        keys
    }

    /// Builds search segments from normalized key values.
    pub fn search_segments(&self, index: Option<&IndexDef>, key: &[Option<Vec<u8>>]) -> Vec<Segment> {
        key.iter()
            .enumerate()
            .map(|(i, value)| {
                let descending = index
                    .and_then(|idx| idx.segments.get(i))
                    .is_some_and(|(_, d)| *d);
                Segment::new(value.clone(), descending)
            })
            .collect()
    }

    /// A fresh record with defaults and auto-increment values filled in.
    pub fn new_row(&mut self) -> Row {
        let mut row = Row::new();
        for column in self.columns.values_mut() {
            if column.grbit.contains(ColumnGrbit::AUTOINCREMENT) {
                let value = column.next_autoinc;
                column.next_autoinc += 1;
                let bytes = match column.column_type.fixed_size() {
                    Some(4) => (value as i32).to_le_bytes().to_vec(),
                    _ => value.to_le_bytes().to_vec(),
                };
                row.insert(column.id, vec![bytes]);
            } else if !column.default_value.is_empty() {
                row.insert(column.id, vec![column.default_value.clone()]);
            }
        }
        row
    }

    /// Fails with a duplicate-key error if `row` collides with another
    /// record in any unique index.
    pub fn check_unique(&self, row: &Row, replacing: Option<u64>) -> Result<(), i32> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let key = self.sort_key(Some(index), 0, row).segments;
            let collides = self.rows.iter().any(|(bookmark, other)| {
                Some(*bookmark) != replacing
                    && self.sort_key(Some(index), *bookmark, other).segments == key
            });
            if collides {
                return Err(JET_errKeyDuplicate);
            }
        }
        Ok(())
    }

    pub fn allocate_bookmark(&mut self) -> u64 {
        let bookmark = self.next_bookmark;
        self.next_bookmark += 1;
        bookmark
    }

    /// Refreshes a remembered position against the current rows and index.
    pub fn refresh(&self, index: Option<&IndexDef>, position: &Position) -> Position {
        match position {
            Position::On(key) => match self.rows.get(&key.bookmark) {
                Some(row) => Position::On(self.sort_key(index, key.bookmark, row)),
                None => position.clone(),
            },
            other => other.clone(),
        }
    }
}

/// Normalizes a column value so that byte order equals value order.
pub(crate) fn normalize(column_type: Option<ColumnType>, value: &[u8]) -> Vec<u8> {
    let Some(column_type) = column_type else {
        return value.to_vec();
    };
    match column_type {
        ColumnType::Short | ColumnType::Long | ColumnType::LongLong | ColumnType::Currency => {
            let mut out: Vec<u8> = value.iter().rev().copied().collect();
            if let Some(first) = out.first_mut() {
                *first ^= 0x80;
            }
            out
        }
        ColumnType::Bit
        | ColumnType::UnsignedByte
        | ColumnType::UnsignedShort
        | ColumnType::UnsignedLong => value.iter().rev().copied().collect(),
        ColumnType::IeeeSingle | ColumnType::IeeeDouble | ColumnType::DateTime => {
            let mut out: Vec<u8> = value.iter().rev().copied().collect();
            let negative = out.first().is_some_and(|b| b & 0x80 != 0);
            if negative {
                for b in &mut out {
                    *b = !*b;
                }
            } else if let Some(first) = out.first_mut() {
                *first ^= 0x80;
            }
            out
        }
        ColumnType::Text | ColumnType::LongText => value.to_ascii_lowercase(),
        _ => value.to_vec(),
    }
}

fn compare_prefix(entry: &[Segment], search: &[Segment]) -> Ordering {
    for (a, b) in entry.iter().zip(search) {
        match a.cmp(b) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Finds the record a seek lands on. Returns its key and whether the key
/// matched exactly.
pub(crate) fn seek(keys: &[SortKey], search: &[Segment], grbit: SeekGrbit) -> Result<(SortKey, bool), i32> {
    let cmp = |k: &&SortKey| compare_prefix(&k.segments, search);
    let found = if grbit.contains(SeekGrbit::EQ) {
        keys.iter().find(|k| cmp(k) == Ordering::Equal)
    } else if grbit.contains(SeekGrbit::GE) {
        keys.iter().find(|k| cmp(k) != Ordering::Less)
    } else if grbit.contains(SeekGrbit::GT) {
        keys.iter().find(|k| cmp(k) == Ordering::Greater)
    } else if grbit.contains(SeekGrbit::LE) {
        keys.iter().rev().find(|k| cmp(k) != Ordering::Greater)
    } else if grbit.contains(SeekGrbit::LT) {
        keys.iter().rev().find(|k| cmp(k) == Ordering::Less)
    } else {
        return Err(JET_errInvalidParameter);
    };
    let key = found.ok_or(JET_errRecordNotFound)?;
    Ok((key.clone(), cmp(&key) == Ordering::Equal))
}

/// Moves from `from` by `rows` over the sorted keys. On failure returns
/// the position the cursor is left at.
pub(crate) fn step(keys: &[SortKey], from: &Position, rows: i32) -> Result<Position, Position> {
    let len = keys.len() as i64;
    let (target, forward) = match rows {
        i32::MIN => (0, false),
        i32::MAX => (len - 1, true),
        0 => {
            return match from {
                Position::On(key) if keys.binary_search(key).is_ok() => Ok(from.clone()),
                _ => Err(from.clone()),
            };
        }
        n if n > 0 => {
            let start = match from {
                Position::BeforeFirst => 0,
                Position::On(key) => keys.partition_point(|k| k <= key) as i64,
                Position::AfterLast => len,
            };
            (start + i64::from(n) - 1, true)
        }
        n => {
            let end = match from {
                Position::BeforeFirst => 0,
                Position::On(key) => keys.partition_point(|k| k < key) as i64,
                Position::AfterLast => len,
            };
            (end + i64::from(n), false)
        }
    };

    if (0..len).contains(&target) {
        Ok(Position::On(keys[target as usize].clone()))
    } else if rows == i32::MIN {
        Err(Position::BeforeFirst)
    } else if rows == i32::MAX || forward {
        Err(Position::AfterLast)
    } else {
        Err(Position::BeforeFirst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_column(table: &mut TableData, name: &str) -> u32 {
        let def = NativeColumnDef {
            coltyp: ColumnType::Long as u32,
            ..NativeColumnDef::default()
        };
        table.add_column(name, &def, &[]).unwrap()
    }

    fn row(column: u32, value: i32) -> Row {
        let mut row = Row::new();
        row.insert(column, vec![value.to_le_bytes().to_vec()]);
        row
    }

    #[test]
    fn column_ids_by_storage_class() {
        let mut table = TableData::default();
        let fixed = long_column(&mut table, "a");
        let var = table
            .add_column(
                "b",
                &NativeColumnDef {
                    coltyp: ColumnType::Binary as u32,
                    ..NativeColumnDef::default()
                },
                &[],
            )
            .unwrap();
        let tagged = table
            .add_column(
                "c",
                &NativeColumnDef {
                    coltyp: ColumnType::LongBinary as u32,
                    ..NativeColumnDef::default()
                },
                &[],
            )
            .unwrap();
        assert_eq!((fixed, var, tagged), (1, 128, 256));
        assert_eq!(table.add_column("A", &NativeColumnDef::default(), &[]), Err(JET_errColumnDuplicate));
    }

    #[test]
    fn signed_integers_sort_numerically() {
        let values = [-5i32, 3, -1, 0, 100];
        let mut normalized: Vec<(Vec<u8>, i32)> = values
            .iter()
            .map(|v| (normalize(Some(ColumnType::Long), &v.to_le_bytes()), *v))
            .collect();
        normalized.sort();
        let order: Vec<i32> = normalized.into_iter().map(|(_, v)| v).collect();
        assert_eq!(order, vec![-5, -1, 0, 3, 100]);
    }

    #[test]
    fn doubles_sort_numerically() {
        let values = [2.5f64, -3.0, 0.0, -0.5, 10.0];
        let mut normalized: Vec<(Vec<u8>, usize)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (normalize(Some(ColumnType::IeeeDouble), &v.to_le_bytes()), i))
            .collect();
        normalized.sort();
        let order: Vec<f64> = normalized.into_iter().map(|(_, i)| values[i]).collect();
        assert_eq!(order, vec![-3.0, -0.5, 0.0, 2.5, 10.0]);
    }

    #[test]
    fn index_key_parsing() {
        let mut table = TableData::default();
        long_column(&mut table, "id");
        long_column(&mut table, "rank");
        table
            .create_index("ix", CreateIndexGrbit::NONE, b"+id\0-rank\0\0")
            .unwrap();
        assert_eq!(table.indexes[0].segments, vec![(1, false), (2, true)]);
        assert_eq!(
            table.create_index("ix", CreateIndexGrbit::NONE, b"+id\0\0"),
            Err(JET_errIndexDuplicate)
        );
        assert_eq!(
            table.create_index("bad", CreateIndexGrbit::NONE, b"+nope\0\0"),
            Err(JET_errColumnNotFound)
        );
        table
            .create_index("pk", CreateIndexGrbit::PRIMARY, b"+id\0\0")
            .unwrap();
        assert_eq!(
            table.create_index("pk2", CreateIndexGrbit::PRIMARY, b"+rank\0\0"),
            Err(JET_errIndexHasPrimary)
        );
    }

    #[test]
    fn stepping_and_seeking() {
        let mut table = TableData::default();
        let id = long_column(&mut table, "id");
        table
            .create_index("pk", CreateIndexGrbit::PRIMARY, b"+id\0\0")
            .unwrap();
        for v in [30, 10, 20] {
            let b = table.allocate_bookmark();
            table.rows.insert(b, row(id, v));
        }
        let index = table.ordering(None).cloned();
        let keys = table.sorted_keys(index.as_ref());

        let first = step(&keys, &Position::BeforeFirst, i32::MIN).unwrap();
        assert_eq!(first.bookmark(), Some(2)); // value 10
        let second = step(&keys, &first, 1).unwrap();
        assert_eq!(second.bookmark(), Some(3)); // value 20
        assert_eq!(step(&keys, &second, 2), Err(Position::AfterLast));
        assert_eq!(step(&keys, &first, -1), Err(Position::BeforeFirst));

        let search = table.search_segments(
            index.as_ref(),
            &[Some(normalize(Some(ColumnType::Long), &15i32.to_le_bytes()))],
        );
        let (key, exact) = seek(&keys, &search, SeekGrbit::GE).unwrap();
        assert_eq!((key.bookmark, exact), (3, false));
        let (key, _) = seek(&keys, &search, SeekGrbit::LT).unwrap();
        assert_eq!(key.bookmark, 2);
        assert_eq!(seek(&keys, &search, SeekGrbit::EQ), Err(JET_errRecordNotFound));
    }

    #[test]
    fn unique_check_ignores_replaced_row() {
        let mut table = TableData::default();
        let id = long_column(&mut table, "id");
        table
            .create_index("u", CreateIndexGrbit::UNIQUE, b"+id\0\0")
            .unwrap();
        table.rows.insert(1, row(id, 7));
        assert_eq!(table.check_unique(&row(id, 7), None), Err(JET_errKeyDuplicate));
        assert_eq!(table.check_unique(&row(id, 7), Some(1)), Ok(()));
        assert_eq!(table.check_unique(&row(id, 8), None), Ok(()));
    }
}
