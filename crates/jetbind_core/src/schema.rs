//! Column and index definitions for table DDL.

use jetbind_sys::{ColumnGrbit, ColumnType, CreateIndexGrbit, NativeColumnDef};

use crate::error::{JetError, JetResult};

/// Code page for Unicode (UTF-16) text columns.
pub const CODE_PAGE_UNICODE: u16 = 1200;

/// Code page for single-byte text columns.
pub const CODE_PAGE_ASCII: u16 = 1252;

/// Definition of a column to add to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Value type.
    pub column_type: ColumnType,
    /// Column options.
    pub grbit: ColumnGrbit,
    /// Maximum value length in bytes; zero means the type's default.
    pub max_size: u32,
    /// Code page for text columns.
    pub code_page: u16,
    /// Value used when a new record does not set the column.
    pub default_value: Vec<u8>,
}

impl ColumnDefinition {
    /// A nullable column of the given type.
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            grbit: ColumnGrbit::NONE,
            max_size: 0,
            code_page: CODE_PAGE_ASCII,
            default_value: Vec::new(),
        }
    }

    /// Stores the column in the tagged area of the record.
    #[must_use]
    pub fn tagged(mut self) -> Self {
        self.grbit |= ColumnGrbit::TAGGED;
        self
    }

    /// Allows several values per record. Multi-valued columns are tagged.
    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.grbit |= ColumnGrbit::TAGGED | ColumnGrbit::MULTI_VALUED;
        self
    }

    /// Stores the column in the fixed area of the record.
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.grbit |= ColumnGrbit::FIXED;
        self
    }

    /// Rejects null values.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.grbit |= ColumnGrbit::NOT_NULL;
        self
    }

    /// Assigns increasing values on insert.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.grbit |= ColumnGrbit::AUTOINCREMENT;
        self
    }

    /// Limits values to `max_size` bytes.
    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Stores text as UTF-16.
    #[must_use]
    pub fn unicode(mut self) -> Self {
        self.code_page = CODE_PAGE_UNICODE;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Builds the engine's column definition record.
    pub fn to_native(&self) -> NativeColumnDef {
        NativeColumnDef {
            coltyp: self.column_type as u32,
            cp: if self.column_type.is_text() {
                self.code_page
            } else {
                0
            },
            cb_max: self.max_size,
            grbit: self.grbit.bits(),
            ..NativeColumnDef::default()
        }
    }
}

/// Direction of one index segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest value first.
    Ascending,
    /// Largest value first.
    Descending,
}

impl SortOrder {
    const fn prefix(self) -> u8 {
        match self {
            Self::Ascending => b'+',
            Self::Descending => b'-',
        }
    }
}

/// Definition of an index to create on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Key columns in significance order.
    pub segments: Vec<(String, SortOrder)>,
    /// Index options.
    pub grbit: CreateIndexGrbit,
    /// Initial page density in percent.
    pub density: u32,
}

impl Default for IndexDefinition {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            grbit: CreateIndexGrbit::NONE,
            density: 100,
        }
    }
}

impl IndexDefinition {
    /// An index with no segments yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an ascending key column.
    #[must_use]
    pub fn ascending(mut self, column: impl Into<String>) -> Self {
        self.segments.push((column.into(), SortOrder::Ascending));
        self
    }

    /// Adds a descending key column.
    #[must_use]
    pub fn descending(mut self, column: impl Into<String>) -> Self {
        self.segments.push((column.into(), SortOrder::Descending));
        self
    }

    /// Rejects duplicate keys.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.grbit |= CreateIndexGrbit::UNIQUE;
        self
    }

    /// Makes this the table's primary (clustered) index. Primary indexes
    /// are unique.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.grbit |= CreateIndexGrbit::PRIMARY | CreateIndexGrbit::UNIQUE;
        self
    }

    /// Sets the page density.
    #[must_use]
    pub fn density(mut self, density: u32) -> Self {
        self.density = density;
        self
    }

    /// Encodes the key description: `+col\0-col\0\0`.
    pub fn key(&self) -> JetResult<Vec<u8>> {
        if self.segments.is_empty() {
            return Err(JetError::invalid_argument(
                "an index needs at least one key column",
            ));
        }
        let mut key = Vec::new();
        for (column, order) in &self.segments {
            if column.is_empty() || column.contains('\0') {
                return Err(JetError::invalid_argument(format!(
                    "invalid index column name {column:?}"
                )));
            }
            key.push(order.prefix());
            key.extend_from_slice(column.as_bytes());
            key.push(0);
        }
        key.push(0);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_builder_sets_bits() {
        let def = ColumnDefinition::new(ColumnType::LongBinary).multi_valued();
        assert!(def.grbit.contains(ColumnGrbit::TAGGED));
        assert!(def.grbit.contains(ColumnGrbit::MULTI_VALUED));

        let native = def.to_native();
        assert_eq!(native.coltyp, ColumnType::LongBinary as u32);
        assert_eq!(native.cp, 0);
    }

    #[test]
    fn text_columns_carry_code_page() {
        let native = ColumnDefinition::new(ColumnType::Text).unicode().to_native();
        assert_eq!(native.cp, CODE_PAGE_UNICODE);
    }

    #[test]
    fn key_encoding() {
        let index = IndexDefinition::new().ascending("name").descending("id");
        assert_eq!(index.key().unwrap(), b"+name\0-id\0\0".to_vec());
    }

    #[test]
    fn key_requires_segments() {
        assert!(IndexDefinition::new().key().is_err());
        assert!(IndexDefinition::new().ascending("").key().is_err());
    }

    #[test]
    fn primary_implies_unique() {
        let index = IndexDefinition::new().ascending("id").primary();
        assert!(index.grbit.contains(CreateIndexGrbit::UNIQUE));
    }
}
