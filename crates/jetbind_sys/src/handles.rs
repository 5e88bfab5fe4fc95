//! Opaque engine handles.
//!
//! Each handle kind is a distinct newtype so that, for example, a session
//! handle can never be passed where a table handle is expected. The bits
//! are engine-defined and never interpreted on this side of the boundary.

/// Defines a transparent handle newtype over an integer representation.
macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $repr);

        impl $name {
            /// The engine's "no handle" value (all bits set).
            pub const NIL: Self = Self(<$repr>::MAX);

            /// Returns true if this is the nil handle.
            #[inline]
            pub const fn is_nil(self) -> bool {
                self.0 == <$repr>::MAX
            }

            /// Returns the raw value handed to the engine.
            #[inline]
            pub const fn value(self) -> $repr {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NIL
            }
        }
    };
}

define_handle!(
    /// Handle to an engine instance (`JET_INSTANCE`).
    InstanceHandle(usize)
);

define_handle!(
    /// Handle to a session (`JET_SESID`).
    SessionHandle(usize)
);

define_handle!(
    /// Handle to a table cursor (`JET_TABLEID`).
    TableHandle(usize)
);

define_handle!(
    /// Identifier of a database opened by a session (`JET_DBID`).
    DatabaseId(u32)
);

/// Identifier of a column within a table (`JET_COLUMNID`).
///
/// Column ids are plain numbers handed out by the engine. Zero is reserved:
/// in bulk retrieval it means "every tagged column of the record".
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ColumnId(pub u32);

impl ColumnId {
    /// Wildcard that enumerates all tagged, multi-valued and sparse columns.
    pub const ALL_TAGGED: Self = Self(0);

    /// Returns the raw value handed to the engine.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true if this is the all-tagged wildcard.
    #[inline]
    pub const fn is_all_tagged(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "column#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_handles() {
        assert!(SessionHandle::NIL.is_nil());
        assert!(SessionHandle::default().is_nil());
        assert!(!SessionHandle(1).is_nil());
        assert_eq!(DatabaseId::NIL.value(), u32::MAX);
        assert_eq!(InstanceHandle::NIL.value(), usize::MAX);
    }

    #[test]
    fn all_tagged_column() {
        assert!(ColumnId::ALL_TAGGED.is_all_tagged());
        assert!(!ColumnId(256).is_all_tagged());
        assert_eq!(ColumnId(7).to_string(), "column#7");
    }

    #[test]
    fn handles_are_pointer_sized() {
        assert_eq!(std::mem::size_of::<TableHandle>(), std::mem::size_of::<usize>());
        assert_eq!(std::mem::size_of::<ColumnId>(), 4);
    }
}
