//! Prepared record updates.

use std::marker::PhantomData;

use jetbind_sys::{ColumnId, JetApi, Prep, SetGrbit, MAX_BOOKMARK_SIZE};

use crate::columns::{SetColumn, SetColumnResult};
use crate::error::{JetError, JetResult};
use crate::marshal;
use crate::resource::{HandleKind, Resource, ResourceKind};
use crate::session::SessionBound;
use crate::status;
use crate::table::{CursorHandle, Table};

/// Allocation parameters for [`UpdateKind`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateParams {
    /// Cursor to prepare the update on.
    pub cursor: CursorHandle,
    /// Kind of update.
    pub prep: Prep,
}

/// Handle kind for a prepared update on a cursor.
#[derive(Debug)]
pub struct UpdateKind;

impl HandleKind for UpdateKind {
    type Handle = CursorHandle;
    type Params = UpdateParams;

    const KIND: ResourceKind = ResourceKind::Update;
    const ALLOCATE_OPERATION: &'static str = "JetPrepareUpdate";
    const RELEASE_OPERATION: &'static str = "JetPrepareUpdate(cancel)";

    fn allocate(api: &dyn JetApi, params: &UpdateParams) -> (i32, CursorHandle) {
        let cursor = params.cursor;
        (
            api.prepare_update(cursor.session, cursor.table, params.prep),
            cursor,
        )
    }

    fn release(api: &dyn JetApi, cursor: CursorHandle) -> i32 {
        api.prepare_update(cursor.session, cursor.table, Prep::Cancel)
    }
}

/// An insert or replace being built on a cursor. Cancelled on drop unless
/// saved.
#[derive(Debug)]
#[must_use = "an update is cancelled when dropped; call save to apply it"]
pub struct Update<'t> {
    resource: Resource<UpdateKind>,
    prep: Prep,
    _table: SessionBound<'t>,
}

impl<'t> Update<'t> {
    pub(crate) fn prepare(table: &'t Table<'_>, prep: Prep) -> JetResult<Self> {
        if prep == Prep::Cancel {
            return Err(JetError::invalid_argument(
                "Prep::Cancel does not start an update; drop the Update instead",
            ));
        }
        let params = UpdateParams {
            cursor: table.cursor()?,
            prep,
        };
        let mut resource = Resource::new(table.api_arc().clone());
        resource.allocate(&params)?;
        Ok(Self {
            resource,
            prep,
            _table: PhantomData,
        })
    }

    /// The kind of update being built.
    pub fn prep(&self) -> Prep {
        self.prep
    }

    /// Writes a batch of columns into the update.
    pub fn set_columns(&self, columns: &[SetColumn<'_>]) -> JetResult<Vec<SetColumnResult>> {
        let cursor = self.resource.ensure_usable()?;
        marshal::set_columns(self.resource.api().as_ref(), cursor, columns)
    }

    /// Writes one column value, failing if the engine rejects it.
    pub fn set_column(&self, column: ColumnId, data: &[u8], grbit: SetGrbit) -> JetResult<()> {
        let results = self.set_columns(&[SetColumn::new(column, data).with_grbit(grbit)])?;
        match results.first().and_then(SetColumnResult::error) {
            Some(kind) => Err(JetError::native(kind, "JetSetColumns")),
            None => Ok(()),
        }
    }

    /// Applies the update and returns the bookmark of the written record.
    ///
    /// If the engine rejects the record (for example a duplicate key), the
    /// update is cancelled when it is dropped on return.
    pub fn save(mut self) -> JetResult<Vec<u8>> {
        let cursor = self.resource.ensure_usable()?;
        let mut bookmark = vec![0u8; MAX_BOOKMARK_SIZE];
        let mut actual = 0u32;
        let code =
            self.resource
                .api()
                .update(cursor.session, cursor.table, &mut bookmark, &mut actual);
        status::check(code, "JetUpdate")?;
        self.resource.mark_released();
        bookmark.truncate(actual as usize);
        Ok(bookmark)
    }

    /// Cancels the update now.
    pub fn cancel(mut self) {
        self.resource.release();
    }
}

impl Drop for Update<'_> {
    fn drop(&mut self) {
        self.resource.release();
    }
}
