//! Reference-counted storage.
//!
//! This module encapsulates the `cell` field of [`Shared`]. When it is `Some`,
//! the [`Remote`] inside the [`Arc`] is occupied and every [`Shared`] pointing
//! at that [`Arc`] holds the same object, described by the same table.
//!
//! The object is destroyed when the last [`Shared`] referring to it is
//! destructed. Dropping a [`Shared`] without destructing it only releases its
//! reference, so the object leaks if that was the last one.

use core::ptr::NonNull;

use triomphe::Arc;

use crate::{
    object::{ObjectTable, StorageInfo},
    storage::{OwningStorage, Remote, Storage},
    util::Erased,
};

/// Storage whose copies alias one heap object.
///
/// Copying is O(1) and never consults the table. Because copies observe the
/// same object, [`Storage::get_mut`] only grants access while this is the
/// sole reference; mutation through aliased copies has to go through
/// interior mutability in the held type.
pub struct Shared {
    /// The shared heap object, or `None` once moved from.
    cell: Option<Arc<Remote>>,
}

impl Shared {
    /// Whether this is the only storage referring to the held object.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.cell.as_ref().is_some_and(Arc::is_unique)
    }
}

// SAFETY:
// 1. The `Remote` inside the `Arc` stays occupied until the last reference is
//    destructed.
// 2. `get_mut` goes through `Arc::get_mut`, which fails when other references
//    exist.
// 3. Every layout can be allocated.
unsafe impl Storage for Shared {
    #[inline]
    fn can_store(_info: StorageInfo) -> bool {
        true
    }

    #[inline]
    unsafe fn clone_from(other: &Self, _table: &impl ObjectTable) -> Option<Self> {
        Some(Self {
            cell: other.cell.clone(),
        })
    }

    #[inline]
    unsafe fn move_from(other: &mut Self, _table: &impl ObjectTable) -> Self {
        Self {
            cell: other.cell.take(),
        }
    }

    #[inline]
    unsafe fn swap(
        &mut self,
        _this_table: &impl ObjectTable,
        other: &mut Self,
        _other_table: &impl ObjectTable,
    ) {
        core::mem::swap(&mut self.cell, &mut other.cell);
    }

    unsafe fn destruct(&mut self, table: &impl ObjectTable) {
        if let Some(mut cell) = self.cell.take()
            && let Some(remote) = Arc::get_mut(&mut cell)
        {
            // SAFETY:
            // 1. The remote is occupied and described by `table`, guaranteed
            //    by the caller
            // 2. This was the last reference, nobody can observe the object
            unsafe { remote.destruct(table) }
        }
    }

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        match &self.cell {
            Some(cell) => cell.get(),
            None => panic!("shared storage accessed after being moved from"),
        }
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        Arc::get_mut(self.cell.as_mut()?)?.get_mut()
    }
}

// SAFETY: the value is placed in an occupied `Remote`.
unsafe impl OwningStorage for Shared {
    fn try_new<T: 'static>(value: T) -> Result<Self, T> {
        let remote = Remote::try_new(value)?;
        Ok(Self {
            cell: Some(Arc::new(remote)),
        })
    }
}
