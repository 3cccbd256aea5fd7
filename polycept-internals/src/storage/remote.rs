//! Heap storage.
//!
//! This module encapsulates the `ptr` field of [`Remote`]. When it is `Some`,
//! the pointer was produced by [`allocate`] with the layout of the held object
//! and points at that initialized object.
//!
//! Moving out of a [`Remote`] steals the pointer and leaves `None` behind, so
//! destructing a moved-from [`Remote`] is a no-op.

use alloc::alloc::{alloc, dealloc, handle_alloc_error};
use core::ptr::{self, NonNull};

use crate::{
    object::{ObjectTable, StorageInfo},
    storage::{OwningStorage, Storage},
    util::Erased,
};

/// Storage that keeps every object in its own heap allocation.
///
/// The allocation is exactly as large as the held type. Swapping two
/// [`Remote`] storages exchanges the pointers, independently of the types
/// they hold.
///
/// Allocation failure is fatal and reported through
/// [`handle_alloc_error`].
pub struct Remote {
    /// The allocation holding the object, or `None` once moved from.
    ptr: Option<NonNull<Erased>>,
}

impl Remote {
    /// Whether the storage currently holds an object.
    #[inline]
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.ptr.is_some()
    }
}

/// Allocates uninitialized memory for an object with the given footprint.
///
/// Zero-sized objects get a dangling, suitably aligned pointer.
fn allocate(info: StorageInfo) -> NonNull<Erased> {
    let layout = info.layout();
    if layout.size() == 0 {
        let dangling = ptr::without_provenance_mut::<Erased>(layout.align());
        // SAFETY: alignments are never zero
        return unsafe { NonNull::new_unchecked(dangling) };
    }
    // SAFETY: the layout has a non-zero size
    let raw = unsafe { alloc(layout) };
    match NonNull::new(raw) {
        Some(ptr) => ptr.cast::<Erased>(),
        None => handle_alloc_error(layout),
    }
}

/// Releases memory obtained from [`allocate`].
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `ptr` was returned by [`allocate`] for the same `info`.
/// 2. The memory is not used afterwards.
unsafe fn deallocate(ptr: NonNull<Erased>, info: StorageInfo) {
    let layout = info.layout();
    if layout.size() != 0 {
        // SAFETY:
        // 1. The pointer came from `alloc` with this layout
        // 2. Guaranteed by the caller
        unsafe { dealloc(ptr.cast::<u8>().as_ptr(), layout) }
    }
}

// SAFETY:
// 1. `ptr` points at the held object for as long as it is `Some`.
// 2. The allocation is owned by exactly one `Remote`.
// 3. Every layout can be allocated.
unsafe impl Storage for Remote {
    #[inline]
    fn can_store(_info: StorageInfo) -> bool {
        true
    }

    unsafe fn clone_from(other: &Self, table: &impl ObjectTable) -> Option<Self> {
        let destination = allocate(table.storage_info());
        // SAFETY:
        // 1. `other` is occupied, guaranteed by the caller
        // 2. `destination` is a fresh allocation for the described type
        // 3. Guaranteed by the caller
        unsafe { table.copy_construct(destination, other.get()) };
        Some(Self {
            ptr: Some(destination),
        })
    }

    #[inline]
    unsafe fn move_from(other: &mut Self, _table: &impl ObjectTable) -> Self {
        Self {
            ptr: other.ptr.take(),
        }
    }

    #[inline]
    unsafe fn swap(
        &mut self,
        _this_table: &impl ObjectTable,
        other: &mut Self,
        _other_table: &impl ObjectTable,
    ) {
        core::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    unsafe fn destruct(&mut self, table: &impl ObjectTable) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY:
            // 1. The pointer refers to the held object
            // 2. The pointer was taken out of `self`, so it is never used again
            unsafe { table.destruct(ptr) };
            // SAFETY:
            // 1. The memory came from `allocate` with the layout of the object,
            //    which `table` reports
            // 2. The pointer was taken out of `self`
            unsafe { deallocate(ptr, table.storage_info()) };
        }
    }

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        match self.ptr {
            Some(ptr) => ptr,
            None => panic!("remote storage accessed after being moved from"),
        }
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        self.ptr
    }
}

// SAFETY: the allocation is sized and aligned for `T`, which is then written
// into it.
unsafe impl OwningStorage for Remote {
    fn try_new<T: 'static>(value: T) -> Result<Self, T> {
        let ptr = allocate(StorageInfo::of::<T>());
        // SAFETY: `ptr` is valid for writes of `T`
        unsafe { ptr.cast::<T>().write(value) };
        Ok(Self { ptr: Some(ptr) })
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, string::String};
    use core::cell::Cell;

    use super::*;
    use crate::storage::testing::{Tracked, TypedTable, read, tracked_value};

    #[test]
    fn test_remote_size() {
        assert_eq!(
            core::mem::size_of::<Remote>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_remote_roundtrip_and_destruct() {
        let drops = Rc::new(Cell::new(0));
        let table = TypedTable::<Tracked>::new();
        let Ok(mut storage) = Remote::try_new(Tracked::new(7, &drops)) else {
            unreachable!()
        };
        assert_eq!(tracked_value(&storage), 7);
        // SAFETY: the storage holds a `Tracked`
        unsafe { storage.destruct(&table) };
        assert_eq!(drops.get(), 1);
        assert!(!storage.is_occupied());
    }

    #[test]
    fn test_remote_move_nulls_source() {
        let drops = Rc::new(Cell::new(0));
        let table = TypedTable::<Tracked>::new();
        let Ok(mut source) = Remote::try_new(Tracked::new(1, &drops)) else {
            unreachable!()
        };
        // SAFETY: the storage holds a `Tracked`
        let mut target = unsafe { Remote::move_from(&mut source, &table) };
        assert!(!source.is_occupied());
        // Destructing the moved-from side must not touch the object.
        // SAFETY: a vacant remote storage ignores the table
        unsafe { source.destruct(&table) };
        assert_eq!(drops.get(), 0);
        // SAFETY: the storage holds a `Tracked`
        unsafe { target.destruct(&table) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_remote_clone_is_independent() {
        let table = TypedTable::<String>::new();
        let Ok(mut original) = Remote::try_new(String::from("left")) else {
            unreachable!()
        };
        // SAFETY: the storage holds a `String`
        let mut copy = unsafe { Remote::clone_from(&original, &table) }.unwrap();
        assert_ne!(original.get(), copy.get());

        let target = copy.get_mut().unwrap().cast::<String>();
        // SAFETY: `copy` holds a `String` and nothing else observes it
        unsafe { (*target.as_ptr()).push_str("-changed") };
        assert_eq!(read::<String>(&original), "left");
        assert_eq!(read::<String>(&copy), "left-changed");

        // SAFETY: both storages hold a `String`
        unsafe { original.destruct(&table) };
        // SAFETY: see above
        unsafe { copy.destruct(&table) };
    }

    #[test]
    fn test_remote_swap_different_types() {
        let left_table = TypedTable::<u8>::new();
        let right_table = TypedTable::<String>::new();
        let Ok(mut left) = Remote::try_new(3u8) else {
            unreachable!()
        };
        let Ok(mut right) = Remote::try_new(String::from("three")) else {
            unreachable!()
        };
        let (left_ptr, right_ptr) = (left.get(), right.get());
        // SAFETY: the tables describe the held objects
        unsafe { left.swap(&left_table, &mut right, &right_table) };
        assert_eq!(left.get(), right_ptr);
        assert_eq!(right.get(), left_ptr);
        assert_eq!(read::<String>(&left), "three");
        assert_eq!(read::<u8>(&right), 3);

        // SAFETY: the tables were swapped along with the objects
        unsafe { left.destruct(&right_table) };
        // SAFETY: see above
        unsafe { right.destruct(&left_table) };
    }

    #[test]
    fn test_remote_zero_sized() {
        let table = TypedTable::<()>::new();
        let Ok(mut storage) = Remote::try_new(()) else {
            unreachable!()
        };
        assert!(storage.is_occupied());
        // SAFETY: the storage holds a `()`
        unsafe { storage.destruct(&table) };
    }

    #[test]
    fn test_remote_not_send_sync() {
        static_assertions::assert_not_impl_any!(Remote: Send, Sync);
    }
}
