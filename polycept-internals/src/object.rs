//! Lifecycle contract between storages and dispatch tables.
//!
//! A storage holds the bytes of an object whose type it has forgotten. To
//! copy, relocate or destroy that object it asks an [`ObjectTable`], which is
//! implemented by the dispatch tables of the root crate.
//!
//! # Safety Invariant
//!
//! An [`ObjectTable`] passed to a storage operation must describe the object
//! that storage currently holds. Implementations in turn promise that every
//! method behaves exactly like the corresponding operation of one concrete
//! type, and that [`ObjectTable::storage_info`] reports that type's layout.

use core::{alloc::Layout, ptr::NonNull};

use crate::util::Erased;

/// Size and alignment of a concrete type.
///
/// This is what the builtin `Storable` operation reports, and what every
/// storage consults when it needs to allocate room for an object it cannot
/// name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageInfo(
    /// The layout of the described type.
    Layout,
);

impl StorageInfo {
    /// Returns the storage requirements of `T`.
    #[inline]
    #[must_use]
    pub const fn of<T>() -> Self {
        Self(Layout::new::<T>())
    }

    /// Size of the object in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        self.0.size()
    }

    /// Required alignment of the object in bytes.
    #[inline]
    #[must_use]
    pub const fn align(self) -> usize {
        self.0.align()
    }

    /// The allocation layout for the object.
    #[inline]
    #[must_use]
    pub const fn layout(self) -> Layout {
        self.0
    }
}

/// Type-erased lifecycle operations for a single concrete type.
///
/// # Safety
///
/// Implementors must guarantee that all four operations act on one and the
/// same concrete type `T`, and that [`storage_info`](Self::storage_info)
/// returns [`StorageInfo::of::<T>`](StorageInfo::of).
pub unsafe trait ObjectTable {
    /// Size and alignment of the described type.
    fn storage_info(&self) -> StorageInfo;

    /// Runs the destructor of the object at `object`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `object` points to an initialized object of the described type.
    /// 2. The object is not used again after this call, other than having its
    ///    memory released or overwritten.
    unsafe fn destruct(&self, object: NonNull<Erased>);

    /// Moves the object at `source` into the uninitialized memory at
    /// `destination`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `source` points to an initialized object of the described type.
    /// 2. `destination` is valid for writes of the described type and does
    ///    not overlap `source`.
    /// 3. After the call the memory at `source` is treated as uninitialized:
    ///    it is never destructed nor read as an object again.
    unsafe fn relocate(&self, destination: NonNull<Erased>, source: NonNull<Erased>);

    /// Constructs a copy of the object at `source` in the uninitialized memory
    /// at `destination`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `source` points to an initialized object of the described type.
    /// 2. `destination` is valid for writes of the described type and does
    ///    not overlap `source`.
    /// 3. The table supports copying. Tables built for types without a copy
    ///    operation panic here.
    unsafe fn copy_construct(&self, destination: NonNull<Erased>, source: NonNull<Erased>);
}
