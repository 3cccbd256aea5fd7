//! Physical placement strategies for erased objects.
//!
//! Every storage owns (or refers to) the bytes of exactly one object whose
//! concrete type it does not know. Anything that depends on that type is
//! delegated to an [`ObjectTable`] supplied by the caller.
//!
//! # Lifecycle
//!
//! A storage goes through the following states:
//!
//! - **occupied**: created by [`OwningStorage::try_new`], [`Storage::clone_from`]
//!   or [`Storage::move_from`]. [`Storage::get`] points at a live object.
//! - **vacant**: the source of a [`Storage::move_from`] call, or a storage
//!   after [`Storage::destruct`]. A vacant storage must not be destructed,
//!   read or swapped again. It may be dropped or overwritten.
//!
//! Storages have no drop glue that touches the held object. Dropping an
//! occupied storage without calling [`Storage::destruct`] leaks the object;
//! it never runs a destructor with the wrong type.
//!
//! # Moves and swaps
//!
//! Relocations always go through [`ObjectTable::relocate`]. Swaps between
//! storages holding objects of different types, or living in different
//! physical branches, are performed as a sequence of relocations through a
//! scratch storage of the same kind, so that every object is relocated into
//! vacant memory and destructed exactly once over its lifetime.

mod borrowed;
mod fallback;
mod local;
mod remote;
mod sbo;
mod shared;

use core::ptr::NonNull;

pub use self::{
    borrowed::{Borrowed, BorrowedMut},
    fallback::Fallback,
    local::Local,
    remote::Remote,
    sbo::Sbo,
    shared::Shared,
};
use crate::{
    object::{ObjectTable, StorageInfo},
    util::Erased,
};

/// Common contract of every storage variant.
///
/// # Safety
///
/// Implementors must guarantee:
///
/// 1. While the storage is occupied, [`get`](Self::get) points at the held
///    object, suitably aligned for its type, and stays valid until the storage
///    is destructed, moved from or swapped.
/// 2. [`get_mut`](Self::get_mut) only returns a pointer when no other storage
///    can observe the held object.
/// 3. [`can_store`](Self::can_store) returns `true` only for layouts the
///    storage is able to hold.
pub unsafe trait Storage: Sized {
    /// Whether this storage kind can hold an object with the given footprint.
    fn can_store(info: StorageInfo) -> bool;

    /// Creates a new storage holding a copy of the object in `other`.
    ///
    /// Returns `None` if this storage kind cannot hold two independent values
    /// of the same object, as is the case for [`BorrowedMut`].
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `other` is occupied.
    /// 2. `table` describes the object held by `other`.
    unsafe fn clone_from(other: &Self, table: &impl ObjectTable) -> Option<Self>;

    /// Creates a new storage by relocating the object out of `other`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `other` is occupied.
    /// 2. `table` describes the object held by `other`.
    /// 3. `other` is treated as vacant afterwards.
    unsafe fn move_from(other: &mut Self, table: &impl ObjectTable) -> Self;

    /// Exchanges the objects held by `self` and `other`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both storages are occupied.
    /// 2. `this_table` describes the object held by `self` and `other_table`
    ///    describes the object held by `other`.
    /// 3. The caller swaps the two tables as well, so that each table keeps
    ///    describing the object it was paired with.
    unsafe fn swap(
        &mut self,
        this_table: &impl ObjectTable,
        other: &mut Self,
        other_table: &impl ObjectTable,
    );

    /// Ends the lifetime of the held object, or of this storage's claim on it.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The storage is occupied.
    /// 2. `table` describes the held object.
    /// 3. The storage is treated as vacant afterwards.
    unsafe fn destruct(&mut self, table: &impl ObjectTable);

    /// Pointer to the held object.
    ///
    /// # Panics
    ///
    /// May panic if the storage is vacant.
    fn get(&self) -> NonNull<Erased>;

    /// Pointer to the held object, if this storage grants exclusive access.
    fn get_mut(&mut self) -> Option<NonNull<Erased>>;
}

/// A storage that can take ownership of a value.
///
/// # Safety
///
/// On success, [`try_new`](Self::try_new) must return an occupied storage
/// holding `value`, and must not succeed for values whose layout fails
/// [`Storage::can_store`].
pub unsafe trait OwningStorage: Storage {
    /// Moves `value` into a new storage.
    ///
    /// # Errors
    ///
    /// Hands `value` back if it does not fit this storage kind.
    fn try_new<T: 'static>(value: T) -> Result<Self, T>;
}
