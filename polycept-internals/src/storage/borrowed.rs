//! Non-owning storage.
//!
//! Both types here only store a pointer derived from a Rust reference of
//! lifetime `'a`. They never destroy or free the referenced object, so
//! [`Storage::destruct`] is a no-op. They are constructed from references
//! only, which rules out holding a temporary.

use core::{marker::PhantomData, ptr::NonNull};

use crate::{
    object::{ObjectTable, StorageInfo},
    storage::Storage,
    util::Erased,
};

/// Storage referring to an object behind a shared reference.
///
/// Copies alias the same object. No mutable access is ever granted.
pub struct Borrowed<'a> {
    /// The referenced object.
    ptr: NonNull<Erased>,
    /// Ties the storage to the shared borrow it came from.
    _lifetime: PhantomData<&'a ()>,
}

impl<'a> Borrowed<'a> {
    /// Refers to `value` for the lifetime `'a`.
    #[inline]
    #[must_use]
    pub fn new<T: 'static>(value: &'a T) -> Self {
        Self {
            ptr: NonNull::from(value).cast::<Erased>(),
            _lifetime: PhantomData,
        }
    }
}

/// Storage referring to an object behind a mutable reference.
///
/// Grants mutable access but cannot be copied, since two copies would hand
/// out aliasing mutable pointers.
pub struct BorrowedMut<'a> {
    /// The referenced object.
    ptr: NonNull<Erased>,
    /// Ties the storage to the mutable borrow it came from.
    _lifetime: PhantomData<&'a mut ()>,
}

impl<'a> BorrowedMut<'a> {
    /// Refers to `value` for the lifetime `'a`.
    #[inline]
    #[must_use]
    pub fn new<T: 'static>(value: &'a mut T) -> Self {
        Self {
            ptr: NonNull::from(value).cast::<Erased>(),
            _lifetime: PhantomData,
        }
    }
}

// SAFETY:
// 1. The pointer came from a reference that outlives the storage.
// 2. `get_mut` never returns a pointer.
// 3. References of any layout can be held.
unsafe impl Storage for Borrowed<'_> {
    #[inline]
    fn can_store(_info: StorageInfo) -> bool {
        true
    }

    #[inline]
    unsafe fn clone_from(other: &Self, _table: &impl ObjectTable) -> Option<Self> {
        Some(Self {
            ptr: other.ptr,
            _lifetime: PhantomData,
        })
    }

    #[inline]
    unsafe fn move_from(other: &mut Self, _table: &impl ObjectTable) -> Self {
        Self {
            ptr: other.ptr,
            _lifetime: PhantomData,
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

    #[inline]
    unsafe fn destruct(&mut self, _table: &impl ObjectTable) {}

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        self.ptr
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        None
    }
}

// SAFETY:
// 1. The pointer came from a mutable reference that outlives the storage.
// 2. The storage is the only holder of that mutable reference, since it
//    cannot be copied.
// 3. References of any layout can be held.
unsafe impl Storage for BorrowedMut<'_> {
    #[inline]
    fn can_store(_info: StorageInfo) -> bool {
        true
    }

    #[inline]
    unsafe fn clone_from(_other: &Self, _table: &impl ObjectTable) -> Option<Self> {
        None
    }

    #[inline]
    unsafe fn move_from(other: &mut Self, _table: &impl ObjectTable) -> Self {
        Self {
            ptr: other.ptr,
            _lifetime: PhantomData,
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

    #[inline]
    unsafe fn destruct(&mut self, _table: &impl ObjectTable) {}

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        self.ptr
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        Some(self.ptr)
    }
}
