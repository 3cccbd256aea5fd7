//! Fixed-size inline storage.

use core::{cell::UnsafeCell, mem::MaybeUninit, ptr::NonNull};

use crate::{
    object::{ObjectTable, StorageInfo},
    storage::{OwningStorage, Storage},
    util::Erased,
};

/// Alignment of every [`Local`] buffer.
pub const LOCAL_ALIGN: usize = 16;

/// Storage that keeps the object in an inline buffer of `SIZE` bytes.
///
/// Never allocates. Objects larger than `SIZE` bytes or aligned to more than
/// [`LOCAL_ALIGN`] bytes cannot be held: [`Local::new`] rejects them at build
/// time and [`OwningStorage::try_new`] hands them back.
///
/// The buffer is wrapped in an [`UnsafeCell`] because the held object may
/// itself rely on interior mutability.
#[repr(C, align(16))]
pub struct Local<const SIZE: usize> {
    /// The bytes of the held object, starting at offset zero.
    buffer: UnsafeCell<MaybeUninit<[u8; SIZE]>>,
}

impl<const SIZE: usize> Local<SIZE> {
    /// Moves `value` into a new buffer.
    ///
    /// Fails to compile if `T` does not fit.
    #[must_use]
    pub fn new<T: 'static>(value: T) -> Self {
        const {
            assert!(
                size_of::<T>() <= SIZE && align_of::<T>() <= LOCAL_ALIGN,
                "the value does not fit in this local storage"
            );
        }
        let storage = Self::vacant();
        // SAFETY: the assertion above guarantees the buffer is large and
        // aligned enough for `T`
        unsafe { storage.slot().cast::<T>().write(value) };
        storage
    }

    /// A storage holding nothing yet.
    #[inline]
    fn vacant() -> Self {
        Self {
            buffer: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Pointer to the start of the buffer.
    #[inline]
    fn slot(&self) -> NonNull<Erased> {
        NonNull::from(&self.buffer).cast::<Erased>()
    }
}

// SAFETY:
// 1. The object always lives at the start of the buffer.
// 2. The buffer is owned by exactly one `Local`.
// 3. `can_store` checks both size and alignment against the buffer.
unsafe impl<const SIZE: usize> Storage for Local<SIZE> {
    #[inline]
    fn can_store(info: StorageInfo) -> bool {
        info.size() <= SIZE && info.align() <= LOCAL_ALIGN
    }

    unsafe fn clone_from(other: &Self, table: &impl ObjectTable) -> Option<Self> {
        let storage = Self::vacant();
        // SAFETY:
        // 1. `other` holds the described object, guaranteed by the caller
        // 2. The new buffer fits the object because `other` already holds it
        // 3. Guaranteed by the caller
        unsafe { table.copy_construct(storage.slot(), other.slot()) };
        Some(storage)
    }

    unsafe fn move_from(other: &mut Self, table: &impl ObjectTable) -> Self {
        let storage = Self::vacant();
        // SAFETY:
        // 1. `other` holds the described object, guaranteed by the caller
        // 2. The new buffer fits the object because `other` already holds it
        // 3. The caller treats `other` as vacant afterwards
        unsafe { table.relocate(storage.slot(), other.slot()) };
        storage
    }

    unsafe fn swap(
        &mut self,
        this_table: &impl ObjectTable,
        other: &mut Self,
        other_table: &impl ObjectTable,
    ) {
        // Both buffers are the same physical slot kind, so neither object can
        // be relocated into the other buffer while it is still occupied.
        // SAFETY: `self` holds the object described by `this_table`
        let mut scratch = unsafe { Self::move_from(self, this_table) };
        // SAFETY: `other` holds the object described by `other_table`, and
        // `self` is vacant so overwriting it drops nothing
        *self = unsafe { Self::move_from(other, other_table) };
        // SAFETY: `scratch` holds the object described by `this_table`
        *other = unsafe { Self::move_from(&mut scratch, this_table) };
    }

    unsafe fn destruct(&mut self, table: &impl ObjectTable) {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The caller treats the storage as vacant afterwards
        unsafe { table.destruct(self.slot()) }
    }

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        self.slot()
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        Some(self.slot())
    }
}

// SAFETY: `can_store` is checked before the value is written.
unsafe impl<const SIZE: usize> OwningStorage for Local<SIZE> {
    fn try_new<T: 'static>(value: T) -> Result<Self, T> {
        if !Self::can_store(StorageInfo::of::<T>()) {
            return Err(value);
        }
        let storage = Self::vacant();
        // SAFETY: the buffer is large and aligned enough for `T`
        unsafe { storage.slot().cast::<T>().write(value) };
        Ok(storage)
    }
}
