//! Small-buffer-optimized storage.
//!
//! The active branch of [`Sbo`] is recorded by its enum discriminant, which
//! plays the role of the "on heap" flag. Objects land in the inline branch
//! whenever [`Local::can_store`] accepts their footprint, and on the heap
//! otherwise. The branch of an object never changes while it is held, except
//! through [`Storage::swap`], which moves each object into the other storage
//! together with its branch.

use core::ptr::NonNull;

use crate::{
    object::{ObjectTable, StorageInfo},
    storage::{Local, OwningStorage, Remote, Storage},
    util::Erased,
};

/// Storage that keeps small objects inline and spills large ones to the heap.
pub struct Sbo<const SIZE: usize> {
    /// The active branch.
    slot: Slot<SIZE>,
}

/// Where an [`Sbo`] keeps its object.
enum Slot<const SIZE: usize> {
    /// In the inline buffer.
    Local(Local<SIZE>),
    /// On the heap.
    Remote(Remote),
}

impl<const SIZE: usize> Sbo<SIZE> {
    /// Whether the held object lives on the heap.
    #[inline]
    #[must_use]
    pub fn on_heap(&self) -> bool {
        matches!(self.slot, Slot::Remote(_))
    }
}

// SAFETY:
// 1. Both branches uphold the pointer guarantees of their own storage.
// 2. Both branches own their object exclusively.
// 3. The heap branch accepts every layout.
unsafe impl<const SIZE: usize> Storage for Sbo<SIZE> {
    #[inline]
    fn can_store(_info: StorageInfo) -> bool {
        true
    }

    unsafe fn clone_from(other: &Self, table: &impl ObjectTable) -> Option<Self> {
        let slot = match &other.slot {
            // SAFETY: guaranteed by the caller
            Slot::Local(local) => Slot::Local(unsafe { Local::clone_from(local, table) }?),
            // SAFETY: guaranteed by the caller
            Slot::Remote(remote) => Slot::Remote(unsafe { Remote::clone_from(remote, table) }?),
        };
        Some(Self { slot })
    }

    unsafe fn move_from(other: &mut Self, table: &impl ObjectTable) -> Self {
        let slot = match &mut other.slot {
            // SAFETY: guaranteed by the caller
            Slot::Local(local) => Slot::Local(unsafe { Local::move_from(local, table) }),
            // SAFETY: guaranteed by the caller
            Slot::Remote(remote) => Slot::Remote(unsafe { Remote::move_from(remote, table) }),
        };
        Self { slot }
    }

    unsafe fn swap(
        &mut self,
        this_table: &impl ObjectTable,
        other: &mut Self,
        other_table: &impl ObjectTable,
    ) {
        match (&mut self.slot, &mut other.slot) {
            (Slot::Remote(this), Slot::Remote(that)) => {
                // SAFETY: guaranteed by the caller
                unsafe { this.swap(this_table, that, other_table) }
            }
            (Slot::Local(this), Slot::Local(that)) => {
                // SAFETY: guaranteed by the caller
                unsafe { this.swap(this_table, that, other_table) }
            }
            (Slot::Local(this), Slot::Remote(that)) => {
                // SAFETY: `that` holds the object described by `other_table`
                let remote = unsafe { Remote::move_from(that, other_table) };
                // SAFETY: `this` holds the object described by `this_table`
                let local = unsafe { Local::move_from(this, this_table) };
                // Both old slots are vacant, overwriting them drops nothing.
                self.slot = Slot::Remote(remote);
                other.slot = Slot::Local(local);
            }
            (Slot::Remote(_), Slot::Local(_)) => {
                // SAFETY: the same as above with the roles exchanged
                unsafe { other.swap(other_table, self, this_table) }
            }
        }
    }

    unsafe fn destruct(&mut self, table: &impl ObjectTable) {
        match &mut self.slot {
            // SAFETY: guaranteed by the caller
            Slot::Local(local) => unsafe { local.destruct(table) },
            // SAFETY: guaranteed by the caller
            Slot::Remote(remote) => unsafe { remote.destruct(table) },
        }
    }

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        match &self.slot {
            Slot::Local(local) => local.get(),
            Slot::Remote(remote) => remote.get(),
        }
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        match &mut self.slot {
            Slot::Local(local) => local.get_mut(),
            Slot::Remote(remote) => remote.get_mut(),
        }
    }
}

// SAFETY: delegates to the branch that accepts the value.
unsafe impl<const SIZE: usize> OwningStorage for Sbo<SIZE> {
    fn try_new<T: 'static>(value: T) -> Result<Self, T> {
        let slot = match Local::try_new(value) {
            Ok(local) => Slot::Local(local),
            Err(value) => Slot::Remote(Remote::try_new(value)?),
        };
        Ok(Self { slot })
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use core::{cell::Cell, fmt::Debug};

    use super::*;
    use crate::storage::testing::{Tracked, TypedTable, read};

    fn sbo<T: 'static>(value: T) -> Sbo<16> {
        match Sbo::try_new(value) {
            Ok(storage) => storage,
            Err(_) => unreachable!(),
        }
    }

    #[test]
    fn test_sbo_picks_branch() {
        assert!(!sbo(1u32).on_heap());
        assert!(!sbo([7u64; 2]).on_heap());
        assert!(sbo([7u64; 3]).on_heap());
    }

    fn swap_twice<A, B>(a: A, b: B)
    where
        A: Clone + PartialEq + Debug + 'static,
        B: Clone + PartialEq + Debug + 'static,
    {
        let a_table = TypedTable::<A>::new();
        let b_table = TypedTable::<B>::new();
        let mut left = sbo(a.clone());
        let mut right = sbo(b.clone());
        let (left_heap, right_heap) = (left.on_heap(), right.on_heap());

        // SAFETY: the tables describe the held objects
        unsafe { left.swap(&a_table, &mut right, &b_table) };
        assert_eq!(left.on_heap(), right_heap);
        assert_eq!(right.on_heap(), left_heap);
        assert_eq!(read::<B>(&left), b);
        assert_eq!(read::<A>(&right), a);

        // SAFETY: the tables were exchanged along with the objects
        unsafe { left.swap(&b_table, &mut right, &a_table) };
        assert_eq!(left.on_heap(), left_heap);
        assert_eq!(right.on_heap(), right_heap);
        assert_eq!(read::<A>(&left), a);
        assert_eq!(read::<B>(&right), b);

        // SAFETY: the tables describe the held objects
        unsafe { left.destruct(&a_table) };
        // SAFETY: see above
        unsafe { right.destruct(&b_table) };
    }

    #[test]
    fn test_sbo_swap_local_local() {
        swap_twice(1u32, 2usize);
    }

    #[test]
    fn test_sbo_swap_local_heap() {
        swap_twice(1u32, [2u64; 8]);
    }

    #[test]
    fn test_sbo_swap_heap_local() {
        swap_twice([1u64; 8], 2u16);
    }

    #[test]
    fn test_sbo_swap_heap_heap() {
        swap_twice([1u64; 8], [2u32; 16]);
    }

    #[test]
    fn test_sbo_heap_clone_and_destruct() {
        let drops = Rc::new(Cell::new(0));
        let table = TypedTable::<(Tracked, [u64; 4])>::new();
        let mut original = sbo((Tracked::new(9, &drops), [0u64; 4]));
        assert!(original.on_heap());
        // SAFETY: the storage holds the described tuple
        let mut copy = unsafe { Sbo::clone_from(&original, &table) }.unwrap();
        assert!(copy.on_heap());
        assert_ne!(original.get(), copy.get());
        // SAFETY: both storages hold the described tuple
        unsafe { original.destruct(&table) };
        // SAFETY: see above
        unsafe { copy.destruct(&table) };
        assert_eq!(drops.get(), 2);
    }
}
