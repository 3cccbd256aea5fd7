//! Two-level fallback storage.
//!
//! [`Fallback`] is an enum, so the primary and secondary storages share one
//! slot and the discriminant records which branch is active. An object is
//! placed in the primary branch whenever the primary storage accepts it.

use core::ptr::NonNull;

use crate::{
    object::{ObjectTable, StorageInfo},
    storage::{OwningStorage, Storage},
    util::Erased,
};

/// Storage that uses `Primary` when it can hold the object and `Secondary`
/// otherwise.
///
/// [`Sbo`](crate::storage::Sbo) behaves like `Fallback<Local<N>, Remote>`;
/// this combinator generalizes it to any pair of storages.
pub enum Fallback<Primary, Secondary> {
    /// The object lives in the primary storage.
    Primary(Primary),
    /// The object lives in the secondary storage.
    Secondary(Secondary),
}

impl<P, S> Fallback<P, S> {
    /// Whether the object lives in the primary storage.
    #[inline]
    #[must_use]
    pub fn in_primary(&self) -> bool {
        matches!(self, Self::Primary(_))
    }
}

// SAFETY:
// 1. Both branches uphold the pointer guarantees of their own storage.
// 2. `get_mut` defers to the active branch.
// 3. `can_store` accepts exactly what either branch accepts.
unsafe impl<P: Storage, S: Storage> Storage for Fallback<P, S> {
    #[inline]
    fn can_store(info: StorageInfo) -> bool {
        P::can_store(info) || S::can_store(info)
    }

    unsafe fn clone_from(other: &Self, table: &impl ObjectTable) -> Option<Self> {
        Some(match other {
            // SAFETY: guaranteed by the caller
            Self::Primary(primary) => Self::Primary(unsafe { P::clone_from(primary, table) }?),
            Self::Secondary(secondary) => {
                // SAFETY: guaranteed by the caller
                Self::Secondary(unsafe { S::clone_from(secondary, table) }?)
            }
        })
    }

    unsafe fn move_from(other: &mut Self, table: &impl ObjectTable) -> Self {
        match other {
            // SAFETY: guaranteed by the caller
            Self::Primary(primary) => Self::Primary(unsafe { P::move_from(primary, table) }),
            Self::Secondary(secondary) => {
                // SAFETY: guaranteed by the caller
                Self::Secondary(unsafe { S::move_from(secondary, table) })
            }
        }
    }

    unsafe fn swap(
        &mut self,
        this_table: &impl ObjectTable,
        other: &mut Self,
        other_table: &impl ObjectTable,
    ) {
        match (&mut *self, &mut *other) {
            (Self::Primary(this), Self::Primary(that)) => {
                // SAFETY: guaranteed by the caller
                unsafe { this.swap(this_table, that, other_table) }
            }
            (Self::Secondary(this), Self::Secondary(that)) => {
                // SAFETY: guaranteed by the caller
                unsafe { this.swap(this_table, that, other_table) }
            }
            (Self::Primary(this), Self::Secondary(that)) => {
                // The branches overlap in memory, so each object is first
                // relocated into a scratch storage of its own kind.
                // SAFETY: `this` holds the object described by `this_table`
                let primary = unsafe { P::move_from(this, this_table) };
                // SAFETY: `that` holds the object described by `other_table`
                let secondary = unsafe { S::move_from(that, other_table) };
                *self = Self::Secondary(secondary);
                *other = Self::Primary(primary);
            }
            (Self::Secondary(_), Self::Primary(_)) => {
                // SAFETY: the same as above with the roles exchanged
                unsafe { other.swap(other_table, self, this_table) }
            }
        }
    }

    unsafe fn destruct(&mut self, table: &impl ObjectTable) {
        match self {
            // SAFETY: guaranteed by the caller
            Self::Primary(primary) => unsafe { primary.destruct(table) },
            // SAFETY: guaranteed by the caller
            Self::Secondary(secondary) => unsafe { secondary.destruct(table) },
        }
    }

    #[inline]
    fn get(&self) -> NonNull<Erased> {
        match self {
            Self::Primary(primary) => primary.get(),
            Self::Secondary(secondary) => secondary.get(),
        }
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<Erased>> {
        match self {
            Self::Primary(primary) => primary.get_mut(),
            Self::Secondary(secondary) => secondary.get_mut(),
        }
    }
}

// SAFETY: delegates to the branch that accepts the value.
unsafe impl<P: OwningStorage, S: OwningStorage> OwningStorage for Fallback<P, S> {
    fn try_new<T: 'static>(value: T) -> Result<Self, T> {
        match P::try_new(value) {
            Ok(primary) => Ok(Self::Primary(primary)),
            Err(value) => S::try_new(value).map(Self::Secondary),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, string::String};
    use core::cell::Cell;

    use super::*;
    use crate::storage::{
        Local, Remote,
        testing::{Tracked, TypedTable, read, tracked_value},
    };

    type Storage16 = Fallback<Local<16>, Remote>;

    fn store<T: 'static>(value: T) -> Storage16 {
        match Storage16::try_new(value) {
            Ok(storage) => storage,
            Err(_) => unreachable!(),
        }
    }

    #[test]
    fn test_fallback_branches() {
        assert!(store(1u64).in_primary());
        assert!(!store([1u64; 4]).in_primary());
        assert!(Storage16::can_store(StorageInfo::of::<[u64; 64]>()));
        assert!(!Fallback::<Local<8>, Local<16>>::can_store(StorageInfo::of::<[u64; 3]>()));
    }

    #[test]
    fn test_fallback_rejects_when_both_branches_do() {
        let result = Fallback::<Local<8>, Local<16>>::try_new([5u64; 3]);
        assert!(matches!(result, Err([5, 5, 5])));
    }

    #[test]
    fn test_fallback_swap_across_branches() {
        let drops = Rc::new(Cell::new(0));
        let small = TypedTable::<Tracked>::new();
        let large = TypedTable::<(String, [u64; 4])>::new();
        let mut left = store(Tracked::new(11, &drops));
        let mut right = store((String::from("big"), [1u64; 4]));
        assert!(left.in_primary());
        assert!(!right.in_primary());

        // SAFETY: the tables describe the held objects
        unsafe { left.swap(&small, &mut right, &large) };
        assert!(!left.in_primary());
        assert!(right.in_primary());
        assert_eq!(read::<(String, [u64; 4])>(&left).0, "big");
        assert_eq!(tracked_value(&right), 11);

        // SAFETY: the tables were exchanged along with the objects
        unsafe { left.swap(&large, &mut right, &small) };
        assert!(left.in_primary());
        assert_eq!(tracked_value(&left), 11);
        assert_eq!(read::<(String, [u64; 4])>(&right).0, "big");

        assert_eq!(drops.get(), 0);
        // SAFETY: the tables describe the held objects
        unsafe { left.destruct(&small) };
        // SAFETY: see above
        unsafe { right.destruct(&large) };
        assert_eq!(drops.get(), 1);
    }
}
