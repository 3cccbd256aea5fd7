//! Operation maps: the functions implementing an interface for one type.
//!
//! An [`OperationMap<T>`] binds operation names to plain function pointers
//! implementing them for `T`. Maps may be partial; completion fills in the
//! rest from registered maps, defaults and refined concepts.
//!
//! ```
//! use polycept::prelude::*;
//!
//! polycept::signature! {
//!     pub struct Len = fn(&Self) -> usize;
//! }
//!
//! static LEN: Operation<Len> = Operation::new("len");
//!
//! fn len(bytes: &Vec<u8>) -> usize {
//!     bytes.len()
//! }
//!
//! let map = OperationMap::<Vec<u8>>::new()
//!     .with(&LEN, len)
//!     .with_clone();
//! assert_eq!(map.names().collect::<Vec<_>>(), ["len", "copy_construct"]);
//! ```

use alloc::vec::Vec;
use core::{any::TypeId, fmt, marker::PhantomData};

use indexmap::IndexMap;
use polycept_internals::ErasedFn;
use rustc_hash::FxBuildHasher;

use crate::{
    builtin,
    signature::{Operation, Signature, erase},
};

#[derive(Copy, Clone)]
pub(crate) struct Entry {
    pub(crate) signature: TypeId,
    pub(crate) signature_name: &'static str,
    pub(crate) function: ErasedFn,
    /// Set only for the lifecycle functions of [`builtin`], which are the
    /// only functions allowed in the lifecycle slots.
    pub(crate) lifecycle: bool,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && core::ptr::fn_addr_eq(self.function, other.function)
    }
}

/// Functions implementing named operations for the concrete type `T`.
pub struct OperationMap<T> {
    entries: IndexMap<&'static str, Entry, FxBuildHasher>,
    duplicates: Vec<&'static str>,
    _type: PhantomData<fn(&T)>,
}

impl<T: 'static> OperationMap<T> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::with_hasher(FxBuildHasher),
            duplicates: Vec::new(),
            _type: PhantomData,
        }
    }

    /// Binds `function` to `operation`.
    ///
    /// Binding a name twice is reported as
    /// [`ErasureError::DuplicateEntry`](crate::ErasureError::DuplicateEntry)
    /// when the map is completed or registered; the first binding is kept.
    ///
    /// The lifecycle operations of [`Erasable`](crate::builtin::Erasable),
    /// such as `destruct` or `type_id`, are always derived from `T` and
    /// cannot be bound by hand: completion and registration report
    /// [`ErasureError::ReservedOperation`](crate::ErasureError::ReservedOperation).
    #[must_use]
    pub fn with<S: Signature>(self, operation: &Operation<S>, function: S::Fn<T>) -> Self {
        self.bind(operation, function, false)
    }

    /// Binds one of the lifecycle functions of [`builtin`].
    pub(crate) fn with_lifecycle<S: Signature>(
        self,
        operation: &Operation<S>,
        function: S::Fn<T>,
    ) -> Self {
        self.bind(operation, function, true)
    }

    fn bind<S: Signature>(
        mut self,
        operation: &Operation<S>,
        function: S::Fn<T>,
        lifecycle: bool,
    ) -> Self {
        let entry = Entry {
            signature: TypeId::of::<S>(),
            signature_name: core::any::type_name::<S>(),
            function: erase::<S, T>(function),
            lifecycle,
        };
        if self.entries.contains_key(operation.name()) {
            self.duplicates.push(operation.name());
        } else {
            self.entries.insert(operation.name(), entry);
        }
        self
    }

    /// Binds `copy_construct` to the [`Clone`] impl of `T`.
    #[must_use]
    pub fn with_clone(self) -> Self
    where
        T: Clone,
    {
        self.with(&builtin::COPY_CONSTRUCT, builtin::copy_construct::<T>)
    }

    /// Binds `equal` to the [`PartialEq`] impl of `T`.
    #[must_use]
    pub fn with_equality(self) -> Self
    where
        T: PartialEq,
    {
        self.with(&builtin::EQUAL, builtin::equal::<T>)
    }

    /// The bound names, in insertion order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Whether a function is bound to `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&'static str, &Entry)> + '_ {
        self.entries.iter().map(|(name, entry)| (*name, entry))
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub(crate) fn first_duplicate(&self) -> Option<&'static str> {
        self.duplicates.first().copied()
    }

    /// Adds every entry of `other` whose name is not bound yet.
    pub(crate) fn merge_missing(&mut self, other: &Self) {
        for (name, entry) in &other.entries {
            self.entries.entry(*name).or_insert(*entry);
        }
    }

    /// Rebuilds the map with exactly `names`, in that order.
    ///
    /// Names without an entry are skipped.
    pub(crate) fn reordered<'n>(&self, names: impl Iterator<Item = &'n str>) -> Self {
        let mut map = Self::new();
        for name in names {
            if let Some((_, key, entry)) = self.entries.get_full(name) {
                map.entries.insert(key, *entry);
            }
        }
        map
    }

    /// Identifies the bound functions, for memoizing completed maps.
    pub(crate) fn fingerprint(&self) -> Vec<(&'static str, usize)> {
        self.entries
            .iter()
            .map(|(name, entry)| (*name, entry.function as usize))
            .collect()
    }
}

impl<T: 'static> Default for OperationMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for OperationMap<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            duplicates: self.duplicates.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> PartialEq for OperationMap<T> {
    /// Maps are equal when they bind the same names to the same functions,
    /// regardless of order.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(name, entry)| other.entries.get(name) == Some(entry))
    }
}

impl<T> fmt::Debug for OperationMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(name, entry)| (name, entry.signature_name)),
            )
            .finish()
    }
}
