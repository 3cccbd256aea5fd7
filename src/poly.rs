//! The polymorphic value.
//!
//! A [`Poly`] pairs one [`Storage`] with one [`DispatchTable`] and keeps them
//! describing the same concrete object for its whole lifetime. Copies copy the
//! table first and then the storage through it, swaps relocate through both
//! sides' tables and then exchange the tables, and dropping destructs the
//! storage with its table.
//!
//! ```
//! use core::ops::Range;
//!
//! use polycept::prelude::*;
//!
//! polycept::signature! {
//!     pub struct Next = fn(&mut Self) -> Option<u32>;
//! }
//!
//! static NEXT: Operation<Next> = Operation::new("next");
//!
//! struct Iterate;
//!
//! impl Concept for Iterate {
//!     type Refines = ();
//!
//!     fn clauses(clauses: &mut Clauses) {
//!         clauses.declare(&NEXT);
//!     }
//! }
//!
//! fn next(range: &mut Range<u32>) -> Option<u32> {
//!     range.next()
//! }
//!
//! let map = OperationMap::<Range<u32>>::new().with(&NEXT, next);
//! let mut poly = Poly::<Iterate>::with_map(1..5, map).unwrap();
//!
//! let next = poly.method(&NEXT);
//! let mut values = Vec::new();
//! while let Some(value) = Next::call(next, &mut poly) {
//!     values.push(value);
//! }
//! assert_eq!(values, [1, 2, 3, 4]);
//! ```

use core::{any::TypeId, marker::PhantomData, ptr::NonNull};

use polycept_internals::{
    Erased, ErasedFn, ObjectTable, StorageInfo,
    storage::{Borrowed, BorrowedMut, OwningStorage, Remote, Storage},
};
use rootcause::{Report, report};

use crate::{
    builtin::{
        self, CopyConstruct, DESTRUCT_INDEX, Destruct, Erasable, MOVE_CONSTRUCT_INDEX,
        MoveConstruct, STORAGE_INFO_INDEX, StorageInfoOf,
    },
    concept::Concept,
    error::ErasureError,
    layout::{Indirect, Layout},
    map::OperationMap,
    method::{Method, Receiver, sealed},
    signature::{Operation, Signature, restore},
    table::DispatchTable,
};

/// The lifecycle view of a dispatch table handed to storages.
struct Dispatch<'t, C, L: Layout> {
    table: &'t DispatchTable<Erasable<C>, L>,
    copy: Option<ErasedFn>,
}

impl<'t, C, L: Layout> Dispatch<'t, C, L> {
    fn new(table: &'t DispatchTable<Erasable<C>, L>) -> Self {
        Self { table, copy: None }
    }

    fn builtin<S: Signature>(&self, index: usize) -> S::Fn<Erased> {
        let Some(function) = self.table.slot(index) else {
            panic!(
                "dispatch table of {} is missing builtin operation #{index}",
                self.table.type_name()
            );
        };
        // SAFETY: every `Erasable` closure starts with the builtin operations
        // at fixed indices, and completion checked the signature of each slot
        unsafe { restore::<S>(function) }
    }
}

// SAFETY: every slot of the table was bound for the concrete type the table
// was built for, and `storage_info` is the builtin default of that type.
unsafe impl<C, L: Layout> ObjectTable for Dispatch<'_, C, L> {
    fn storage_info(&self) -> StorageInfo {
        self.builtin::<StorageInfoOf>(STORAGE_INFO_INDEX)()
    }

    unsafe fn destruct(&self, object: NonNull<Erased>) {
        let destruct = self.builtin::<Destruct>(DESTRUCT_INDEX);
        // SAFETY: guaranteed by the caller
        unsafe { destruct(object.as_ptr()) }
    }

    unsafe fn relocate(&self, destination: NonNull<Erased>, source: NonNull<Erased>) {
        let relocate = self.builtin::<MoveConstruct>(MOVE_CONSTRUCT_INDEX);
        // SAFETY: guaranteed by the caller
        unsafe { relocate(destination.as_ptr(), source.as_ptr()) }
    }

    unsafe fn copy_construct(&self, destination: NonNull<Erased>, source: NonNull<Erased>) {
        let Some(function) = self.copy else {
            panic!("{} has no copy_construct operation", self.table.type_name());
        };
        // SAFETY: `copy` is only set from the slot `copy_construct` resolves
        // to, which `Interface::lookup` checked against `CopyConstruct`
        let copy = unsafe { restore::<CopyConstruct>(function) };
        // SAFETY: guaranteed by the caller
        unsafe { copy(destination.as_ptr(), source.as_ptr().cast_const()) }
    }
}

/// A type-erased value modeling the concept `C`.
///
/// The held object lives in storage `St` and dispatches through a table laid
/// out by `L`. Both are chosen per use site:
///
/// ```
/// use polycept::{
///     layout::{Indirect, Inline, Joined, Only},
///     prelude::*,
///     storage::{Local, Sbo},
/// };
///
/// struct Marker;
///
/// impl Concept for Marker {
///     type Refines = ();
///
///     fn clauses(_clauses: &mut Clauses) {}
/// }
///
/// polycept::names! {
///     struct Hot = ["type_id"];
/// }
///
/// let heap = Poly::<Marker>::new(7_u8).unwrap();
/// let local = Poly::<Marker, Local<16>, Inline<5>>::new(7_u8).unwrap();
/// let split = Poly::<Marker, Sbo<16>, Joined<Inline<1, Only<Hot>>, Indirect>>::new(7_u8).unwrap();
///
/// assert!(heap.is::<u8>() && local.is::<u8>() && split.is::<u8>());
/// ```
///
/// `Poly` is neither [`Send`] nor [`Sync`]: the held type is unknown.
pub struct Poly<C: Concept, St: Storage = Remote, L: Layout = Indirect> {
    table: DispatchTable<Erasable<C>, L>,
    storage: St,
    _not_send: PhantomData<*const ()>,
}

impl<C: Concept, St: OwningStorage, L: Layout> Poly<C, St, L> {
    /// Erases `value`, completing its operations from the registered maps.
    ///
    /// # Errors
    ///
    /// - Any error of [`complete`](crate::complete), for the interface
    ///   `Erasable<C>`.
    /// - Any layout error of `L`.
    /// - [`ErasureError::Capacity`] if `value` does not fit `St`.
    pub fn new<T: 'static>(value: T) -> Result<Self, Report<ErasureError>> {
        Self::place(DispatchTable::for_type::<T>()?, value)
    }

    /// Erases `value`, completing `map` and then the registered maps.
    ///
    /// # Errors
    ///
    /// Fails like [`Poly::new`].
    pub fn with_map<T: 'static>(
        value: T,
        map: OperationMap<T>,
    ) -> Result<Self, Report<ErasureError>> {
        Self::place(DispatchTable::with_map(map)?, value)
    }

    fn place<T: 'static>(
        table: DispatchTable<Erasable<C>, L>,
        value: T,
    ) -> Result<Self, Report<ErasureError>> {
        match St::try_new(value) {
            Ok(storage) => Ok(Self {
                table,
                storage,
                _not_send: PhantomData,
            }),
            Err(_value) => {
                let info = StorageInfo::of::<T>();
                Err(report!(ErasureError::Capacity {
                    type_name: core::any::type_name::<T>(),
                    size: info.size(),
                    align: info.align(),
                    storage: core::any::type_name::<St>(),
                }))
            }
        }
    }
}

impl<'a, C: Concept, L: Layout> Poly<C, Borrowed<'a>, L> {
    /// Erases a shared reference. Copies alias `value`, and the value is
    /// never accessible mutably.
    ///
    /// # Errors
    ///
    /// Fails like [`Poly::new`], except for capacity.
    pub fn borrowed<T: 'static>(value: &'a T) -> Result<Self, Report<ErasureError>> {
        Ok(Self {
            table: DispatchTable::for_type::<T>()?,
            storage: Borrowed::new(value),
            _not_send: PhantomData,
        })
    }
}

impl<'a, C: Concept, L: Layout> Poly<C, BorrowedMut<'a>, L> {
    /// Erases a mutable reference. The result cannot be copied.
    ///
    /// # Errors
    ///
    /// Fails like [`Poly::new`], except for capacity.
    pub fn borrowed_mut<T: 'static>(value: &'a mut T) -> Result<Self, Report<ErasureError>> {
        Ok(Self {
            table: DispatchTable::for_type::<T>()?,
            storage: BorrowedMut::new(value),
            _not_send: PhantomData,
        })
    }
}

impl<C: Concept, St: Storage, L: Layout> Poly<C, St, L> {
    fn dispatch(&self) -> Dispatch<'_, C, L> {
        Dispatch::new(&self.table)
    }

    /// Copies the value: the table first, then the storage through it.
    ///
    /// The interface must contain `copy_construct`, i.e. `C` must refine
    /// [`CopyConstructible`](crate::builtin::CopyConstructible). [`Shared`]
    /// and [`Borrowed`] storages alias instead of copying the object.
    ///
    /// # Errors
    ///
    /// - [`ErasureError::NotCopyable`] if the interface has no
    ///   `copy_construct`.
    /// - [`ErasureError::StorageNotCopyable`] if `St` cannot hold two
    ///   values of one object.
    ///
    /// [`Shared`]: crate::storage::Shared
    pub fn try_clone(&self) -> Result<Self, Report<ErasureError>> {
        let Ok(index) = self.table.index_of(&builtin::COPY_CONSTRUCT) else {
            return Err(report!(ErasureError::NotCopyable {
                type_name: self.type_name(),
            })
            .attach(alloc::format!("Concept: {}", C::name())));
        };

        let table = self.table;
        let dispatch = Dispatch {
            table: &table,
            copy: table.slot(index),
        };
        // SAFETY: the storage is occupied and `dispatch` describes its object
        let Some(storage) = (unsafe { St::clone_from(&self.storage, &dispatch) }) else {
            return Err(report!(ErasureError::StorageNotCopyable {
                storage: core::any::type_name::<St>(),
            }));
        };
        Ok(Self {
            table,
            storage,
            _not_send: PhantomData,
        })
    }

    /// Exchanges the objects held by `self` and `other`, together with their
    /// tables.
    pub fn swap(&mut self, other: &mut Self) {
        let this_table = Dispatch::new(&self.table);
        let other_table = Dispatch::new(&other.table);
        // SAFETY: both storages are occupied, each table describes its own
        // storage, and the tables are swapped right after
        unsafe {
            self.storage
                .swap(&this_table, &mut other.storage, &other_table);
        }
        core::mem::swap(&mut self.table, &mut other.table);
    }

    /// Takes the function bound to `operation` for the held type.
    ///
    /// # Errors
    ///
    /// Fails like [`Interface::lookup`](crate::Interface::lookup).
    pub fn try_method<S: Signature>(
        &self,
        operation: &Operation<S>,
    ) -> Result<Method<S>, Report<ErasureError>> {
        let index = self.table.index_of(operation)?;
        let Some(function) = self.table.slot(index) else {
            return Err(report!(self.table.interface().unknown(operation.name())));
        };
        // SAFETY: `index_of` checked that the clause at `index` has signature
        // `S`, and the slot was bound for the held type
        Ok(unsafe { Method::new(function, self.type_id(), self.type_name()) })
    }

    /// Takes the function bound to `operation` for the held type.
    ///
    /// # Panics
    ///
    /// Panics if `operation` is not part of the interface, or is declared
    /// with another signature.
    #[track_caller]
    pub fn method<S: Signature>(&self, operation: &Operation<S>) -> Method<S> {
        match self.try_method(operation) {
            Ok(method) => method,
            Err(report) => panic!("{report}"),
        }
    }

    /// The names of every operation the value dispatches, in index order.
    pub fn operation_names(&self) -> impl ExactSizeIterator<Item = &'static str> {
        self.table.names()
    }

    /// The [`TypeId`] of the held object.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.table.type_id()
    }

    /// The type name of the held object.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.table.type_name()
    }

    /// The size and alignment of the held object.
    #[must_use]
    pub fn storage_info(&self) -> StorageInfo {
        self.dispatch().storage_info()
    }

    /// Whether the held object is a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    /// Whether both values hold objects of the same concrete type.
    #[must_use]
    pub fn same_type<St2: Storage, L2: Layout>(&self, other: &Poly<C, St2, L2>) -> bool {
        self.type_id() == other.type_id()
    }

    /// The held object, if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: the held object is a `T`, alive while `self` is borrowed
        Some(unsafe { self.storage.get().cast::<T>().as_ref() })
    }

    /// The held object, if it is a `T` and the storage grants exclusive
    /// access.
    #[must_use]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.is::<T>() {
            return None;
        }
        let object = self.storage.get_mut()?;
        // SAFETY: the held object is a `T` and the storage granted exclusive
        // access for as long as `self` is mutably borrowed
        Some(unsafe { object.cast::<T>().as_mut() })
    }

    /// Compares the held objects with the `equal` operation.
    ///
    /// Values holding different concrete types are never equal.
    ///
    /// # Errors
    ///
    /// Fails like [`Poly::try_method`] if the interface has no `equal`,
    /// i.e. `C` does not refine
    /// [`EqualityComparable`](crate::builtin::EqualityComparable).
    pub fn equals<St2: Storage, L2: Layout>(
        &self,
        other: &Poly<C, St2, L2>,
    ) -> Result<bool, Report<ErasureError>> {
        let method = self.try_method(&builtin::EQUAL)?;
        if !self.same_type(other) {
            return Ok(false);
        }
        Ok(builtin::Equal::call(method, self, other))
    }

    /// The dispatch table.
    #[must_use]
    pub fn table(&self) -> &DispatchTable<Erasable<C>, L> {
        &self.table
    }

    /// The storage holding the object.
    #[must_use]
    pub fn storage(&self) -> &St {
        &self.storage
    }
}

impl<C: Concept, St: Storage, L: Layout> Clone for Poly<C, St, L> {
    /// # Panics
    ///
    /// Panics where [`Poly::try_clone`] fails.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(report) => panic!("{report}"),
        }
    }
}

impl<C: Concept, St: Storage, L: Layout> Drop for Poly<C, St, L> {
    fn drop(&mut self) {
        let table = Dispatch::new(&self.table);
        // SAFETY: the storage is occupied and `table` describes its object.
        // The storage is not used again.
        unsafe { self.storage.destruct(&table) }
    }
}

impl<C: Concept, St: Storage, L: Layout> sealed::Sealed for Poly<C, St, L> {}

impl<C: Concept, St: Storage, L: Layout> Receiver for Poly<C, St, L> {
    fn object_type_id(&self) -> TypeId {
        self.type_id()
    }

    fn object_ptr(&self) -> NonNull<Erased> {
        self.storage.get()
    }

    fn object_mut_ptr(&mut self) -> Option<NonNull<Erased>> {
        self.storage.get_mut()
    }
}

impl<C: Concept, St: Storage, L: Layout> core::fmt::Debug for Poly<C, St, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Poly")
            .field("concept", &C::name())
            .field("type_name", &self.type_name())
            .field("storage", &core::any::type_name::<St>())
            .field("layout", &core::any::type_name::<L>())
            .finish()
    }
}
