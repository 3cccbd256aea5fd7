//! Builtin concepts describing the lifecycle of a type.
//!
//! Every polymorphic value dispatches through [`Erasable<C>`], which adds
//! [`Destructible`], [`Storable`], [`TypeIdentity`] and [`MoveConstructible`]
//! in front of the user concept `C`. These four provide their operations for
//! every `'static` type through [`Concept::default_map`], so users never bind
//! them by hand.
//!
//! [`CopyConstructible`] and [`EqualityComparable`] depend on trait impls of
//! the concrete type. Rust cannot branch on whether a type implements
//! [`Clone`], so their operations are bound explicitly with
//! [`OperationMap::with_clone`] and [`OperationMap::with_equality`], or
//! registered once per type with [`register_clone`] and
//! [`register_equality`].

use core::{any::TypeId, marker::PhantomData};

use polycept_internals::StorageInfo;
use rootcause::Report;

use crate::{
    concept::{Clause, Clauses, Concept},
    error::ErasureError,
    map::OperationMap,
    registry,
    signature::{Operation, Signature},
};

/// Signature of `destruct`: drops the object in place.
#[derive(Debug, Clone, Copy)]
pub struct Destruct;

// SAFETY: `S` only appears behind a pointer.
unsafe impl Signature for Destruct {
    type Fn<S: 'static> = unsafe fn(*mut S);
}

/// Signature of `storage_info`: the size and alignment of the type.
#[derive(Debug, Clone, Copy)]
pub struct StorageInfoOf;

// SAFETY: `S` does not appear.
unsafe impl Signature for StorageInfoOf {
    type Fn<S: 'static> = fn() -> StorageInfo;
}

/// Signature of `type_id`.
#[derive(Debug, Clone, Copy)]
pub struct TypeIdOf;

// SAFETY: `S` does not appear.
unsafe impl Signature for TypeIdOf {
    type Fn<S: 'static> = fn() -> TypeId;
}

/// Signature of `type_name`.
#[derive(Debug, Clone, Copy)]
pub struct TypeNameOf;

// SAFETY: `S` does not appear.
unsafe impl Signature for TypeNameOf {
    type Fn<S: 'static> = fn() -> &'static str;
}

/// Signature of `move_construct`: relocates the object at the second pointer
/// into the uninitialized memory at the first.
#[derive(Debug, Clone, Copy)]
pub struct MoveConstruct;

// SAFETY: `S` only appears behind pointers.
unsafe impl Signature for MoveConstruct {
    type Fn<S: 'static> = unsafe fn(*mut S, *mut S);
}

/// Signature of `copy_construct`: writes a copy of the object at the second
/// pointer into the uninitialized memory at the first.
#[derive(Debug, Clone, Copy)]
pub struct CopyConstruct;

// SAFETY: `S` only appears behind pointers.
unsafe impl Signature for CopyConstruct {
    type Fn<S: 'static> = unsafe fn(*mut S, *const S);
}

crate::signature! {
    /// Signature of `equal`.
    pub struct Equal = fn(&Self, &Self) -> bool;
}

/// Drops the object in place.
pub static DESTRUCT: Operation<Destruct> = Operation::new("destruct");
/// Reports the size and alignment of the type.
pub static STORAGE_INFO: Operation<StorageInfoOf> = Operation::new("storage_info");
/// Reports the [`TypeId`] of the type.
pub static TYPE_ID: Operation<TypeIdOf> = Operation::new("type_id");
/// Reports the name of the type.
pub static TYPE_NAME: Operation<TypeNameOf> = Operation::new("type_name");
/// Relocates the object.
pub static MOVE_CONSTRUCT: Operation<MoveConstruct> = Operation::new("move_construct");
/// Copies the object.
pub static COPY_CONSTRUCT: Operation<CopyConstruct> = Operation::new("copy_construct");
/// Compares two objects of the same type.
pub static EQUAL: Operation<Equal> = Operation::new("equal");

// Closure indices of the operations every `Erasable` interface starts with.
pub(crate) const DESTRUCT_INDEX: usize = 0;
pub(crate) const STORAGE_INFO_INDEX: usize = 1;
pub(crate) const MOVE_CONSTRUCT_INDEX: usize = 4;

/// Whether `clause` is one of the lifecycle operations every type derives
/// from its own layout and identity.
///
/// The storages and [`Poly`](crate::Poly) trust these slots, so they are
/// never bound by hand.
pub(crate) fn is_lifecycle(clause: &Clause) -> bool {
    [
        Clause::of(&DESTRUCT),
        Clause::of(&STORAGE_INFO),
        Clause::of(&TYPE_ID),
        Clause::of(&TYPE_NAME),
        Clause::of(&MOVE_CONSTRUCT),
    ]
    .contains(clause)
}

unsafe fn destruct<T>(object: *mut T) {
    // SAFETY: the dispatch table only calls this with a live `T` that is
    // never used again
    unsafe { object.drop_in_place() }
}

fn storage_info<T>() -> StorageInfo {
    StorageInfo::of::<T>()
}

fn type_id<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}

fn type_name<T>() -> &'static str {
    core::any::type_name::<T>()
}

unsafe fn move_construct<T>(destination: *mut T, source: *mut T) {
    // SAFETY: the dispatch table only calls this with a live `T` at `source`
    // and writable, non-overlapping memory at `destination`
    unsafe { destination.copy_from_nonoverlapping(source, 1) }
}

pub(crate) unsafe fn copy_construct<T: Clone>(destination: *mut T, source: *const T) {
    // SAFETY: the dispatch table only calls this with a live `T` at `source`
    let copy = unsafe { &*source }.clone();
    // SAFETY: `destination` is writable memory for a `T`
    unsafe { destination.write(copy) }
}

pub(crate) fn equal<T: PartialEq>(this: &T, other: &T) -> bool {
    this == other
}

/// Types that can be destroyed. Holds for every type.
#[derive(Debug)]
pub struct Destructible;

impl Concept for Destructible {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&DESTRUCT);
    }

    fn default_map<T: 'static>(map: OperationMap<T>) -> OperationMap<T> {
        map.with_lifecycle(&DESTRUCT, destruct::<T>)
    }
}

/// Types that can report their size and alignment. Holds for every type.
#[derive(Debug)]
pub struct Storable;

impl Concept for Storable {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&STORAGE_INFO);
    }

    fn default_map<T: 'static>(map: OperationMap<T>) -> OperationMap<T> {
        map.with_lifecycle(&STORAGE_INFO, storage_info::<T>)
    }
}

/// Types that can report their identity. Holds for every `'static` type.
#[derive(Debug)]
pub struct TypeIdentity;

impl Concept for TypeIdentity {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&TYPE_ID).declare(&TYPE_NAME);
    }

    fn default_map<T: 'static>(map: OperationMap<T>) -> OperationMap<T> {
        map.with_lifecycle(&TYPE_ID, type_id::<T>)
            .with_lifecycle(&TYPE_NAME, type_name::<T>)
    }
}

/// Types that can be relocated. Holds for every type.
#[derive(Debug)]
pub struct MoveConstructible;

impl Concept for MoveConstructible {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&MOVE_CONSTRUCT);
    }

    fn default_map<T: 'static>(map: OperationMap<T>) -> OperationMap<T> {
        map.with_lifecycle(&MOVE_CONSTRUCT, move_construct::<T>)
    }
}

/// Types that can be copied.
#[derive(Debug)]
pub struct CopyConstructible;

impl Concept for CopyConstructible {
    type Refines = (MoveConstructible,);

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&COPY_CONSTRUCT);
    }
}

/// Types whose values can be compared for equality.
#[derive(Debug)]
pub struct EqualityComparable;

impl Concept for EqualityComparable {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&EQUAL);
    }
}

/// The interface a polymorphic value over `C` dispatches through.
///
/// Its closure starts with `destruct`, `storage_info`, `type_id`,
/// `type_name` and `move_construct`, in that order, followed by the closure
/// of `C`.
pub struct Erasable<C>(PhantomData<fn() -> C>);

impl<C: Concept> Concept for Erasable<C> {
    type Refines = (
        Destructible,
        Storable,
        TypeIdentity,
        MoveConstructible,
        C,
    );

    fn name() -> &'static str {
        C::name()
    }

    fn clauses(_clauses: &mut Clauses) {}
}

/// Registers the [`Clone`] impl of `T` as its `copy_construct` default.
///
/// # Errors
///
/// Fails like [`register_default`](crate::register_default).
pub fn register_clone<T: Clone + 'static>() -> Result<(), Report<ErasureError>> {
    registry::register_default::<CopyConstructible, T>(OperationMap::new().with_clone())
}

/// Registers the [`PartialEq`] impl of `T` as its `equal` default.
///
/// # Errors
///
/// Fails like [`register_default`](crate::register_default).
pub fn register_equality<T: PartialEq + 'static>() -> Result<(), Report<ErasureError>> {
    registry::register_default::<EqualityComparable, T>(OperationMap::new().with_equality())
}
