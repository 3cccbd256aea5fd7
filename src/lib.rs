#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links
)]
// Extra checks on nightly
#![cfg_attr(nightly_extra_checks, feature(rustdoc_missing_doc_code_examples))]
#![cfg_attr(nightly_extra_checks, forbid(rustdoc::missing_doc_code_examples))]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Composable runtime polymorphism for Rust.
//!
//! ## Overview
//!
//! polycept erases concrete types behind interfaces that are declared as
//! data rather than as traits. An interface is a set of named operations,
//! each with a function signature. A concrete type models an interface when
//! every operation is bound to a plain function taking the type. A
//! polymorphic value holds any modeling type and calls those functions
//! through a dispatch table.
//!
//! Compared to `dyn Trait`, every piece of this is configurable:
//!
//! - **Interfaces compose.** A [`Concept`] refines other concepts. Operations
//!   reached through several paths are merged, and conflicting signatures
//!   are rejected.
//! - **Bindings are layered.** An [`OperationMap`] may be partial. Missing
//!   operations are filled in from registered maps, registered defaults,
//!   family defaults and the refined concepts, see [`complete`].
//! - **Tables have a layout.** A [`layout`] places each operation inside the
//!   table value or behind a pointer to a shared table, per use site.
//! - **Storage is pluggable.** A [`storage`] kind decides where the object
//!   lives: on the heap, in an inline buffer, in a small buffer with a heap
//!   fallback, reference counted, or borrowed.
//!
//! ## Quick Example
//!
//! ```
//! use polycept::prelude::*;
//!
//! polycept::signature! {
//!     pub struct Area = fn(&Self) -> f64;
//!     pub struct Describe = fn(&Self) -> String;
//! }
//!
//! static AREA: Operation<Area> = Operation::new("area");
//! static DESCRIBE: Operation<Describe> = Operation::new("describe");
//!
//! struct Shape;
//!
//! impl Concept for Shape {
//!     type Refines = ();
//!
//!     fn clauses(clauses: &mut Clauses) {
//!         clauses.declare(&AREA).declare(&DESCRIBE);
//!     }
//! }
//!
//! struct Square(f64);
//!
//! fn square_area(square: &Square) -> f64 {
//!     square.0 * square.0
//! }
//!
//! fn square_describe(square: &Square) -> String {
//!     format!("square with side {}", square.0)
//! }
//!
//! polycept::register::<Shape, Square>(
//!     OperationMap::new()
//!         .with(&AREA, square_area)
//!         .with(&DESCRIBE, square_describe),
//! )
//! .unwrap();
//!
//! let shape = Poly::<Shape>::new(Square(2.0)).unwrap();
//! assert_eq!(Area::call(shape.method(&AREA), &shape), 4.0);
//! assert_eq!(
//!     Describe::call(shape.method(&DESCRIBE), &shape),
//!     "square with side 2"
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - A **signature** is a marker type declared with [`signature!`]. `Self`
//!   stands for the erased type and may only appear behind a reference or a
//!   pointer, so that every bound function has the same ABI as its erased
//!   form.
//! - An **operation** is a named signature, see [`Operation`].
//! - An **interface** is the flattened closure of a concept and everything it
//!   refines, see [`Interface`]. Each operation in it has a small integer
//!   index.
//! - A **dispatch table** holds one function per operation of an interface,
//!   for one concrete type, see [`DispatchTable`].
//! - A **polymorphic value** pairs a storage with a dispatch table, see
//!   [`Poly`]. It always dispatches through `Erasable<C>`, which adds the
//!   [`builtin`] lifecycle operations in front of the user concept.
//!
//! ## Errors
//!
//! Everything that can go wrong is detected when an interface, map or table
//! is first built, and reported as a [`rootcause::Report`] of
//! [`ErasureError`]. Calls through a [`Method`] never fail, except for
//! panicking when a receiver holds another type than the method was taken
//! from.
//!
//! ## Features
//!
//! - `std`: use `std::sync::RwLock` for the process-wide registries instead
//!   of a spin lock.
//!
//! For the storage implementations, see the [`polycept-internals`] crate.
//!
//! [`polycept-internals`]: polycept_internals

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod builtin;
pub mod error;
pub mod layout;
pub mod prelude;

mod completion;
mod concept;
mod interface;
mod lock;
mod map;
mod method;
mod poly;
mod registry;
mod signature;
mod table;

pub use polycept_internals::{Erased, ObjectTable, StorageInfo, storage};

pub use self::{
    completion::{Model, complete},
    concept::{Clause, Clauses, Concept, Refinements},
    error::ErasureError,
    interface::{Interface, MAX_OPERATIONS},
    map::OperationMap,
    method::{Method, Receiver},
    poly::Poly,
    registry::{register, register_default},
    signature::{Moved, Operation, Signature},
    table::DispatchTable,
};

/// A [`Result`](core::result::Result) type alias where the error is a
/// [`Report`](rootcause::Report) of [`ErasureError`].
///
/// # Examples
///
/// ```
/// use polycept::{Interface, builtin::Destructible};
///
/// fn closure_len() -> polycept::Result<usize> {
///     Ok(Interface::of::<Destructible>()?.len())
/// }
///
/// assert_eq!(closure_len().unwrap(), 1);
/// ```
pub type Result<T> = core::result::Result<T, rootcause::Report<ErasureError>>;

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use crate::method::{erase_const_ptr, erase_moved, erase_mut, erase_mut_ptr, erase_ref};
}
