//! Interface declarations.
//!
//! A concept is a type implementing [`Concept`]. It names the operations it
//! requires directly, through [`Concept::clauses`], and the concepts it
//! refines, through [`Concept::Refines`]. The flattened result is an
//! [`Interface`](crate::Interface).
//!
//! ```
//! use polycept::{Interface, builtin::CopyConstructible, prelude::*};
//!
//! polycept::signature! {
//!     pub struct Area = fn(&Self) -> f64;
//! }
//!
//! pub static AREA: Operation<Area> = Operation::new("area");
//!
//! pub struct Shape;
//!
//! impl Concept for Shape {
//!     type Refines = (CopyConstructible,);
//!
//!     fn clauses(clauses: &mut Clauses) {
//!         clauses.declare(&AREA);
//!     }
//! }
//!
//! let interface = Interface::of::<Shape>().unwrap();
//! assert_eq!(
//!     interface.names().collect::<Vec<_>>(),
//!     ["move_construct", "copy_construct", "area"]
//! );
//! ```

use alloc::vec::Vec;
use core::any::TypeId;

use rootcause::Report;

use crate::{
    completion,
    error::ErasureError,
    interface::Interface,
    map::OperationMap,
    signature::{Operation, Signature},
};

/// A named set of required operations, refining zero or more other concepts.
pub trait Concept: 'static {
    /// The concepts this one refines, as a tuple of up to eight concepts.
    ///
    /// Use `()` for a concept without bases.
    type Refines: Refinements;

    /// Name used in diagnostics.
    fn name() -> &'static str {
        core::any::type_name::<Self>()
    }

    /// Declares the operations this concept adds on top of its bases.
    fn clauses(clauses: &mut Clauses);

    /// Operations this concept provides for every type.
    ///
    /// This is the lowest-priority source during completion: it is only
    /// consulted for names that neither the supplied map nor a registered
    /// map resolves. The default provides nothing.
    fn default_map<T: 'static>(map: OperationMap<T>) -> OperationMap<T> {
        map
    }
}

/// One declared operation: a name and a signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Clause {
    name: &'static str,
    signature: TypeId,
    signature_name: &'static str,
}

impl Clause {
    pub(crate) fn of<S: Signature>(operation: &Operation<S>) -> Self {
        Self {
            name: operation.name(),
            signature: TypeId::of::<S>(),
            signature_name: core::any::type_name::<S>(),
        }
    }

    /// The operation name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The [`TypeId`] of the signature marker.
    #[must_use]
    pub fn signature(&self) -> TypeId {
        self.signature
    }

    /// The type name of the signature marker.
    #[must_use]
    pub fn signature_name(&self) -> &'static str {
        self.signature_name
    }
}

/// Collects the direct clauses of a concept.
#[derive(Debug)]
pub struct Clauses {
    declared: Vec<Clause>,
    duplicates: Vec<&'static str>,
}

impl Clauses {
    pub(crate) fn new() -> Self {
        Self {
            declared: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    /// Declares an operation.
    ///
    /// Declaring the same name twice is reported when the interface is built.
    pub fn declare<S: Signature>(&mut self, operation: &Operation<S>) -> &mut Self {
        let clause = Clause::of(operation);
        if self.declared.iter().any(|c| c.name == clause.name) {
            self.duplicates.push(clause.name);
        } else {
            self.declared.push(clause);
        }
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<Clause>, Vec<&'static str>) {
        (self.declared, self.duplicates)
    }
}

/// A list of refined concepts.
///
/// Implemented for `()` and for tuples of up to eight [`Concept`]s.
pub trait Refinements: 'static {
    /// The interfaces of the refined concepts, in order.
    #[doc(hidden)]
    fn interfaces() -> Result<Vec<&'static Interface>, Report<ErasureError>>;

    /// Fills the missing entries of `map` from every refined concept.
    #[doc(hidden)]
    fn gather<T: 'static>(map: &mut OperationMap<T>);
}

impl Refinements for () {
    fn interfaces() -> Result<Vec<&'static Interface>, Report<ErasureError>> {
        Ok(Vec::new())
    }

    fn gather<T: 'static>(_map: &mut OperationMap<T>) {}
}

macro_rules! impl_refinements {
    ($($base:ident),+) => {
        impl<$($base: Concept),+> Refinements for ($($base,)+) {
            fn interfaces() -> Result<Vec<&'static Interface>, Report<ErasureError>> {
                Ok(alloc::vec![$(Interface::of::<$base>()?),+])
            }

            fn gather<T: 'static>(map: &mut OperationMap<T>) {
                $(completion::gather::<$base, T>(map);)+
            }
        }
    };
}

impl_refinements!(A);
impl_refinements!(A, B);
impl_refinements!(A, B, C);
impl_refinements!(A, B, C, D);
impl_refinements!(A, B, C, D, E);
impl_refinements!(A, B, C, D, E, F);
impl_refinements!(A, B, C, D, E, F, G);
impl_refinements!(A, B, C, D, E, F, G, H);
