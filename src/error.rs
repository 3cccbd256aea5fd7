//! The error type reported by every fallible operation in this crate.
//!
//! Failures are returned as a [`Report<ErasureError>`](rootcause::Report), so
//! callers can match on the variant through
//! [`Report::current_context`](rootcause::Report::current_context) while the
//! report carries any extra attachments added along the way.
//!
//! ```
//! use polycept::{ErasureError, prelude::*};
//!
//! struct Named;
//! impl Concept for Named {
//!     type Refines = ();
//!     fn clauses(clauses: &mut Clauses) {
//!         clauses.declare(&NAME);
//!     }
//! }
//!
//! polycept::signature! {
//!     struct NameSig = fn(&Self) -> &'static str;
//! }
//! static NAME: Operation<NameSig> = Operation::new("name");
//!
//! let report = polycept::complete::<Named, u8>(OperationMap::new()).unwrap_err();
//! assert!(matches!(report.current_context(), ErasureError::Incomplete { .. }));
//! ```

use alloc::vec::Vec;
use core::fmt;

/// Everything that can go wrong while declaring interfaces, building dispatch
/// tables or constructing polymorphic values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErasureError {
    /// A concept declared the same operation name twice.
    DuplicateClause {
        /// The concept.
        concept: &'static str,
        /// The repeated operation name.
        operation: &'static str,
    },
    /// A concept declared an operation that one of its bases already provides.
    Redeclared {
        /// The concept.
        concept: &'static str,
        /// The operation name.
        operation: &'static str,
        /// The base providing it.
        base: &'static str,
    },
    /// Two bases of a concept provide the same operation name with different
    /// signatures.
    ConflictingRefinement {
        /// The concept.
        concept: &'static str,
        /// The operation name.
        operation: &'static str,
    },
    /// An interface has more operations than a dispatch table can index.
    TooManyOperations {
        /// The concept.
        concept: &'static str,
        /// The number of operations in its closure.
        count: usize,
    },
    /// An operation map was given two functions for one name.
    DuplicateEntry {
        /// The operation name.
        operation: &'static str,
    },
    /// An operation name is not part of the interface.
    UnknownOperation {
        /// The interface, or the layout selector, that was asked.
        interface: &'static str,
        /// The requested name.
        operation: &'static str,
        /// The names that are available.
        available: Vec<&'static str>,
    },
    /// A function was supplied for an operation under the wrong signature.
    SignatureMismatch {
        /// The operation name.
        operation: &'static str,
        /// The signature the interface declares.
        expected: &'static str,
        /// The signature that was supplied.
        found: &'static str,
    },
    /// A map bound a lifecycle operation, such as `destruct` or `type_id`,
    /// that is always derived from the concrete type.
    ReservedOperation {
        /// The operation name.
        operation: &'static str,
        /// The concrete type.
        type_name: &'static str,
    },
    /// After gathering every default, some operations of the interface are
    /// still missing.
    Incomplete {
        /// The interface being completed.
        interface: &'static str,
        /// The concrete type.
        type_name: &'static str,
        /// The operation names that were supplied, in interface order.
        supplied: Vec<&'static str>,
        /// The operation names that are missing, in interface order.
        missing: Vec<&'static str>,
    },
    /// A map or default map was already registered for this concept and type.
    AlreadyRegistered {
        /// The concept.
        concept: &'static str,
        /// The concrete type.
        type_name: &'static str,
    },
    /// A map was registered after a dispatch table for the type was built.
    RegisteredAfterUse {
        /// The concept.
        concept: &'static str,
        /// The concrete type.
        type_name: &'static str,
    },
    /// A layout selector claimed an operation that an earlier part of the
    /// layout already placed.
    ClaimedTwice {
        /// The operation name.
        operation: &'static str,
    },
    /// A layout left operations of the interface unplaced.
    NotCovered {
        /// The unplaced operation names, in interface order.
        missing: Vec<&'static str>,
    },
    /// An inline layout selected a different number of operations than it
    /// has room for.
    InlineCapacity {
        /// The declared number of slots.
        capacity: usize,
        /// The number of selected operations.
        selected: usize,
    },
    /// A value does not fit in the chosen storage.
    Capacity {
        /// The concrete type.
        type_name: &'static str,
        /// Its size in bytes.
        size: usize,
        /// Its alignment in bytes.
        align: usize,
        /// The storage type.
        storage: &'static str,
    },
    /// The held type has no copy operation.
    NotCopyable {
        /// The concrete type.
        type_name: &'static str,
    },
    /// The storage cannot hold two independent values of one object.
    StorageNotCopyable {
        /// The storage type.
        storage: &'static str,
    },
}

struct List<'a>(&'a [&'static str]);

impl fmt::Display for List<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(none)");
        }
        for (index, name) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

impl fmt::Display for ErasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateClause { concept, operation } => {
                write!(f, "Concept {concept} declares operation `{operation}` twice")
            }
            Self::Redeclared {
                concept,
                operation,
                base,
            } => write!(
                f,
                "Concept {concept} redeclares operation `{operation}` already provided by {base}"
            ),
            Self::ConflictingRefinement { concept, operation } => write!(
                f,
                "Bases of concept {concept} provide operation `{operation}` with different signatures"
            ),
            Self::TooManyOperations { concept, count } => write!(
                f,
                "Concept {concept} has {count} operations, more than a dispatch table can index"
            ),
            Self::DuplicateEntry { operation } => {
                write!(f, "Operation `{operation}` was supplied twice")
            }
            Self::UnknownOperation {
                interface,
                operation,
                available,
            } => write!(
                f,
                "{interface} has no operation `{operation}`; available: {}",
                List(available)
            ),
            Self::SignatureMismatch {
                operation,
                expected,
                found,
            } => write!(
                f,
                "Operation `{operation}` has signature {expected}, but a function for {found} was supplied"
            ),
            Self::ReservedOperation {
                operation,
                type_name,
            } => write!(
                f,
                "Operation `{operation}` of {type_name} is derived from the type and cannot be bound"
            ),
            Self::Incomplete {
                interface,
                type_name,
                supplied,
                missing,
            } => write!(
                f,
                "Type {type_name} does not model {interface}: missing {}; supplied {}",
                List(missing),
                List(supplied)
            ),
            Self::AlreadyRegistered { concept, type_name } => write!(
                f,
                "An operation map for {type_name} under {concept} is already registered"
            ),
            Self::RegisteredAfterUse { concept, type_name } => write!(
                f,
                "Cannot register an operation map for {type_name} under {concept} after a dispatch table for it was built"
            ),
            Self::ClaimedTwice { operation } => write!(
                f,
                "Operation `{operation}` is claimed by more than one part of the layout"
            ),
            Self::NotCovered { missing } => {
                write!(f, "The layout does not place {}", List(missing))
            }
            Self::InlineCapacity { capacity, selected } => write!(
                f,
                "Inline layout has {capacity} slots but selects {selected} operations"
            ),
            Self::Capacity {
                type_name,
                size,
                align,
                storage,
            } => write!(
                f,
                "{type_name} (size {size}, align {align}) does not fit in {storage}"
            ),
            Self::NotCopyable { type_name } => {
                write!(f, "Type {type_name} does not provide a copy operation")
            }
            Self::StorageNotCopyable { storage } => {
                write!(f, "Storage {storage} cannot be copied")
            }
        }
    }
}

impl core::error::Error for ErasureError {}
