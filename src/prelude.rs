//! Commonly used items for convenient importing.
//!
//! ```rust
//! use polycept::prelude::*;
//!
//! struct Empty;
//!
//! impl Concept for Empty {
//!     type Refines = ();
//!
//!     fn clauses(_clauses: &mut Clauses) {}
//! }
//!
//! let value = Poly::<Empty>::new(1_u8).unwrap();
//! assert!(value.is::<u8>());
//! ```
//!
//! The prelude contains the traits and types needed to declare a concept,
//! bind its operations and erase a value: [`Concept`], [`Clauses`],
//! [`Operation`], [`OperationMap`], [`Poly`], [`Signature`], [`Receiver`],
//! [`Moved`] and [`ErasureError`]. Layouts, storages and the builtin
//! concepts live in their own modules.

pub use crate::{
    Clauses, Concept, ErasureError, Moved, Operation, OperationMap, Poly, Receiver, Signature,
};
