//! Flattened interface descriptors.
//!
//! [`Interface::of`] turns a [`Concept`] into its closure: every operation of
//! the concept and of everything it refines, de-duplicated by name, each with
//! a stable index. Interfaces are built once per concept and live for the
//! rest of the process.
//!
//! Closure order is deterministic: the closures of the refined concepts come
//! first, in [`Concept::Refines`] order, followed by the direct clauses of the
//! concept itself. An operation reached through several refinement paths
//! keeps the position of its first occurrence.

use alloc::{boxed::Box, vec::Vec};
use core::any::TypeId;

use hashbrown::HashMap;
use indexmap::IndexMap;
use rootcause::{Report, report};
use rustc_hash::FxBuildHasher;

use crate::{
    concept::{Clause, Clauses, Concept, Refinements},
    error::ErasureError,
    lock::RegistryLock,
    signature::{Operation, Signature},
};

/// Largest number of operations a single closure may contain.
pub const MAX_OPERATIONS: usize = 64;

type InterfaceMap = HashMap<TypeId, &'static Interface, FxBuildHasher>;

static INTERFACES: RegistryLock<InterfaceMap> = RegistryLock::new();

/// The flattened, validated descriptor of one concept.
#[derive(Debug)]
pub struct Interface {
    name: &'static str,
    concept: TypeId,
    direct: Vec<Clause>,
    closure: IndexMap<&'static str, Clause, FxBuildHasher>,
    refines: Vec<&'static Interface>,
    /// One byte per closure index. An [`Operation`] resolved by this
    /// interface remembers the address of the byte at its index, which is
    /// unique to this interface for the rest of the process.
    anchors: Box<[u8]>,
}

impl Interface {
    /// Returns the interface of `C`, building it on first use.
    ///
    /// # Errors
    ///
    /// - [`ErasureError::DuplicateClause`] if `C` declares a name twice.
    /// - [`ErasureError::Redeclared`] if `C` declares a name one of its bases
    ///   already provides.
    /// - [`ErasureError::ConflictingRefinement`] if two bases provide the same
    ///   name with different signatures.
    /// - [`ErasureError::TooManyOperations`] if the closure exceeds
    ///   [`MAX_OPERATIONS`].
    pub fn of<C: Concept>() -> Result<&'static Self, Report<ErasureError>> {
        let concept = TypeId::of::<C>();
        if let Some(interface) = INTERFACES
            .read()
            .get()
            .and_then(|map| map.get(&concept).copied())
        {
            return Ok(interface);
        }

        // Bases are resolved without holding the lock, since they recurse
        // into this function.
        let interface = Self::build::<C>()?;

        let mut guard = INTERFACES.write();
        let interface = *guard
            .get_or_default()
            .entry(concept)
            .or_insert_with(|| Box::leak(Box::new(interface)));
        tracing::debug!(
            interface = interface.name,
            operations = interface.len(),
            "declared interface"
        );
        Ok(interface)
    }

    fn build<C: Concept>() -> Result<Self, Report<ErasureError>> {
        let name = C::name();
        let refines = C::Refines::interfaces()?;

        let mut clauses = Clauses::new();
        C::clauses(&mut clauses);
        let (direct, duplicates) = clauses.into_parts();
        if let Some(&operation) = duplicates.first() {
            return Err(report!(ErasureError::DuplicateClause {
                concept: name,
                operation,
            }));
        }

        let mut closure: IndexMap<&'static str, Clause, FxBuildHasher> =
            IndexMap::with_hasher(FxBuildHasher);
        for base in &refines {
            for clause in base.closure() {
                match closure.get(clause.name()) {
                    Some(existing) if *existing != *clause => {
                        return Err(report!(ErasureError::ConflictingRefinement {
                            concept: name,
                            operation: clause.name(),
                        })
                        .attach(alloc::format!(
                            "Signatures: {} and {}",
                            existing.signature_name(),
                            clause.signature_name()
                        )));
                    }
                    Some(_) => {}
                    None => {
                        closure.insert(clause.name(), *clause);
                    }
                }
            }
        }

        for clause in &direct {
            if closure.contains_key(clause.name()) {
                let base = refines
                    .iter()
                    .find(|base| base.contains(clause.name()))
                    .map_or("a refined concept", |base| base.name());
                return Err(report!(ErasureError::Redeclared {
                    concept: name,
                    operation: clause.name(),
                    base,
                }));
            }
            closure.insert(clause.name(), *clause);
        }

        if closure.len() > MAX_OPERATIONS {
            return Err(report!(ErasureError::TooManyOperations {
                concept: name,
                count: closure.len(),
            }));
        }

        let anchors = alloc::vec![0; closure.len()].into_boxed_slice();
        Ok(Self {
            name,
            concept: TypeId::of::<C>(),
            direct,
            closure,
            refines,
            anchors,
        })
    }

    /// Name of the concept, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The [`TypeId`] of the concept.
    #[must_use]
    pub fn concept(&self) -> TypeId {
        self.concept
    }

    /// Every operation of the concept and its bases, in index order.
    pub fn closure(&self) -> impl ExactSizeIterator<Item = &Clause> + '_ {
        self.closure.values()
    }

    /// The operation names of the closure, in index order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &'static str> + '_ {
        self.closure.keys().copied()
    }

    /// Only the operations the concept declares itself.
    #[must_use]
    pub fn direct_clauses(&self) -> &[Clause] {
        &self.direct
    }

    /// The interfaces of the refined concepts.
    #[must_use]
    pub fn refines(&self) -> &[&'static Interface] {
        &self.refines
    }

    /// Number of operations in the closure.
    #[must_use]
    pub fn len(&self) -> usize {
        self.closure.len()
    }

    /// Whether the closure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closure.is_empty()
    }

    /// Whether the closure contains an operation with this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.closure.contains_key(name)
    }

    /// The index of the named operation.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.closure.get_index_of(name)
    }

    /// The clause at `index`.
    #[must_use]
    pub fn clause(&self, index: usize) -> Option<&Clause> {
        self.closure.get_index(index).map(|(_, clause)| clause)
    }

    /// The index of `operation`, checking both its name and its signature.
    ///
    /// A successful lookup is remembered by `operation`, so repeating it
    /// against this interface skips the name lookup.
    ///
    /// # Errors
    ///
    /// - [`ErasureError::UnknownOperation`] if the name is not in the
    ///   closure. The error lists the available names.
    /// - [`ErasureError::SignatureMismatch`] if the closure declares the name
    ///   with another signature.
    pub fn lookup<S: Signature>(
        &self,
        operation: &Operation<S>,
    ) -> Result<usize, Report<ErasureError>> {
        let anchors = self.anchors.as_ptr_range();
        let start = anchors.start.addr();
        let resolved = operation.resolved();
        if (start..anchors.end.addr()).contains(&resolved) {
            return Ok(resolved - start);
        }

        let Some((index, _, clause)) = self.closure.get_full(operation.name()) else {
            return Err(report!(self.unknown(operation.name())));
        };
        if clause.signature() != TypeId::of::<S>() {
            return Err(report!(ErasureError::SignatureMismatch {
                operation: operation.name(),
                expected: clause.signature_name(),
                found: core::any::type_name::<S>(),
            }));
        }
        operation.remember(start + index);
        Ok(index)
    }

    pub(crate) fn unknown(&self, operation: &'static str) -> ErasureError {
        ErasureError::UnknownOperation {
            interface: self.name,
            operation,
            available: self.names().collect(),
        }
    }
}
