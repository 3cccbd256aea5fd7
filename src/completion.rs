//! Completing operation maps against an interface.
//!
//! Completion merges several sources into one map covering exactly the
//! closure of a concept. For a concept `C` and a type `T`, the sources are
//! consulted in this order, and the first one binding a name wins:
//!
//! 1. the map passed in explicitly,
//! 2. the map registered for `(C, T)` with [`register`](crate::register),
//! 3. the default map registered for `(C, T)` with
//!    [`register_default`](crate::register_default),
//! 4. the family defaults of [`Concept::default_map`],
//! 5. each refined concept, recursively and in [`Concept::Refines`] order,
//!    starting again at step 2 for that concept.
//!
//! Refinement branches reaching the same operation are expected to agree, so
//! the first branch that binds it is used.

use alloc::{boxed::Box, vec::Vec};
use core::any::TypeId;

use hashbrown::HashMap;
use polycept_internals::ErasedFn;
use rootcause::{Report, report};
use rustc_hash::FxBuildHasher;

use crate::{
    builtin,
    concept::{Concept, Refinements},
    error::ErasureError,
    interface::Interface,
    lock::RegistryLock,
    map::OperationMap,
    registry::{self, Kind},
};

/// Completes `partial` for the concept `C` and the type `T`.
///
/// The result binds every operation of the closure of `C`, and nothing else,
/// in closure order. Completing a completed map returns an equal map.
///
/// # Errors
///
/// - Any error of [`Interface::of`].
/// - [`ErasureError::DuplicateEntry`] if `partial` binds a name twice.
/// - [`ErasureError::UnknownOperation`] if a name is not part of the
///   interface.
/// - [`ErasureError::SignatureMismatch`] if a name is bound under another
///   signature than the interface declares.
/// - [`ErasureError::ReservedOperation`] if `partial` binds one of the
///   lifecycle operations of [`Erasable`](crate::builtin::Erasable).
/// - [`ErasureError::Incomplete`] if some operations are still unbound after
///   every source was consulted. The error names the interface, the type, the
///   bound operations and the missing ones.
pub fn complete<C: Concept, T: 'static>(
    partial: OperationMap<T>,
) -> Result<OperationMap<T>, Report<ErasureError>> {
    let interface = Interface::of::<C>()?;
    validate(interface, &partial)?;

    let mut map = partial;
    gather_registered::<C, T>(&mut map);
    let family = C::default_map(OperationMap::new());
    validate(interface, &family)?;
    map.merge_missing(&family);
    C::Refines::gather(&mut map);

    let (supplied, missing): (Vec<_>, Vec<_>) =
        interface.names().partition(|name| map.contains(name));
    if !missing.is_empty() {
        return Err(report!(ErasureError::Incomplete {
            interface: interface.name(),
            type_name: core::any::type_name::<T>(),
            supplied,
            missing,
        }));
    }

    tracing::debug!(
        interface = interface.name(),
        type_name = core::any::type_name::<T>(),
        operations = interface.len(),
        "completed operation map"
    );
    Ok(map.reordered(interface.names()))
}

/// Fills the missing entries of `map` from everything `C` provides for `T`.
///
/// Family defaults of refined concepts are trusted to stay within their own
/// interface; explicit and registered maps were validated on entry.
pub(crate) fn gather<C: Concept, T: 'static>(map: &mut OperationMap<T>) {
    gather_registered::<C, T>(map);
    map.merge_missing(&C::default_map(OperationMap::new()));
    C::Refines::gather(map);
}

fn gather_registered<C: Concept, T: 'static>(map: &mut OperationMap<T>) {
    for kind in [Kind::Map, Kind::Default] {
        if let Some(registered) = registry::lookup::<C, T>(kind) {
            map.merge_missing(&registered);
        }
    }
}

/// Checks that every entry of `map` is an operation of `interface` with the
/// declared signature.
pub(crate) fn validate<T: 'static>(
    interface: &Interface,
    map: &OperationMap<T>,
) -> Result<(), Report<ErasureError>> {
    if let Some(operation) = map.first_duplicate() {
        return Err(report!(ErasureError::DuplicateEntry { operation }));
    }
    for (name, entry) in map.entries() {
        let Some(index) = interface.index_of(name) else {
            return Err(report!(interface.unknown(name)));
        };
        let Some(clause) = interface.clause(index) else {
            return Err(report!(interface.unknown(name)));
        };
        if clause.signature() != entry.signature {
            return Err(report!(ErasureError::SignatureMismatch {
                operation: name,
                expected: clause.signature_name(),
                found: entry.signature_name,
            }));
        }
        if !entry.lifecycle && builtin::is_lifecycle(clause) {
            return Err(report!(ErasureError::ReservedOperation {
                operation: name,
                type_name: core::any::type_name::<T>(),
            }));
        }
    }
    Ok(())
}

/// A completed map frozen into an array of functions in closure order.
///
/// Models are the input of every dispatch table layout. They are built once
/// per concept, type and explicit map, and never freed.
#[derive(Debug)]
pub struct Model {
    interface: &'static Interface,
    type_id: TypeId,
    type_name: &'static str,
    functions: Box<[ErasedFn]>,
}

impl Model {
    /// The interface the model implements.
    #[must_use]
    pub fn interface(&self) -> &'static Interface {
        self.interface
    }

    /// The [`TypeId`] of the concrete type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The name of the concrete type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The function bound to the operation at `index`.
    #[must_use]
    pub fn function(&self, index: usize) -> Option<ErasedFn> {
        self.functions.get(index).copied()
    }
}

type ModelKey = (TypeId, TypeId, Option<Vec<(&'static str, usize)>>);

static MODELS: RegistryLock<HashMap<ModelKey, &'static Model, FxBuildHasher>> =
    RegistryLock::new();

/// The model of `T` under `C`, completed from `explicit` or, if `None`, from
/// the registered maps alone.
pub(crate) fn model<C: Concept, T: 'static>(
    explicit: Option<OperationMap<T>>,
) -> Result<&'static Model, Report<ErasureError>> {
    let key: ModelKey = (
        TypeId::of::<C>(),
        TypeId::of::<T>(),
        explicit.as_ref().map(OperationMap::fingerprint),
    );
    if let Some(model) = MODELS.read().get().and_then(|map| map.get(&key).copied()) {
        return Ok(model);
    }

    let interface = Interface::of::<C>()?;
    let completed = complete::<C, T>(explicit.unwrap_or_default())?;
    let functions = completed
        .entries()
        .map(|(_, entry)| entry.function)
        .collect::<Box<[_]>>();
    registry::mark_materialized(interface, TypeId::of::<T>());

    let mut guard = MODELS.write();
    let model = *guard.get_or_default().entry(key).or_insert_with(|| {
        Box::leak(Box::new(Model {
            interface,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            functions,
        }))
    });
    Ok(model)
}
