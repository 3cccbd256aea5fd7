//! Process-wide registration of operation maps.
//!
//! Maps are keyed by `(concept, type)`. A concept and type pair can have one
//! registered map and one registered default map; completion consults the
//! map before the default. A registration for `(C, T)` must happen before the
//! first dispatch table of `T` that completes through `C`, either directly or
//! as a refined concept, so every such table observes the same operations.
//! Registrations for concepts no table of `T` has consulted stay open.

use alloc::boxed::Box;
use core::any::{Any, TypeId};

use hashbrown::{HashMap, HashSet};
use rootcause::{Report, report};
use rustc_hash::FxBuildHasher;

use crate::{
    completion, concept::Concept, error::ErasureError, interface::Interface, lock::RegistryLock,
    map::OperationMap,
};

type Key = (TypeId, TypeId);
type MapStore = HashMap<Key, Box<dyn Any + Send + Sync>, FxBuildHasher>;

#[derive(Default)]
struct Registry {
    maps: MapStore,
    defaults: MapStore,
    materialized: HashSet<Key, FxBuildHasher>,
}

static REGISTRY: RegistryLock<Registry> = RegistryLock::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Map,
    Default,
}

/// Registers the operation map of `T` under `C`.
///
/// The map may be partial: completion fills the remaining operations from the
/// default map, from `C`'s family defaults and from the refined concepts.
///
/// ```
/// use polycept::prelude::*;
///
/// polycept::signature! {
///     pub struct Name = fn(&Self) -> &'static str;
/// }
/// static NAME: Operation<Name> = Operation::new("name");
///
/// struct Named;
/// impl Concept for Named {
///     type Refines = ();
///     fn clauses(clauses: &mut Clauses) {
///         clauses.declare(&NAME);
///     }
/// }
///
/// struct Dog;
/// fn dog_name(_: &Dog) -> &'static str {
///     "dog"
/// }
///
/// polycept::register::<Named, Dog>(OperationMap::new().with(&NAME, dog_name)).unwrap();
/// let map = polycept::complete::<Named, Dog>(OperationMap::new()).unwrap();
/// assert!(map.contains("name"));
/// ```
///
/// # Errors
///
/// - [`ErasureError::DuplicateEntry`], [`ErasureError::UnknownOperation`],
///   [`ErasureError::SignatureMismatch`] and
///   [`ErasureError::ReservedOperation`] if the map does not fit the
///   interface of `C`.
/// - [`ErasureError::AlreadyRegistered`] if a map is already registered for
///   `C` and `T`.
/// - [`ErasureError::RegisteredAfterUse`] if a dispatch table for `T` was
///   already built through `C`, either directly or as a refined concept.
pub fn register<C: Concept, T: 'static>(
    map: OperationMap<T>,
) -> Result<(), Report<ErasureError>> {
    insert::<C, T>(Kind::Map, map)
}

/// Registers the default operation map of `T` under `C`.
///
/// The default is consulted after the registered map and before the family
/// defaults of [`Concept::default_map`].
///
/// # Errors
///
/// Fails like [`register`].
pub fn register_default<C: Concept, T: 'static>(
    map: OperationMap<T>,
) -> Result<(), Report<ErasureError>> {
    insert::<C, T>(Kind::Default, map)
}

fn insert<C: Concept, T: 'static>(
    kind: Kind,
    map: OperationMap<T>,
) -> Result<(), Report<ErasureError>> {
    let interface = Interface::of::<C>()?;
    completion::validate(interface, &map)?;

    let key = (TypeId::of::<C>(), TypeId::of::<T>());
    let mut guard = REGISTRY.write();
    let registry = guard.get_or_default();
    if registry.materialized.contains(&key) {
        return Err(report!(ErasureError::RegisteredAfterUse {
            concept: interface.name(),
            type_name: core::any::type_name::<T>(),
        }));
    }
    let store = match kind {
        Kind::Map => &mut registry.maps,
        Kind::Default => &mut registry.defaults,
    };
    if store.contains_key(&key) {
        return Err(report!(ErasureError::AlreadyRegistered {
            concept: interface.name(),
            type_name: core::any::type_name::<T>(),
        })
        .attach(alloc::format!("Registration kind: {kind:?}")));
    }
    store.insert(key, Box::new(map));
    tracing::debug!(
        concept = interface.name(),
        type_name = core::any::type_name::<T>(),
        ?kind,
        "registered operation map"
    );
    Ok(())
}

/// A copy of the map registered for `C` and `T`, if any.
pub(crate) fn lookup<C: Concept, T: 'static>(kind: Kind) -> Option<OperationMap<T>> {
    let guard = REGISTRY.read();
    let registry = guard.get()?;
    let store = match kind {
        Kind::Map => &registry.maps,
        Kind::Default => &registry.defaults,
    };
    store
        .get(&(TypeId::of::<C>(), TypeId::of::<T>()))?
        .downcast_ref::<OperationMap<T>>()
        .cloned()
}

/// Records that a dispatch table for `type_id` was completed through
/// `interface`, closing registration for that type under the concept and
/// every concept it refines.
pub(crate) fn mark_materialized(interface: &Interface, type_id: TypeId) {
    let mut guard = REGISTRY.write();
    let materialized = &mut guard.get_or_default().materialized;
    let mut pending = alloc::vec![interface];
    while let Some(interface) = pending.pop() {
        if materialized.insert((interface.concept(), type_id)) {
            pending.extend_from_slice(interface.refines());
        }
    }
}
