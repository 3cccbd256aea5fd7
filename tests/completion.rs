//! Completing operation maps.
//!
//! Covers precedence between the sources (explicit map, registered map,
//! registered default, family default, refined concepts), idempotence,
//! refinement merging and the diagnostics of every completion error.
//!
//! The registry is process-wide, so every test works with its own types.

use polycept::{
    ErasureError, builtin,
    builtin::{CopyConstructible, EqualityComparable},
    prelude::*,
};

polycept::signature! {
    pub struct Name = fn(&Self) -> String;
    pub struct Size = fn(&Self) -> usize;
    pub struct Grow = fn(&mut Self, usize);
}

static NAME: Operation<Name> = Operation::new("name");
static SIZE: Operation<Size> = Operation::new("size");
static GROW: Operation<Grow> = Operation::new("grow");

/// Names every type by its Rust type name, unless told otherwise.
struct Named;

impl Concept for Named {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&NAME);
    }

    fn default_map<T: 'static>(map: OperationMap<T>) -> OperationMap<T> {
        map.with(&NAME, type_name_of::<T>)
    }
}

fn type_name_of<T>(_: &T) -> String {
    core::any::type_name::<T>().to_owned()
}

struct Measured;

impl Concept for Measured {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&SIZE);
    }
}

struct Growable;

impl Concept for Growable {
    type Refines = (Measured,);

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&GROW);
    }
}

/// No operations beyond the lifecycle ones.
struct Plain;

impl Concept for Plain {
    type Refines = ();

    fn clauses(_clauses: &mut Clauses) {}
}

/// Both branches, nothing of its own.
struct Container;

impl Concept for Container {
    type Refines = (Named, Growable);

    fn clauses(_clauses: &mut Clauses) {}
}

fn call_name<St: polycept::storage::Storage, L: polycept::layout::Layout, C: Concept>(
    poly: &Poly<C, St, L>,
) -> String {
    Name::call(poly.method(&NAME), poly)
}

#[derive(Clone, PartialEq, Debug)]
struct Bag(Vec<u8>);

fn bag_size(bag: &Bag) -> usize {
    bag.0.len()
}

fn bag_grow(bag: &mut Bag, by: usize) {
    bag.0.extend(core::iter::repeat_n(0, by));
}

fn bag_name(_: &Bag) -> String {
    "bag".to_owned()
}

#[test]
fn test_completion_is_idempotent() {
    let partial = OperationMap::<Bag>::new()
        .with(&SIZE, bag_size)
        .with(&GROW, bag_grow);
    let once = polycept::complete::<Container, Bag>(partial).unwrap();
    let twice = polycept::complete::<Container, Bag>(once.clone()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.names().collect::<Vec<_>>(), ["name", "size", "grow"]);
}

#[test]
fn test_refinements_merge_like_the_flattened_concept() {
    struct Flat;

    impl Concept for Flat {
        type Refines = ();

        fn clauses(clauses: &mut Clauses) {
            clauses.declare(&NAME).declare(&SIZE).declare(&GROW);
        }
    }

    let partial = || {
        OperationMap::<Bag>::new()
            .with(&NAME, bag_name)
            .with(&SIZE, bag_size)
            .with(&GROW, bag_grow)
    };
    let through_bases = polycept::complete::<Container, Bag>(partial()).unwrap();
    let flattened = polycept::complete::<Flat, Bag>(partial()).unwrap();
    assert_eq!(through_bases, flattened);

    // Completing each base on its own covers the same bindings.
    let named = polycept::complete::<Named, Bag>(OperationMap::new().with(&NAME, bag_name)).unwrap();
    let growable = polycept::complete::<Growable, Bag>(
        OperationMap::new().with(&SIZE, bag_size).with(&GROW, bag_grow),
    )
    .unwrap();
    assert_eq!(named.len() + growable.len(), through_bases.len());
    assert!(named.names().chain(growable.names()).all(|name| through_bases.contains(name)));
}

#[test]
fn test_family_default_fills_the_gap() {
    #[derive(Debug)]
    struct Anonymous;

    let poly = Poly::<Named>::new(Anonymous).unwrap();
    assert_eq!(call_name(&poly), core::any::type_name::<Anonymous>());
}

#[test]
fn test_precedence_of_sources() {
    struct Registered;
    struct Defaulted;

    fn registered_name(_: &Registered) -> String {
        "registered".to_owned()
    }
    fn registered_default(_: &Registered) -> String {
        "registered default".to_owned()
    }
    fn defaulted_name(_: &Defaulted) -> String {
        "default".to_owned()
    }
    fn explicit_name(_: &Registered) -> String {
        "explicit".to_owned()
    }

    polycept::register_default::<Named, Registered>(
        OperationMap::new().with(&NAME, registered_default),
    )
    .unwrap();
    polycept::register::<Named, Registered>(OperationMap::new().with(&NAME, registered_name))
        .unwrap();
    polycept::register_default::<Named, Defaulted>(OperationMap::new().with(&NAME, defaulted_name))
        .unwrap();

    // The registered map wins over the registered default.
    let registered = Poly::<Named>::new(Registered).unwrap();
    assert_eq!(call_name(&registered), "registered");

    // The registered default wins over the family default.
    let defaulted = Poly::<Named>::new(Defaulted).unwrap();
    assert_eq!(call_name(&defaulted), "default");

    // An explicit map wins over everything.
    let explicit =
        Poly::<Named>::with_map(Registered, OperationMap::new().with(&NAME, explicit_name))
            .unwrap();
    assert_eq!(call_name(&explicit), "explicit");
}

#[test]
fn test_partial_map_keeps_explicit_entries() {
    struct Counter(usize);

    fn counter_size(counter: &Counter) -> usize {
        counter.0
    }
    fn counter_grow(counter: &mut Counter, by: usize) {
        counter.0 += by;
    }
    fn counter_name(_: &Counter) -> String {
        "counter".to_owned()
    }

    polycept::register::<Growable, Counter>(
        OperationMap::new()
            .with(&SIZE, counter_size)
            .with(&GROW, counter_grow),
    )
    .unwrap();

    // `Container` gets `size` and `grow` from the `Growable` registration,
    // and `name` from the explicit map.
    let mut poly =
        Poly::<Container>::with_map(Counter(1), OperationMap::new().with(&NAME, counter_name))
            .unwrap();
    Grow::call(poly.method(&GROW), &mut poly, 2);
    assert_eq!(Size::call(poly.method(&SIZE), &poly), 3);
    assert_eq!(call_name(&poly), "counter");
}

#[test]
fn test_incomplete_names_exactly_the_missing_operation() {
    struct Unmeasured;

    let error = polycept::complete::<Container, Unmeasured>(OperationMap::new()).unwrap_err();
    match error.current_context() {
        ErasureError::Incomplete {
            interface,
            type_name,
            supplied,
            missing,
        } => {
            assert_eq!(*interface, Container::name());
            assert_eq!(*type_name, core::any::type_name::<Unmeasured>());
            assert_eq!(supplied, &["name"]);
            assert_eq!(missing, &["size", "grow"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    fn size(_: &Unmeasured) -> usize {
        0
    }
    let error =
        polycept::complete::<Container, Unmeasured>(OperationMap::new().with(&SIZE, size)).unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::Incomplete { missing, .. } if missing == &["grow"]
    ));
}

#[test]
fn test_map_validation() {
    struct Sample;

    fn size(_: &Sample) -> usize {
        0
    }
    fn other_size(_: &Sample) -> usize {
        1
    }
    fn grow(_: &mut Sample, _: usize) {}

    let error = polycept::complete::<Measured, Sample>(
        OperationMap::new().with(&SIZE, size).with(&SIZE, other_size),
    )
    .unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::DuplicateEntry { operation: "size" }
    );

    let error = polycept::complete::<Measured, Sample>(
        OperationMap::new().with(&SIZE, size).with(&GROW, grow),
    )
    .unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::UnknownOperation { operation: "grow", available, .. }
            if available == &["size"]
    ));

    static MISTYPED: Operation<Name> = Operation::new("size");
    fn mistyped(_: &Sample) -> String {
        String::new()
    }
    let error =
        polycept::complete::<Measured, Sample>(OperationMap::new().with(&MISTYPED, mistyped))
            .unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::SignatureMismatch { operation: "size", .. }
    ));
}

#[test]
fn test_registration_errors() {
    struct Late;
    struct Twice;

    fn late_size(_: &Late) -> usize {
        0
    }
    fn twice_size(_: &Twice) -> usize {
        0
    }

    polycept::register::<Measured, Twice>(OperationMap::new().with(&SIZE, twice_size)).unwrap();
    let error = polycept::register::<Measured, Twice>(OperationMap::new().with(&SIZE, twice_size))
        .unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::AlreadyRegistered { .. }
    ));

    // Building a table for `Late` through `Named` closes registration for
    // `Late` under `Named`, but not under concepts the table never consulted.
    let _poly = Poly::<Named>::new(Late).unwrap();
    let error = polycept::register::<Named, Late>(OperationMap::new()).unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::RegisteredAfterUse {
            concept: Named::name(),
            type_name: core::any::type_name::<Late>(),
        }
    );
    polycept::register::<Measured, Late>(OperationMap::new().with(&SIZE, late_size)).unwrap();
}

#[test]
fn test_registration_closes_for_refined_concepts() {
    struct Sealed(Vec<u8>);

    fn sealed_size(sealed: &Sealed) -> usize {
        sealed.0.len()
    }
    fn sealed_grow(sealed: &mut Sealed, by: usize) {
        sealed.0.resize(sealed.0.len() + by, 0);
    }
    fn sealed_name(_: &Sealed) -> String {
        "sealed".to_owned()
    }

    // An unrelated concept leaves every registration open.
    let _plain = Poly::<Plain>::new(Sealed(Vec::new())).unwrap();
    polycept::register::<Measured, Sealed>(OperationMap::new().with(&SIZE, sealed_size)).unwrap();
    polycept::register::<Growable, Sealed>(OperationMap::new().with(&GROW, sealed_grow)).unwrap();

    let poly = Poly::<Growable>::new(Sealed(vec![1, 2])).unwrap();
    assert_eq!(Size::call(poly.method(&SIZE), &poly), 2);

    // `Growable` refines `Measured`, so both are closed now. `Named` is not.
    for error in [
        polycept::register_default::<Growable, Sealed>(OperationMap::new()).unwrap_err(),
        polycept::register_default::<Measured, Sealed>(OperationMap::new()).unwrap_err(),
    ] {
        assert!(matches!(
            error.current_context(),
            ErasureError::RegisteredAfterUse { .. }
        ));
    }
    polycept::register::<Named, Sealed>(OperationMap::new().with(&NAME, sealed_name)).unwrap();
}

#[test]
fn test_lifecycle_operations_are_reserved() {
    use core::any::TypeId;

    use polycept::StorageInfo;

    struct Disguised(u8);

    fn string_type_id() -> TypeId {
        TypeId::of::<String>()
    }
    fn oversized() -> StorageInfo {
        StorageInfo::of::<[u64; 64]>()
    }

    // A forged identity would let `downcast_ref::<String>` read a `u8`.
    let error = Poly::<Plain>::with_map(
        Disguised(5),
        OperationMap::new().with(&builtin::TYPE_ID, string_type_id),
    )
    .unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::ReservedOperation {
            operation: "type_id",
            type_name: core::any::type_name::<Disguised>(),
        }
    );

    let error = polycept::register::<builtin::Storable, Disguised>(
        OperationMap::new().with(&builtin::STORAGE_INFO, oversized),
    )
    .unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::ReservedOperation {
            operation: "storage_info",
            ..
        }
    ));

    // The derived lifecycle functions survive a second completion.
    let once = polycept::complete::<builtin::Erasable<Plain>, Disguised>(OperationMap::new())
        .unwrap();
    let twice = polycept::complete::<builtin::Erasable<Plain>, Disguised>(once.clone()).unwrap();
    assert_eq!(once, twice);

    let poly = Poly::<Plain>::new(Disguised(5)).unwrap();
    assert!(poly.downcast_ref::<String>().is_none());
    assert_eq!(poly.downcast_ref::<Disguised>().map(|value| value.0), Some(5));
}

#[test]
fn test_builtin_registrations() {
    struct Comparable;

    impl Concept for Comparable {
        type Refines = (CopyConstructible, EqualityComparable);

        fn clauses(_clauses: &mut Clauses) {}
    }

    #[derive(Clone, PartialEq)]
    struct Point(i32, i32);

    builtin::register_clone::<Point>().unwrap();
    builtin::register_equality::<Point>().unwrap();

    let origin = Poly::<Comparable>::new(Point(0, 0)).unwrap();
    let copy = origin.clone();
    let other = Poly::<Comparable>::new(Point(1, 0)).unwrap();
    assert!(origin.equals(&copy).unwrap());
    assert!(!origin.equals(&other).unwrap());

    // Values of different types are never equal.
    let text = Poly::<Comparable>::with_map(
        String::from("origin"),
        OperationMap::new().with_clone().with_equality(),
    )
    .unwrap();
    assert!(!origin.equals(&text).unwrap());
}

#[test]
fn test_bag_round_trip_through_poly() {
    let mut poly = Poly::<Growable>::with_map(
        Bag(vec![1]),
        OperationMap::new()
            .with(&SIZE, bag_size)
            .with(&GROW, bag_grow),
    )
    .unwrap();
    Grow::call(poly.method(&GROW), &mut poly, 3);
    assert_eq!(poly.downcast_ref::<Bag>(), Some(&Bag(vec![1, 0, 0, 0])));
}
