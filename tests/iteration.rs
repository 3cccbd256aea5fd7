//! Iterating one erased sequence through every storage and layout.
//!
//! The same `[1, 2, 3, 4]` iterator is erased behind a forward-iteration
//! concept with each combination of storage kind and table layout. Storage
//! and layout are implementation details, so every combination must yield the
//! original sequence.

use std::sync::Once;

use polycept::{
    layout::{Except, Indirect, Inline, Joined, Layout, Only},
    prelude::*,
    storage::{BorrowedMut, Fallback, Local, OwningStorage, Remote, Sbo, Shared, Storage},
};

polycept::signature! {
    pub struct Next = fn(&mut Self) -> Option<u32>;
}

static NEXT: Operation<Next> = Operation::new("next");

struct Iterate;

impl Concept for Iterate {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&NEXT);
    }
}

polycept::names! {
    struct Hot = ["next"];
    struct Lifecycle = ["destruct", "move_construct"];
}

static VALUES: [u32; 4] = [1, 2, 3, 4];

type Values = core::slice::Iter<'static, u32>;

fn next(values: &mut Values) -> Option<u32> {
    values.next().copied()
}

fn setup() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        polycept::register::<Iterate, Values>(OperationMap::new().with(&NEXT, next)).unwrap();
    });
}

fn drain<St: Storage, L: Layout>(poly: &mut Poly<Iterate, St, L>) -> Vec<u32> {
    let next = poly.method(&NEXT);
    let mut collected = Vec::new();
    while let Some(value) = Next::call(next, poly) {
        collected.push(value);
    }
    collected
}

fn collect<St: OwningStorage, L: Layout>() -> Vec<u32> {
    setup();
    let mut poly = Poly::<Iterate, St, L>::new(VALUES.iter()).unwrap();
    drain(&mut poly)
}

type Split = Joined<Inline<1, Only<Hot>>, Indirect>;
type Cold = Joined<Indirect<Only<Lifecycle>>, Inline<4, Except<Lifecycle>>>;

#[test]
fn test_remote() {
    assert_eq!(collect::<Remote, Indirect>(), VALUES);
    assert_eq!(collect::<Remote, Inline<6>>(), VALUES);
    assert_eq!(collect::<Remote, Split>(), VALUES);
    assert_eq!(collect::<Remote, Cold>(), VALUES);
}

#[test]
fn test_local() {
    assert_eq!(collect::<Local<16>, Indirect>(), VALUES);
    assert_eq!(collect::<Local<16>, Inline<6>>(), VALUES);
    assert_eq!(collect::<Local<16>, Split>(), VALUES);
}

#[test]
fn test_sbo() {
    assert_eq!(collect::<Sbo<16>, Indirect>(), VALUES);
    assert_eq!(collect::<Sbo<16>, Inline<6>>(), VALUES);
    assert_eq!(collect::<Sbo<16>, Split>(), VALUES);
    // Too small for the iterator, so it lives on the heap.
    assert_eq!(collect::<Sbo<8>, Split>(), VALUES);
}

#[test]
fn test_fallback() {
    assert_eq!(collect::<Fallback<Local<16>, Remote>, Indirect>(), VALUES);
    assert_eq!(collect::<Fallback<Local<16>, Remote>, Inline<6>>(), VALUES);
    assert_eq!(collect::<Fallback<Local<8>, Remote>, Split>(), VALUES);
}

#[test]
fn test_shared() {
    assert_eq!(collect::<Shared, Indirect>(), VALUES);
    assert_eq!(collect::<Shared, Split>(), VALUES);
}

#[test]
fn test_borrowed_mut() {
    setup();
    let mut values = VALUES.iter();
    {
        let mut poly = Poly::<Iterate, BorrowedMut<'_>>::borrowed_mut(&mut values).unwrap();
        assert_eq!(Next::call(poly.method(&NEXT), &mut poly), Some(1));
    }
    // The borrowed iterator advanced in place.
    assert_eq!(values.next(), Some(&2));
}

#[test]
fn test_sbo_placement() {
    setup();
    let inline = Poly::<Iterate, Sbo<16>>::new(VALUES.iter()).unwrap();
    let heap = Poly::<Iterate, Sbo<8>>::new(VALUES.iter()).unwrap();
    assert!(!inline.storage().on_heap());
    assert!(heap.storage().on_heap());

    let primary = Poly::<Iterate, Fallback<Local<16>, Remote>>::new(VALUES.iter()).unwrap();
    let secondary = Poly::<Iterate, Fallback<Local<8>, Remote>>::new(VALUES.iter()).unwrap();
    assert!(primary.storage().in_primary());
    assert!(!secondary.storage().in_primary());
}
