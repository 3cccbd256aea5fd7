//! Dispatch table layouts: coverage, sharing and compression.

use polycept::{
    DispatchTable, ErasureError,
    builtin::Erasable,
    layout::{Everything, EverythingElse, Except, Indirect, Inline, Joined, Layout, Only},
    prelude::*,
};

polycept::signature! {
    pub struct F = fn(&Self) -> u8;
    pub struct G = fn(&Self) -> u8;
    pub struct H = fn(&Self) -> u8;
}

static OP_F: Operation<F> = Operation::new("f");
static OP_G: Operation<G> = Operation::new("g");
static OP_H: Operation<H> = Operation::new("h");

/// The interface `{f, g, h}`.
struct Fgh;

impl Concept for Fgh {
    type Refines = ();

    fn clauses(clauses: &mut Clauses) {
        clauses.declare(&OP_F).declare(&OP_G).declare(&OP_H);
    }
}

polycept::names! {
    struct OnlyF = ["f"];
    struct GAndH = ["g", "h"];
    struct FAndG = ["f", "g"];
    struct Missing = ["i"];
}

#[derive(Debug)]
struct Letters;

fn f(_: &Letters) -> u8 {
    b'f'
}
fn g(_: &Letters) -> u8 {
    b'g'
}
fn h(_: &Letters) -> u8 {
    b'h'
}

fn letters() -> OperationMap<Letters> {
    OperationMap::new()
        .with(&OP_F, f)
        .with(&OP_G, g)
        .with(&OP_H, h)
}

fn build<L: Layout>() -> Result<DispatchTable<Fgh, L>, rootcause::Report<ErasureError>> {
    DispatchTable::with_map(letters())
}

fn call_all<L: Layout>(table: &DispatchTable<Fgh, L>) -> Vec<u8> {
    let mut results = Vec::new();
    for index in 0..3 {
        let slot = table.slot(index).expect("every operation is placed");
        // SAFETY: all three operations share the signature `fn(&Letters) -> u8`
        let function: fn(&Letters) -> u8 = unsafe { core::mem::transmute(slot) };
        results.push(function(&Letters));
    }
    results
}

#[test]
fn test_joined_table_exposes_every_operation() {
    type Split = Joined<Inline<1, Only<OnlyF>>, Indirect<Only<GAndH>>>;

    let table = build::<Split>().unwrap();
    assert_eq!(table.names().collect::<Vec<_>>(), ["f", "g", "h"]);
    assert_eq!(call_all(&table), b"fgh");
    assert_eq!(table.index_of(&OP_H).unwrap(), 2);

    let (inline, indirect) = table.raw();
    assert_eq!(Inline::<1, Only<OnlyF>>::lookup_part(inline, 0), table.slot(0));
    assert!(Inline::<1, Only<OnlyF>>::lookup_part(inline, 1).is_none());
    assert!(indirect.has_slots());
    assert_eq!(table.type_name(), core::any::type_name::<Letters>());
}

#[test]
fn test_operation_routed_twice_is_rejected() {
    type Overlap = Joined<Inline<1, Only<OnlyF>>, Indirect<Only<FAndG>>>;

    let error = build::<Overlap>().unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::ClaimedTwice { operation: "f" }
    );

    type Greedy = Joined<Inline<1, Only<OnlyF>>, Indirect<Everything>>;
    let error = build::<Greedy>().unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::ClaimedTwice { operation: "f" }
    );
}

#[test]
fn test_uncovered_operations_are_rejected() {
    type Partial = Indirect<Only<GAndH>>;
    let error = build::<Partial>().unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::NotCovered { missing: vec!["f"] }
    );

    type Gap = Joined<Inline<1, Only<OnlyF>>, Indirect<Only<()>>>;
    let error = build::<Gap>().unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::NotCovered {
            missing: vec!["g", "h"]
        }
    );
}

#[test]
fn test_selector_naming_an_unknown_operation() {
    let error = build::<Indirect<Only<Missing>>>().unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::UnknownOperation { operation: "i", available, .. }
            if available == &["f", "g", "h"]
    ));

    let error = build::<Indirect<Except<Missing>>>().unwrap_err();
    assert!(matches!(
        error.current_context(),
        ErasureError::UnknownOperation { operation: "i", .. }
    ));
}

#[test]
fn test_inline_slot_count_must_match() {
    let error = build::<Inline<2>>().unwrap_err();
    assert_eq!(
        error.current_context(),
        &ErasureError::InlineCapacity {
            capacity: 2,
            selected: 3,
        }
    );
    assert_eq!(call_all(&build::<Inline<3>>().unwrap()), b"fgh");
}

#[test]
fn test_empty_side_is_compressed() {
    type InlineOnly = Joined<Inline<3>, Indirect>;
    type IndirectOnly = Joined<Inline<0, Only<()>>, Indirect>;

    let table = build::<InlineOnly>().unwrap();
    assert!(!table.raw().1.has_slots());
    assert_eq!(call_all(&table), b"fgh");
    assert_eq!(table.type_name(), core::any::type_name::<Letters>());

    assert_eq!(
        size_of::<<IndirectOnly as Layout>::Table>(),
        size_of::<usize>()
    );
    assert_eq!(
        size_of::<DispatchTable<Fgh, IndirectOnly>>(),
        size_of::<usize>()
    );
    assert_eq!(call_all(&build::<IndirectOnly>().unwrap()), b"fgh");
}

#[test]
fn test_indirect_tables_are_shared_per_type() {
    struct Other;

    fn other(_: &Other) -> u8 {
        0
    }

    let first = DispatchTable::<Erasable<Fgh>, Indirect>::with_map(letters()).unwrap();
    let second = DispatchTable::<Erasable<Fgh>, Indirect>::with_map(letters()).unwrap();
    assert!(first.raw().ptr_eq(*second.raw()));

    let map = OperationMap::<Other>::new()
        .with(&OP_F, other)
        .with(&OP_G, other)
        .with(&OP_H, other);
    let third = DispatchTable::<Erasable<Fgh>, Indirect>::with_map(map).unwrap();
    assert!(!first.raw().ptr_eq(*third.raw()));
    assert_eq!(third.type_name(), core::any::type_name::<Other>());

    // Values of the same type under the same layout point at one table.
    let a = Poly::<Fgh>::with_map(Letters, letters()).unwrap();
    let b = Poly::<Fgh>::with_map(Letters, letters()).unwrap();
    assert!(a.table().raw().ptr_eq(*b.table().raw()));
    assert!(a.table().raw().ptr_eq(*first.raw()));
}

#[test]
fn test_layouts_agree_on_results() {
    type Hot = Joined<Inline<2, Only<FAndG>>, Indirect<EverythingElse>>;

    let inline = Poly::<Fgh, polycept::storage::Remote, Inline<8>>::with_map(Letters, letters())
        .unwrap();
    let split =
        Poly::<Fgh, polycept::storage::Remote, Hot>::with_map(Letters, letters()).unwrap();
    let indirect = Poly::<Fgh>::with_map(Letters, letters()).unwrap();

    assert_eq!(F::call(inline.method(&OP_F), &inline), b'f');
    assert_eq!(F::call(split.method(&OP_F), &split), b'f');
    assert_eq!(F::call(indirect.method(&OP_F), &indirect), b'f');
    assert_eq!(H::call(split.method(&OP_H), &split), b'h');
    assert_eq!(G::call(inline.method(&OP_G), &inline), b'g');
}

#[test]
fn test_table_value_is_the_whole_table() {
    // An indirect value is one table pointer next to one storage pointer.
    assert_eq!(size_of::<DispatchTable<Erasable<Fgh>, Indirect>>(), size_of::<usize>());
    assert_eq!(size_of::<Poly<Fgh>>(), 2 * size_of::<usize>());

    // Inline slots sit next to one model pointer.
    type Slots = Inline<8>;
    assert_eq!(
        size_of::<DispatchTable<Erasable<Fgh>, Slots>>(),
        size_of::<<Slots as Layout>::Table>()
    );

    let poly = Poly::<Fgh, polycept::storage::Remote, Slots>::with_map(Letters, letters()).unwrap();
    assert!(poly.is::<Letters>());
    assert_eq!(poly.table().type_id(), core::any::TypeId::of::<Letters>());
    assert_eq!(poly.table().interface().len(), 8);
    assert_eq!(poly.table().model().type_name(), poly.type_name());
}
