//! Shared, process-wide dispatch tables.
//!
//! Every `(selection, model)` pair gets one leaked [`IndirectRow`], built on
//! first use. All polymorphic values holding the same concrete type under the
//! same selection point at that row, so comparing the pointers tells whether
//! two values hold the same type. An empty selection still gets a row,
//! without slots, because the row is how the table value reaches its model.

use alloc::{boxed::Box, vec::Vec};
use core::marker::PhantomData;

use hashbrown::HashMap;
use polycept_internals::ErasedFn;
use rootcause::Report;
use rustc_hash::FxBuildHasher;

use crate::{
    completion::Model,
    error::ErasureError,
    layout::{EverythingElse, Layout, OpSet, Selector},
    lock::RegistryLock,
};

/// Stores the operations picked by `Sel` in a shared table and keeps a single
/// pointer to it in the table value.
pub struct Indirect<Sel = EverythingElse>(PhantomData<fn() -> Sel>);

/// One shared table, indexed by closure index.
///
/// Next to its slots a row keeps the model it was built from, so the table
/// value needs no second pointer to know the interface and the type.
#[derive(Debug)]
pub struct IndirectRow {
    model: &'static Model,
    slots: Box<[Option<ErasedFn>]>,
}

/// Table value of [`Indirect`]: a pointer to a shared row.
#[derive(Copy, Clone, Debug)]
pub struct IndirectTable(&'static IndirectRow);

impl IndirectTable {
    /// Whether both tables point at the same shared row.
    #[must_use]
    pub fn ptr_eq(self, other: Self) -> bool {
        core::ptr::eq(self.0, other.0)
    }

    /// Whether the row holds any slot. A row of an empty selection only
    /// carries the model.
    #[must_use]
    pub fn has_slots(self) -> bool {
        !self.0.slots.is_empty()
    }
}

type RowKey = (usize, u64);

static ROWS: RegistryLock<HashMap<RowKey, &'static IndirectRow, FxBuildHasher>> =
    RegistryLock::new();

fn row(model: &'static Model, selected: OpSet) -> &'static IndirectRow {
    let key = (core::ptr::from_ref(model).addr(), selected.bits());
    if let Some(row) = ROWS.read().get().and_then(|rows| rows.get(&key).copied()) {
        return row;
    }

    let len = if selected.is_empty() {
        0
    } else {
        model.interface().len()
    };
    let slots = (0..len)
        .map(|index| {
            if selected.contains(index) {
                model.function(index)
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .into_boxed_slice();
    *ROWS
        .write()
        .get_or_default()
        .entry(key)
        .or_insert_with(|| Box::leak(Box::new(IndirectRow { model, slots })))
}

impl<Sel: Selector> Layout for Indirect<Sel> {
    type Table = IndirectTable;
    type Part = IndirectTable;

    fn claim(
        model: &'static Model,
        remaining: &mut OpSet,
    ) -> Result<Self::Part, Report<ErasureError>> {
        let selected = Sel::select(model.interface(), *remaining)?;
        for index in selected.iter() {
            remaining.remove(index);
        }
        Ok(IndirectTable(row(model, selected)))
    }

    fn anchor(_model: &'static Model, part: Self::Part) -> Self::Table {
        part
    }

    #[inline]
    fn model(table: &Self::Table) -> &'static Model {
        table.0.model
    }

    #[inline]
    fn lookup(table: &Self::Table, index: usize) -> Option<ErasedFn> {
        Self::lookup_part(table, index)
    }

    #[inline]
    fn lookup_part(part: &Self::Part, index: usize) -> Option<ErasedFn> {
        part.0.slots.get(index).copied().flatten()
    }
}
