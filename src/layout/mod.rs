//! Physical layouts of dispatch tables.
//!
//! A [`Layout`] decides where the function pointers of a dispatch table
//! live:
//!
//! - [`Inline`]: inside the table value itself. Reading a slot costs no
//!   indirection, and the table value grows by one pointer per operation.
//! - [`Indirect`]: in a process-wide table shared by every value of the same
//!   concrete type. The table value is a single pointer.
//! - [`Joined`]: two layouts side by side, each placing the operations its
//!   [`Selector`] picks.
//!
//! ```
//! use polycept::layout::{Indirect, Inline, Joined, Only};
//!
//! polycept::names! {
//!     struct Hot = ["next"];
//! }
//!
//! // `next` lives in the table value, everything else behind one pointer.
//! type Split = Joined<Inline<1, Only<Hot>>, Indirect>;
//! ```
//!
//! Every operation of the interface must be placed by exactly one part of the
//! layout. Overlaps are reported as [`ErasureError::ClaimedTwice`] and gaps
//! as [`ErasureError::NotCovered`] when the table is built.
//!
//! Every table value reaches the model it was built from, which knows the
//! interface and the concrete type. An [`Indirect`] table value is one
//! pointer, because the shared row carries the model. An [`Inline`] table
//! value carries a model pointer in front of its slots, unless it is the first
//! half of a [`Joined`] layout, where the second half already reaches the
//! model. So an empty [`Inline`] in front of another layout is zero-sized,
//! and an empty [`Indirect`] points at a row without slots.

mod indirect;
mod inline;
mod selector;

use alloc::{boxed::Box, vec::Vec};
use core::any::{Any, TypeId};

use hashbrown::HashMap;
use polycept_internals::ErasedFn;
use rootcause::{Report, report};
use rustc_hash::FxBuildHasher;

pub use self::{
    indirect::{Indirect, IndirectRow, IndirectTable},
    inline::{Inline, InlineTable},
    selector::{Everything, EverythingElse, Except, Names, Only, Selector},
};
use crate::{completion::Model, error::ErasureError, lock::RegistryLock};

/// A set of operation indices of one interface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct OpSet(u64);

impl OpSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The indices `0..len`.
    #[must_use]
    pub const fn full(len: usize) -> Self {
        if len >= 64 {
            Self(u64::MAX)
        } else {
            Self((1 << len) - 1)
        }
    }

    /// Whether `index` is in the set.
    #[must_use]
    pub const fn contains(self, index: usize) -> bool {
        index < 64 && self.0 & (1 << index) != 0
    }

    /// Adds `index` to the set.
    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < 64);
        self.0 |= 1 << index;
    }

    /// Removes `index` from the set.
    pub fn remove(&mut self, index: usize) {
        if index < 64 {
            self.0 &= !(1 << index);
        }
    }

    /// The indices in `self` but not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of indices in the set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// The indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..64).filter(move |&index| self.contains(index))
    }

    pub(crate) fn bits(self) -> u64 {
        self.0
    }
}

/// A physical dispatch table layout.
///
/// The table value of a layout is [`Layout::Table`]. It is `Copy`, so a
/// polymorphic value can duplicate its table before duplicating its storage,
/// and it reaches the [`Model`] it was built from, so a dispatch table needs
/// nothing beside it. [`Layout::Part`] holds the slots alone and is what a
/// layout contributes as the first half of a [`Joined`] layout.
pub trait Layout: 'static {
    /// The table value stored in every polymorphic value.
    type Table: Copy + Send + Sync + 'static;

    /// The slots the layout places, without the model.
    type Part: Copy + Send + Sync + 'static;

    /// Places the operations the layout selects for `model`, removing them
    /// from `remaining`.
    #[doc(hidden)]
    fn claim(
        model: &'static Model,
        remaining: &mut OpSet,
    ) -> Result<Self::Part, Report<ErasureError>>;

    /// Turns the placed slots into a table value that reaches `model`.
    #[doc(hidden)]
    fn anchor(model: &'static Model, part: Self::Part) -> Self::Table;

    /// The model a table value was built from.
    #[doc(hidden)]
    fn model(table: &Self::Table) -> &'static Model;

    /// The function at closure index `index`, if this layout placed it.
    #[doc(hidden)]
    fn lookup(table: &Self::Table, index: usize) -> Option<ErasedFn>;

    /// The function at closure index `index` within the slots alone.
    #[doc(hidden)]
    fn lookup_part(part: &Self::Part, index: usize) -> Option<ErasedFn>;
}

/// The table value of a layout whose slots cannot reach the model, such as
/// [`Inline`]: a model pointer in front of the slots.
#[derive(Copy, Clone)]
pub struct Anchored<P> {
    model: &'static Model,
    part: P,
}

impl<P> Anchored<P> {
    /// The slots.
    #[must_use]
    pub fn part(&self) -> &P {
        &self.part
    }
}

impl<P: core::fmt::Debug> core::fmt::Debug for Anchored<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Anchored")
            .field("type_name", &self.model.type_name())
            .field("part", &self.part)
            .finish()
    }
}

/// Two layouts side by side.
///
/// `A` claims its operations first and `B` sees the rest. Lookups try `A`
/// and then `B`. Only `B` reaches the model, so `A` adds nothing but its
/// slots to the table value.
pub struct Joined<A, B>(core::marker::PhantomData<fn() -> (A, B)>);

impl<A: Layout, B: Layout> Layout for Joined<A, B> {
    type Table = (A::Part, B::Table);
    type Part = (A::Part, B::Part);

    fn claim(
        model: &'static Model,
        remaining: &mut OpSet,
    ) -> Result<Self::Part, Report<ErasureError>> {
        let first = A::claim(model, remaining)?;
        let second = B::claim(model, remaining)?;
        Ok((first, second))
    }

    fn anchor(model: &'static Model, (first, second): Self::Part) -> Self::Table {
        (first, B::anchor(model, second))
    }

    #[inline]
    fn model(table: &Self::Table) -> &'static Model {
        B::model(&table.1)
    }

    #[inline]
    fn lookup(table: &Self::Table, index: usize) -> Option<ErasedFn> {
        A::lookup_part(&table.0, index).or_else(|| B::lookup(&table.1, index))
    }

    #[inline]
    fn lookup_part(part: &Self::Part, index: usize) -> Option<ErasedFn> {
        A::lookup_part(&part.0, index).or_else(|| B::lookup_part(&part.1, index))
    }
}

type TableKey = (TypeId, usize);

static TABLES: RegistryLock<HashMap<TableKey, Box<dyn Any + Send + Sync>, FxBuildHasher>> =
    RegistryLock::new();

/// Builds, or fetches the cached, table value of layout `L` for `model`.
///
/// # Errors
///
/// - Any error a selector of `L` reports.
/// - [`ErasureError::NotCovered`] if `L` leaves operations unplaced.
pub(crate) fn materialize<L: Layout>(
    model: &'static Model,
) -> Result<L::Table, Report<ErasureError>> {
    let key = (TypeId::of::<L>(), core::ptr::from_ref(model).addr());
    if let Some(table) = TABLES
        .read()
        .get()
        .and_then(|tables| tables.get(&key)?.downcast_ref::<L::Table>().copied())
    {
        return Ok(table);
    }

    let interface = model.interface();
    let mut remaining = OpSet::full(interface.len());
    let part = L::claim(model, &mut remaining)?;
    if !remaining.is_empty() {
        let missing = remaining
            .iter()
            .filter_map(|index| interface.clause(index))
            .map(|clause| clause.name())
            .collect::<Vec<_>>();
        return Err(report!(ErasureError::NotCovered { missing })
            .attach(alloc::format!("Layout: {}", core::any::type_name::<L>())));
    }

    let table = L::anchor(model, part);
    tracing::trace!(
        interface = interface.name(),
        type_name = model.type_name(),
        layout = core::any::type_name::<L>(),
        "materialized dispatch table"
    );
    TABLES
        .write()
        .get_or_default()
        .entry(key)
        .or_insert_with(|| Box::new(table));
    Ok(table)
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn test_op_set() {
        let mut set = OpSet::full(5);
        assert_eq!(set.len(), 5);
        set.remove(1);
        set.remove(3);
        assert_eq!(set.iter().collect::<Vec<_>>(), [0, 2, 4]);
        assert_eq!(
            OpSet::full(5).difference(set).iter().collect::<Vec<_>>(),
            [1, 3]
        );
        assert_eq!(OpSet::full(64).len(), 64);
        assert!(OpSet::empty().is_empty());
        assert!(!OpSet::full(0).contains(0));
    }

    static_assertions::assert_eq_size!(<Inline<0> as Layout>::Part, ());
    static_assertions::assert_eq_size!(<Inline<0> as Layout>::Table, usize);
    static_assertions::assert_eq_size!(<Indirect as Layout>::Table, usize);
    static_assertions::assert_eq_size!(
        <Joined<Inline<0, Only<()>>, Indirect> as Layout>::Table,
        usize
    );
    static_assertions::assert_eq_size!(<Inline<2> as Layout>::Part, [usize; 3]);
    static_assertions::assert_eq_size!(<Inline<2> as Layout>::Table, [usize; 4]);
    static_assertions::assert_eq_size!(
        <Joined<Inline<1, Only<()>>, Indirect> as Layout>::Table,
        [usize; 3]
    );
}
