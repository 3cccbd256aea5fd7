use alloc::vec::Vec;
use core::marker::PhantomData;

use polycept_internals::ErasedFn;
use rootcause::{Report, report};

use crate::{
    completion::Model,
    error::ErasureError,
    layout::{Anchored, Everything, Layout, OpSet, Selector},
};

/// Stores the `N` operations picked by `Sel` directly in the table value.
///
/// The selector must pick exactly `N` operations, otherwise building the
/// table fails with [`ErasureError::InlineCapacity`]. Reading a slot costs
/// no indirection. On its own the table value also keeps a pointer to the
/// model; as the first half of a [`Joined`](crate::layout::Joined) layout it
/// is the slots alone, and `Inline<0, _>` is then zero-sized.
pub struct Inline<const N: usize, Sel = Everything>(PhantomData<fn() -> Sel>);

/// The slots of [`Inline`].
#[derive(Copy, Clone)]
pub struct InlineTable<const N: usize> {
    indices: [u8; N],
    functions: [ErasedFn; N],
}

impl<const N: usize> core::fmt::Debug for InlineTable<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InlineTable")
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}

impl<const N: usize, Sel: Selector> Layout for Inline<N, Sel> {
    type Table = Anchored<InlineTable<N>>;
    type Part = InlineTable<N>;

    fn claim(
        model: &'static Model,
        remaining: &mut OpSet,
    ) -> Result<Self::Part, Report<ErasureError>> {
        let selected = Sel::select(model.interface(), *remaining)?;
        if selected.len() != N {
            return Err(report!(ErasureError::InlineCapacity {
                capacity: N,
                selected: selected.len(),
            }));
        }

        let positions = selected.iter().collect::<Vec<_>>();
        let functions = positions
            .iter()
            .map(|&index| model.function(index))
            .collect::<Option<Vec<_>>>()
            .and_then(|functions| <[ErasedFn; N]>::try_from(functions).ok());
        let Some(functions) = functions else {
            return Err(report!(ErasureError::InlineCapacity {
                capacity: N,
                selected: positions.len(),
            }));
        };
        // Closure indices are below 64, see `MAX_OPERATIONS`.
        let indices = core::array::from_fn(|slot| positions[slot] as u8);

        for index in positions {
            remaining.remove(index);
        }
        Ok(InlineTable { indices, functions })
    }

    fn anchor(model: &'static Model, part: Self::Part) -> Self::Table {
        Anchored { model, part }
    }

    #[inline]
    fn model(table: &Self::Table) -> &'static Model {
        table.model
    }

    #[inline]
    fn lookup(table: &Self::Table, index: usize) -> Option<ErasedFn> {
        Self::lookup_part(&table.part, index)
    }

    #[inline]
    fn lookup_part(part: &Self::Part, index: usize) -> Option<ErasedFn> {
        let position = part
            .indices
            .iter()
            .position(|&slot| usize::from(slot) == index)?;
        Some(part.functions[position])
    }
}
