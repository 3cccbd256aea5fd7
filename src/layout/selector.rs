use alloc::vec::Vec;
use core::marker::PhantomData;

use rootcause::{Report, report};

use crate::{error::ErasureError, interface::Interface, layout::OpSet};

/// A list of operation names, used to parameterize selectors.
///
/// Implemented for `()` (no names). Declare other lists with
/// [`names!`](crate::names!).
pub trait Names: 'static {
    /// The names in the list.
    const NAMES: &'static [&'static str];
}

impl Names for () {
    const NAMES: &'static [&'static str] = &[];
}

/// Declares a [`Names`] list.
///
/// ```
/// polycept::names! {
///     /// The operations kept inline.
///     pub struct Hot = ["next", "peek"];
/// }
///
/// use polycept::layout::Names;
/// assert_eq!(Hot::NAMES, ["next", "peek"]);
/// ```
#[macro_export]
macro_rules! names {
    ($(
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = [$($operation:literal),* $(,)?];
    )*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::layout::Names for $name {
            const NAMES: &'static [&'static str] = &[$($operation),*];
        }
    )*};
}

/// Chooses which operations of an interface a layout places.
///
/// Selectors run in layout order. Each one sees the operations no earlier
/// part of the layout has claimed yet.
pub trait Selector: 'static {
    /// Returns the selected operations.
    ///
    /// `remaining` holds the operations not claimed so far.
    #[doc(hidden)]
    fn select(interface: &Interface, remaining: OpSet) -> Result<OpSet, Report<ErasureError>>;
}

/// Selects every operation of the interface.
///
/// Fails with [`ErasureError::ClaimedTwice`] if an earlier part of the
/// layout already placed some operation.
#[derive(Debug, Clone, Copy)]
pub struct Everything;

/// Selects every operation not placed yet.
#[derive(Debug, Clone, Copy)]
pub struct EverythingElse;

/// Selects exactly the operations named by `N`.
pub struct Only<N>(PhantomData<fn() -> N>);

/// Selects every remaining operation except the ones named by `N`.
pub struct Except<N>(PhantomData<fn() -> N>);

fn index_of(
    interface: &Interface,
    operation: &'static str,
) -> Result<usize, Report<ErasureError>> {
    interface
        .index_of(operation)
        .ok_or_else(|| report!(interface.unknown(operation)))
}

fn first_name(interface: &Interface, set: OpSet) -> &'static str {
    set.iter()
        .find_map(|index| interface.clause(index))
        .map_or("<unknown>", |clause| clause.name())
}

impl Selector for Everything {
    fn select(interface: &Interface, remaining: OpSet) -> Result<OpSet, Report<ErasureError>> {
        let all = OpSet::full(interface.len());
        let claimed = all.difference(remaining);
        if !claimed.is_empty() {
            return Err(report!(ErasureError::ClaimedTwice {
                operation: first_name(interface, claimed),
            }));
        }
        Ok(all)
    }
}

impl Selector for EverythingElse {
    fn select(_interface: &Interface, remaining: OpSet) -> Result<OpSet, Report<ErasureError>> {
        Ok(remaining)
    }
}

impl<N: Names> Selector for Only<N> {
    fn select(interface: &Interface, remaining: OpSet) -> Result<OpSet, Report<ErasureError>> {
        let mut selected = OpSet::empty();
        for &operation in N::NAMES {
            let index = index_of(interface, operation)?;
            if !remaining.contains(index) {
                return Err(report!(ErasureError::ClaimedTwice { operation }));
            }
            selected.insert(index);
        }
        Ok(selected)
    }
}

impl<N: Names> Selector for Except<N> {
    fn select(interface: &Interface, remaining: OpSet) -> Result<OpSet, Report<ErasureError>> {
        let excluded = N::NAMES
            .iter()
            .map(|&operation| index_of(interface, operation))
            .collect::<Result<Vec<_>, _>>()?;
        let mut selected = remaining;
        for index in excluded {
            selected.remove(index);
        }
        Ok(selected)
    }
}
