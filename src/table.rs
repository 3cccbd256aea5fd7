//! Typed dispatch tables.

use core::{any::TypeId, marker::PhantomData};

use polycept_internals::ErasedFn;
use rootcause::Report;

use crate::{
    completion::{self, Model},
    concept::Concept,
    error::ErasureError,
    interface::Interface,
    layout::{self, Layout},
    map::OperationMap,
    signature::{Operation, Signature},
};

/// The dispatch table of one concrete type under concept `C`, laid out by
/// `L`.
///
/// A table value is `Copy`: for [`Indirect`](crate::layout::Indirect) layouts
/// it is a pointer to the shared table, for [`Inline`](crate::layout::Inline)
/// layouts it is the function pointers themselves. It is exactly as large as
/// the layout's table value, which also reaches the interface and the
/// concrete type.
#[repr(transparent)]
pub struct DispatchTable<C, L: Layout> {
    raw: L::Table,
    _concept: PhantomData<fn() -> C>,
}

impl<C, L: Layout> Clone for DispatchTable<C, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, L: Layout> Copy for DispatchTable<C, L> {}

impl<C: Concept, L: Layout> DispatchTable<C, L> {
    /// The table of `T`, completed from the registered maps.
    ///
    /// # Errors
    ///
    /// Any error of [`complete`](crate::complete) or of the layout.
    pub fn for_type<T: 'static>() -> Result<Self, Report<ErasureError>> {
        Self::build(completion::model::<C, T>(None)?)
    }

    /// The table of `T`, completed from `map` and then the registered maps.
    ///
    /// # Errors
    ///
    /// Any error of [`complete`](crate::complete) or of the layout.
    pub fn with_map<T: 'static>(map: OperationMap<T>) -> Result<Self, Report<ErasureError>> {
        Self::build(completion::model::<C, T>(Some(map))?)
    }

    fn build(model: &'static Model) -> Result<Self, Report<ErasureError>> {
        Ok(Self {
            raw: layout::materialize::<L>(model)?,
            _concept: PhantomData,
        })
    }
}

impl<C, L: Layout> DispatchTable<C, L> {
    /// The model the table was built from.
    #[must_use]
    pub fn model(&self) -> &'static Model {
        L::model(&self.raw)
    }

    /// The interface the table implements.
    #[must_use]
    pub fn interface(&self) -> &'static Interface {
        self.model().interface()
    }

    /// The [`TypeId`] of the concrete type the table was built for.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.model().type_id()
    }

    /// The name of the concrete type the table was built for.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.model().type_name()
    }

    /// The closure index of `operation`.
    ///
    /// The index is remembered by `operation`, so later lookups against the
    /// same interface skip the name lookup.
    ///
    /// # Errors
    ///
    /// Fails like [`Interface::lookup`].
    pub fn index_of<S: Signature>(
        &self,
        operation: &Operation<S>,
    ) -> Result<usize, Report<ErasureError>> {
        self.interface().lookup(operation)
    }

    /// The names of every operation the table exposes, in index order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &'static str> {
        self.interface().names()
    }

    /// The layout's table value.
    #[must_use]
    pub fn raw(&self) -> &L::Table {
        &self.raw
    }

    /// The function at closure index `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<ErasedFn> {
        L::lookup(&self.raw, index)
    }
}

impl<C, L: Layout> core::fmt::Debug for DispatchTable<C, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("interface", &self.interface().name())
            .field("type_name", &self.type_name())
            .field("layout", &core::any::type_name::<L>())
            .finish()
    }
}
