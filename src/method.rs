//! Erased functions taken out of a dispatch table.

use core::{any::TypeId, marker::PhantomData, ptr::NonNull};

use polycept_internals::{Erased, ErasedFn};

use crate::signature::{Moved, Signature, restore};

/// The function implementing one operation for the concrete type held by a
/// polymorphic value.
///
/// A method remembers the concrete type it was taken from. The `call`
/// functions generated by [`signature!`](crate::signature!) check every
/// receiver argument against it before erasing the argument.
pub struct Method<S> {
    function: ErasedFn,
    type_id: TypeId,
    type_name: &'static str,
    _signature: PhantomData<fn() -> S>,
}

impl<S> Clone for Method<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Method<S> {}

impl<S: Signature> Method<S> {
    /// # Safety
    ///
    /// `function` must be the slot of an operation with signature `S`,
    /// implemented for the type identified by `type_id`.
    pub(crate) unsafe fn new(function: ErasedFn, type_id: TypeId, type_name: &'static str) -> Self {
        Self {
            function,
            type_id,
            type_name,
            _signature: PhantomData,
        }
    }

    /// The erased function.
    ///
    /// # Safety
    ///
    /// Every self placeholder argument passed to the returned function must
    /// point to a live object of the type this method was taken from, with
    /// the access the placeholder form requires.
    #[doc(hidden)]
    #[must_use]
    pub unsafe fn function(&self) -> S::Fn<Erased> {
        // SAFETY: the slot was stored for signature `S`, guaranteed by the
        // constructor
        unsafe { restore::<S>(self.function) }
    }

    /// The [`TypeId`] of the concrete type this method was taken from.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The name of the concrete type this method was taken from.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn check(&self, receiver: &impl Receiver) {
        assert!(
            receiver.object_type_id() == self.type_id,
            "method taken from a {} was called with a receiver holding a different type",
            self.type_name
        );
    }
}

impl<S> core::fmt::Debug for Method<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Method")
            .field("signature", &core::any::type_name::<S>())
            .field("type_name", &self.type_name)
            .finish()
    }
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A value that can be passed in a self placeholder position.
///
/// Implemented by [`Poly`](crate::Poly) only: the engine cannot erase an
/// arbitrary object to "the same type as the receiver".
pub trait Receiver: sealed::Sealed {
    /// The [`TypeId`] of the held object.
    fn object_type_id(&self) -> TypeId;

    /// Pointer to the held object.
    fn object_ptr(&self) -> NonNull<Erased>;

    /// Pointer to the held object, if the receiver grants exclusive access.
    fn object_mut_ptr(&mut self) -> Option<NonNull<Erased>>;
}

fn exclusive<S: Signature>(method: &Method<S>, receiver: &mut impl Receiver) -> NonNull<Erased> {
    match receiver.object_mut_ptr() {
        Some(ptr) => ptr,
        None => panic!(
            "the {} held by this receiver cannot be accessed mutably",
            method.type_name
        ),
    }
}

/// Erases a `&Self` argument.
pub fn erase_ref<'a, S: Signature>(method: &Method<S>, receiver: &'a impl Receiver) -> &'a Erased {
    method.check(receiver);
    // SAFETY: the pointer refers to the object held by `receiver`, which stays
    // alive and unaliased by writers while `receiver` is borrowed
    unsafe { receiver.object_ptr().as_ref() }
}

/// Erases a `&mut Self` argument.
pub fn erase_mut<'a, S: Signature>(
    method: &Method<S>,
    receiver: &'a mut impl Receiver,
) -> &'a mut Erased {
    method.check(&*receiver);
    let mut ptr = exclusive(method, receiver);
    // SAFETY: the receiver granted exclusive access for as long as it is
    // mutably borrowed
    unsafe { ptr.as_mut() }
}

/// Erases a `&move Self` argument.
pub fn erase_moved<'a, S: Signature>(
    method: &Method<S>,
    receiver: &'a mut impl Receiver,
) -> Moved<'a, Erased> {
    Moved::new(erase_mut(method, receiver))
}

/// Erases a `*const Self` argument.
pub fn erase_const_ptr<S: Signature>(method: &Method<S>, receiver: &impl Receiver) -> *const Erased {
    method.check(receiver);
    receiver.object_ptr().as_ptr().cast_const()
}

/// Erases a `*mut Self` argument.
pub fn erase_mut_ptr<S: Signature>(method: &Method<S>, receiver: &mut impl Receiver) -> *mut Erased {
    method.check(&*receiver);
    exclusive(method, receiver).as_ptr()
}
