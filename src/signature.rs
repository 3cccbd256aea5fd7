//! Operation signatures and their erased form.
//!
//! A signature is a zero-sized marker type implementing [`Signature`]. Its
//! generic associated type [`Signature::Fn`] maps a concrete self type `S` to
//! the function pointer type implementing the operation for `S`. Substituting
//! [`Erased`] for `S` gives the erased form stored in dispatch tables.
//!
//! Signatures are normally declared with the [`signature!`](crate::signature!)
//! macro, which also generates a `call` function translating polymorphic
//! values into erased pointers:
//!
//! ```
//! use polycept::prelude::*;
//!
//! polycept::signature! {
//!     /// Appends a description to the buffer.
//!     pub struct Describe = fn(&Self, &mut String);
//!     /// Advances and returns the next item.
//!     pub struct Next = fn(&mut Self) -> Option<u8>;
//! }
//!
//! static DESCRIBE: Operation<Describe> = Operation::new("describe");
//! assert_eq!(DESCRIBE.name(), "describe");
//! ```
//!
//! # Self placeholders
//!
//! `Self` may appear in the parameter list as `&Self`, `&mut Self`,
//! `&move Self`, `*const Self` or `*mut Self`, and in the return type as
//! `*const Self` or `*mut Self`. Every other type passes through unchanged.
//! Passing `Self` by value cannot be erased and is rejected:
//!
//! ```compile_fail
//! polycept::signature! {
//!     pub struct Consume = fn(Self);
//! }
//! ```
//!
//! Returning `Self` or a reference to `Self` is rejected as well:
//!
//! ```compile_fail
//! polycept::signature! {
//!     pub struct Duplicate = fn(&Self) -> Self;
//! }
//! ```

use core::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

use polycept_internals::{Erased, ErasedFn};

/// Marker type describing the shape of one operation.
///
/// # Safety
///
/// Implementors must guarantee:
///
/// 1. [`Fn<S>`](Self::Fn) is a function pointer type.
/// 2. `S` only occurs in `Fn<S>` behind a pointer, a reference or
///    [`Moved`], so that `Fn<T>` and `Fn<Erased>` are ABI compatible for
///    every sized `T`.
pub unsafe trait Signature: 'static {
    /// The function pointer type implementing this operation for the self
    /// type `S`.
    type Fn<S: 'static>: Copy + 'static;
}

/// Converts the function implementing a signature for `T` into a table slot.
pub(crate) fn erase<S: Signature, T: 'static>(function: S::Fn<T>) -> ErasedFn {
    const {
        assert!(size_of::<S::Fn<T>>() == size_of::<ErasedFn>());
    }
    // SAFETY: `Fn<T>` is a function pointer type of the same size, guaranteed
    // by the `Signature` contract and checked above
    unsafe { core::mem::transmute_copy::<S::Fn<T>, ErasedFn>(&function) }
}

/// Converts a table slot back into the erased form of a signature.
///
/// # Safety
///
/// The caller must ensure that `function` was produced by [`erase`] for the
/// same signature `S`.
pub(crate) unsafe fn restore<S: Signature>(function: ErasedFn) -> S::Fn<Erased> {
    const {
        assert!(size_of::<S::Fn<Erased>>() == size_of::<ErasedFn>());
    }
    // SAFETY: `function` was a `Fn<T>` for some `T`, which is ABI compatible
    // with `Fn<Erased>` by the `Signature` contract
    unsafe { core::mem::transmute_copy::<ErasedFn, S::Fn<Erased>>(&function) }
}

/// A named operation with signature `S`.
///
/// Operations are the keys of operation maps and dispatch tables. Two
/// operations are the same when they have the same name; declaring one name
/// with two different signatures in one interface is an error.
///
/// An operation remembers where it was last found, so that looking it up
/// again in the same interface costs a range check instead of a name lookup.
/// Declaring operations as `static` items lets every call site share that
/// memory.
pub struct Operation<S> {
    name: &'static str,
    /// Address of the anchor byte of the interface that last resolved this
    /// operation, or zero.
    resolved: AtomicUsize,
    _signature: PhantomData<fn() -> S>,
}

impl<S> Operation<S> {
    /// Creates an operation key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            resolved: AtomicUsize::new(0),
            _signature: PhantomData,
        }
    }

    /// The name of the operation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The address remembered by the last successful lookup.
    #[inline]
    pub(crate) fn resolved(&self) -> usize {
        self.resolved.load(Ordering::Relaxed)
    }

    /// Remembers the address of the anchor byte a lookup resolved to.
    #[inline]
    pub(crate) fn remember(&self, anchor: usize) {
        self.resolved.store(anchor, Ordering::Relaxed);
    }
}

impl<S> Clone for Operation<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            resolved: AtomicUsize::new(self.resolved()),
            _signature: PhantomData,
        }
    }
}

impl<S> core::fmt::Debug for Operation<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("signature", &core::any::type_name::<S>())
            .finish()
    }
}

/// A self argument passed by `&move Self`.
///
/// The caller gives up the object: the polymorphic value it came from is
/// consumed by the call. The callee may leave the object in any valid state,
/// for example by taking its contents with [`Moved::take`], and it is
/// dropped normally afterwards.
#[repr(transparent)]
pub struct Moved<'a, T: ?Sized>(&'a mut T);

impl<'a, T: ?Sized> Moved<'a, T> {
    pub(crate) fn new(object: &'a mut T) -> Self {
        Self(object)
    }

    /// Unwraps the underlying reference.
    #[must_use]
    pub fn into_inner(self) -> &'a mut T {
        self.0
    }
}

impl<T: Default> Moved<'_, T> {
    /// Takes the object, leaving its default value behind.
    #[must_use]
    pub fn take(self) -> T {
        core::mem::take(self.0)
    }
}

impl<T> Moved<'_, T> {
    /// Takes the object, leaving `replacement` behind.
    #[must_use]
    pub fn replace(self, replacement: T) -> T {
        core::mem::replace(self.0, replacement)
    }
}

impl<T: ?Sized> Deref for Moved<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

impl<T: ?Sized> DerefMut for Moved<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.0
    }
}

/// Declares operation signatures.
///
/// Each declaration has the form
/// `$vis struct $Name = fn($($param),*) $(-> $ret)?;` and produces:
///
/// - a unit struct `$Name` implementing [`Signature`], and
/// - an inherent `$Name::call(method, args...)` that invokes a
///   [`Method<$Name>`](crate::Method) taken from a polymorphic value.
///
/// Self placeholder parameters become receiver parameters of `call`:
///
/// | parameter     | `call` takes                   | the function receives |
/// |---------------|--------------------------------|-----------------------|
/// | `&Self`       | `&impl Receiver`               | `&T`                  |
/// | `&mut Self`   | `&mut impl Receiver`           | `&mut T`              |
/// | `&move Self`  | `impl Receiver` (consumed)     | `Moved<'_, T>`        |
/// | `*const Self` | `&impl Receiver`               | `*const T`            |
/// | `*mut Self`   | `&mut impl Receiver`           | `*mut T`              |
///
/// Only polymorphic values implement [`Receiver`](crate::Receiver), and
/// `call` panics if a receiver holds a different concrete type than the one
/// the method was taken from. At most eight parameters are supported.
///
/// ```
/// use polycept::prelude::*;
///
/// polycept::signature! {
///     pub struct Area = fn(&Self) -> f64;
///     pub struct Scale = fn(&mut Self, f64);
/// }
///
/// fn area(square: &f64) -> f64 {
///     square * square
/// }
///
/// let map = OperationMap::<f64>::new().with(&Operation::<Area>::new("area"), area);
/// assert!(map.contains("area"));
/// ```
#[macro_export]
macro_rules! signature {
    () => {};

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = fn($($params:tt)*) $($tail:tt)*
    ) => {
        $crate::signature!(@params
            [{ $(#[$meta])* $vis struct $name } __S method]
            [] [] []
            [__a0 __a1 __a2 __a3 __a4 __a5 __a6 __a7]
            [$($params)* ,]
            [$($tail)*]
        );
    };

    (@params $ctx:tt [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*] $pool:tt [$(,)?] [$($tail:tt)*]) => {
        $crate::signature!(@ret $ctx [$($fnp)*] [$($cp)*] [$($ca)*] [$($tail)*]);
    };

    (@params [$head:tt $S:ident $method:ident] [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*]
        [$arg:ident $($pool:ident)*] [& Self , $($params:tt)*] $tail:tt
    ) => {
        $crate::signature!(@params [$head $S $method]
            [$($fnp)* &$S,]
            [$($cp)* $arg: &impl $crate::Receiver,]
            [$($ca)* $crate::__private::erase_ref(&$method, $arg),]
            [$($pool)*] [$($params)*] $tail
        );
    };

    (@params [$head:tt $S:ident $method:ident] [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*]
        [$arg:ident $($pool:ident)*] [& mut Self , $($params:tt)*] $tail:tt
    ) => {
        $crate::signature!(@params [$head $S $method]
            [$($fnp)* &mut $S,]
            [$($cp)* $arg: &mut impl $crate::Receiver,]
            [$($ca)* $crate::__private::erase_mut(&$method, $arg),]
            [$($pool)*] [$($params)*] $tail
        );
    };

    (@params [$head:tt $S:ident $method:ident] [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*]
        [$arg:ident $($pool:ident)*] [& move Self , $($params:tt)*] $tail:tt
    ) => {
        $crate::signature!(@params [$head $S $method]
            [$($fnp)* $crate::Moved<'_, $S>,]
            [$($cp)* mut $arg: impl $crate::Receiver,]
            [$($ca)* $crate::__private::erase_moved(&$method, &mut $arg),]
            [$($pool)*] [$($params)*] $tail
        );
    };

    (@params [$head:tt $S:ident $method:ident] [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*]
        [$arg:ident $($pool:ident)*] [* const Self , $($params:tt)*] $tail:tt
    ) => {
        $crate::signature!(@params [$head $S $method]
            [$($fnp)* *const $S,]
            [$($cp)* $arg: &impl $crate::Receiver,]
            [$($ca)* $crate::__private::erase_const_ptr(&$method, $arg),]
            [$($pool)*] [$($params)*] $tail
        );
    };

    (@params [$head:tt $S:ident $method:ident] [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*]
        [$arg:ident $($pool:ident)*] [* mut Self , $($params:tt)*] $tail:tt
    ) => {
        $crate::signature!(@params [$head $S $method]
            [$($fnp)* *mut $S,]
            [$($cp)* $arg: &mut impl $crate::Receiver,]
            [$($ca)* $crate::__private::erase_mut_ptr(&$method, $arg),]
            [$($pool)*] [$($params)*] $tail
        );
    };

    (@params $ctx:tt $fnp:tt $cp:tt $ca:tt $pool:tt [Self , $($params:tt)*] $tail:tt) => {
        ::core::compile_error!(
            "`Self` cannot be passed by value to an erased operation; \
             use `&Self`, `&mut Self`, `&move Self`, `*const Self` or `*mut Self`"
        );
    };

    (@params $ctx:tt $fnp:tt $cp:tt $ca:tt [] $params:tt $tail:tt) => {
        ::core::compile_error!("erased operations take at most eight parameters");
    };

    (@params [$head:tt $S:ident $method:ident] [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*]
        [$arg:ident $($pool:ident)*] [$ty:ty , $($params:tt)*] $tail:tt
    ) => {
        $crate::signature!(@params [$head $S $method]
            [$($fnp)* $ty,]
            [$($cp)* $arg: $ty,]
            [$($ca)* $arg,]
            [$($pool)*] [$($params)*] $tail
        );
    };

    (@ret [$head:tt $S:ident $method:ident] $fnp:tt $cp:tt $ca:tt
        [-> * const Self ; $($rest:tt)*]
    ) => {
        $crate::signature!(@emit [$head $S $method] $fnp $cp $ca
            [*const $S] [*const $crate::Erased]);
        $crate::signature!($($rest)*);
    };

    (@ret [$head:tt $S:ident $method:ident] $fnp:tt $cp:tt $ca:tt
        [-> * mut Self ; $($rest:tt)*]
    ) => {
        $crate::signature!(@emit [$head $S $method] $fnp $cp $ca
            [*mut $S] [*mut $crate::Erased]);
        $crate::signature!($($rest)*);
    };

    (@ret $ctx:tt $fnp:tt $cp:tt $ca:tt [-> Self ; $($rest:tt)*]) => {
        ::core::compile_error!("erased operations cannot return `Self` by value");
    };

    (@ret $ctx:tt $fnp:tt $cp:tt $ca:tt [-> & Self ; $($rest:tt)*]) => {
        ::core::compile_error!(
            "erased operations cannot return a reference to `Self`; return `*const Self` instead"
        );
    };

    (@ret $ctx:tt $fnp:tt $cp:tt $ca:tt [-> & mut Self ; $($rest:tt)*]) => {
        ::core::compile_error!(
            "erased operations cannot return a reference to `Self`; return `*mut Self` instead"
        );
    };

    (@ret $ctx:tt $fnp:tt $cp:tt $ca:tt [-> $ret:ty ; $($rest:tt)*]) => {
        $crate::signature!(@emit $ctx $fnp $cp $ca [$ret] [$ret]);
        $crate::signature!($($rest)*);
    };

    (@ret $ctx:tt $fnp:tt $cp:tt $ca:tt [; $($rest:tt)*]) => {
        $crate::signature!(@emit $ctx $fnp $cp $ca [()] [()]);
        $crate::signature!($($rest)*);
    };

    (@emit
        [{ $(#[$meta:meta])* $vis:vis struct $name:ident } $S:ident $method:ident]
        [$($fnp:tt)*] [$($cp:tt)*] [$($ca:tt)*] [$($fret:tt)*] [$($cret:tt)*]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        // SAFETY: the macro only places `Self` behind references, pointers or
        // `Moved`, and rejects every other use
        unsafe impl $crate::Signature for $name {
            type Fn<$S: 'static> = fn($($fnp)*) -> $($fret)*;
        }

        impl $name {
            /// Invokes `method`, translating the receiver arguments into
            /// erased pointers.
            ///
            /// # Panics
            ///
            /// Panics if a receiver holds a different concrete type than the
            /// one `method` was taken from, or does not grant the access the
            /// signature requires.
            #[allow(clippy::too_many_arguments, dead_code)]
            $vis fn call($method: $crate::Method<Self>, $($cp)*) -> $($cret)* {
                // SAFETY: every receiver argument is checked against the type
                // the method was taken from before it is erased
                let function = unsafe { $method.function() };
                function($($ca)*)
            }
        }
    };
}
