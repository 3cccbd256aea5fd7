//! Erased pointee and function slot types.

/// Marker type standing in for the concrete type of an erased object.
///
/// Pointers to held objects are passed around as `NonNull<Erased>`, and the
/// erased form of an operation signature substitutes `Erased` for every self
/// placeholder. The type is zero-sized and cannot be constructed outside this
/// crate, so a `&Erased` can only be obtained from a real held object.
pub struct Erased(
    /// Keeps the type unconstructible outside this crate.
    (),
);

/// The type of every slot in a dispatch table.
///
/// Operation functions of arbitrary signatures are stored as this type and
/// transmuted back to their erased signature right before being called.
/// Calling an `ErasedFn` directly is never correct.
pub type ErasedFn = unsafe fn();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erased_is_zero_sized() {
        assert_eq!(core::mem::size_of::<Erased>(), 0);
        assert_eq!(core::mem::align_of::<Erased>(), 1);
    }

    #[test]
    fn test_erased_fn_is_pointer_sized() {
        assert_eq!(
            core::mem::size_of::<ErasedFn>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<ErasedFn>>(),
            core::mem::size_of::<usize>()
        );
    }
}
