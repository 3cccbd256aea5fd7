#[cfg(feature = "std")]
use std::sync as impl_;

#[cfg(not(feature = "std"))]
use spin as impl_;

/// Lock guarding one piece of process-wide registry state.
///
/// The state is created lazily on the first write, so the lock can live in a
/// `static`.
#[repr(transparent)]
pub(crate) struct RegistryLock<T: 'static + Send + Sync>(impl_::RwLock<Option<T>>);

#[repr(transparent)]
pub(crate) struct RegistryReadGuard<T: 'static + Send + Sync>(
    impl_::RwLockReadGuard<'static, Option<T>>,
);

#[repr(transparent)]
pub(crate) struct RegistryWriteGuard<T: 'static + Send + Sync>(
    impl_::RwLockWriteGuard<'static, Option<T>>,
);

impl<T: 'static + Send + Sync> RegistryLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(impl_::RwLock::new(None))
    }

    #[inline]
    pub(crate) fn read(&'static self) -> RegistryReadGuard<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        #[cfg(feature = "std")]
        let guard = self
            .0
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        RegistryReadGuard(guard)
    }

    #[inline]
    pub(crate) fn write(&'static self) -> RegistryWriteGuard<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.write();

        #[cfg(feature = "std")]
        let guard = self
            .0
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        RegistryWriteGuard(guard)
    }
}

impl<T: 'static + Send + Sync> RegistryReadGuard<T> {
    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T: 'static + Send + Sync + Default> RegistryWriteGuard<T> {
    /// The guarded state, created on first access.
    #[inline]
    pub(crate) fn get_or_default(&mut self) -> &mut T {
        self.0.get_or_insert_with(T::default)
    }
}
