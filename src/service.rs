use crate::{InjectError, Injected};
use std::any::{Any, TypeId};

/// Shared, interior-mutable state. A lock poisoned by a panic is recovered,
/// so closures must leave the value consistent before doing anything that
/// can panic.
pub(crate) trait MapContainerEx<T> {
    fn new(value: T) -> Self;
    fn with_inner<R, F: FnOnce(&T) -> R>(&self, f: F) -> R;
    fn with_inner_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R;
}

#[cfg(feature = "arc")]
mod types {
    use super::MapContainerEx;
    use crate::{InjectError, Injected};
    use std::{
        any::Any,
        sync::{Arc, Mutex, PoisonError},
    };

    /// A reference-counted pointer holding a service. The pointer type is
    /// determined by the feature flags passed to this crate.
    pub type Svc<T> = Arc<T>;

    /// A reference-counted service pointer holding an instance of `dyn Any`.
    pub type DynSvc = Arc<dyn Any + Send + Sync>;

    /// Implemented automatically on types that are capable of being a service.
    pub trait Service: Any + Send + Sync {}
    impl<T: ?Sized + Any + Send + Sync> Service for T {}

    pub(crate) type Activator = Svc<
        dyn Fn(&Injected) -> Result<DynSvc, InjectError> + Send + Sync,
    >;

    pub(crate) type MapContainer<T> = Arc<Mutex<T>>;

    impl<T> MapContainerEx<T> for MapContainer<T> {
        fn new(value: T) -> Self {
            Arc::new(Mutex::new(value))
        }

        fn with_inner<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
            f(&*self.lock().unwrap_or_else(PoisonError::into_inner))
        }

        fn with_inner_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
            f(&mut *self.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }
}

#[cfg(feature = "rc")]
mod types {
    use super::MapContainerEx;
    use crate::{InjectError, Injected};
    use std::{any::Any, cell::RefCell, rc::Rc};

    /// A reference-counted pointer holding a service. The pointer type is
    /// determined by the feature flags passed to this crate.
    pub type Svc<T> = Rc<T>;

    /// A reference-counted service pointer holding an instance of `dyn Any`.
    pub type DynSvc = Rc<dyn Any>;

    /// Implemented automatically on types that are capable of being a service.
    pub trait Service: Any {}
    impl<T: ?Sized + Any> Service for T {}

    pub(crate) type Activator =
        Svc<dyn Fn(&Injected) -> Result<DynSvc, InjectError>>;

    pub(crate) type MapContainer<T> = Rc<RefCell<T>>;

    impl<T> MapContainerEx<T> for MapContainer<T> {
        fn new(value: T) -> Self {
            Rc::new(RefCell::new(value))
        }

        fn with_inner<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
            f(&*self.borrow())
        }

        fn with_inner_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
            f(&mut *self.borrow_mut())
        }
    }
}

#[allow(clippy::wildcard_imports)]
pub use types::*;

/// A result from attempting to register, plan or construct a service.
pub type InjectResult<T> = Result<T, InjectError>;

/// Type information about a service.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this service.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Wraps a typed instance into a type-erased service pointer.
pub(crate) fn erase<T: Service>(value: T) -> DynSvc {
    Svc::new(value) as DynSvc
}

/// Wraps an activation function into an [`Activator`].
pub(crate) fn activator<F>(f: F) -> Activator
where
    F: Service + Fn(&Injected) -> InjectResult<DynSvc>,
{
    Svc::new(f)
}
