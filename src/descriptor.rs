use crate::{
    activate, activator, erase, Activator, DeferredType, Dependencies,
    DynSvc, InjectError, InjectResult, Injectable, Injected, Scope, Seeded,
    Service, ServiceInfo, Token,
};
use derive_more::Display;
use std::{
    error::Error,
    fmt::{Debug, Formatter},
    marker::PhantomData,
};

/// How the instances of a registration are produced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum ConstructionKind {
    /// A type built by its own constructor from its injected dependencies.
    #[display(fmt = "class")]
    Class,

    /// A zero-argument factory function.
    #[display(fmt = "factory")]
    Factory,

    /// A pre-built value.
    #[display(fmt = "constant")]
    Constant,
}

#[derive(Clone)]
enum ConstructionSource {
    Activator(Activator),
    Value(DynSvc),
}

/// A registration record: what to build, how long instances live and what
/// they depend on.
///
/// Descriptors are usually created from a [`DescriptorSource`] such as
/// [`Class`] or [`Factory`]. They can also be assembled by hand and passed
/// to [`Container::register`](crate::Container::register).
///
/// ```
/// use token_injector::{
///     ConstructionKind, Container, Descriptor, InjectError, Scope,
///     ServiceInfo, Token,
/// };
///
/// let token = Token::new("broken");
/// let descriptor = Descriptor::new(
///     ConstructionKind::Factory,
///     ServiceInfo::of::<u8>(),
///     Scope::Transient,
/// );
///
/// let mut container = Container::new();
/// match container.register(token, descriptor) {
///     Err(InjectError::MissingConstructionSource { token: t })
///         if t == token => {}
///     _ => panic!("a factory descriptor without a factory was accepted"),
/// }
/// ```
#[derive(Clone)]
pub struct Descriptor {
    kind: ConstructionKind,
    target: ServiceInfo,
    scope: Scope,
    dependencies: Dependencies,
    source: Option<ConstructionSource>,
}

impl Descriptor {
    /// Creates a descriptor with no dependencies and nothing to construct
    /// from. A constant kind always gets the constant scope.
    #[must_use]
    pub fn new(
        kind: ConstructionKind,
        target: ServiceInfo,
        scope: Scope,
    ) -> Self {
        let scope = match kind {
            ConstructionKind::Constant => Scope::Constant,
            _ => scope,
        };

        Descriptor {
            kind,
            target,
            scope,
            dependencies: Dependencies::new(),
            source: None,
        }
    }

    /// Creates a descriptor for a pre-built value.
    #[must_use]
    pub fn constant<T: Service>(value: T) -> Self {
        Descriptor::new(
            ConstructionKind::Constant,
            ServiceInfo::of::<T>(),
            Scope::Constant,
        )
        .with_value(erase(value))
    }

    pub(crate) fn deferred(deferred: &DeferredType, scope: Scope) -> Self {
        Descriptor::new(ConstructionKind::Class, deferred.info(), scope)
            .with_dependencies(deferred.manifest())
            .with_source(ConstructionSource::Activator(activator(
                deferred.activate_fn(),
            )))
    }

    /// Replaces the declared dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Sets the function that builds instances from their injected
    /// dependencies.
    #[must_use]
    pub fn with_activator<R, F>(self, f: F) -> Self
    where
        R: Service,
        F: Service + Fn(&Injected) -> InjectResult<R>,
    {
        self.with_source(ConstructionSource::Activator(activator(
            move |injected: &Injected| f(injected).map(erase),
        )))
    }

    /// Sets the pre-built value of a constant descriptor.
    #[must_use]
    pub fn with_value(self, value: DynSvc) -> Self {
        self.with_source(ConstructionSource::Value(value))
    }

    fn with_source(mut self, source: ConstructionSource) -> Self {
        self.source = Some(source);
        self
    }

    fn scoped(mut self, scope: Scope) -> Self {
        if self.kind != ConstructionKind::Constant {
            self.scope = scope;
        }
        self
    }

    /// How instances are produced.
    #[must_use]
    pub fn kind(&self) -> ConstructionKind {
        self.kind
    }

    /// The type of the instances.
    #[must_use]
    pub fn target(&self) -> ServiceInfo {
        self.target
    }

    /// The lifetime of the instances.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The declared dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Checks that the descriptor has what its kind needs.
    pub(crate) fn validate(&self, token: Token) -> InjectResult<()> {
        let well_formed = match (self.kind, &self.source) {
            (
                ConstructionKind::Constant,
                Some(ConstructionSource::Value(_)),
            ) => true,
            (
                ConstructionKind::Class | ConstructionKind::Factory,
                Some(ConstructionSource::Activator(_)),
            ) => self.scope != Scope::Constant,
            _ => false,
        };

        if well_formed {
            Ok(())
        } else {
            Err(InjectError::MissingConstructionSource { token })
        }
    }

    pub(crate) fn value(&self) -> Option<DynSvc> {
        match &self.source {
            Some(ConstructionSource::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Produces a new instance. Constants hand back their value.
    pub(crate) fn activate(
        &self,
        token: Token,
        injected: &Injected,
    ) -> InjectResult<DynSvc> {
        match &self.source {
            Some(ConstructionSource::Activator(activate)) => activate(injected),
            Some(ConstructionSource::Value(value)) => Ok(value.clone()),
            None => Err(InjectError::MissingConstructionSource { token }),
        }
    }
}

impl Debug for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &self.kind)
            .field("target", &self.target.name())
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// Anything that can be turned into a [`Descriptor`] once its scope is
/// known. The `add_*` methods of [`Container`](crate::Container) accept any
/// descriptor source.
pub trait DescriptorSource {
    /// Creates the descriptor for the given scope.
    fn into_descriptor(self, scope: Scope) -> Descriptor;
}

/// Uses the descriptor as is, except for its scope. Constant descriptors
/// keep the constant scope.
impl DescriptorSource for Descriptor {
    fn into_descriptor(self, scope: Scope) -> Descriptor {
        self.scoped(scope)
    }
}

/// Registers an [`Injectable`] type. By default its own manifest is used.
///
/// ```
/// use token_injector::{
///     Class, Container, InjectResult, Injectable, Injected, Svc, Token,
/// };
///
/// #[derive(Default)]
/// struct Logger;
///
/// impl Injectable for Logger {
///     fn construct(_injected: &Injected) -> InjectResult<Self> {
///         Ok(Logger)
///     }
/// }
///
/// let token = Token::new("logger");
/// let mut container = Container::new();
/// container.add_transient(token, Class::<Logger>::new()).unwrap();
///
/// let first: Svc<Logger> = container.resolve(token).unwrap();
/// let second: Svc<Logger> = container.resolve(token).unwrap();
/// assert!(!Svc::ptr_eq(&first, &second));
/// ```
pub struct Class<T: Injectable> {
    dependencies: Dependencies,
    marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Class<T> {
    /// Uses the manifest declared by `T`.
    #[must_use]
    pub fn new() -> Self {
        Class {
            dependencies: T::dependencies(),
            marker: PhantomData,
        }
    }

    /// Replaces the manifest declared by `T` with the given one.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl<T: Injectable> Default for Class<T> {
    fn default() -> Self {
        Class::new()
    }
}

impl<T: Injectable> DescriptorSource for Class<T> {
    fn into_descriptor(self, scope: Scope) -> Descriptor {
        Descriptor::new(ConstructionKind::Class, ServiceInfo::of::<T>(), scope)
            .with_dependencies(self.dependencies)
            .with_source(ConstructionSource::Activator(activator(
                activate::<T>,
            )))
    }
}

/// Registers a factory function.
pub struct Factory {
    target: ServiceInfo,
    dependencies: Dependencies,
    activate: Activator,
}

impl Factory {
    /// Uses a zero-argument factory. The factory has no dependencies.
    ///
    /// ```
    /// use token_injector::{Container, Factory, Svc, Token};
    ///
    /// let token = Token::new("answer");
    /// let mut container = Container::new();
    /// container.add_singleton(token, Factory::new(|| 42_u32)).unwrap();
    ///
    /// let answer: Svc<u32> = container.resolve(token).unwrap();
    /// assert_eq!(42, *answer);
    /// ```
    #[must_use]
    pub fn new<R, F>(factory: F) -> Self
    where
        R: Service,
        F: Service + Fn() -> R,
    {
        Factory {
            target: ServiceInfo::of::<R>(),
            dependencies: Dependencies::new(),
            activate: activator(move |_: &Injected| Ok(erase(factory()))),
        }
    }

    /// Uses a zero-argument factory that may fail. A failure is reported as
    /// [`InjectError::ActivationFailed`] with the factory's error as its
    /// source.
    ///
    /// ```
    /// use token_injector::{Container, Factory, InjectError, Token};
    ///
    /// let token = Token::new("port");
    /// let mut container = Container::new();
    /// container
    ///     .add_transient(
    ///         token,
    ///         Factory::fallible(|| "not a port".parse::<u16>()),
    ///     )
    ///     .unwrap();
    ///
    /// match container.resolve::<u16>(token) {
    ///     Err(InjectError::ActivationFailed { .. }) => {}
    ///     _ => panic!("activation should have failed"),
    /// }
    /// ```
    #[must_use]
    pub fn fallible<R, E, F>(factory: F) -> Self
    where
        R: Service,
        E: Error + Send + Sync + 'static,
        F: Service + Fn() -> Result<R, E>,
    {
        Factory {
            target: ServiceInfo::of::<R>(),
            dependencies: Dependencies::new(),
            activate: activator(move |injected: &Injected| {
                factory().map(erase).map_err(|error| {
                    InjectError::ActivationFailed {
                        token: injected.token(),
                        inner: Box::new(error),
                    }
                })
            }),
        }
    }

    /// Uses a zero-argument factory to produce the constructor arguments of
    /// a [`Seeded`] type. The type's manifest is used for its injected
    /// fields.
    #[must_use]
    pub fn seeded<T, F>(factory: F) -> Self
    where
        T: Seeded,
        F: Service + Fn() -> T::Seed,
    {
        Factory {
            target: ServiceInfo::of::<T>(),
            dependencies: T::dependencies(),
            activate: activator(move |injected: &Injected| {
                T::construct(factory(), injected).map(erase)
            }),
        }
    }

    /// Replaces the declared dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl DescriptorSource for Factory {
    fn into_descriptor(self, scope: Scope) -> Descriptor {
        Descriptor::new(ConstructionKind::Factory, self.target, scope)
            .with_dependencies(self.dependencies)
            .with_source(ConstructionSource::Activator(self.activate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_kind_forces_constant_scope() {
        let descriptor =
            Descriptor::constant(3_i64).into_descriptor(Scope::Transient);

        assert_eq!(ConstructionKind::Constant, descriptor.kind());
        assert_eq!(Scope::Constant, descriptor.scope());
        assert!(descriptor.validate(Token::new("three")).is_ok());
    }

    #[test]
    fn constant_scope_needs_a_value() {
        let token = Token::new("odd");
        let descriptor = Descriptor::new(
            ConstructionKind::Class,
            ServiceInfo::of::<u8>(),
            Scope::Constant,
        )
        .with_activator(|_: &Injected| Ok(1_u8));

        match descriptor.validate(token) {
            Err(InjectError::MissingConstructionSource { token: t })
                if t == token => {}
            other => panic!("unexpected validation result: {:?}", other),
        }
    }

    #[test]
    fn factory_descriptor_records_target() {
        let descriptor = Factory::new(|| String::from("hi"))
            .into_descriptor(Scope::Request);

        assert_eq!(ConstructionKind::Factory, descriptor.kind());
        assert_eq!(ServiceInfo::of::<String>(), descriptor.target());
        assert_eq!(Scope::Request, descriptor.scope());
        assert!(descriptor.dependencies().is_empty());
    }
}
