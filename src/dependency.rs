use crate::{
    erase, DynSvc, InjectError, InjectResult, Scope, Service, ServiceInfo,
    Svc, Token,
};
use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
};

/// A type that the container can construct from its declared dependencies.
///
/// The manifest returned by [`Injectable::dependencies`] names every field
/// the type needs. By the time [`Injectable::construct`] runs, each of those
/// fields has already been resolved, so the instance is fully wired the
/// moment it exists.
///
/// ```
/// use token_injector::{
///     Class, Container, Dependencies, InjectResult, Injectable, Injected,
///     Svc, Token,
/// };
///
/// // Marker type whose derived token names the configuration.
/// struct ConfigKey;
///
/// struct Config(u16);
/// struct Server {
///     config: Svc<Config>,
/// }
///
/// impl Injectable for Server {
///     fn dependencies() -> Dependencies {
///         Dependencies::new().inject("config", Token::of::<ConfigKey>())
///     }
///
///     fn construct(injected: &Injected) -> InjectResult<Self> {
///         Ok(Server {
///             config: injected.get("config")?,
///         })
///     }
/// }
///
/// let server = Token::new("server");
///
/// let mut container = Container::new();
/// container.add_constant(Token::of::<ConfigKey>(), Config(8080)).unwrap();
/// container.add_singleton(server, Class::<Server>::new()).unwrap();
///
/// let server: Svc<Server> = container.resolve(server).unwrap();
/// assert_eq!(8080, server.config.0);
/// ```
///
/// # Inherited declarations
///
/// A type that extends another one builds its manifest from the base
/// manifest and overlays its own entries with [`Dependencies::merge`]. Its
/// constructor can then build the base part with the base constructor.
pub trait Injectable: Service + Sized {
    /// The dependencies of this type. Defaults to none.
    fn dependencies() -> Dependencies {
        Dependencies::new()
    }

    /// Builds an instance from its resolved dependencies.
    fn construct(injected: &Injected) -> InjectResult<Self>;
}

/// A type whose constructor takes arguments produced by a factory in
/// addition to its injected dependencies. Register it with
/// [`Factory::seeded`](crate::Factory::seeded).
pub trait Seeded: Service + Sized {
    /// The arguments produced by the factory.
    type Seed;

    /// The dependencies of this type. Defaults to none.
    fn dependencies() -> Dependencies {
        Dependencies::new()
    }

    /// Builds an instance from the factory's output and the resolved
    /// dependencies.
    fn construct(seed: Self::Seed, injected: &Injected) -> InjectResult<Self>;
}

/// A reference to a type that is registered on first use rather than up
/// front. The type is registered under its derived token,
/// [`Token::of::<T>()`](Token::of).
#[derive(Clone, Copy)]
pub struct DeferredType {
    info: ServiceInfo,
    manifest: fn() -> Dependencies,
    activate: fn(&Injected) -> InjectResult<DynSvc>,
}

impl DeferredType {
    /// Creates a deferred reference to an [`Injectable`] type.
    #[must_use]
    pub fn of<T: Injectable>() -> Self {
        DeferredType {
            info: ServiceInfo::of::<T>(),
            manifest: T::dependencies,
            activate: activate::<T>,
        }
    }

    /// The type being referenced.
    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        self.info
    }

    /// The token the type is materialized under.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::for_service(self.info)
    }

    pub(crate) fn manifest(&self) -> Dependencies {
        (self.manifest)()
    }

    pub(crate) fn activate_fn(
        &self,
    ) -> fn(&Injected) -> InjectResult<DynSvc> {
        self.activate
    }
}

impl Debug for DeferredType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeferredType").field(&self.info.name()).finish()
    }
}

pub(crate) fn activate<T: Injectable>(
    injected: &Injected,
) -> InjectResult<DynSvc> {
    T::construct(injected).map(erase)
}

/// Where a declared dependency comes from.
#[derive(Clone, Debug)]
pub enum DependencySource {
    /// An explicitly registered token.
    Token(Token),

    /// A type that may be registered on first use.
    Deferred(DeferredType),
}

impl DependencySource {
    /// The token the dependency resolves through.
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            DependencySource::Token(token) => *token,
            DependencySource::Deferred(deferred) => deferred.token(),
        }
    }
}

/// A single `(field, token, scope)` declaration.
#[derive(Clone, Debug)]
pub struct Dependency {
    field: &'static str,
    source: DependencySource,
    scope: Option<Scope>,
}

impl Dependency {
    /// The field the dependency is injected into.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Where the dependency comes from.
    #[must_use]
    pub fn source(&self) -> &DependencySource {
        &self.source
    }

    /// The token the dependency resolves through.
    #[must_use]
    pub fn token(&self) -> Token {
        self.source.token()
    }

    /// The explicitly requested scope, if any. This is the scope a deferred
    /// type is materialized with. Registered tokens always keep the scope
    /// they were registered with.
    #[must_use]
    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub(crate) fn deferred(&self) -> Option<&DeferredType> {
        match &self.source {
            DependencySource::Deferred(deferred) => Some(deferred),
            DependencySource::Token(_) => None,
        }
    }
}

/// An ordered manifest of the dependencies of a type. Field names are
/// unique; declaring a field again replaces the earlier declaration in
/// place.
///
/// ```
/// use token_injector::{Dependencies, Token};
///
/// let a = Token::new("a");
/// let b = Token::new("b");
///
/// let base = Dependencies::new().inject("x", a).inject("y", a);
/// let derived = base.merge(Dependencies::new().inject("x", b));
///
/// let fields: Vec<_> =
///     derived.iter().map(|d| (d.field(), d.token())).collect();
/// assert_eq!(vec![("x", b), ("y", a)], fields);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Dependencies {
    entries: Vec<Dependency>,
}

impl Dependencies {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Dependencies::default()
    }

    /// Declares a dependency on a token.
    #[must_use]
    pub fn inject(self, field: &'static str, token: Token) -> Self {
        self.declare(field, DependencySource::Token(token), None)
    }

    /// Declares a dependency on a token with an explicit scope.
    #[must_use]
    pub fn inject_scoped(
        self,
        field: &'static str,
        token: Token,
        scope: Scope,
    ) -> Self {
        self.declare(field, DependencySource::Token(token), Some(scope))
    }

    /// Declares a dependency on a type that doesn't need to be registered.
    /// If no registration exists for [`Token::of::<T>()`](Token::of) when
    /// the dependency is needed, the container's
    /// [`AutoWire`](crate::AutoWire) policy decides whether to materialize
    /// it.
    #[must_use]
    pub fn inject_type<T: Injectable>(self, field: &'static str) -> Self {
        self.declare(
            field,
            DependencySource::Deferred(DeferredType::of::<T>()),
            None,
        )
    }

    /// Declares a dependency on a type that is materialized with the given
    /// scope if it hasn't been registered.
    #[must_use]
    pub fn inject_type_scoped<T: Injectable>(
        self,
        field: &'static str,
        scope: Scope,
    ) -> Self {
        self.declare(
            field,
            DependencySource::Deferred(DeferredType::of::<T>()),
            Some(scope),
        )
    }

    fn declare(
        mut self,
        field: &'static str,
        source: DependencySource,
        scope: Option<Scope>,
    ) -> Self {
        self.insert(Dependency {
            field,
            source,
            scope,
        });
        self
    }

    fn insert(&mut self, dependency: Dependency) {
        match self.entries.iter_mut().find(|d| d.field == dependency.field) {
            Some(existing) => *existing = dependency,
            None => self.entries.push(dependency),
        }
    }

    /// Overlays another manifest on top of this one. Entries of `overlay`
    /// win over entries of `self` that use the same field name.
    #[must_use]
    pub fn merge(mut self, overlay: Dependencies) -> Self {
        for dependency in overlay.entries {
            self.insert(dependency);
        }
        self
    }

    /// Iterates over the declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The resolved dependencies of an instance that is being constructed.
pub struct Injected {
    token: Token,
    service: ServiceInfo,
    fields: HashMap<&'static str, (Token, DynSvc)>,
}

impl Injected {
    pub(crate) fn new(
        token: Token,
        service: ServiceInfo,
        fields: HashMap<&'static str, (Token, DynSvc)>,
    ) -> Self {
        Injected {
            token,
            service,
            fields,
        }
    }

    /// Gets the instance injected into a declared field.
    pub fn get<T: Service>(&self, field: &'static str) -> InjectResult<Svc<T>> {
        let (token, instance) = self.fields.get(field).ok_or(
            InjectError::UndeclaredDependency {
                service: self.service,
                field,
            },
        )?;

        instance
            .clone()
            .downcast::<T>()
            .map_err(|_| InjectError::TypeMismatch {
                token: *token,
                expected: ServiceInfo::of::<T>(),
            })
    }

    /// The token of the instance being constructed.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }
}
