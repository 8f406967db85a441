use crate::{
    activation::Activation, graph::DependencyGraph, plan::Plan,
    registry::Registry, scope::SingletonStore, AutoWire, ContainerBuilder,
    Descriptor, DescriptorSource, DynSvc, InjectError, InjectResult,
    MapContainer, MapContainerEx, Scope, Service, ServiceInfo, Svc, Token,
};
use std::collections::HashMap;

/// A runtime dependency injection container.
///
/// Services are registered under [`Token`]s with a [`Scope`] and are
/// resolved by token. Every registration is checked for dependency cycles
/// before it is accepted. Resolution follows a cached [`Plan`] that is
/// rebuilt after any registration.
///
/// Registration needs exclusive access to the container. Resolution only
/// needs a shared reference, and with the "arc" feature the container can
/// be shared between threads.
///
/// ```
/// use token_injector::{
///     Class, Container, Dependencies, InjectResult, Injectable, Injected,
///     Svc, Token,
/// };
///
/// struct Repository;
/// impl Injectable for Repository {
///     fn construct(_: &Injected) -> InjectResult<Self> {
///         Ok(Repository)
///     }
/// }
///
/// struct Handler {
///     first: Svc<Repository>,
///     second: Svc<Repository>,
/// }
/// impl Injectable for Handler {
///     fn construct(injected: &Injected) -> InjectResult<Self> {
///         Ok(Handler {
///             first: injected.get("first")?,
///             second: injected.get("second")?,
///         })
///     }
/// }
///
/// let repository = Token::new("repository");
/// let handler = Token::new("handler");
///
/// let mut container = Container::new();
/// container.add_request(repository, Class::<Repository>::new()).unwrap();
/// container
///     .add_transient(
///         handler,
///         Class::<Handler>::new().with_dependencies(
///             Dependencies::new()
///                 .inject("first", repository)
///                 .inject("second", repository),
///         ),
///     )
///     .unwrap();
///
/// let handler: Svc<Handler> = container.resolve(handler).unwrap();
/// assert!(Svc::ptr_eq(&handler.first, &handler.second));
/// ```
pub struct Container {
    registry: Registry,
    graph: DependencyGraph,
    plans: MapContainer<HashMap<Token, Svc<Plan>>>,
    singletons: SingletonStore,
    auto_wire: AutoWire,
}

impl Container {
    /// Creates a builder for a container.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Creates an empty container with the default [`AutoWire`] policy.
    #[must_use]
    pub fn new() -> Self {
        Container::with_auto_wire(AutoWire::default())
    }

    pub(crate) fn with_auto_wire(auto_wire: AutoWire) -> Self {
        Container {
            registry: Registry::default(),
            graph: DependencyGraph::default(),
            plans: MapContainerEx::new(HashMap::new()),
            singletons: SingletonStore::default(),
            auto_wire,
        }
    }

    /// The policy for deferred dependencies.
    #[must_use]
    pub fn auto_wire(&self) -> AutoWire {
        self.auto_wire
    }

    /// Registers a descriptor under a token, replacing any earlier
    /// registration of that token.
    ///
    /// The registration is rejected with
    /// [`InjectError::CyclicDependency`] if it would close a dependency
    /// cycle, and with [`InjectError::MissingConstructionSource`] if the
    /// descriptor is malformed. A rejected registration leaves the container
    /// as it was.
    pub fn register(
        &mut self,
        token: Token,
        descriptor: Descriptor,
    ) -> InjectResult<()> {
        descriptor.validate(token)?;
        let descriptor = Svc::new(descriptor);

        let previous = self.registry.insert(token, descriptor.clone());
        if previous.is_some() {
            tracing::warn!(%token, "overwriting an existing registration");
        }
        let previous_node =
            self.graph.replace(token, descriptor.dependencies());
        let previous_instance = match descriptor.value() {
            Some(value) => self.singletons.insert(token, value),
            None => self.singletons.evict(token),
        };

        let affected = self.graph.invalidate(token);
        if let Err(cycle) = self.graph.validate(&affected, self.auto_wire) {
            self.graph.restore(token, previous_node);
            self.registry.restore(token, previous);
            self.singletons.restore(token, previous_instance);

            tracing::debug!(
                %token,
                length = cycle.len(),
                "rejected registration closing a dependency cycle"
            );
            return Err(InjectError::CyclicDependency { cycle });
        }

        self.invalidate_plans();
        tracing::debug!(
            %token,
            kind = %descriptor.kind(),
            scope = %descriptor.scope(),
            dependencies = descriptor.dependencies().len(),
            "registered service"
        );
        Ok(())
    }

    /// Registers a service that is created every time it is needed.
    pub fn add_transient<S: DescriptorSource>(
        &mut self,
        token: Token,
        source: S,
    ) -> InjectResult<()> {
        self.register(token, source.into_descriptor(Scope::Transient))
    }

    /// Registers a service that is created at most once per call to
    /// [`Container::resolve`].
    pub fn add_request<S: DescriptorSource>(
        &mut self,
        token: Token,
        source: S,
    ) -> InjectResult<()> {
        self.register(token, source.into_descriptor(Scope::Request))
    }

    /// Registers a service that is created once, the first time it is
    /// needed.
    pub fn add_singleton<S: DescriptorSource>(
        &mut self,
        token: Token,
        source: S,
    ) -> InjectResult<()> {
        self.register(token, source.into_descriptor(Scope::Singleton))
    }

    /// Registers a pre-built value. Every resolution of the token returns
    /// this exact instance.
    ///
    /// ```
    /// use token_injector::{Container, Svc, Token};
    ///
    /// let token = Token::new("greeting");
    /// let mut container = Container::new();
    /// container.add_constant(token, String::from("hello")).unwrap();
    ///
    /// let first: Svc<String> = container.resolve(token).unwrap();
    /// let second: Svc<String> = container.resolve(token).unwrap();
    /// assert!(Svc::ptr_eq(&first, &second));
    /// ```
    pub fn add_constant<T: Service>(
        &mut self,
        token: Token,
        value: T,
    ) -> InjectResult<()> {
        self.register(token, Descriptor::constant(value))
    }

    /// Resolves a token into a fully wired instance of `T`.
    pub fn resolve<T: Service>(&self, token: Token) -> InjectResult<Svc<T>> {
        self.resolve_dyn(token)?
            .downcast::<T>()
            .map_err(|_| InjectError::TypeMismatch {
                token,
                expected: ServiceInfo::of::<T>(),
            })
    }

    /// Resolves a token into a type-erased instance.
    pub fn resolve_dyn(&self, token: Token) -> InjectResult<DynSvc> {
        let plan = self.plan(token)?;
        Activation::new(&plan, &self.singletons).run()
    }

    /// Gets the resolution plan for a token, building it if it isn't cached.
    pub fn plan(&self, token: Token) -> InjectResult<Svc<Plan>> {
        let cached = self.plans.with_inner(|plans| plans.get(&token).cloned());
        if let Some(plan) = cached {
            return Ok(plan);
        }

        let plan =
            Svc::new(Plan::build(token, &self.registry, self.auto_wire)?);
        Ok(self
            .plans
            .with_inner_mut(|plans| plans.entry(token).or_insert(plan).clone()))
    }

    /// Whether a token has been registered explicitly.
    #[must_use]
    pub fn is_registered(&self, token: Token) -> bool {
        self.registry.contains(token)
    }

    /// Gets the descriptor registered under a token.
    #[must_use]
    pub fn descriptor(&self, token: Token) -> Option<Svc<Descriptor>> {
        self.registry.get(token).cloned()
    }

    fn invalidate_plans(&self) {
        let cleared = self.plans.with_inner_mut(|plans| {
            let cleared = plans.len();
            plans.clear();
            cleared
        });

        if cleared > 0 {
            tracing::debug!(cleared, "invalidated cached resolution plans");
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}
