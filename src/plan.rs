use crate::{
    AutoWire, Dependency, Descriptor, InjectError, InjectResult, Svc, Token,
    registry::Registry,
};
use std::collections::HashMap;

/// A precomputed construction order for a root token. Every entry comes
/// after all of its dependencies, and the root is always last.
///
/// ```
/// use token_injector::{Container, Dependencies, Factory, Token};
///
/// let config = Token::new("config");
/// let server = Token::new("server");
///
/// let mut container = Container::new();
/// container.add_constant(config, 8080_u16).unwrap();
/// container
///     .add_singleton(
///         server,
///         Factory::new(|| "server").with_dependencies(
///             Dependencies::new().inject("config", config),
///         ),
///     )
///     .unwrap();
///
/// let plan = container.plan(server).unwrap();
/// assert_eq!(vec![config, server], plan.tokens().collect::<Vec<_>>());
/// ```
#[derive(Debug)]
pub struct Plan {
    root: Token,
    entries: Vec<PlanEntry>,
}

#[derive(Debug)]
pub(crate) struct PlanEntry {
    pub token: Token,
    pub descriptor: Svc<Descriptor>,
    pub dependencies: Vec<PlanDependency>,
}

/// A field of an entry, and the index of the entry that supplies it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PlanDependency {
    pub field: &'static str,
    pub index: usize,
}

impl Plan {
    /// Compiles the plan for a root token with a post-order walk over its
    /// dependencies. A token reached more than once is planned only once.
    pub(crate) fn build(
        root: Token,
        registry: &Registry,
        auto_wire: AutoWire,
    ) -> InjectResult<Plan> {
        let descriptor = registry.lookup(root)?.clone();
        let mut planner = Planner {
            registry,
            auto_wire,
            entries: Vec::new(),
            indices: HashMap::new(),
            path: Vec::new(),
        };
        planner.visit(root, descriptor)?;

        tracing::debug!(
            %root,
            entries = planner.entries.len(),
            "built resolution plan"
        );
        Ok(Plan {
            root,
            entries: planner.entries,
        })
    }

    /// The token this plan resolves.
    #[must_use]
    pub fn root(&self) -> Token {
        self.root
    }

    /// The tokens of the plan, dependencies first.
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.entries.iter().map(|entry| entry.token)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub(crate) fn root_index(&self) -> usize {
        self.entries.len() - 1
    }
}

struct Planner<'a> {
    registry: &'a Registry,
    auto_wire: AutoWire,
    entries: Vec<PlanEntry>,
    indices: HashMap<Token, usize>,
    path: Vec<Token>,
}

impl Planner<'_> {
    fn visit(
        &mut self,
        token: Token,
        descriptor: Svc<Descriptor>,
    ) -> InjectResult<usize> {
        if let Some(&index) = self.indices.get(&token) {
            return Ok(index);
        }

        if self.path.contains(&token) {
            return Err(InjectError::InternalError(format!(
                "{} was reached again while planning it",
                token
            )));
        }

        self.path.push(token);
        let mut dependencies =
            Vec::with_capacity(descriptor.dependencies().len());
        for dependency in descriptor.dependencies().iter() {
            let target = self.descriptor_for(token, dependency)?;
            let index = self.visit(dependency.token(), target)?;
            dependencies.push(PlanDependency {
                field: dependency.field(),
                index,
            });
        }
        self.path.pop();

        let index = self.entries.len();
        self.entries.push(PlanEntry {
            token,
            descriptor,
            dependencies,
        });
        self.indices.insert(token, index);
        Ok(index)
    }

    /// Finds the descriptor for a dependency. Registered tokens always win.
    /// Otherwise only deferred declarations can materialize a type, however
    /// the type was reached before. The first scope a deferred type is
    /// materialized with is kept for the whole plan.
    fn descriptor_for(
        &self,
        dependent: Token,
        dependency: &Dependency,
    ) -> InjectResult<Svc<Descriptor>> {
        let token = dependency.token();
        if let Some(descriptor) = self.registry.get(token) {
            return Ok(descriptor.clone());
        }

        let scope = self.auto_wire.scope_for(dependency.scope());
        let (Some(deferred), Some(scope)) = (dependency.deferred(), scope)
        else {
            return Err(InjectError::DependencyNotRegistered {
                token: dependent,
                dependency: token,
            });
        };

        if let Some(&index) = self.indices.get(&token) {
            return Ok(self.entries[index].descriptor.clone());
        }

        let descriptor = Descriptor::deferred(deferred, scope);
        descriptor.validate(token)?;
        tracing::trace!(%token, %scope, "materializing deferred type");
        Ok(Svc::new(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Dependencies, DescriptorSource, Factory, InjectResult, Injectable,
        Injected, Scope,
    };

    fn factory(dependencies: Dependencies) -> Svc<Descriptor> {
        Svc::new(
            Factory::new(|| 0_u8)
                .with_dependencies(dependencies)
                .into_descriptor(Scope::Transient),
        )
    }

    #[test]
    fn diamond_is_planned_once_in_dependency_order() {
        let a = Token::new("a");
        let b = Token::new("b");
        let c = Token::new("c");
        let d = Token::new("d");

        let mut registry = Registry::default();
        registry.insert(d, factory(Dependencies::new()));
        registry.insert(b, factory(Dependencies::new().inject("d", d)));
        registry.insert(c, factory(Dependencies::new().inject("d", d)));
        registry.insert(
            a,
            factory(Dependencies::new().inject("b", b).inject("c", c)),
        );

        let plan = Plan::build(a, &registry, AutoWire::default()).unwrap();
        assert_eq!(vec![d, b, c, a], plan.tokens().collect::<Vec<_>>());
        assert_eq!(a, plan.root());
        assert_eq!(3, plan.root_index());

        let root = &plan.entries()[plan.root_index()];
        let fields: Vec<_> = root
            .dependencies
            .iter()
            .map(|d| (d.field, d.index))
            .collect();
        assert_eq!(vec![("b", 1), ("c", 2)], fields);
    }

    #[test]
    fn missing_dependency_names_the_dependent() {
        let a = Token::new("a");
        let missing = Token::new("missing");

        let mut registry = Registry::default();
        registry.insert(a, factory(Dependencies::new().inject("m", missing)));

        match Plan::build(a, &registry, AutoWire::default()) {
            Err(InjectError::DependencyNotRegistered { token, dependency })
                if token == a && dependency == missing => {}
            other => panic!("unexpected plan result: {:?}", other),
        }
    }

    struct Leaf;
    impl Injectable for Leaf {
        fn construct(_: &Injected) -> InjectResult<Self> {
            Ok(Leaf)
        }
    }

    #[test]
    fn deferred_types_follow_the_policy() {
        let a = Token::new("a");
        let mut registry = Registry::default();
        registry.insert(
            a,
            factory(
                Dependencies::new()
                    .inject_type_scoped::<Leaf>("leaf", Scope::Singleton),
            ),
        );

        let plan = Plan::build(a, &registry, AutoWire::default()).unwrap();
        let leaf = &plan.entries()[0];
        assert_eq!(Token::of::<Leaf>(), leaf.token);
        assert_eq!(Scope::Singleton, leaf.descriptor.scope());

        match Plan::build(a, &registry, AutoWire::Disabled) {
            Err(InjectError::DependencyNotRegistered { dependency, .. })
                if dependency == Token::of::<Leaf>() => {}
            other => panic!("unexpected plan result: {:?}", other),
        }
    }

    #[test]
    fn constant_scoped_deferred_type_is_rejected() {
        let a = Token::new("a");
        let mut registry = Registry::default();
        registry.insert(
            a,
            factory(
                Dependencies::new()
                    .inject_type_scoped::<Leaf>("leaf", Scope::Constant),
            ),
        );

        match Plan::build(a, &registry, AutoWire::default()) {
            Err(InjectError::MissingConstructionSource { token })
                if token == Token::of::<Leaf>() => {}
            other => panic!("unexpected plan result: {:?}", other),
        }
    }

    #[test]
    fn plain_reference_to_derived_token_ignores_declaration_order() {
        let deferred_first = Dependencies::new()
            .inject_type::<Leaf>("y")
            .inject("x", Token::of::<Leaf>());
        let plain_first = Dependencies::new()
            .inject("x", Token::of::<Leaf>())
            .inject_type::<Leaf>("y");

        for dependencies in [deferred_first, plain_first] {
            let a = Token::new("a");
            let mut registry = Registry::default();
            registry.insert(a, factory(dependencies));

            match Plan::build(a, &registry, AutoWire::default()) {
                Err(InjectError::DependencyNotRegistered { token, dependency })
                    if token == a && dependency == Token::of::<Leaf>() => {}
                other => panic!("unexpected plan result: {:?}", other),
            }

            registry.insert(
                Token::of::<Leaf>(),
                factory(Dependencies::new()),
            );
            let plan = Plan::build(a, &registry, AutoWire::default()).unwrap();
            assert_eq!(
                vec![Token::of::<Leaf>(), a],
                plan.tokens().collect::<Vec<_>>()
            );
        }
    }
}
