use crate::{AutoWire, DeferredType, Dependencies, Token};
use std::collections::{HashMap, HashSet, VecDeque};

struct Edge {
    target: Token,
    deferred: Option<DeferredType>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Origin {
    Registered,
    Deferred,
}

/// The outgoing edges of one token.
pub(crate) struct Node {
    edges: Vec<Edge>,
    origin: Origin,
}

impl Node {
    fn new(dependencies: &Dependencies, origin: Origin) -> Self {
        Node {
            edges: dependencies
                .iter()
                .map(|dependency| Edge {
                    target: dependency.token(),
                    deferred: dependency.deferred().copied(),
                })
                .collect(),
            origin,
        }
    }
}

/// Dependency graph over registered tokens, plus the deferred types the
/// auto-wire policy allows to be reached.
///
/// Acyclicity is checked incrementally. Once a node has been walked without
/// finding a cycle it is marked validated and is skipped by later walks until
/// something it can reach is registered again.
#[derive(Default)]
pub(crate) struct DependencyGraph {
    nodes: HashMap<Token, Node>,
    /// Reverse edges, kept even for targets that have no node yet.
    dependents: HashMap<Token, HashSet<Token>>,
    validated: HashSet<Token>,
}

impl DependencyGraph {
    /// Sets the outgoing edges of a registered token. Returns the node it
    /// replaced so that a rejected registration can be rolled back.
    pub fn replace(
        &mut self,
        token: Token,
        dependencies: &Dependencies,
    ) -> Option<Node> {
        let previous = self.remove(token);
        if matches!(&previous, Some(node) if node.origin == Origin::Deferred) {
            tracing::trace!(
                %token,
                "explicit registration replaces an auto-wired type"
            );
        }
        self.insert(token, Node::new(dependencies, Origin::Registered));
        previous
    }

    /// Puts back what [`DependencyGraph::replace`] returned.
    pub fn restore(&mut self, token: Token, previous: Option<Node>) {
        self.remove(token);
        if let Some(previous) = previous {
            self.insert(token, previous);
        }
    }

    fn insert(&mut self, token: Token, node: Node) {
        for edge in &node.edges {
            self.dependents.entry(edge.target).or_default().insert(token);
        }
        self.nodes.insert(token, node);
    }

    fn remove(&mut self, token: Token) -> Option<Node> {
        let node = self.nodes.remove(&token)?;
        for edge in &node.edges {
            if let Some(dependents) = self.dependents.get_mut(&edge.target) {
                dependents.remove(&token);
                if dependents.is_empty() {
                    self.dependents.remove(&edge.target);
                }
            }
        }
        self.validated.remove(&token);
        Some(node)
    }

    /// Clears the validated mark of a token and of everything that can reach
    /// it. Returns the affected tokens, starting with `token`.
    pub fn invalidate(&mut self, token: Token) -> Vec<Token> {
        let mut affected = vec![token];
        let mut seen = HashSet::from([token]);
        let mut queue = VecDeque::from([token]);

        while let Some(current) = queue.pop_front() {
            self.validated.remove(&current);
            let Some(dependents) = self.dependents.get(&current) else {
                continue;
            };
            for &dependent in dependents {
                if seen.insert(dependent) {
                    affected.push(dependent);
                    queue.push_back(dependent);
                }
            }
        }

        affected
    }

    /// Walks the graph from each root in order. On failure, returns the
    /// cycle that was found and removes any deferred nodes that the walk
    /// inserted.
    pub fn validate(
        &mut self,
        roots: &[Token],
        auto_wire: AutoWire,
    ) -> Result<(), Vec<Token>> {
        let mut inserted = Vec::new();
        let mut path = Vec::new();

        for &root in roots {
            path.clear();
            let walked = self.visit(root, &mut path, &mut inserted, auto_wire);
            if let Err(cycle) = walked {
                for token in inserted {
                    self.remove(token);
                }
                return Err(cycle);
            }
        }

        if !inserted.is_empty() {
            tracing::debug!(
                count = inserted.len(),
                "added deferred types to the dependency graph"
            );
        }
        Ok(())
    }

    fn visit(
        &mut self,
        token: Token,
        path: &mut Vec<Token>,
        inserted: &mut Vec<Token>,
        auto_wire: AutoWire,
    ) -> Result<(), Vec<Token>> {
        if self.validated.contains(&token) {
            return Ok(());
        }

        if let Some(position) = path.iter().position(|&t| t == token) {
            return Err(path[position..].to_vec());
        }

        // Unregistered targets are leaves.
        let Some(node) = self.nodes.get(&token) else {
            return Ok(());
        };
        let targets: Vec<_> = node
            .edges
            .iter()
            .map(|edge| (edge.target, edge.deferred))
            .collect();

        path.push(token);
        for (target, deferred) in targets {
            if !self.nodes.contains_key(&target) {
                match deferred {
                    Some(deferred) if auto_wire.is_enabled() => {
                        let node =
                            Node::new(&deferred.manifest(), Origin::Deferred);
                        self.insert(target, node);
                        inserted.push(target);
                    }
                    _ => continue,
                }
            }

            self.visit(target, path, inserted, auto_wire)?;
        }
        path.pop();

        self.validated.insert(token);
        Ok(())
    }

    #[cfg(test)]
    pub fn is_validated(&self, token: Token) -> bool {
        self.validated.contains(&token)
    }

    #[cfg(test)]
    pub fn is_deferred(&self, token: Token) -> bool {
        self.nodes
            .get(&token)
            .map_or(false, |node| node.origin == Origin::Deferred)
    }

    #[cfg(test)]
    pub fn dependents_of(&self, token: Token) -> usize {
        self.dependents.get(&token).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InjectResult, Injectable, Injected, Scope};

    fn register(
        graph: &mut DependencyGraph,
        token: Token,
        dependencies: &Dependencies,
    ) -> Result<(), Vec<Token>> {
        let previous = graph.replace(token, dependencies);
        let affected = graph.invalidate(token);
        let result = graph.validate(&affected, AutoWire::default());
        if result.is_err() {
            graph.restore(token, previous);
        }
        result
    }

    #[test]
    fn walked_nodes_are_memoized() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");
        let b = Token::new("b");
        let c = Token::new("c");

        register(&mut graph, c, &Dependencies::new()).unwrap();
        register(&mut graph, b, &Dependencies::new().inject("c", c)).unwrap();
        assert!(graph.is_validated(b));
        assert!(graph.is_validated(c));

        register(&mut graph, a, &Dependencies::new().inject("b", b)).unwrap();
        assert!(graph.is_validated(a));
        assert_eq!(1, graph.dependents_of(b));
    }

    #[test]
    fn re_registration_invalidates_ancestors() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");
        let b = Token::new("b");
        let c = Token::new("c");

        register(&mut graph, b, &Dependencies::new().inject("c", c)).unwrap();
        register(&mut graph, a, &Dependencies::new().inject("b", b)).unwrap();

        assert_eq!(vec![c, b, a], graph.invalidate(c));
        assert!(!graph.is_validated(a));
        assert!(!graph.is_validated(b));

        graph.validate(&[c, b, a], AutoWire::default()).unwrap();
        assert!(graph.is_validated(a));
    }

    #[test]
    fn unregistered_targets_are_leaves() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");
        let missing = Token::new("missing");

        let deps = Dependencies::new().inject("m", missing);
        register(&mut graph, a, &deps).unwrap();
        assert!(graph.is_validated(a));
        assert!(!graph.is_validated(missing));
    }

    #[test]
    fn rejected_cycle_is_rolled_back() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");
        let b = Token::new("b");

        register(&mut graph, a, &Dependencies::new().inject("b", b)).unwrap();
        let deps = Dependencies::new().inject("a", a);
        let cycle = register(&mut graph, b, &deps).unwrap_err();
        assert_eq!(vec![b, a], cycle);

        // b has no node again, so a can be walked without finding anything
        assert_eq!(0, graph.dependents_of(a));
        register(&mut graph, b, &Dependencies::new()).unwrap();
        assert!(graph.is_validated(a));
    }

    struct Loop;
    impl Injectable for Loop {
        fn dependencies() -> Dependencies {
            Dependencies::new().inject_type::<Loop>("next")
        }

        fn construct(_: &Injected) -> InjectResult<Self> {
            Ok(Loop)
        }
    }

    struct Plain;
    impl Injectable for Plain {
        fn construct(_: &Injected) -> InjectResult<Self> {
            Ok(Plain)
        }
    }

    #[test]
    fn deferred_types_are_walked_when_enabled() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");

        let deps = Dependencies::new().inject_type::<Plain>("plain");
        register(&mut graph, a, &deps).unwrap();
        assert!(graph.is_deferred(Token::of::<Plain>()));
        assert!(graph.is_validated(Token::of::<Plain>()));
    }

    #[test]
    fn deferred_types_are_leaves_when_disabled() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");
        let deps = Dependencies::new()
            .inject_type_scoped::<Loop>("loop", Scope::Singleton);

        graph.replace(a, &deps);
        graph.validate(&[a], AutoWire::Disabled).unwrap();
        assert!(!graph.is_deferred(Token::of::<Loop>()));
    }

    #[test]
    fn deferred_cycle_removes_inserted_nodes() {
        let mut graph = DependencyGraph::default();
        let a = Token::new("a");

        let deps = Dependencies::new().inject_type::<Loop>("loop");
        let cycle = register(&mut graph, a, &deps).unwrap_err();
        assert_eq!(vec![Token::of::<Loop>()], cycle);
        assert!(!graph.is_deferred(Token::of::<Loop>()));
        assert_eq!(0, graph.dependents_of(Token::of::<Loop>()));
    }
}
