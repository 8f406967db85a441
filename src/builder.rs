use crate::{Container, Scope};

/// Decides what happens to a deferred dependency on a type that has no
/// registration of its own.
///
/// The policy is consulted while validating the dependency graph and while
/// building resolution plans. It never adds anything to the container's
/// registrations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AutoWire {
    /// Deferred dependencies must be registered explicitly. Missing ones
    /// fail with [`DependencyNotRegistered`].
    ///
    /// [`DependencyNotRegistered`]: crate::InjectError::DependencyNotRegistered
    Disabled,

    /// Deferred dependencies are materialized on first use under their
    /// derived token.
    Enabled {
        /// The scope used when a declaration doesn't request one.
        default_scope: Scope,
    },
}

impl AutoWire {
    /// Whether deferred dependencies may be materialized.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, AutoWire::Enabled { .. })
    }

    /// The scope a deferred type is materialized with, or [`None`] if
    /// auto-wiring is disabled.
    #[must_use]
    pub fn scope_for(self, requested: Option<Scope>) -> Option<Scope> {
        match self {
            AutoWire::Disabled => None,
            AutoWire::Enabled { default_scope } => {
                Some(requested.unwrap_or(default_scope))
            }
        }
    }
}

impl Default for AutoWire {
    fn default() -> Self {
        AutoWire::Enabled {
            default_scope: Scope::Transient,
        }
    }
}

/// A builder for a [`Container`].
///
/// ```
/// use token_injector::{AutoWire, Container};
///
/// let mut builder = Container::builder();
/// builder.auto_wire(AutoWire::Disabled);
/// let container = builder.build();
/// assert_eq!(AutoWire::Disabled, container.auto_wire());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    auto_wire: AutoWire,
}

impl ContainerBuilder {
    /// Sets the policy for deferred dependencies.
    pub fn auto_wire(&mut self, policy: AutoWire) -> &mut Self {
        self.auto_wire = policy;
        self
    }

    /// Builds the container.
    #[must_use]
    pub fn build(self) -> Container {
        Container::with_auto_wire(self.auto_wire)
    }
}
