#![allow(clippy::used_underscore_binding)]

use crate::{ServiceInfo, Token};
use derive_more::Display;
use std::error::Error;

/// An error that has occurred while registering or resolving a service.
#[derive(Debug, Display)]
#[display(fmt = "an error occurred during injection: {}")]
#[non_exhaustive]
pub enum InjectError {
    /// A token was resolved that has no registration.
    #[display(fmt = "{} is not registered", token)]
    NotRegistered {
        /// The token that was resolved.
        token: Token,
    },

    /// A registration declares a dependency on a token that has no
    /// registration and cannot be auto-wired.
    #[display(fmt = "{} is not registered (required by {})", dependency, token)]
    DependencyNotRegistered {
        /// The token whose registration declared the dependency.
        token: Token,

        /// The dependency that is missing a registration.
        dependency: Token,
    },

    /// A registration would have closed a cycle in the dependency graph.
    #[display(fmt = "a dependency cycle was detected [{}]", "fmt_cycle(cycle)")]
    CyclicDependency {
        /// The tokens on the cycle, in dependency order. The last token
        /// depends on the first one.
        cycle: Vec<Token>,
    },

    /// A class or factory registration has no constructor or factory, or a
    /// constant registration has no value.
    #[display(
        fmt = "the registration for {} has nothing to construct it from",
        token
    )]
    MissingConstructionSource {
        /// The token of the malformed registration.
        token: Token,
    },

    /// The instance behind a token is not of the requested type.
    #[display(
        fmt = "{} does not hold an instance of {}",
        token,
        "expected.name()"
    )]
    TypeMismatch {
        /// The token that was resolved.
        token: Token,

        /// The type the caller asked for.
        expected: ServiceInfo,
    },

    /// A constructor asked for a field that its manifest never declared.
    #[display(
        fmt = "{} did not declare a dependency named '{}'",
        "service.name()",
        field
    )]
    UndeclaredDependency {
        /// The service being constructed.
        service: ServiceInfo,

        /// The field that was requested.
        field: &'static str,
    },

    /// A factory or constructor failed to produce its service.
    #[display(fmt = "an error occurred during activation of {}", token)]
    ActivationFailed {
        /// The token being activated.
        token: Token,

        /// The error returned by the factory.
        inner: Box<dyn Error + Send + Sync + 'static>,
    },

    /// An unexpected error has occurred. This is usually caused by a bug in
    /// the library itself.
    #[display(
        fmt = "an unexpected error occurred (please report this): {}",
        _0
    )]
    InternalError(String),
}

impl Error for InjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InjectError::ActivationFailed { inner, .. } => {
                let inner: &(dyn Error + 'static) = &**inner;
                Some(inner)
            }
            _ => None,
        }
    }
}

fn fmt_cycle(cycle: &[Token]) -> String {
    let mut joined = String::new();
    for item in cycle.iter().chain(cycle.first()) {
        if !joined.is_empty() {
            joined.push_str(" -> ");
        }
        joined.push_str(item.name());
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Display)]
    #[display(fmt = "boom")]
    struct Boom;
    impl Error for Boom {}

    #[test]
    fn cycle_is_rendered_closed() {
        let a = Token::new("a");
        let b = Token::new("b");
        let error = InjectError::CyclicDependency { cycle: vec![a, b] };

        assert_eq!(
            "an error occurred during injection: a dependency cycle was detected [a -> b -> a]",
            error.to_string()
        );
    }

    #[test]
    fn activation_failure_exposes_source() {
        let error = InjectError::ActivationFailed {
            token: Token::new("foo"),
            inner: Box::new(Boom),
        };

        let source = error.source().expect("source should be set");
        assert_eq!("boom", source.to_string());
    }
}
