use crate::ServiceInfo;
use std::{
    any::{Any, TypeId},
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum TokenId {
    Unique(u64),
    Type(TypeId),
}

/// An opaque key identifying a registration in a
/// [`Container`](crate::Container).
///
/// Equality is based on identity rather than on the name. Every call to
/// [`Token::new`] produces a token that is distinct from all others, even
/// if the same name is used twice. The name only shows up in diagnostics.
///
/// ```
/// use token_injector::Token;
///
/// let first = Token::new("logger");
/// let second = Token::new("logger");
///
/// let copy = first;
///
/// assert_eq!(first, copy);
/// assert_ne!(first, second);
/// ```
///
/// Tokens derived from a type with [`Token::of`] are stable: the same type
/// always derives the same token. These are the tokens that deferred
/// dependencies are registered under.
#[derive(Clone, Copy)]
pub struct Token {
    id: TokenId,
    name: &'static str,
}

impl Token {
    /// Creates a new, globally unique token.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Token {
            id: TokenId::Unique(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed)),
            name,
        }
    }

    /// Derives the token for a type.
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        Token::for_service(ServiceInfo::of::<T>())
    }

    pub(crate) fn for_service(info: ServiceInfo) -> Self {
        Token {
            id: TokenId::Type(info.id()),
            name: info.name(),
        }
    }

    /// Gets the diagnostic name of this token.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this token was derived from a type rather than created with
    /// [`Token::new`].
    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self.id, TokenId::Type(_))
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            TokenId::Unique(id) => write!(f, "Token({}#{})", self.name, id),
            TokenId::Type(_) => write!(f, "Token(<{}>)", self.name),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}
