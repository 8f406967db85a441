use crate::{
    DynSvc, InjectResult, MapContainer, MapContainerEx, Token,
};
use derive_more::Display;
use std::collections::HashMap;

/// The lifetime and sharing policy of the instances behind a token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum Scope {
    /// A new instance is created every time the token is needed, including
    /// several times within a single resolution.
    #[display(fmt = "transient")]
    Transient,

    /// At most one instance is created per call to
    /// [`Container::resolve`](crate::Container::resolve). Instances are
    /// shared by everything built during that call and dropped by the
    /// container when the call returns.
    #[display(fmt = "request")]
    Request,

    /// At most one instance is ever created for the token, on first use.
    #[display(fmt = "singleton")]
    Singleton,

    /// A pre-built value supplied at registration. It is never constructed.
    #[display(fmt = "constant")]
    Constant,
}

impl Scope {
    /// Whether instances of this scope outlive a single construction.
    #[must_use]
    pub fn is_shared(self) -> bool {
        !matches!(self, Scope::Transient)
    }
}

type Slot = MapContainer<Option<DynSvc>>;

/// Container-lifetime store for singleton and constant instances.
///
/// Every token gets its own slot. A slot is locked for as long as its
/// instance is being constructed, so concurrent resolutions of the same
/// singleton wait for the first one and then share its instance.
#[derive(Default)]
pub(crate) struct SingletonStore {
    slots: MapContainer<HashMap<Token, Slot>>,
}

impl SingletonStore {
    fn slot(&self, token: Token) -> Slot {
        self.slots.with_inner_mut(|slots| {
            slots
                .entry(token)
                .or_insert_with(|| MapContainerEx::new(None))
                .clone()
        })
    }

    /// Stores a pre-built value for a token, replacing whatever was there.
    pub fn insert(&self, token: Token, value: DynSvc) -> Option<DynSvc> {
        self.slot(token)
            .with_inner_mut(|instance| instance.replace(value))
    }

    pub fn get(&self, token: Token) -> Option<DynSvc> {
        let slot = self
            .slots
            .with_inner(|slots| slots.get(&token).cloned())?;
        slot.with_inner(Clone::clone)
    }

    /// Drops the slot of a token. Threads already waiting on the old slot
    /// still receive the instance it ends up holding.
    pub fn evict(&self, token: Token) -> Option<DynSvc> {
        let slot =
            self.slots.with_inner_mut(|slots| slots.remove(&token))?;
        slot.with_inner_mut(Option::take)
    }

    /// Puts a previously evicted instance back.
    pub fn restore(&self, token: Token, value: Option<DynSvc>) {
        match value {
            Some(value) => drop(self.insert(token, value)),
            None => drop(self.evict(token)),
        }
    }

    /// Returns the instance for a token, constructing it with `init` if the
    /// slot is empty. A failed or panicking construction leaves the slot
    /// empty.
    pub fn get_or_try_init<F>(
        &self,
        token: Token,
        init: F,
    ) -> InjectResult<DynSvc>
    where
        F: FnOnce() -> InjectResult<DynSvc>,
    {
        self.slot(token).with_inner_mut(|instance| {
            if let Some(instance) = instance {
                tracing::trace!(%token, "reusing singleton");
                return Ok(instance.clone());
            }

            let created = init()?;
            *instance = Some(created.clone());
            Ok(created)
        })
    }
}

/// Per-call store for request-scoped instances. One is created for every
/// top-level resolution and dropped when that resolution returns.
#[derive(Default)]
pub(crate) struct RequestScope {
    instances: HashMap<Token, DynSvc>,
}

impl RequestScope {
    pub fn get(&self, token: Token) -> Option<DynSvc> {
        let instance = self.instances.get(&token)?;
        tracing::trace!(%token, "reusing request-scoped instance");
        Some(instance.clone())
    }

    pub fn insert(&mut self, token: Token, instance: DynSvc) {
        self.instances.insert(token, instance);
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{erase, InjectError, Svc};

    #[test]
    fn singleton_slot_is_filled_once() {
        let store = SingletonStore::default();
        let token = Token::new("counter");

        let first =
            store.get_or_try_init(token, || Ok(erase(1_i32))).unwrap();
        let second = store
            .get_or_try_init(token, || panic!("slot should already be filled"))
            .unwrap();

        assert!(Svc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_init_leaves_slot_empty() {
        let store = SingletonStore::default();
        let token = Token::new("flaky");

        let result = store.get_or_try_init(token, || {
            Err(InjectError::InternalError("nope".into()))
        });
        assert!(result.is_err());
        assert!(store.get(token).is_none());

        store.get_or_try_init(token, || Ok(erase(2_i32))).unwrap();
        assert!(store.get(token).is_some());
    }

    #[cfg(feature = "arc")]
    #[test]
    fn panicking_init_leaves_slot_usable() {
        let store = SingletonStore::default();
        let token = Token::new("panicky");

        let panicked = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    store.get_or_try_init(token, || panic!("init failed"))
                })
                .join()
                .is_err()
        });
        assert!(panicked);
        assert!(store.get(token).is_none());

        let created = store.get_or_try_init(token, || Ok(erase(3_i32)));
        assert!(created.is_ok());
    }

    #[test]
    fn evict_and_restore() {
        let store = SingletonStore::default();
        let token = Token::new("value");
        store.insert(token, erase("a"));

        let evicted = store.evict(token);
        assert!(evicted.is_some());
        assert!(store.get(token).is_none());

        store.restore(token, evicted);
        assert!(store.get(token).is_some());
    }

    #[test]
    fn request_scope_reuses_within_call() {
        let mut scope = RequestScope::default();
        let token = Token::new("request");

        assert!(scope.get(token).is_none());
        scope.insert(token, erase(0_u8));
        let first = scope.get(token).unwrap();
        let second = scope.get(token).unwrap();

        assert!(Svc::ptr_eq(&first, &second));
        assert_eq!(1, scope.len());
    }
}
