use crate::{Descriptor, InjectError, InjectResult, Svc, Token};
use std::collections::HashMap;

/// Map from token to its registration record. The last registration for a
/// token wins.
#[derive(Default)]
pub(crate) struct Registry {
    descriptors: HashMap<Token, Svc<Descriptor>>,
}

impl Registry {
    /// Stores a descriptor, returning the one it replaced.
    pub fn insert(
        &mut self,
        token: Token,
        descriptor: Svc<Descriptor>,
    ) -> Option<Svc<Descriptor>> {
        self.descriptors.insert(token, descriptor)
    }

    /// Puts back what [`Registry::insert`] replaced.
    pub fn restore(&mut self, token: Token, previous: Option<Svc<Descriptor>>) {
        match previous {
            Some(previous) => {
                self.descriptors.insert(token, previous);
            }
            None => {
                self.descriptors.remove(&token);
            }
        }
    }

    pub fn get(&self, token: Token) -> Option<&Svc<Descriptor>> {
        self.descriptors.get(&token)
    }

    pub fn lookup(&self, token: Token) -> InjectResult<&Svc<Descriptor>> {
        self.get(token)
            .ok_or(InjectError::NotRegistered { token })
    }

    pub fn contains(&self, token: Token) -> bool {
        self.descriptors.contains_key(&token)
    }
}
