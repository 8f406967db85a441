use crate::{
    plan::Plan,
    scope::{RequestScope, SingletonStore},
    DynSvc, InjectError, InjectResult, Injected, Scope,
};
use std::collections::HashMap;

/// One execution of a [`Plan`]. Owns the request scope of a single
/// top-level resolution, which is dropped along with it.
///
/// Entries are resolved on demand starting from the root, so the
/// dependencies of a singleton that already exists are never touched.
pub(crate) struct Activation<'a> {
    plan: &'a Plan,
    singletons: &'a SingletonStore,
    request: RequestScope,
    shared: Vec<Option<DynSvc>>,
}

impl<'a> Activation<'a> {
    pub fn new(plan: &'a Plan, singletons: &'a SingletonStore) -> Self {
        Activation {
            plan,
            singletons,
            request: RequestScope::default(),
            shared: vec![None; plan.len()],
        }
    }

    /// Produces the root instance.
    pub fn run(mut self) -> InjectResult<DynSvc> {
        let root = self.obtain(self.plan.root_index());
        tracing::trace!(
            root = %self.plan.root(),
            request_scoped = self.request.len(),
            "finished resolution"
        );
        root
    }

    fn obtain(&mut self, index: usize) -> InjectResult<DynSvc> {
        if let Some(instance) = &self.shared[index] {
            return Ok(instance.clone());
        }

        let plan = self.plan;
        let singletons = self.singletons;
        let entry = &plan.entries()[index];
        let instance = match entry.descriptor.scope() {
            Scope::Transient => return self.construct(index),
            Scope::Constant => singletons
                .get(entry.token)
                .or_else(|| entry.descriptor.value())
                .ok_or(InjectError::MissingConstructionSource {
                    token: entry.token,
                })?,
            Scope::Singleton => singletons
                .get_or_try_init(entry.token, || self.construct(index))?,
            Scope::Request => match self.request.get(entry.token) {
                Some(instance) => instance,
                None => {
                    let created = self.construct(index)?;
                    self.request.insert(entry.token, created.clone());
                    created
                }
            },
        };

        self.shared[index] = Some(instance.clone());
        Ok(instance)
    }

    fn construct(&mut self, index: usize) -> InjectResult<DynSvc> {
        let plan = self.plan;
        let entry = &plan.entries()[index];

        let mut fields = HashMap::with_capacity(entry.dependencies.len());
        for dependency in &entry.dependencies {
            let instance = self.obtain(dependency.index)?;
            let token = plan.entries()[dependency.index].token;
            fields.insert(dependency.field, (token, instance));
        }

        tracing::trace!(
            token = %entry.token,
            scope = %entry.descriptor.scope(),
            kind = %entry.descriptor.kind(),
            "constructing"
        );
        let injected =
            Injected::new(entry.token, entry.descriptor.target(), fields);
        entry.descriptor.activate(entry.token, &injected)
    }
}
