use super::Module;
use crate::config::Configuration;
use crate::events::{Events, Listener};
use crate::routing::{Resolver, Router};
use std::sync::Arc;

/// What a module sees while it starts.
pub struct ModuleContext<'a> {
    module: Arc<dyn Module>,
    router: &'a mut Router,
    events: &'a Events,
    config: &'a Configuration,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        module: Arc<dyn Module>,
        router: &'a mut Router,
        events: &'a Events,
        config: &'a Configuration,
    ) -> Self {
        Self {
            module,
            router,
            events,
            config,
        }
    }

    pub fn module_id(&self) -> &str {
        self.module.id()
    }

    /// Registers a resolver owned by the starting module.
    pub fn add_resolver(&mut self, resolver: impl Resolver + 'static) {
        self.add_shared_resolver(Arc::new(resolver));
    }

    pub fn add_shared_resolver(&mut self, resolver: Arc<dyn Resolver>) {
        self.router.add_resolver(self.module.clone(), resolver);
    }

    /// Subscribes `listener` to `event`.
    pub fn listen(&self, event: impl AsRef<str>, listener: impl Listener + 'static) {
        self.events.listen(event, listener);
    }

    pub fn events(&self) -> &Events {
        self.events
    }

    pub fn config(&self) -> &Configuration {
        self.config
    }
}
