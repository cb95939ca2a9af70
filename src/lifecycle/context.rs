use crate::config::Configuration;
use crate::events::Events;
use crate::module::ModulesContainer;

/// Everything a resolver may reach during one request.
pub struct AppContext {
    config: Configuration,
    modules: ModulesContainer,
    events: Events,
}

impl AppContext {
    /// Create a context from the request's collaborators.
    pub fn new(config: Configuration, modules: ModulesContainer, events: Events) -> Self {
        Self {
            config,
            modules,
            events,
        }
    }

    /// In-memory configuration, no modules, no listeners.
    pub fn detached() -> Self {
        let config = Configuration::in_memory();
        Self::new(config.clone(), ModulesContainer::empty(config), Events::new())
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn modules(&self) -> &ModulesContainer {
        &self.modules
    }

    pub fn events(&self) -> &Events {
        &self.events
    }
}
