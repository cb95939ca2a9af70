//! Modules and their activation state.
//!
//! A module owns a set of resolvers and listeners which it registers from
//! [`Module::on_start`]. The router asks the owning module whether it is
//! active every time one of its resolvers matches, so toggling a module takes
//! effect immediately without re-registering anything.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Catalog {
//!     state: ModuleState,
//! }
//!
//! impl Module for Catalog {
//!     fn state(&self) -> &ModuleState {
//!         &self.state
//!     }
//!
//!     fn on_start(&self, ctx: &mut ModuleContext<'_>) -> Result<()> {
//!         ctx.add_resolver(ListProducts);
//!         Ok(())
//!     }
//! }
//!
//! let modules = ModulesList::new().with("catalog", |id| Catalog { state: ModuleState::new(id) });
//! ```

mod container;
mod context;
mod service;

pub use container::{Activation, MODULES_KEY, ModulesContainer, Persistence, StateLock};
pub use context::ModuleContext;
pub use service::Service;

use crate::error::Result;
use crate::routing::Resolver;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identity and activation flag shared by every module.
#[derive(Debug)]
pub struct ModuleState {
    id: String,
    active: AtomicBool,
}

impl ModuleState {
    /// Modules start out active.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

pub trait Module: Send + Sync + 'static {
    fn state(&self) -> &ModuleState;

    fn id(&self) -> &str {
        self.state().id()
    }

    fn is_active(&self) -> bool {
        self.state().is_active()
    }

    fn set_active_state(&self, active: bool) {
        self.state().set_active(active);
    }

    /// Registers resolvers and listeners.
    fn on_start(&self, _ctx: &mut ModuleContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once the request has ended.
    fn on_finish(&self) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// A module that only carries a fixed set of resolvers.
pub struct BasicModule {
    state: ModuleState,
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl BasicModule {
    /// Create a module without resolvers.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            state: ModuleState::new(id),
            resolvers: Vec::new(),
        }
    }

    /// Registers `resolver` when the module starts.
    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }
}

impl Module for BasicModule {
    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn on_start(&self, ctx: &mut ModuleContext<'_>) -> Result<()> {
        for resolver in &self.resolvers {
            ctx.add_shared_resolver(resolver.clone());
        }
        Ok(())
    }
}

type ModuleFactory = Arc<dyn Fn(&str) -> Arc<dyn Module> + Send + Sync>;

/// Ordered module declarations, instantiated once per request.
#[derive(Clone, Default)]
pub struct ModulesList {
    entries: Vec<(String, ModuleFactory)>,
}

impl ModulesList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a module; `factory` receives the id.
    pub fn with<M, F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        M: Module,
        F: Fn(&str) -> M + Send + Sync + 'static,
    {
        self.push(id, factory);
        self
    }

    /// In-place variant of [`ModulesList::with`].
    pub fn push<M, F>(&mut self, id: impl Into<String>, factory: F)
    where
        M: Module,
        F: Fn(&str) -> M + Send + Sync + 'static,
    {
        let factory: ModuleFactory = Arc::new(move |id: &str| Arc::new(factory(id)) as Arc<dyn Module>);
        self.entries.push((id.into(), factory));
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn instantiate(&self) -> Vec<Arc<dyn Module>> {
        self.entries
            .iter()
            .map(|(id, factory)| factory(id))
            .collect()
    }
}

impl fmt::Debug for ModulesList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
