use super::{Module, ModuleContext, ModuleState};
use crate::discovery::ServiceProvider;
use crate::error::Result;
use std::sync::Arc;

/// A module published through service discovery.
///
/// While the module is active it is served locally, so it is withdrawn from
/// the registry; once deactivated it is registered again and traffic goes to
/// the other instances. Registry failures are logged and never block the
/// transition.
pub struct Service<M> {
    inner: M,
    provider: Arc<dyn ServiceProvider>,
}

impl<M: Module> Service<M> {
    /// Wrap `inner` so its activation changes reach `provider`.
    pub fn new(inner: M, provider: Arc<dyn ServiceProvider>) -> Self {
        Self { inner, provider }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn provider(&self) -> &Arc<dyn ServiceProvider> {
        &self.provider
    }
}

impl<M: Module> Module for Service<M> {
    fn state(&self) -> &ModuleState {
        self.inner.state()
    }

    fn set_active_state(&self, active: bool) {
        let was_active = self.inner.is_active();
        self.inner.set_active_state(active);
        if self.inner.is_active() == was_active {
            return;
        }

        let result = if active {
            self.provider.unregister_service()
        } else {
            self.provider.register_service()
        };
        if let Err(e) = result {
            tracing::warn!(
                module = %self.id(),
                service = %self.provider.service_name(),
                error = %e,
                "Service discovery update failed"
            );
        }
    }

    fn on_start(&self, ctx: &mut ModuleContext<'_>) -> Result<()> {
        self.inner.on_start(ctx)
    }

    fn on_finish(&self) -> Result<()> {
        self.inner.on_finish()
    }
}
