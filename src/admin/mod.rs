//! Module administration over HTTP.
//!
//! ```text
//! GET    /modules              → 200 ["catalog", ...]
//! PUT    /modules/$moduleName  → 204 {"catalog": true}   | 404
//! DELETE /modules/$moduleName  → 204 {"catalog": false}  | 404 | 409
//! ```

mod api;

pub use api::{DisableModule, EnableModule, ListModules};

use crate::error::Result;
use crate::module::{Module, ModuleContext, ModuleState};

pub const ADMIN_MODULE_ID: &str = "service_api";

/// Serves the admin routes. Always active: it cannot be switched off through
/// its own API.
pub struct AdminModule {
    state: ModuleState,
}

impl AdminModule {
    /// Create the admin module registered under `id`.
    pub fn new(id: &str) -> Self {
        Self {
            state: ModuleState::new(id),
        }
    }
}

impl Default for AdminModule {
    fn default() -> Self {
        Self::new(ADMIN_MODULE_ID)
    }
}

impl Module for AdminModule {
    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn set_active_state(&self, _active: bool) {}

    fn on_start(&self, ctx: &mut ModuleContext<'_>) -> Result<()> {
        ctx.add_resolver(ListModules);
        ctx.add_resolver(EnableModule);
        ctx.add_resolver(DisableModule);
        Ok(())
    }
}
