//! Application bootstrap
//!
//! A [`Bootstrap`] lives for the whole process and builds one
//! [`Application`] per request.

use super::AppContext;
use crate::config::{ConfigStore, Configuration, Environment};
use crate::error::{Result, SwitchyardError};
use crate::events::{CoreEvent, Events};
use crate::module::{Module, ModulesContainer, ModulesList, StateLock};
use crate::routing::{Dispatch, RawRequest, Request, Router};
use serde_json::json;
use std::sync::Arc;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AppState {
    Running,
    ShuttingDown,
    Finished,
}

/// Process-wide application setup: the persistent store, the module
/// declarations and the lock guarding the persisted module state.
#[derive(Clone)]
pub struct Bootstrap {
    store: Arc<dyn ConfigStore>,
    modules: ModulesList,
    state_lock: StateLock,
}

impl Bootstrap {
    /// Create a new bootstrap over `store` without modules.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            modules: ModulesList::new(),
            state_lock: StateLock::new(),
        }
    }

    /// Declares a module; see [`ModulesList::with`].
    pub fn module<M, F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        M: Module,
        F: Fn(&str) -> M + Send + Sync + 'static,
    {
        self.modules.push(id, factory);
        self
    }

    /// Replaces every declared module with `modules`.
    pub fn modules(mut self, modules: ModulesList) -> Self {
        self.modules = modules;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Seeds the persistent configuration on a cold start.
    pub fn seed_environment(&self, env: &Environment) -> Result<bool> {
        Ok(env.seed(&Configuration::new(self.store.clone()))?)
    }

    /// Starts an application for `raw` without running it.
    pub fn start(&self, raw: RawRequest) -> Result<Application> {
        Application::start(raw, self.store.clone(), &self.modules, &self.state_lock)
    }

    /// Starts, runs and finishes an application for `raw`.
    pub fn dispatch(&self, raw: RawRequest) -> Result<Dispatch> {
        self.start(raw)?.run()
    }
}

/// One request's router, modules and events.
///
/// Teardown (`request_end` and every module's `on_finish`) happens in
/// [`Application::finish`], or on drop when it was never called.
pub struct Application {
    request: Option<Request>,
    router: Router,
    ctx: AppContext,
    state: AppState,
    span: tracing::Span,
}

impl Application {
    /// Normalizes `raw`, starts the modules and emits `init`.
    ///
    /// A malformed body fails here, before any module is involved.
    /// Applications sharing `store` must share `state_lock` too.
    pub fn start(
        raw: RawRequest,
        store: Arc<dyn ConfigStore>,
        modules: &ModulesList,
        state_lock: &StateLock,
    ) -> Result<Self> {
        let request = Request::from_raw(raw)?;
        let span = tracing::info_span!(
            "request",
            id = %request.id(),
            method = %request.method(),
            path = %request.path()
        );
        let entered = span.enter();

        if let Some(source) = request.source_service() {
            tracing::debug!(source, "Request from another service");
        }

        let config = Configuration::new(store);
        let events = Events::new();
        let mut router = Router::for_request(&request);
        let container = ModulesContainer::start(modules, &mut router, &events, &config, state_lock)?;

        drop(entered);
        let app = Self {
            request: Some(request),
            router,
            ctx: AppContext::new(config, container, events),
            state: AppState::Running,
            span,
        };

        app.ctx.events().emit(CoreEvent::Init, None)?;
        Ok(app)
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The request, until [`Application::run`] consumes it.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// Resolves the request, emits `pre_request_end` with the final status
    /// and tears the application down.
    pub fn run(mut self) -> Result<Dispatch> {
        let request = self
            .request
            .take()
            .ok_or_else(|| SwitchyardError::Internal("request already dispatched".into()))?;
        let span = self.span.clone();
        let _entered = span.enter();

        let result = self.router.resolve(request, &self.ctx);
        let status = match &result {
            Ok(dispatch) => dispatch.status,
            Err(e) => e.status_code(),
        };
        tracing::info!(status = status.as_u16(), "Request resolved");

        let pre_end = self.ctx.events().emit(
            CoreEvent::PreRequestEnd,
            Some(&json!({ "status": status.as_u16() })),
        );
        let finished = self.finish();

        let dispatch = result?;
        pre_end?;
        finished?;
        Ok(dispatch)
    }

    /// Emits `request_end` and stops the modules. Runs once.
    pub fn finish(&mut self) -> Result<()> {
        if self.state != AppState::Running {
            return Ok(());
        }
        self.state = AppState::ShuttingDown;

        let result = self.ctx.events().emit(CoreEvent::RequestEnd, None);
        self.ctx.modules().stop_modules();

        self.state = AppState::Finished;
        tracing::debug!("Application finished");
        result
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if self.state == AppState::Running {
            let span = self.span.clone();
            let _entered = span.enter();
            if let Err(e) = self.finish() {
                tracing::error!("Teardown failed: {}", e);
            }
        }
    }
}
