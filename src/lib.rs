//! # Switchyard
//!
//! A small request-dispatch core: raw requests are normalized, matched against
//! resolvers registered by modules, and turned into a final response. Modules
//! can be switched on and off at runtime, and their state survives restarts
//! through a pluggable configuration store.
//!
//! ## Features
//!
//! - **Routing**: static and parameterized (`$name`, `...`) routes, first
//!   registered wins
//! - **Modules**: activation checked on every dispatch, persisted on demand
//! - **Events**: synchronous `init` / `pre_request_end` / `request_end`
//!   notifications
//! - **Admin API**: list, enable and disable modules over HTTP
//! - **axum adapter**: serve the whole thing behind a single fallback handler
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard::prelude::*;
//! use switchyard::config::MemoryStore;
//!
//! #[resolver(method = "GET", route = "/$id", namespace = "/items")]
//! struct GetItem;
//!
//! impl Resolver for GetItem {
//!     fn resolve(&self, request: &Request, _ctx: &AppContext) -> Result<Outcome> {
//!         let id = request.param("id").unwrap_or_default();
//!         Ok(Response::json(StatusCode::OK, &serde_json::json!({ "id": id }))?.into())
//!     }
//! }
//!
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
//!         ctx.add_resolver(GetItem);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let bootstrap = Bootstrap::new(Arc::new(MemoryStore::new()))
//!         .module(ADMIN_MODULE_ID, AdminModule::new)
//!         .module("catalog", |id| Catalog { state: ModuleState::new(id) });
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, switchyard::http::app(bootstrap))
//!         .with_graceful_shutdown(shutdown_signal())
//!         .await
//!         .unwrap();
//! }
//! ```

extern crate self as switchyard;

pub mod admin;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod module;
pub mod network;
pub mod routing;

// Re-export core types
pub use error::{Result, SwitchyardError, SwitchyardError as Error};
pub use lifecycle::{AppContext, Application, Bootstrap};
pub use module::{Module, ModuleState};
pub use routing::{Dispatch, Outcome, RawRequest, Request, Resolver, Response};

// Re-export macros
pub use switchyard_macro::resolver;

// Re-export commonly used types from dependencies
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::admin::{ADMIN_MODULE_ID, AdminModule};
    pub use crate::config::{Configuration, SetOptions};
    pub use crate::error::{Result, SwitchyardError};
    pub use crate::events::{CoreEvent, Events, Listener};
    pub use crate::lifecycle::{AppContext, Application, Bootstrap, shutdown_signal};
    pub use crate::module::{
        Activation, BasicModule, Module, ModuleContext, ModuleState, ModulesList, Persistence,
        Service,
    };
    pub use crate::network::{Cache, Csp, HeaderProvider};
    pub use crate::resolver;
    pub use crate::routing::{
        Body, Dispatch, FnResolver, Method, Outcome, RawRequest, Redirect, Request, Resolver,
        Response, Route,
    };
    pub use axum::http::StatusCode;
    pub use std::sync::Arc;
}
