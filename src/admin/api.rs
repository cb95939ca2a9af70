use super::ADMIN_MODULE_ID;
use crate::error::Result;
use crate::lifecycle::AppContext;
use crate::module::{Activation, Persistence};
use crate::routing::{Outcome, Request, Resolver, Response};
use axum::http::StatusCode;
use std::collections::BTreeMap;
use switchyard_macro::resolver;

/// Lists the active modules. The admin module itself is always active and
/// cannot be toggled, so it is left out.
#[resolver(method = "GET", route = "", namespace = "/modules")]
pub struct ListModules;

impl Resolver for ListModules {
    fn resolve(&self, _request: &Request, ctx: &AppContext) -> Result<Outcome> {
        let active = ctx
            .modules()
            .active_ids()
            .into_iter()
            .filter(|id| id != ADMIN_MODULE_ID)
            .collect::<Vec<_>>();
        Ok(Response::json(StatusCode::OK, &active)?.into())
    }
}

/// Activates a module and persists the change.
#[resolver(method = "PUT", route = "/$moduleName", namespace = "/modules")]
pub struct EnableModule;

impl Resolver for EnableModule {
    fn resolve(&self, request: &Request, ctx: &AppContext) -> Result<Outcome> {
        let Some(name) = request.param("moduleName") else {
            return Ok(Response::not_found().into());
        };
        let activation = ctx.modules().enable(name, Persistence::Persisted)?;
        activation_response(name, activation).map(Outcome::from)
    }
}

/// Deactivates a module and persists the change.
#[resolver(method = "DELETE", route = "/$moduleName", namespace = "/modules")]
pub struct DisableModule;

impl Resolver for DisableModule {
    fn resolve(&self, request: &Request, ctx: &AppContext) -> Result<Outcome> {
        let Some(name) = request.param("moduleName") else {
            return Ok(Response::not_found().into());
        };
        let activation = ctx.modules().disable(name, Persistence::Persisted)?;
        activation_response(name, activation).map(Outcome::from)
    }
}

/// `204 {name: active}` once the module is in the requested state.
fn activation_response(name: &str, activation: Activation) -> Result<Response> {
    let active = match activation {
        Activation::Enabled | Activation::AlreadyEnabled => true,
        Activation::Disabled | Activation::AlreadyDisabled => false,
        Activation::NotFound => return Ok(Response::not_found()),
        Activation::Pinned => return Ok(Response::new(StatusCode::CONFLICT)),
    };
    tracing::info!(module = %name, active, ?activation, "Module state requested over admin API");
    let body = BTreeMap::from([(name, active)]);
    Response::json(StatusCode::NO_CONTENT, &body)
}
