use super::pattern::{Pattern, split_segments};
use super::request::{Method, Request};
use super::resolver::{Outcome, Resolver};
use super::response::Dispatch;
use crate::error::{Result, SwitchyardError};
use crate::lifecycle::AppContext;
use crate::module::Module;
use std::collections::HashMap;
use std::sync::Arc;

/// Forwards followed before resolution gives up.
pub const MAX_FORWARDS: usize = 16;

struct Entry {
    module: Arc<dyn Module>,
    resolver: Arc<dyn Resolver>,
    pattern: Pattern,
}

impl Entry {
    /// Invokes the resolver unless the owning module is inactive.
    fn invoke(&self, request: &Request, ctx: &AppContext) -> Result<Outcome> {
        if !self.module.is_active() {
            tracing::debug!(
                module = %self.module.id(),
                pattern = %self.pattern,
                "Skipping resolver of inactive module"
            );
            return Ok(Outcome::Continue);
        }
        self.resolver.resolve(request, ctx)
    }
}

/// Route table for one request.
///
/// Patterns without `$` or `...` live in the static table and are looked up
/// exactly; the rest are tried in registration order.
#[derive(Default)]
pub struct Router {
    target: Option<String>,
    statics: HashMap<Method, HashMap<String, Entry>>,
    dynamics: HashMap<Method, Vec<Entry>>,
}

impl Router {
    /// A router accepting resolvers of every module.
    pub fn new() -> Self {
        Self::default()
    }

    /// A router for `request`: when it names a target service, only that
    /// module's resolvers are registered.
    pub fn for_request(request: &Request) -> Self {
        Self {
            target: request.target_service().map(str::to_string),
            ..Self::default()
        }
    }

    /// Register `resolver` on behalf of `module`.
    ///
    /// Skipped when the request targets another service. Patterns with a capture
    /// or `...` go to the dynamic table in registration order, everything else
    /// to the static table; an already registered key is replaced in place.
    pub fn add_resolver(&mut self, module: Arc<dyn Module>, resolver: Arc<dyn Resolver>) {
        let pattern = Pattern::parse(&resolver.full_path());
        let method = resolver.method();

        if let Some(target) = &self.target {
            if target != module.id() {
                tracing::debug!(
                    module = %module.id(),
                    target = %target,
                    pattern = %pattern,
                    "Resolver not registered, request targets another module"
                );
                return;
            }
        }

        tracing::debug!(module = %module.id(), method = %method, pattern = %pattern, "Registering resolver");

        if pattern.is_dynamic() {
            let entries = self.dynamics.entry(method).or_default();
            let entry = Entry {
                module,
                resolver,
                pattern,
            };
            match entries.iter_mut().find(|e| e.pattern == entry.pattern) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        } else {
            self.statics.entry(method).or_default().insert(
                pattern.as_str().to_string(),
                Entry {
                    module,
                    resolver,
                    pattern,
                },
            );
        }
    }

    /// Number of registered resolvers across both tables.
    pub fn route_count(&self) -> usize {
        self.statics.values().map(HashMap::len).sum::<usize>()
            + self.dynamics.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.route_count() == 0
    }

    /// Resolves `request` to its final dispatch.
    pub fn resolve(&self, request: Request, ctx: &AppContext) -> Result<Dispatch> {
        let mut current = request;
        let mut forwards = 0;

        loop {
            match self.resolve_once(&mut current, ctx)? {
                Outcome::Terminate(response) => {
                    return Dispatch::from_response(response, ctx.config());
                }
                Outcome::Redirect(redirect) => {
                    tracing::debug!(kind = ?redirect.kind(), location = %redirect.location(), "Redirecting");
                    return Ok(Dispatch::from_redirect(&redirect));
                }
                Outcome::Forward(next) => {
                    forwards += 1;
                    if forwards > MAX_FORWARDS {
                        return Err(SwitchyardError::ForwardLimit {
                            limit: MAX_FORWARDS,
                        });
                    }
                    tracing::debug!(from = %current.path(), to = %next.path(), "Forwarding request");
                    current = next;
                }
                Outcome::Continue => {
                    tracing::debug!(method = %current.method(), path = %current.path(), "No resolver matched");
                    return Ok(Dispatch::not_found());
                }
            }
        }
    }

    /// One pass over both tables. Returns `Continue` when nothing handled
    /// the request.
    fn resolve_once(&self, request: &mut Request, ctx: &AppContext) -> Result<Outcome> {
        let method = request.method().clone();

        if let Some(entry) = self
            .statics
            .get(&method)
            .and_then(|table| table.get(request.path()))
        {
            request.clear_bindings();
            let outcome = entry.invoke(request, ctx)?;
            if handled(&outcome, request) {
                return Ok(outcome);
            }
        }

        let Some(candidates) = self.dynamics.get(&method) else {
            return Ok(Outcome::Continue);
        };
        let path = request.path().to_string();
        let segments = split_segments(&path);

        for entry in candidates {
            let Some(matched) = entry.pattern.matches(&segments) else {
                continue;
            };
            request.bind(matched);
            let outcome = entry.invoke(request, ctx)?;
            if handled(&outcome, request) {
                return Ok(outcome);
            }
        }
        Ok(Outcome::Continue)
    }
}

/// A forward to an identical request counts as not handled.
fn handled(outcome: &Outcome, current: &Request) -> bool {
    match outcome {
        Outcome::Continue => false,
        Outcome::Forward(next) => next != current,
        Outcome::Terminate(_) | Outcome::Redirect(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{BasicModule, Module};
    use crate::routing::{FnResolver, Redirect, Response};
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn module(id: &str) -> Arc<dyn Module> {
        Arc::new(BasicModule::new(id))
    }

    fn text(method: Method, route: &str, body: &'static str) -> Arc<dyn Resolver> {
        Arc::new(FnResolver::new(
            method,
            route,
            move |_: &Request, _: &AppContext| Ok(Response::text(StatusCode::OK, body).into()),
        ))
    }

    fn resolve(router: &Router, method: Method, uri: &str) -> Dispatch {
        router
            .resolve(Request::new(method, uri), &AppContext::detached())
            .unwrap()
    }

    #[test]
    fn static_hit() {
        let mut router = Router::new();
        router.add_resolver(module("a"), text(Method::Get, "/modules", "list"));

        let dispatch = resolve(&router, Method::Get, "/modules/");
        assert_eq!(dispatch.status, StatusCode::OK);
        assert_eq!(dispatch.body.as_deref(), Some("list"));

        assert_eq!(resolve(&router, Method::Post, "/modules").status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unmatched_is_empty_404() {
        let router = Router::new();
        let dispatch = resolve(&router, Method::Get, "/nothing");
        assert_eq!(dispatch, Dispatch::not_found());
    }

    #[test]
    fn dynamic_binding() {
        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(
                Method::Get,
                "/items/$id",
                |request: &Request, _: &AppContext| {
                    assert_eq!(request.params().len(), 1);
                    Ok(Response::text(StatusCode::OK, request.param("id").unwrap_or_default()).into())
                },
            )),
        );

        assert_eq!(resolve(&router, Method::Get, "/items/42").body.as_deref(), Some("42"));
        assert_eq!(resolve(&router, Method::Get, "/items").status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn variadic_requires_extra_segments() {
        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(
                Method::Get,
                "/books/psychology/...",
                |request: &Request, _: &AppContext| {
                    Ok(Response::text(StatusCode::OK, request.rest().join("/")).into())
                },
            )),
        );

        assert_eq!(resolve(&router, Method::Get, "/books").status, StatusCode::NOT_FOUND);
        assert_eq!(
            resolve(&router, Method::Get, "/books/psychology").status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            resolve(&router, Method::Get, "/books/psychology/freud/dreams").body.as_deref(),
            Some("freud/dreams")
        );
    }

    #[test]
    fn first_registered_dynamic_wins() {
        let mut router = Router::new();
        router.add_resolver(module("a"), text(Method::Get, "/items/$id", "first"));
        router.add_resolver(module("b"), text(Method::Get, "/items/$name", "second"));

        assert_eq!(resolve(&router, Method::Get, "/items/1").body.as_deref(), Some("first"));
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let mut router = Router::new();
        router.add_resolver(module("a"), text(Method::Get, "/items/$id", "old"));
        router.add_resolver(module("a"), text(Method::Get, "/items/$id/tags", "tags"));
        router.add_resolver(module("a"), text(Method::Get, "/items/$id", "new"));

        assert_eq!(router.route_count(), 2);
        assert_eq!(resolve(&router, Method::Get, "/items/1").body.as_deref(), Some("new"));
    }

    #[test]
    fn continue_falls_through_to_next_candidate() {
        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(Method::Get, "/items", |_: &Request, _: &AppContext| {
                Ok(Outcome::Continue)
            })),
        );
        router.add_resolver(module("b"), text(Method::Get, "/$section", "section"));

        assert_eq!(resolve(&router, Method::Get, "/items").body.as_deref(), Some("section"));
    }

    #[test]
    fn inactive_module_is_skipped() {
        let inactive = module("a");
        inactive.set_active_state(false);

        let mut router = Router::new();
        router.add_resolver(inactive, text(Method::Get, "/items", "hidden"));
        router.add_resolver(module("b"), text(Method::Get, "/...", "fallback"));

        assert_eq!(resolve(&router, Method::Get, "/items").body.as_deref(), Some("fallback"));
    }

    #[test]
    fn target_service_filters_registration() {
        let request = Request::new(Method::Get, "/items").with_header("X-Target-Service", "b");
        let mut router = Router::for_request(&request);
        router.add_resolver(module("a"), text(Method::Get, "/items", "a"));
        router.add_resolver(module("b"), text(Method::Get, "/other", "b"));

        assert_eq!(router.route_count(), 1);
        assert_eq!(
            router
                .resolve(request, &AppContext::detached())
                .unwrap()
                .status,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn forward_restarts_resolution() {
        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(Method::Get, "/old", |request: &Request, _: &AppContext| {
                Ok(request.clone().with_path("/new").into())
            })),
        );
        router.add_resolver(module("a"), text(Method::Get, "/new", "moved"));

        assert_eq!(resolve(&router, Method::Get, "/old").body.as_deref(), Some("moved"));
    }

    #[test]
    fn forwarding_to_the_same_request_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(Method::Get, "/loop", move |request: &Request, _: &AppContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(request.clone().into())
            })),
        );

        assert_eq!(resolve(&router, Method::Get, "/loop").status, StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn endless_forwarding_is_cut_off() {
        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(Method::Get, "/$n", |request: &Request, _: &AppContext| {
                let next = request.param("n").unwrap_or("0").parse::<u32>().unwrap_or(0) + 1;
                Ok(request.clone().with_path(&format!("/{next}")).into())
            })),
        );

        let err = router
            .resolve(Request::new(Method::Get, "/0"), &AppContext::detached())
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::ForwardLimit { limit: MAX_FORWARDS }));
    }

    #[test]
    fn redirect_ends_processing() {
        let mut router = Router::new();
        router.add_resolver(
            module("a"),
            Arc::new(FnResolver::new(Method::Get, "/old", |_: &Request, _: &AppContext| {
                Ok(Redirect::permanent("/new").into())
            })),
        );

        let dispatch = resolve(&router, Method::Get, "/old");
        assert_eq!(dispatch.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(dispatch.header("Location"), Some("/new"));
    }
}
