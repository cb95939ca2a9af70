use super::pattern::join_path;
use super::redirect::Redirect;
use super::request::{Method, Request};
use super::response::Response;
use crate::error::Result;
use crate::lifecycle::AppContext;

/// What a resolver decided for the current request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Stop and answer with this response.
    Terminate(Response),
    Redirect(Redirect),
    /// Restart resolution with another request.
    Forward(Request),
    /// Not handled here, try the next candidate.
    Continue,
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Terminate(response)
    }
}

impl From<Redirect> for Outcome {
    fn from(redirect: Redirect) -> Self {
        Outcome::Redirect(redirect)
    }
}

impl From<Request> for Outcome {
    fn from(request: Request) -> Self {
        Outcome::Forward(request)
    }
}

/// Where a resolver is mounted. Usually derived with `#[resolver(...)]`.
pub trait Route {
    fn method(&self) -> Method;

    fn route(&self) -> &str;

    fn namespace(&self) -> &str {
        "/"
    }

    fn full_path(&self) -> String {
        join_path(self.namespace(), self.route())
    }
}

pub trait Resolver: Route + Send + Sync {
    fn resolve(&self, request: &Request, ctx: &AppContext) -> Result<Outcome>;
}

/// Resolver backed by a closure.
pub struct FnResolver<F> {
    method: Method,
    route: String,
    namespace: String,
    handler: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&Request, &AppContext) -> Result<Outcome> + Send + Sync,
{
    /// Create a resolver answering `method` on `route` with `handler`.
    pub fn new(method: Method, route: impl Into<String>, handler: F) -> Self {
        Self {
            method,
            route: route.into(),
            namespace: "/".to_string(),
            handler,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl<F> Route for FnResolver<F> {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn route(&self) -> &str {
        &self.route
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl<F> Resolver for FnResolver<F>
where
    F: Fn(&Request, &AppContext) -> Result<Outcome> + Send + Sync,
{
    fn resolve(&self, request: &Request, ctx: &AppContext) -> Result<Outcome> {
        (self.handler)(request, ctx)
    }
}
