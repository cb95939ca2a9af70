use proc_macro::TokenStream;

mod resolver;

/// Attribute macro mounting a resolver struct on a method and route
///
/// Generates the `Route` implementation; the struct still implements
/// `Resolver` by hand. `namespace` defaults to `/` and `route` to the empty
/// route.
///
/// # Example
/// ```ignore
/// use switchyard::prelude::*;
///
/// #[resolver(method = "PUT", route = "/$moduleName", namespace = "/modules")]
/// pub struct EnableModule;
///
/// impl Resolver for EnableModule {
///     fn resolve(&self, request: &Request, ctx: &AppContext) -> Result<Outcome> {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn resolver(attr: TokenStream, item: TokenStream) -> TokenStream {
    resolver::resolver_attribute(attr, item)
}
