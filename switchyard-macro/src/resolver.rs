use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, Ident, ItemStruct, LitStr, Token,
};

const METHODS: [(&str, &str); 5] = [
    ("GET", "Get"),
    ("POST", "Post"),
    ("PUT", "Put"),
    ("DELETE", "Delete"),
    ("HEAD", "Head"),
];

struct ResolverArgs {
    method: Ident,
    route: String,
    namespace: Option<String>,
}

impl Parse for ResolverArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut method = None;
        let mut route = None;
        let mut namespace = None;

        while !input.is_empty() {
            let name: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let lit: LitStr = input.parse()?;

            if name == "method" {
                let value = lit.value().to_ascii_uppercase();
                let variant = METHODS
                    .iter()
                    .find(|(verb, _)| *verb == value)
                    .map(|(_, variant)| Ident::new(variant, Span::call_site()))
                    .ok_or_else(|| {
                        syn::Error::new(
                            lit.span(),
                            "expected one of GET, POST, PUT, DELETE, HEAD",
                        )
                    })?;
                method = Some(variant);
            } else if name == "route" {
                route = Some(lit.value());
            } else if name == "namespace" {
                namespace = Some(lit.value());
            } else {
                return Err(syn::Error::new(
                    name.span(),
                    "expected `method`, `route` or `namespace`",
                ));
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(ResolverArgs {
            method: method.ok_or_else(|| input.error("missing `method`"))?,
            route: route.unwrap_or_default(),
            namespace,
        })
    }
}

pub fn resolver_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ResolverArgs);
    let input = parse_macro_input!(item as ItemStruct);
    TokenStream::from(generate_route_impl(&args, &input))
}

fn generate_route_impl(args: &ResolverArgs, input: &ItemStruct) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let method = &args.method;
    let route = &args.route;
    let namespace = args.namespace.as_ref().map(|namespace| {
        quote! {
            fn namespace(&self) -> &str { #namespace }
        }
    });

    quote! {
        #input

        impl #impl_generics ::switchyard::routing::Route for #struct_name #ty_generics #where_clause {
            fn method(&self) -> ::switchyard::routing::Method {
                ::switchyard::routing::Method::#method
            }

            fn route(&self) -> &str { #route }

            #namespace
        }
    }
}
