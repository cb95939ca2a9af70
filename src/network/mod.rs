//! Response header providers.
//!
//! Anything that contributes response headers implements [`HeaderProvider`].
//! A [`Response`](crate::routing::Response) merges the output of every
//! attached provider in attach order, so a later provider overwrites an
//! earlier one on duplicate names.

mod cache;
mod csp;

pub use cache::{Cache, CacheRule};
pub use csp::{Csp, directive, source};

use std::collections::BTreeMap;
use std::fmt::Debug;

/// Header name to value.
pub type Headers = BTreeMap<String, String>;

pub trait HeaderProvider: Send + Sync + Debug {
    fn headers(&self) -> Headers;
}

impl HeaderProvider for Headers {
    fn headers(&self) -> Headers {
        self.clone()
    }
}

/// Merges provider outputs, later providers winning on duplicate names.
pub fn merge_headers<'a, I>(providers: I) -> Headers
where
    I: IntoIterator<Item = &'a dyn HeaderProvider>,
{
    let mut merged = Headers::new();
    for provider in providers {
        merged.extend(provider.headers());
    }
    merged
}
