//! Request normalization, resolvers and the router.
//!
//! ```text
//! RawRequest ──► Request ──► Router ──► static table  ──► Resolver ──► Outcome
//!                                  └──► dynamic table ─┘
//!                                                      Outcome ──► Dispatch
//! ```

mod body;
mod pattern;
mod redirect;
mod request;
mod resolver;
mod response;
mod router;

pub use body::{Body, FORM_MEDIA_TYPE, JSON_MEDIA_TYPE, MULTIPART_MEDIA_TYPE};
pub use pattern::{PathMatch, PathParams, Pattern, Segment, join_path, normalize_path};
pub use redirect::{ACCEL_REDIRECT_HEADER, Redirect, RedirectKind};
pub use request::{
    Method, RawRequest, Request, SOURCE_SERVICE_HEADER, TARGET_SERVICE_HEADER,
    TARGET_SERVICE_TAG_HEADER,
};
pub use resolver::{FnResolver, Outcome, Resolver, Route};
pub use response::{Dispatch, MIME_TYPES_KEY, Response, resolve_mime_type};
pub use router::{MAX_FORWARDS, Router};
