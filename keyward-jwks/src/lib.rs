//! JWK set caching and signature key resolution.
//!
//! Given a compact JWS and a [`ResolutionHint`] describing what the caller trusts,
//! [`KeyResolver::resolve`] selects the single [`JWK`] that signature must be
//! verified with, fetching (and caching in a [`JwksCache`]) a remote key set when
//! the caller trusts a `jwks_uri`.
//!
//! Keys found in the JWS header itself (`jwk`, `kid`, `jku`) are never trusted
//! on their own. They only tell which key to look at, and an embedded `jwk` must
//! be identical to the key vouched for by the trusted source.
//!
//! [`JWK`]: keyward_crypto::jose::JWK
//!
//! # keyward
//!
//! Crate used by the end-user `keyward` crate and `keyward` crate authors alike.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

mod cache;
pub use cache::{CacheEntry, JwksCache, JwksCacheConfig};

mod resolver;
pub use resolver::{
    KeyResolver, ResolutionHint, ResolveError, ResolveErrorKind, ResolveOptions,
    check_jwk_matches_header,
};

#[cfg(test)]
mod test_helpers;
