//! keyward resolves the public key (JWK) a JSON Web Signature (JWS) must be verified with.
//!
//! Verifying a JWS starts with picking the right key, and the JWS itself is of no
//! help there: its header (`kid`, `jwk`, `jku`) is written by the signer. keyward
//! only selects keys from sources the caller trusts, described by a [`ResolutionHint`]:
//!
//! | hint | key selected |
//! |-|-|
//! | [`Untrusted`](ResolutionHint::Untrusted) | the `jwk` embedded in the header, a `jku` is never fetched |
//! | [`TrustedSet`](ResolutionHint::TrustedSet) | the key with the `kid` of the JWS in the given set |
//! | [`TrustedKey`](ResolutionHint::TrustedKey) | the given key, if it has the `kid` of the JWS |
//! | [`TrustedUri`](ResolutionHint::TrustedUri) | the key with the `kid` of the JWS in the set published at the uri |
//!
//! Whatever the source, a `jwk` embedded in the header must be identical to the
//! selected key, or resolution fails with [`KeyMismatch`](ResolveErrorKind::KeyMismatch).
//!
//! Key sets published at a trusted uri are fetched over `https` with the
//! [`JwksFetcher`] you provide and kept in a size and time bounded [`JwksCache`].
//! A fresh cached set answers immediately while a background fetch refreshes it,
//! an older one stands in when fetching fails.
//!
//! keyward does not verify signatures, nor does it manage private keys.
//!
//! # Example
//!
//! ```
//! use keyward::{KeyResolver, ResolutionHint, ResolveOptions, fetcher_fn};
//! use keyward::core::error::OpaqueError;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let resolver = KeyResolver::new(fetcher_fn(|_uri, _timeout| async move {
//!     // use your http client of choice here
//!     Ok::<_, OpaqueError>(bytes::Bytes::from_static(
//!         br#"{"keys":[{"kty":"EC","crv":"P-256","kid":"k1","x":"x","y":"y"}]}"#,
//!     ))
//! }));
//!
//! // {"alg":"ES256","kid":"k1"} . {} . (no signature)
//! let jws = "eyJhbGciOiJFUzI1NiIsImtpZCI6ImsxIn0.e30.";
//! let hint = ResolutionHint::trusted_uri("https://example.com/jwks.json").unwrap();
//!
//! let key = resolver
//!     .resolve(jws, &hint, ResolveOptions::default())
//!     .await
//!     .unwrap();
//! assert_eq!(key.kid(), Some("k1"));
//! # }
//! ```
//!
//! # Crates
//!
//! - [`keyward::core`](crate::core): error utilities, the [`JwksFetcher`] seam and clocks;
//! - [`keyward::crypto`](crate::crypto): JOSE types, [`JWK`] and [`JWKSet`] predicates and the JWS decoder;
//! - [`keyward::jwks`](crate::jwks): the [`JwksCache`] and the [`KeyResolver`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

#[doc(inline)]
pub use ::keyward_core as core;

#[doc(inline)]
pub use ::keyward_crypto as crypto;

#[doc(inline)]
pub use ::keyward_jwks as jwks;

pub use ::keyward_core::{BoxJwksFetcher, JwksFetcher, fetcher_fn};
pub use ::keyward_crypto::jose::{JWK, JWKSet};
pub use ::keyward_jwks::{
    JwksCache, JwksCacheConfig, KeyResolver, ResolutionHint, ResolveError, ResolveErrorKind,
    ResolveOptions,
};
