//! Resolution of the key a JWS must be verified with.

use crate::JwksCache;
use http::Uri;
use http::uri::{PathAndQuery, Scheme};
use keyward_core::error::{ErrorContext as _, OpaqueError};
use keyward_core::telemetry::tracing;
use keyward_core::{BoxJwksFetcher, JwksFetcher};
use keyward_crypto::jose::{DecodedJWSCompact, JWK, JWKSet};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod error;
pub use error::{ResolveError, ResolveErrorKind};

mod hint;
pub use hint::ResolutionHint;

mod trust;
pub use trust::check_jwk_matches_header;
use trust::Latch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Options of a single [`KeyResolver::resolve`] call.
pub struct ResolveOptions {
    timeout: Duration,
}

impl ResolveOptions {
    /// Default timeout of a JWK set fetch.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Create [`ResolveOptions`] with the default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Timeout of the JWK set fetch.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the timeout of the JWK set fetch.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout of the JWK set fetch.
    pub const fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects the [`JWK`] a JWS must be verified with.
///
/// A resolver owns (or shares) a [`JwksCache`] and a [`JwksFetcher`], used for
/// [`ResolutionHint::TrustedUri`] hints. It is cheap to clone, clones share both.
///
/// # Trusted uri
///
/// When the caller trusts a key set uri, every call fetches that uri (over `https`)
/// in a background task. Meanwhile, if the cache holds a fresh copy of the set
/// which contains the `kid` of the JWS, the call is answered from the cache right
/// away; the fetch keeps running and refreshes the cache for later calls.
///
/// When the fetch fails (or times out) a cached copy younger than the failure
/// timeout of the cache is used instead, otherwise the call fails with
/// [`KeyFetchFailed`](ResolveErrorKind::KeyFetchFailed).
///
/// ```
/// use keyward_core::{error::OpaqueError, fetcher_fn};
/// use keyward_jwks::{KeyResolver, ResolutionHint, ResolveErrorKind, ResolveOptions};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let resolver = KeyResolver::new(fetcher_fn(|_uri, _timeout| async move {
///     Err::<bytes::Bytes, _>(OpaqueError::from_display("offline"))
/// }));
///
/// // {"alg":"ES256","kid":"k1"} . {} . (no signature)
/// let jws = "eyJhbGciOiJFUzI1NiIsImtpZCI6ImsxIn0.e30.";
/// let hint = ResolutionHint::trusted_uri("https://example.com/jwks.json").unwrap();
///
/// let err = resolver
///     .resolve(jws, &hint, ResolveOptions::default())
///     .await
///     .unwrap_err();
/// assert_eq!(err.kind(), ResolveErrorKind::KeyFetchFailed);
/// # }
/// ```
pub struct KeyResolver<F = BoxJwksFetcher> {
    fetcher: Arc<F>,
    cache: Arc<JwksCache>,
}

impl<F> KeyResolver<F> {
    /// Create a new [`KeyResolver`] with its own [`JwksCache`].
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            cache: Arc::new(JwksCache::new()),
        }
    }

    /// Use the given [`JwksCache`], e.g. to share it between resolvers.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<JwksCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Reference to the [`JwksCache`] of this resolver.
    #[must_use]
    pub fn cache(&self) -> &Arc<JwksCache> {
        &self.cache
    }
}

impl<F> Clone for KeyResolver<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<F> fmt::Debug for KeyResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyResolver")
            .field("cache", &self.cache)
            .finish()
    }
}

impl<F: JwksFetcher> KeyResolver<F> {
    /// Resolve the key the given compact JWS must be verified with.
    ///
    /// Nothing is verified: the returned [`JWK`] is the key the caller trusts
    /// for this JWS, verifying the signature with it is up to the caller.
    pub async fn resolve(
        &self,
        jws: &str,
        hint: &ResolutionHint,
        options: ResolveOptions,
    ) -> Result<JWK, ResolveError> {
        let jws = DecodedJWSCompact::decode(jws)?;
        self.resolve_decoded(&jws, hint, options).await
    }

    /// Resolve the key of an already decoded JWS, see [`KeyResolver::resolve`].
    pub async fn resolve_decoded(
        &self,
        jws: &DecodedJWSCompact,
        hint: &ResolutionHint,
        options: ResolveOptions,
    ) -> Result<JWK, ResolveError> {
        let kid = jws.kid();
        let embedded = jws.embedded_jwk();

        match hint {
            ResolutionHint::Untrusted => {
                if let Some(jku) = jws.jku() {
                    tracing::warn!(
                        %jku,
                        "ignoring jku header of JWS: the signer's key set uri is not trusted"
                    );
                }
                let candidate = embedded.and_then(|value| JWK::try_from(value.clone()).ok());
                check_jwk_matches_header(candidate, embedded)
            }
            ResolutionHint::TrustedSet(jwks) => {
                check_jwk_matches_header(jwks.find(kid).cloned(), embedded)
            }
            ResolutionHint::TrustedKey(key) => {
                if key.get("kid") != jws.header().get("kid") {
                    return Err(ResolveError::invalid_hint(
                        "kid of trusted key differs from kid of JWS",
                    ));
                }
                check_jwk_matches_header(Some(key.clone()), embedded)
            }
            ResolutionHint::TrustedUri(uri) => {
                self.resolve_remote(uri, kid, embedded, options).await
            }
        }
    }

    async fn resolve_remote(
        &self,
        uri: &Uri,
        kid: Option<&str>,
        embedded: Option<&Value>,
        options: ResolveOptions,
    ) -> Result<JWK, ResolveError> {
        let uri = force_https(uri)?;
        let cache_key = uri.to_string();
        let (latch, rx) = Latch::new();

        // a fresh hit settles the latch before the fetch task exists
        if let Some(entry) = self.cache.get_fresh(&cache_key) {
            if let Some(key) = entry.jwks().find(kid) {
                tracing::trace!(uri = %cache_key, kid, "fresh JWK set cache hit");
                latch.settle(check_jwk_matches_header(Some(key.clone()), embedded));
            } else {
                tracing::trace!(
                    uri = %cache_key,
                    kid,
                    "kid not found in fresh cached JWK set: waiting on fetch"
                );
            }
        }

        tokio::spawn(
            FetchTask {
                fetcher: self.fetcher.clone(),
                cache: self.cache.clone(),
                uri,
                cache_key,
                kid: kid.map(ToOwned::to_owned),
                embedded: embedded.cloned(),
                timeout: options.timeout,
                latch,
            }
            .run(),
        );

        rx.await.unwrap_or_else(|err| {
            Err(ResolveError::new(ResolveErrorKind::KeyFetchFailed)
                .with_source(OpaqueError::from_std(err)))
        })
    }
}

/// Everything the background fetch of a single resolution owns.
struct FetchTask<F> {
    fetcher: Arc<F>,
    cache: Arc<JwksCache>,
    uri: Uri,
    cache_key: String,
    kid: Option<String>,
    embedded: Option<Value>,
    timeout: Duration,
    latch: Latch,
}

impl<F: JwksFetcher> FetchTask<F> {
    async fn run(self) {
        let jwks = match self.fetch().await {
            Ok((jwks, size_bytes)) => {
                let jwks = Arc::new(jwks);
                if self.cache.put(self.cache_key.as_str(), jwks.clone(), size_bytes) {
                    tracing::debug!(uri = %self.uri, size_bytes, "cached fetched JWK set");
                }
                jwks
            }
            Err(err) => match self.cache.prune_on_failure(&self.cache_key) {
                Some(entry) => {
                    tracing::warn!(
                        uri = %self.uri,
                        error = %err,
                        inserted_at = entry.inserted_at(),
                        "failed to fetch JWK set: using cached copy"
                    );
                    entry.jwks().clone()
                }
                None => {
                    tracing::warn!(
                        uri = %self.uri,
                        error = %err,
                        "failed to fetch JWK set: no cached copy to fall back to"
                    );
                    self.latch.settle(Err(ResolveError::new(
                        ResolveErrorKind::KeyFetchFailed,
                    )
                    .with_source(err)));
                    return;
                }
            },
        };

        if self.latch.is_settled() {
            tracing::trace!(uri = %self.uri, "resolution answered from cache: fetch only refreshed it");
            return;
        }

        let candidate = jwks.find(self.kid.as_deref()).cloned();
        self.latch
            .settle(check_jwk_matches_header(candidate, self.embedded.as_ref()));
    }

    async fn fetch(&self) -> Result<(JWKSet, u64), OpaqueError> {
        let body = tokio::time::timeout(self.timeout, self.fetcher.fetch(&self.uri, self.timeout))
            .await
            .context("fetch JWK set")??;
        let jwks = JWKSet::from_slice(&body)?;
        Ok((jwks, body.len() as u64))
    }
}

/// Rewrite the uri to use the `https` scheme, whatever scheme it has.
fn force_https(uri: &Uri) -> Result<Uri, ResolveError> {
    if uri.scheme() == Some(&Scheme::HTTPS) {
        return Ok(uri.clone());
    }
    let mut parts = uri.clone().into_parts();
    if parts.authority.is_none() {
        return Err(ResolveError::invalid_hint(
            "trusted JWK set uri must contain an authority",
        ));
    }
    parts.scheme = Some(Scheme::HTTPS);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let https = Uri::from_parts(parts)
        .map_err(|err| ResolveError::new(ResolveErrorKind::InvalidHint).with_source(err))?;
    tracing::debug!(%uri, %https, "forcing https scheme for JWK set uri");
    Ok(https)
}
