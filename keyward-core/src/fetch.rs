//! [`JwksFetcher`] and [`BoxJwksFetcher`], the transport seam of keyward.
//!
//! keyward does not ship an http client. Whatever client the application already
//! uses is plugged in by implementing [`JwksFetcher`], or by wrapping an async
//! closure with [`fetcher_fn`].

use crate::error::OpaqueError;
use bytes::Bytes;
use http::Uri;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Fetches the raw body of a JSON Web Key Set.
///
/// Implementations are expected to perform a single `GET` for the given [`Uri`],
/// buffer the full response body and respect the given timeout.
/// The caller enforces the timeout as well, so an implementation
/// that cannot honour it is still bounded.
///
/// The [`Uri`] is always an `https` uri.
pub trait JwksFetcher: Send + Sync + 'static {
    /// Fetch the body found at the given [`Uri`].
    fn fetch(
        &self,
        uri: &Uri,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, OpaqueError>> + Send + '_;

    /// Box this fetcher to allow for dynamic dispatch.
    fn boxed(self) -> BoxJwksFetcher
    where
        Self: Sized,
    {
        BoxJwksFetcher::new(self)
    }
}

impl<F> JwksFetcher for Arc<F>
where
    F: JwksFetcher,
{
    #[inline]
    fn fetch(
        &self,
        uri: &Uri,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, OpaqueError>> + Send + '_ {
        self.as_ref().fetch(uri, timeout)
    }
}

impl<F> JwksFetcher for Box<F>
where
    F: JwksFetcher,
{
    #[inline]
    fn fetch(
        &self,
        uri: &Uri,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, OpaqueError>> + Send + '_ {
        self.as_ref().fetch(uri, timeout)
    }
}

/// Internal trait for dynamic dispatch of the async [`JwksFetcher`] trait.
trait DynJwksFetcher {
    fn fetch_box<'a>(
        &'a self,
        uri: &'a Uri,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, OpaqueError>> + Send + 'a>>;
}

impl<T> DynJwksFetcher for T
where
    T: JwksFetcher,
{
    fn fetch_box<'a>(
        &'a self,
        uri: &'a Uri,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, OpaqueError>> + Send + 'a>> {
        Box::pin(self.fetch(uri, timeout))
    }
}

/// A boxed [`JwksFetcher`], for where you require dynamic dispatch.
#[derive(Clone)]
pub struct BoxJwksFetcher {
    inner: Arc<dyn DynJwksFetcher + Send + Sync + 'static>,
}

impl BoxJwksFetcher {
    /// Create a new [`BoxJwksFetcher`] from the given fetcher.
    #[inline]
    pub fn new<T>(fetcher: T) -> Self
    where
        T: JwksFetcher,
    {
        Self {
            inner: Arc::new(fetcher),
        }
    }
}

impl fmt::Debug for BoxJwksFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxJwksFetcher").finish()
    }
}

impl JwksFetcher for BoxJwksFetcher {
    #[inline]
    fn fetch(
        &self,
        uri: &Uri,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, OpaqueError>> + Send + '_ {
        // the uri reference only lives for this call, so clone it into the boxed future
        let uri = uri.clone();
        async move { self.inner.fetch_box(&uri, timeout).await }
    }

    fn boxed(self) -> BoxJwksFetcher {
        self
    }
}

/// Create a [`FetcherFn`] from an async function or closure.
///
/// ```
/// use keyward_core::{JwksFetcher, fetcher_fn, error::OpaqueError};
/// use bytes::Bytes;
///
/// let fetcher = fetcher_fn(|uri: http::Uri, _timeout| async move {
///     Ok::<_, OpaqueError>(Bytes::from(format!(r#"{{"keys":[],"from":"{uri}"}}"#)))
/// });
/// # let _ = fetcher.boxed();
/// ```
pub fn fetcher_fn<F, R>(f: F) -> FetcherFn<F>
where
    F: Fn(Uri, Duration) -> R + Send + Sync + 'static,
    R: Future<Output = Result<Bytes, OpaqueError>> + Send + 'static,
{
    FetcherFn { f }
}

/// A [`JwksFetcher`] implemented using a function.
///
/// Created using [`fetcher_fn`].
#[derive(Clone)]
pub struct FetcherFn<F> {
    f: F,
}

impl<F> fmt::Debug for FetcherFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherFn").finish()
    }
}

impl<F, R> JwksFetcher for FetcherFn<F>
where
    F: Fn(Uri, Duration) -> R + Send + Sync + 'static,
    R: Future<Output = Result<Bytes, OpaqueError>> + Send + 'static,
{
    fn fetch(
        &self,
        uri: &Uri,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, OpaqueError>> + Send + '_ {
        (self.f)(uri.clone(), timeout)
    }
}
