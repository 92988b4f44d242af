use keyward_core::error::BoxError;
use keyward_crypto::jose::MalformedHeader;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
/// The kind of a [`ResolveError`].
pub enum ResolveErrorKind {
    /// The JWS header could not be decoded into a JSON object.
    MalformedHeader,
    /// The caller passed a hint which is not a valid [`ResolutionHint`].
    ///
    /// [`ResolutionHint`]: super::ResolutionHint
    InvalidHint,
    /// The key set could not be fetched and no cached copy could stand in for it.
    KeyFetchFailed,
    /// None of the trusted sources yield a key for this JWS.
    NoTrustedKey,
    /// The key embedded in the JWS header differs from the trusted key.
    KeyMismatch,
}

impl ResolveErrorKind {
    /// Static description of this kind of error.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed JWS header",
            Self::InvalidHint => "invalid resolution hint",
            Self::KeyFetchFailed => "failed to fetch JWK set",
            Self::NoTrustedKey => "no trusted key found for JWS",
            Self::KeyMismatch => "JWK embedded in JWS header does not match the trusted key",
        }
    }
}

impl fmt::Display for ResolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`KeyResolver::resolve`].
///
/// Every error is final for the call that returned it, the resolver does not retry.
/// Match on [`ResolveError::kind`] to tell them apart, the underlying cause
/// (if any) is available as the [`source`](std::error::Error::source).
///
/// [`KeyResolver::resolve`]: super::KeyResolver::resolve
pub struct ResolveError {
    kind: ResolveErrorKind,
    source: Option<BoxError>,
}

impl ResolveError {
    /// Create a new [`ResolveError`] of the given kind, without a cause.
    #[must_use]
    pub const fn new(kind: ResolveErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Attach the underlying cause of this error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The [`ResolveErrorKind`] of this error.
    #[must_use]
    pub const fn kind(&self) -> ResolveErrorKind {
        self.kind
    }

    pub(crate) fn invalid_hint(reason: &'static str) -> Self {
        Self::new(ResolveErrorKind::InvalidHint).with_source(reason)
    }
}

impl fmt::Debug for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{:?}: {source:?}", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

impl From<ResolveErrorKind> for ResolveError {
    fn from(kind: ResolveErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<MalformedHeader> for ResolveError {
    fn from(err: MalformedHeader) -> Self {
        Self::new(ResolveErrorKind::MalformedHeader).with_source(err)
    }
}
