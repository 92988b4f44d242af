use super::{ResolveError, ResolveErrorKind};
use http::Uri;
use keyward_crypto::jose::{JWK, JWKSet, is_jwk, is_jwk_set};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the caller trusts to select the key of a JWS.
///
/// The header of a JWS is written by the signer, so none of its key related
/// parameters are trusted by themselves. The hint is the caller's own statement
/// of which key source it trusts for this signature.
pub enum ResolutionHint {
    /// Nothing is trusted besides the JWS itself: only a key embedded in
    /// the `jwk` header parameter can be selected. A `jku` header is never fetched.
    Untrusted,
    /// The key set published at this uri is trusted.
    ///
    /// The uri is always fetched over `https`, whatever its scheme.
    TrustedUri(Uri),
    /// This key set is trusted, the key is selected by the `kid` of the JWS.
    TrustedSet(JWKSet),
    /// This key is trusted, it must have the same `kid` as the JWS (or none if the JWS has none).
    TrustedKey(JWK),
}

impl ResolutionHint {
    /// Create a [`ResolutionHint::TrustedUri`] from a uri string.
    ///
    /// Fails with [`InvalidHint`] if the uri cannot be parsed
    /// or does not contain an authority (host).
    ///
    /// [`InvalidHint`]: ResolveErrorKind::InvalidHint
    pub fn trusted_uri(uri: &str) -> Result<Self, ResolveError> {
        let uri: Uri = uri
            .parse()
            .map_err(|err| ResolveError::new(ResolveErrorKind::InvalidHint).with_source(err))?;
        if uri.authority().is_none() {
            return Err(ResolveError::invalid_hint(
                "trusted JWK set uri must contain an authority",
            ));
        }
        Ok(Self::TrustedUri(uri))
    }
}

impl From<JWKSet> for ResolutionHint {
    fn from(jwks: JWKSet) -> Self {
        Self::TrustedSet(jwks)
    }
}

impl From<JWK> for ResolutionHint {
    fn from(jwk: JWK) -> Self {
        Self::TrustedKey(jwk)
    }
}

/// Interpret a loosely typed hint, as found in configuration or passed by a
/// dynamic caller:
///
/// - `false`: [`ResolutionHint::Untrusted`];
/// - a string: [`ResolutionHint::TrustedUri`];
/// - a JWK set: [`ResolutionHint::TrustedSet`];
/// - a JWK: [`ResolutionHint::TrustedKey`].
///
/// Anything else is an [`InvalidHint`](ResolveErrorKind::InvalidHint).
impl TryFrom<Value> for ResolutionHint {
    type Error = ResolveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(false) => Ok(Self::Untrusted),
            Value::String(uri) => Self::trusted_uri(&uri),
            value if is_jwk_set(&value) => JWKSet::try_from(value)
                .map(Self::TrustedSet)
                .map_err(|err| ResolveError::new(ResolveErrorKind::InvalidHint).with_source(err)),
            value if is_jwk(&value) => JWK::try_from(value)
                .map(Self::TrustedKey)
                .map_err(|err| ResolveError::new(ResolveErrorKind::InvalidHint).with_source(err)),
            _ => Err(ResolveError::invalid_hint(
                "hint must be false, a uri, a JWK set or a JWK",
            )),
        }
    }
}
