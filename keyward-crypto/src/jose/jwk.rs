use keyward_core::error::{ErrorContext as _, OpaqueError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value::is_truthy;

/// Returns true if the value looks like a [`JWK`]:
/// a JSON object with a truthy `kty` attribute.
pub fn is_jwk(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("kty"))
        .is_some_and(is_truthy)
}

/// Returns true if the value looks like a [`JWKSet`]:
/// a JSON object whose `keys` attribute is an array
/// containing at least one value for which [`is_jwk`] holds.
pub fn is_jwk_set(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("keys"))
        .and_then(Value::as_array)
        .is_some_and(|keys| keys.iter().any(is_jwk))
}

/// Find the first [`JWK`] of the set, in sequence order, with the given key id.
///
/// Returns `None` for an absent or empty key id. A set containing
/// the same key id more than once is not an error, the earliest key wins.
pub fn find_by_key_id<'a>(kid: Option<&str>, jwks: &'a JWKSet) -> Option<&'a JWK> {
    let kid = kid.filter(|kid| !kid.is_empty())?;
    jwks.keys.iter().find(|key| key.kid() == Some(kid))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
/// [`JWK`] or JSON Web Key as defined in [`rfc7517`]
///
/// The key is kept as the JSON object it was received as.
/// Equality is deep and does not depend on the order of the attributes.
///
/// [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517
pub struct JWK(Map<String, Value>);

impl JWK {
    /// The "kty" (key type) parameter, such as "RSA", "EC" or "oct".
    #[must_use]
    pub fn kty(&self) -> Option<&str> {
        self.0.get("kty").and_then(Value::as_str)
    }

    /// The "kid" (key id) parameter, if any.
    ///
    /// Only string key ids are considered.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.0.get("kid").and_then(Value::as_str)
    }

    /// The "alg" (algorithm) parameter, if any.
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        self.0.get("alg").and_then(Value::as_str)
    }

    /// Get any other attribute of this key.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Reference to all attributes of this key.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume this key into its attributes.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Returns true if the given raw JSON value is exactly this key.
    pub fn matches_value(&self, value: &Value) -> bool {
        value.as_object() == Some(&self.0)
    }
}

impl TryFrom<Value> for JWK {
    type Error = OpaqueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !is_jwk(&value) {
            return Err(OpaqueError::from_display(
                "JWK must be a JSON object with a non-empty kty",
            ));
        }
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(OpaqueError::from_display("JWK must be a JSON object")),
        }
    }
}

impl TryFrom<Map<String, Value>> for JWK {
    type Error = OpaqueError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        Value::Object(map).try_into()
    }
}

impl From<JWK> for Value {
    fn from(jwk: JWK) -> Self {
        Self::Object(jwk.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
/// [`JWKSet`] or JSON Web Key Set as defined in [section 5 of `rfc7517`]
///
/// A set always contains at least one [`JWK`]. Entries of the `keys` array
/// which are not keys according to [`is_jwk`] are dropped when the set is built,
/// they could never be selected anyway.
///
/// [section 5 of `rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517#section-5
pub struct JWKSet {
    keys: Vec<JWK>,
}

impl JWKSet {
    /// Create a [`JWKSet`] from the given keys, fails if there are none.
    pub fn new(keys: Vec<JWK>) -> Result<Self, OpaqueError> {
        if keys.is_empty() {
            return Err(OpaqueError::from_display(
                "JWK set must contain at least one key",
            ));
        }
        Ok(Self { keys })
    }

    /// Parse a [`JWKSet`] from a raw JSON body, as served at a `jwks_uri`.
    pub fn from_slice(body: &[u8]) -> Result<Self, OpaqueError> {
        let value: Value = serde_json::from_slice(body).context("parse JWK set as JSON")?;
        value.try_into()
    }

    /// Keys of this set, in the order they were published.
    #[must_use]
    pub fn keys(&self) -> &[JWK] {
        &self.keys
    }

    /// Find the first key with the given key id, see [`find_by_key_id`].
    #[must_use]
    pub fn find(&self, kid: Option<&str>) -> Option<&JWK> {
        find_by_key_id(kid, self)
    }
}

impl TryFrom<Value> for JWKSet {
    type Error = OpaqueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !is_jwk_set(&value) {
            return Err(OpaqueError::from_display(
                "JWK set must be a JSON object with at least one JWK in its keys array",
            ));
        }
        let keys = match value {
            Value::Object(mut obj) => match obj.remove("keys") {
                Some(Value::Array(keys)) => keys,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Self::new(keys.into_iter().filter_map(|key| key.try_into().ok()).collect())
    }
}

impl From<JWKSet> for Value {
    fn from(jwks: JWKSet) -> Self {
        let keys = jwks.keys.into_iter().map(Self::from).collect();
        let mut obj = Map::with_capacity(1);
        obj.insert("keys".to_owned(), Self::Array(keys));
        Self::Object(obj)
    }
}
