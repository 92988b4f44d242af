use std::fmt;

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use keyward_core::error::{ErrorContext as _, OpaqueError};
use serde_json::{Map, Value};

use super::value::is_truthy;

/// Base64Url, accepting segments with or without padding.
const BASE64_URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Payload of a [`DecodedJWSCompact`].
///
/// A JWS payload does not have to be JSON.
pub enum Payload {
    /// Payload which decoded to a JSON value.
    Json(Value),
    /// Payload which is not JSON, as text.
    Text(String),
}

impl Payload {
    /// Reference to the JSON payload, if the payload was JSON.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Reference to the text payload, if the payload was not JSON.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A compact JWS ([`rfc7515, section 7.1`]) split into its parts,
/// with header and payload decoded.
///
/// Warning: nothing is verified. The header is attacker controlled input
/// until the signature has been checked with a trusted key.
///
/// [`rfc7515, section 7.1`]: https://datatracker.ietf.org/doc/html/rfc7515#section-7.1
pub struct DecodedJWSCompact {
    header: Map<String, Value>,
    payload: Payload,
    signature: String,
}

impl DecodedJWSCompact {
    /// Decode the given compact JWS.
    ///
    /// Fails if the JWS does not consist of exactly three segments,
    /// or if the first segment is not a base64url encoded JSON object.
    ///
    /// A payload which is not JSON is kept as text,
    /// a payload which is not even base64url is kept as the raw segment.
    pub fn decode(jws: &str) -> Result<Self, MalformedHeader> {
        let mut segments = jws.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(MalformedHeader(OpaqueError::from_display(
                "compact JWS must consist of three segments",
            )));
        };

        let header = decode_segment(header)
            .and_then(|text| serde_json::from_str::<Value>(&text).context("parse header as JSON"))
            .and_then(|value| match value {
                Value::Object(header) => Ok(header),
                _ => Err(OpaqueError::from_display("header must be a JSON object")),
            })
            .map_err(MalformedHeader)?;

        let payload = match decode_segment(payload) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => Payload::Json(value),
                Err(_) => Payload::Text(text),
            },
            Err(_) => Payload::Text(payload.to_owned()),
        };

        Ok(Self {
            header,
            payload,
            signature: signature.to_owned(),
        })
    }

    /// Reference to the (unprotected by anything yet) JOSE header.
    #[must_use]
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// Reference to the decoded payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The signature segment, still base64url encoded.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The "alg" header parameter, if present.
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// The "kid" header parameter, if present.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }

    /// The "jku" header parameter, if present and not empty.
    ///
    /// This is a URI chosen by the signer. It must never be fetched
    /// unless the caller trusts that exact URI for other reasons.
    #[must_use]
    pub fn jku(&self) -> Option<&Value> {
        self.header.get("jku").filter(|v| is_truthy(v))
    }

    /// The "jwk" header parameter (a key embedded by the signer), if present and not empty.
    ///
    /// Returned as raw JSON: it may or may not be a valid [`JWK`](super::JWK).
    #[must_use]
    pub fn embedded_jwk(&self) -> Option<&Value> {
        self.header.get("jwk").filter(|v| is_truthy(v))
    }
}

fn decode_segment(segment: &str) -> Result<String, OpaqueError> {
    let bytes = BASE64_URL_SAFE_LENIENT
        .decode(segment)
        .context("base64url decode segment")?;
    String::from_utf8(bytes).context("utf-8 decode segment")
}

/// Error returned when the header of a compact JWS cannot be decoded.
pub struct MalformedHeader(OpaqueError);

impl fmt::Debug for MalformedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MalformedHeader").field(&self.0).finish()
    }
}

impl fmt::Display for MalformedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed JWS header: {}", self.0)
    }
}

impl std::error::Error for MalformedHeader {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::BASE64_URL_SAFE_NO_PAD;
    use serde_json::json;

    fn compact(header: &Value, payload: &[u8]) -> String {
        format!(
            "{}.{}.c2lnbmF0dXJl",
            BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
            BASE64_URL_SAFE_NO_PAD.encode(payload),
        )
    }

    #[test]
    fn decode_header_and_json_payload() {
        let jws = compact(
            &json!({"alg": "ES256", "kid": "k1", "jku": "https://example.com/jwks"}),
            br#"{"sub":"alice"}"#,
        );
        let decoded = DecodedJWSCompact::decode(&jws).unwrap();
        assert_eq!(decoded.alg(), Some("ES256"));
        assert_eq!(decoded.kid(), Some("k1"));
        assert_eq!(decoded.jku(), Some(&json!("https://example.com/jwks")));
        assert!(decoded.embedded_jwk().is_none());
        assert_eq!(decoded.payload().as_json(), Some(&json!({"sub": "alice"})));
        assert_eq!(decoded.signature(), "c2lnbmF0dXJl");
    }

    #[test]
    fn decode_text_payload() {
        let jws = compact(&json!({"alg": "HS256"}), b"hello, world");
        let decoded = DecodedJWSCompact::decode(&jws).unwrap();
        assert_eq!(decoded.payload().as_text(), Some("hello, world"));
        assert!(decoded.kid().is_none());
    }

    #[test]
    fn decode_payload_which_is_not_base64() {
        let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let decoded = DecodedJWSCompact::decode(&format!("{header}.%%%.")).unwrap();
        assert_eq!(decoded.payload(), &Payload::Text("%%%".to_owned()));
        assert_eq!(decoded.signature(), "");
    }

    #[test]
    fn decode_padded_segments() {
        let header = base64::prelude::BASE64_URL_SAFE.encode(br#"{"kid":"a"}"#);
        assert!(header.ends_with('='));
        let decoded = DecodedJWSCompact::decode(&format!("{header}.e30.sig")).unwrap();
        assert_eq!(decoded.kid(), Some("a"));
        assert_eq!(decoded.payload().as_json(), Some(&json!({})));
    }

    #[test]
    fn embedded_jwk_must_be_truthy() {
        let key = json!({"kty": "EC", "kid": "k1", "x": "x", "y": "y", "crv": "P-256"});
        let jws = compact(&json!({"kid": "k1", "jwk": key}), b"");
        let decoded = DecodedJWSCompact::decode(&jws).unwrap();
        assert_eq!(decoded.embedded_jwk(), Some(&key));

        let jws = compact(&json!({"jwk": null, "jku": ""}), b"");
        let decoded = DecodedJWSCompact::decode(&jws).unwrap();
        assert!(decoded.embedded_jwk().is_none());
        assert!(decoded.jku().is_none());
    }

    #[test]
    fn malformed_headers() {
        let not_json = BASE64_URL_SAFE_NO_PAD.encode(b"{not json");
        let not_object = BASE64_URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        let not_utf8 = BASE64_URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        for jws in [
            format!("{not_json}.e30.sig"),
            format!("{not_object}.e30.sig"),
            format!("{not_utf8}.e30.sig"),
            "!!!.e30.sig".to_owned(),
            "e30.e30".to_owned(),
            "e30.e30.sig.extra".to_owned(),
            String::new(),
        ] {
            let err = DecodedJWSCompact::decode(&jws).unwrap_err();
            assert!(
                err.to_string().starts_with("malformed JWS header: "),
                "{jws}: {err}"
            );
        }
    }
}
