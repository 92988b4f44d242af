use base64::Engine as _;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use bytes::Bytes;
use http::Uri;
use keyward_core::JwksFetcher;
use keyward_core::error::OpaqueError;
use keyward_crypto::jose::{JWK, JWKSet};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn ec_key(kid: &str, x: &str) -> JWK {
    json!({
        "kty": "EC",
        "crv": "P-256",
        "kid": kid,
        "x": x,
        "y": "y77t-RvAHRKTsSGdIYUfweuOvwrvDD-Q3Hv5J0fSKbE",
    })
    .try_into()
    .unwrap()
}

pub(crate) fn jwks(kids: &[&str]) -> JWKSet {
    JWKSet::new(kids.iter().map(|kid| ec_key(kid, "x")).collect()).unwrap()
}

pub(crate) fn jwks_body(keys: &[&JWK]) -> Bytes {
    let keys: Vec<Value> = keys.iter().map(|key| Value::from((*key).clone())).collect();
    Bytes::from(serde_json::to_vec(&json!({ "keys": keys })).unwrap())
}

/// Compact JWS with the given header, a JSON payload and a dummy signature.
pub(crate) fn jws(header: &Value) -> String {
    format!(
        "{}.{}.c2ln",
        BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
        BASE64_URL_SAFE_NO_PAD.encode(br#"{"iss":"https://issuer.example"}"#),
    )
}

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Body(Bytes),
    Fail,
    Hang,
}

/// [`JwksFetcher`] always giving the same [`Reply`],
/// recording every uri it was asked for.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedFetcher {
    reply: Reply,
    calls: Arc<AtomicUsize>,
    uris: Arc<Mutex<Vec<Uri>>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
            uris: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn uris(&self) -> Vec<Uri> {
        self.uris.lock().clone()
    }
}

impl JwksFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        uri: &Uri,
        _timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, OpaqueError>> + Send + '_ {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uris.lock().push(uri.clone());
        let reply = self.reply.clone();
        async move {
            match reply {
                Reply::Body(body) => Ok(body),
                Reply::Fail => Err(OpaqueError::from_display("connection refused")),
                Reply::Hang => std::future::pending().await,
            }
        }
    }
}
