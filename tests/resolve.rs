use base64::Engine as _;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use bytes::Bytes;
use keyward::core::error::OpaqueError;
use keyward::core::time::ManualClock;
use keyward::{
    JWK, JwksCache, JwksCacheConfig, JwksFetcher as _, KeyResolver, ResolutionHint,
    ResolveErrorKind, ResolveOptions, fetcher_fn,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing_test::traced_test;

const JWKS_URI: &str = "https://auth.example.com/.well-known/jwks.json";

fn rsa_key(kid: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": format!("modulus-of-{kid}"),
        "e": "AQAB",
    })
}

fn jws(header: &Value) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
        BASE64_URL_SAFE_NO_PAD.encode(br#"{"sub":"1234567890","name":"John Doe"}"#),
    )
}

/// A key set server which can be taken offline, counting the requests it receives.
#[derive(Clone, Default)]
struct KeySetServer {
    requests: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl KeySetServer {
    fn resolver(&self, cache: Arc<JwksCache>) -> KeyResolver {
        let server = self.clone();
        KeyResolver::new(
            fetcher_fn(move |uri: http::Uri, _timeout: Duration| {
                let server = server.clone();
                async move {
                    server.requests.fetch_add(1, Ordering::SeqCst);
                    if server.offline.load(Ordering::SeqCst) {
                        return Err(OpaqueError::from_display("connection refused"));
                    }
                    assert_eq!(uri.scheme_str(), Some("https"));
                    let body = json!({"keys": [rsa_key("2024-01"), rsa_key("2024-07")]});
                    Ok(Bytes::from(serde_json::to_vec(&body).unwrap()))
                }
            })
            .boxed(),
        )
        .with_cache(cache)
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn resolve_against_trusted_jwks_uri() {
    let server = KeySetServer::default();
    let clock = ManualClock::new(1_700_000_000);
    let cache = Arc::new(JwksCache::new().with_clock(clock.clone()));
    let resolver = server.resolver(cache.clone());
    let hint = ResolutionHint::try_from(json!(JWKS_URI)).unwrap();
    let jws = jws(&json!({"alg": "RS256", "kid": "2024-07"}));

    let key = resolver
        .resolve(&jws, &hint, ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(key, JWK::try_from(rsa_key("2024-07")).unwrap());
    assert_eq!(server.requests(), 1);
    assert_eq!(cache.len(), 1);

    // a day later (minus a second) the server is gone, the cached set still answers
    clock.advance(Duration::from_secs(24 * 60 * 60 - 1));
    server.go_offline();
    let key = resolver
        .resolve(&jws, &hint, ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(key.kid(), Some("2024-07"));
    assert_eq!(server.requests(), 2);

    // past the failure window it no longer does
    clock.advance(Duration::from_secs(1));
    let err = resolver
        .resolve(&jws, &hint, ResolveOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::KeyFetchFailed);
    assert!(cache.is_empty());
}

#[tokio::test]
#[traced_test]
async fn signer_cannot_pick_its_own_key_source() {
    let server = KeySetServer::default();
    let resolver = server.resolver(Arc::new(JwksCache::new()));

    let forged = rsa_key("2024-07");
    let header = json!({
        "alg": "RS256",
        "kid": "2024-07",
        "jku": "https://attacker.example/jwks.json",
    });
    let err = resolver
        .resolve(&jws(&header), &ResolutionHint::Untrusted, ResolveOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::NoTrustedKey);
    assert_eq!(server.requests(), 0);
    assert!(logs_contain("ignoring jku header"));

    // an embedded key is only accepted when it is exactly the published one
    let mut tampered = forged.clone();
    tampered["n"] = json!("modulus-of-attacker");
    let header = json!({"alg": "RS256", "kid": "2024-07", "jwk": tampered});
    let err = resolver
        .resolve(
            &jws(&header),
            &ResolutionHint::trusted_uri(JWKS_URI).unwrap(),
            ResolveOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::KeyMismatch);

    let header = json!({"alg": "RS256", "kid": "2024-07", "jwk": forged});
    let key = resolver
        .resolve(
            &jws(&header),
            &ResolutionHint::trusted_uri(JWKS_URI).unwrap(),
            ResolveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(key.get("n"), Some(&json!("modulus-of-2024-07")));
}

#[tokio::test]
async fn resolve_from_static_hints() {
    let resolver = KeySetServer::default().resolver(Arc::new(JwksCache::new()));
    let jws = jws(&json!({"alg": "RS256", "kid": "2024-01"}));

    let set = ResolutionHint::try_from(json!({"keys": [rsa_key("2024-01"), rsa_key("2024-07")]}))
        .unwrap();
    let key = resolver
        .resolve(&jws, &set, ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(key.kid(), Some("2024-01"));

    let single = ResolutionHint::try_from(rsa_key("2024-01")).unwrap();
    let key = resolver
        .resolve(&jws, &single, ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(key.kid(), Some("2024-01"));

    let err = ResolutionHint::try_from(json!(true)).unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::InvalidHint);
}

#[test]
fn cache_config_from_json() {
    let config: JwksCacheConfig = serde_json::from_value(json!({
        "stale_timeout_seconds": 300,
        "max_cache_bytes": 1_000_000,
    }))
    .unwrap();
    assert_eq!(config.stale_timeout_seconds(), 300);
    assert_eq!(config.failure_timeout_seconds(), 86_400);
    assert_eq!(config.max_cache_bytes(), 1_000_000);

    let cache = JwksCache::new_with_config(config);
    assert_eq!(cache.config(), &config);
    assert!(cache.is_empty());
}
