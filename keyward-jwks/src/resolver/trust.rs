use super::{ResolveError, ResolveErrorKind};
use keyward_core::telemetry::tracing;
use keyward_crypto::jose::JWK;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Accept the candidate key selected from a trusted source, if it agrees with the JWS header.
///
/// - no candidate: [`NoTrustedKey`];
/// - the header embeds a `jwk` which is not exactly the candidate: [`KeyMismatch`];
/// - otherwise the candidate is the key to verify the JWS with.
///
/// The embedded key is compared attribute by attribute, in any order.
/// An embedded value which is not a valid JWK never matches.
///
/// [`NoTrustedKey`]: ResolveErrorKind::NoTrustedKey
/// [`KeyMismatch`]: ResolveErrorKind::KeyMismatch
pub fn check_jwk_matches_header(
    candidate: Option<JWK>,
    embedded: Option<&Value>,
) -> Result<JWK, ResolveError> {
    let Some(candidate) = candidate else {
        return Err(ResolveError::new(ResolveErrorKind::NoTrustedKey));
    };
    match embedded {
        Some(embedded) if !candidate.matches_value(embedded) => {
            tracing::debug!(
                kid = candidate.kid(),
                "JWK embedded in JWS header differs from trusted key"
            );
            Err(ResolveError::new(ResolveErrorKind::KeyMismatch))
        }
        _ => Ok(candidate),
    }
}

type Outcome = Result<JWK, ResolveError>;

/// One-shot latch delivering the outcome of a single resolution.
///
/// Shared between the caller (answering from the cache) and the fetch task.
/// Only the first outcome settled is delivered, later ones are dropped.
#[derive(Clone)]
pub(super) struct Latch {
    tx: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl Latch {
    pub(super) fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Settle the latch, returns false if it was already settled
    /// (or the caller is no longer waiting).
    pub(super) fn settle(&self, outcome: Outcome) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            tracing::trace!("resolution already settled: dropping outcome");
            return false;
        };
        tx.send(outcome).is_ok()
    }

    pub(super) fn is_settled(&self) -> bool {
        self.tx.lock().is_none()
    }
}
