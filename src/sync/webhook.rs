//! Webhook intake: signature verification and event classification.
//!
//! The signature is an HMAC-SHA256 over the raw body, hex encoded with a
//! `sha256=` prefix, in `X-Webhook-Signature` (normalized by a fronting
//! proxy) or `X-Hub-Signature-256`.  With no secret configured the check is
//! skipped.

use std::fmt;

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    MissingSignature,
    MalformedSignature(String),
    SignatureMismatch,
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "missing webhook signature header"),
            Self::MalformedSignature(reason) => write!(f, "malformed webhook signature: {reason}"),
            Self::SignatureMismatch => write!(f, "HMAC signature mismatch"),
        }
    }
}

impl std::error::Error for WebhookError {}

/// What to do with an authenticated delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDecision {
    /// Delivery test; acknowledge only.
    Ping,
    /// The tracked ref moved.
    Refresh { git_ref: String },
    Ignored { reason: String },
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

/// Verify the body signature against `secret`.  `None` disables the check.
pub fn verify_signature(
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), WebhookError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let sig_header = headers
        .get("X-Webhook-Signature")
        .or_else(|| headers.get("X-Hub-Signature-256"))
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let sig_hex = sig_header
        .strip_prefix("sha256=")
        .ok_or_else(|| WebhookError::MalformedSignature("expected sha256= prefix".into()))?;

    let sig_bytes =
        hex::decode(sig_hex).map_err(|e| WebhookError::MalformedSignature(e.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::MalformedSignature(e.to_string()))?;
    mac.update(body);

    // Constant-time comparison.
    mac.verify_slice(&sig_bytes)
        .map_err(|_| WebhookError::SignatureMismatch)
}

/// Decide what an authenticated delivery means for `tracked_ref`.
pub fn classify(headers: &HeaderMap, body: &[u8], tracked_ref: &str) -> WebhookDecision {
    let event = headers
        .get("X-Webhook-Event")
        .or_else(|| headers.get("X-GitHub-Event"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("push");

    match event {
        "ping" => WebhookDecision::Ping,
        "push" => {
            let payload: PushPayload = match serde_json::from_slice(body) {
                Ok(p) => p,
                Err(e) => {
                    return WebhookDecision::Ignored {
                        reason: format!("unparseable payload: {e}"),
                    }
                }
            };
            match payload.git_ref {
                Some(r) if ref_matches(&r, tracked_ref) => WebhookDecision::Refresh { git_ref: r },
                Some(r) => WebhookDecision::Ignored {
                    reason: format!("ref {r} is not tracked"),
                },
                None => WebhookDecision::Ignored {
                    reason: "payload names no ref".to_string(),
                },
            }
        }
        other => WebhookDecision::Ignored {
            reason: format!("event {other} is not handled"),
        },
    }
}

fn ref_matches(named: &str, tracked: &str) -> bool {
    named == tracked
        || named.strip_prefix("refs/heads/") == Some(tracked)
        || named.strip_prefix("refs/tags/") == Some(tracked)
}

/// `sha256=<hex>` signature for `body`, as a sender would compute it.
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
