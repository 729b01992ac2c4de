//! Identity verification for HTTP and realtime entrypoints.
//!
//! Credential issuance (passwords, OTP, OAuth) belongs to the external
//! identity system; this module only consumes a bearer token and resolves it
//! to a verified [`Identity`]. The default verifier checks an HMAC-signed
//! token; tests swap in [`StaticTokenVerifier`].

pub mod error;

pub use error::AuthError;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::protocol::UserId;

type HmacSha256 = Hmac<Sha256>;

/// A verified user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

/// Validates a bearer credential and returns the user identity behind it.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Verifier for self-contained HMAC-SHA256 signed tokens.
///
/// Token layout: `base64url(user_id:username:expires_unix) . base64url(sig)`
/// where `sig = HMAC-SHA256(secret, payload)`.
pub struct SignedTokenVerifier {
    secret: Vec<u8>,
}

impl SignedTokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for an identity. Used by operator tooling and tests; the
    /// production issuer lives in the external identity service and shares
    /// the secret.
    pub fn issue(&self, identity: &Identity, ttl_secs: i64) -> String {
        let expires = Utc::now().timestamp() + ttl_secs;
        let payload = format!("{}:{}:{}", identity.user_id, identity.username, expires);
        let sig = self.sign(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(sig)
        )
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so construction cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl IdentityVerifier for SignedTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let (payload_b64, sig_b64) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(&payload);
        mac.verify_slice(&sig).map_err(|_| AuthError::InvalidToken)?;

        let payload = String::from_utf8(payload).map_err(|_| AuthError::InvalidToken)?;
        let mut parts = payload.splitn(3, ':');
        let user_id: Uuid = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(AuthError::InvalidToken)?;
        let username = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::InvalidToken)?
            .to_string();
        let expires: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(AuthError::InvalidToken)?;

        if expires < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(Identity { user_id, username })
    }
}

/// Table-backed verifier for tests and local development: token string maps
/// directly to an identity.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: DashMap<String, Identity>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, identity: Identity) {
        self.tokens.insert(token.into(), identity);
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens
            .get(token)
            .map(|entry| entry.clone())
            .ok_or(AuthError::InvalidToken)
    }
}

/// Pull a bearer token out of a WebSocket query string (`token=...`).
pub fn token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|param| param.strip_prefix("token="))
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn signed_token_round_trips() {
        let verifier = SignedTokenVerifier::new(b"test-secret".to_vec());
        let alice = identity();
        let token = verifier.issue(&alice, 3600);

        let verified = verifier.verify(&token).unwrap();
        assert_eq!(verified, alice);
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = SignedTokenVerifier::new(b"test-secret".to_vec());
        let token = verifier.issue(&identity(), -5);
        assert_eq!(verifier.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let verifier = SignedTokenVerifier::new(b"test-secret".to_vec());
        let mut token = verifier.issue(&identity(), 3600);
        token.replace_range(0..2, "zz");
        assert_eq!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn token_from_wrong_secret_is_rejected() {
        let issuer = SignedTokenVerifier::new(b"secret-a".to_vec());
        let verifier = SignedTokenVerifier::new(b"secret-b".to_vec());
        let token = issuer.issue(&identity(), 3600);
        assert_eq!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn empty_token_is_missing() {
        let verifier = SignedTokenVerifier::new(b"test-secret".to_vec());
        assert_eq!(verifier.verify(""), Err(AuthError::MissingToken));
        assert_eq!(verifier.verify("   "), Err(AuthError::MissingToken));
    }

    #[test]
    fn query_string_token_extraction() {
        assert_eq!(token_from_query("token=abc123"), Some("abc123"));
        assert_eq!(token_from_query("foo=1&token=abc&bar=2"), Some("abc"));
        assert_eq!(token_from_query("foo=1"), None);
        assert_eq!(token_from_query("token="), None);
        assert_eq!(token_from_query(""), None);
    }

    #[test]
    fn static_verifier_resolves_registered_tokens() {
        let verifier = StaticTokenVerifier::new();
        let alice = identity();
        verifier.register("tok-alice", alice.clone());

        assert_eq!(verifier.verify("tok-alice").unwrap(), alice);
        assert_eq!(verifier.verify("tok-bob"), Err(AuthError::InvalidToken));
    }
}
