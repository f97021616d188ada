//! Session token mint and verify.
//!
//! A token is an Ed25519-signed claims blob: base64url(claims JSON), a dot,
//! base64url(signature over the encoded claims). The claims carry the identity
//! id and the token version captured at mint time; nothing is stored server
//! side. Advancing the identity's version kills every older token at once,
//! which is the single-active-session guarantee.

use crate::error::{AppError, AppResult};
use crate::store::{Store, User};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub sub: String,
    /// Token version at mint time.
    pub ver: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token expired at {0}")]
    Expired(i64),
}

/// The explicit freshness check: a token is current only while its embedded
/// version equals the identity's live version.
pub fn session_current(embedded: i64, live: i64) -> bool {
    embedded == live
}

pub struct TokenSigner {
    key: SigningKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(seed: [u8; 32], ttl_days: i64) -> Self {
        Self { key: SigningKey::from_bytes(&seed), ttl: Duration::days(ttl_days) }
    }

    /// Fresh random key; every token dies with the process.
    pub fn ephemeral(ttl_days: i64) -> anyhow::Result<Self> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(Self::new(seed, ttl_days))
    }

    /// Mint a token for the identity as it stands now. No side effects: the
    /// login flow bumps the version first and mints against the new value.
    pub fn mint(&self, user: &User) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            ver: user.token_version,
            iat: now,
            exp: now + self.ttl.num_seconds(),
        };
        self.mint_claims(&claims)
    }

    fn mint_claims(&self, claims: &Claims) -> String {
        // Claims are a closed struct; serialization cannot fail.
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
        let sig = self.key.sign(payload.as_bytes());
        format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(sig.to_bytes()))
    }

    /// Decode and check signature, then expiry. Pure with respect to the
    /// store; identity and version checks happen in [`TokenSigner::verify`].
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let (payload, sig_part) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| TokenError::Malformed)?;
        let sig = Signature::from_slice(&sig_bytes).map_err(|_| TokenError::Malformed)?;
        self.key
            .verifying_key()
            .verify(payload.as_bytes(), &sig)
            .map_err(|_| TokenError::BadSignature)?;
        let claims_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Malformed)?;
        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Expired(claims.exp));
        }
        Ok(claims)
    }

    /// Full verification: signature and expiry, then identity lookup, then the
    /// version comparison. Returns the live identity record on success.
    pub fn verify(&self, token: &str, store: &Store) -> AppResult<User> {
        let claims = self.decode(token).map_err(|e| match e {
            TokenError::Expired(_) => AppError::unauthenticated("token_expired", "Not authorized, token expired"),
            TokenError::Malformed | TokenError::BadSignature => {
                AppError::unauthenticated("token_invalid", "Not authorized")
            }
        })?;
        let user = store
            .find_user_by_id(&claims.sub)?
            .ok_or_else(|| AppError::unauthenticated("identity_not_found", "User not found"))?;
        if !session_current(claims.ver, user.token_version) {
            return Err(AppError::session_superseded());
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewUser, Role};

    fn signer() -> TokenSigner {
        TokenSigner::new([42u8; 32], 30)
    }

    fn seeded_user(store: &Store) -> User {
        store
            .create_user(NewUser::new("A", "a@x.com", "h", Role::Employee))
            .unwrap()
    }

    #[test]
    fn mint_then_verify_returns_live_identity() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let token = signer().mint(&user);
        let verified = signer().verify(&token, &store).unwrap();
        assert_eq!(verified.id, user.id);
    }

    #[test]
    fn mint_alone_has_no_side_effects() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let s = signer();
        let t1 = s.mint(&user);
        let t2 = s.mint(&user);
        assert!(s.verify(&t1, &store).is_ok());
        assert!(s.verify(&t2, &store).is_ok());
    }

    #[test]
    fn verify_is_idempotent_without_state_change() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let s = signer();
        let token = s.mint(&user);
        let a = s.verify(&token, &store).unwrap();
        let b = s.verify(&token, &store).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.token_version, b.token_version);
    }

    #[test]
    fn tampered_token_is_invalid() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let s = signer();
        let token = s.mint(&user);
        let mut forged = token.clone();
        forged.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
        let err = s.verify(&forged, &store).unwrap_err();
        assert_eq!(err.code_str(), "token_invalid");
        assert!(matches!(s.decode("no-dot-here"), Err(TokenError::Malformed)));
    }

    #[test]
    fn foreign_key_signature_is_rejected() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let token = TokenSigner::new([9u8; 32], 30).mint(&user);
        let err = signer().verify(&token, &store).unwrap_err();
        assert_eq!(err.code_str(), "token_invalid");
    }

    #[test]
    fn expired_token_is_reported_before_identity_lookup() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let s = TokenSigner::new([42u8; 32], 30);
        let now = Utc::now().timestamp();
        let claims = Claims { sub: user.id.clone(), ver: user.token_version, iat: now - 120, exp: now - 60 };
        let token = s.mint_claims(&claims);
        let err = s.verify(&token, &store).unwrap_err();
        assert_eq!(err.code_str(), "token_expired");
    }

    #[test]
    fn version_bump_supersedes_older_token() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let s = signer();
        let old = s.mint(&user);
        store.bump_token_version(&user.id).unwrap();
        let err = s.verify(&old, &store).unwrap_err();
        assert_eq!(err.code_str(), "session_superseded");
    }

    #[test]
    fn deleted_identity_fails_with_identity_not_found() {
        let store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let s = signer();
        let token = s.mint(&user);
        store.delete_user(&user.id).unwrap();
        let err = s.verify(&token, &store).unwrap_err();
        assert_eq!(err.code_str(), "identity_not_found");
    }

    #[test]
    fn session_current_is_plain_equality() {
        assert!(session_current(0, 0));
        assert!(session_current(7, 7));
        assert!(!session_current(1, 2));
        assert!(!session_current(2, 1));
    }
}
