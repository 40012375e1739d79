//! JWT token generation and validation
//! RS256 tokens signed with the persisted key pair from [`KeyStore`]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};

use super::key_store::{KeyStore, KeyStoreError};
use super::principal::Principal;

/// Issuer written into and required from every token
pub const ISSUER: &str = "lightpub";

/// JWT claims. The claim set is exactly `iss`, `sub` and `iat`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Issuer
    pub iss: String,

    /// Subject (trimmed user ID)
    pub sub: String,

    /// Issued at (epoch seconds)
    pub iat: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Internal rejection reasons. Logged, never returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MalformedToken,
    SignatureInvalid,
    IssuerMismatch,
    ClaimMissing,
}

impl Rejection {
    fn from_kind(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Rejection::SignatureInvalid,
            ErrorKind::InvalidIssuer => Rejection::IssuerMismatch,
            ErrorKind::MissingRequiredClaim(_) | ErrorKind::Json(_) => Rejection::ClaimMissing,
            _ => Rejection::MalformedToken,
        }
    }
}

/// Token service
pub struct TokenService {
    key_store: Arc<KeyStore>,
    validation: Validation,
}

impl TokenService {
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        // 过期策略尚未确定，见 DESIGN.md
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["iss", "sub"]);
        validation.set_issuer(&[ISSUER]);

        Self {
            key_store,
            validation,
        }
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.key_store
    }

    /// Issue a token for `user_id`
    pub async fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        let key_pair = self.key_store.get_or_create().await?;

        let claims = Claims {
            iss: ISSUER.to_string(),
            sub: user_id.to_string(),
            iat: Utc::now().timestamp().max(0) as u64,
        };

        encode(&Header::new(Algorithm::RS256), &claims, key_pair.encoding_key()).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            TokenError::Signing(e)
        })
    }

    /// Verify a token.
    ///
    /// Every cryptographic or claim failure yields `Ok(None)`; only key store
    /// failures are errors.
    pub async fn verify(&self, token: &str) -> Result<Option<Principal>, KeyStoreError> {
        let key_pair = self.key_store.get_or_create().await?;

        let claims = match decode::<Claims>(token, key_pair.decoding_key(), &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                let reason = Rejection::from_kind(e.kind());
                tracing::debug!(reason = ?reason, "Token validation failed");
                return Ok(None);
            }
        };

        let issued_at = match i64::try_from(claims.iat)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        {
            Some(issued_at) => issued_at,
            None => {
                tracing::debug!(reason = ?Rejection::MalformedToken, "Token iat out of range");
                return Ok(None);
            }
        };

        Ok(Some(Principal::authenticated(claims.sub, issued_at)))
    }
}
