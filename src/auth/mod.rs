use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id, hex-encoded ObjectId.
    pub sub: String,
    pub exp: usize,
}

/// Token verification failures. Each maps to a distinct 401 message so the
/// frontend can tell an expired session from a broken one.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Malformed,
    Unverifiable,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        let msg = match err {
            TokenError::Expired => "Not authorized, token expired",
            TokenError::Malformed => "Not authorized, invalid token",
            TokenError::Unverifiable => "Not authorized, please log in",
        };
        ApiError::Unauthenticated(msg.to_string())
    }
}

pub fn issue(account_id: ObjectId, secret: &str, expire_hours: i64) -> Result<String, ApiError> {
    let claims = Claims {
        sub: account_id.to_hex(),
        exp: (Utc::now().timestamp() + expire_hours * 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|err| {
        log::error!("token signing failed: {}", err);
        ApiError::Internal
    })
}

pub fn verify(token: &str, secret: &str) -> Result<ObjectId, TokenError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            TokenError::Malformed
        }
        _ => TokenError::Unverifiable,
    })?;

    ObjectId::parse_str(&data.claims.sub).map_err(|_| TokenError::Malformed)
}

/// Generates a password-reset token: the raw value goes into the email link,
/// only its SHA-256 hex digest is persisted.
pub fn generate_reset_token() -> (String, String) {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hashed = hash_reset_token(&raw);
    (raw, hashed)
}

pub fn hash_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issue_then_verify_round_trips() {
        let id = ObjectId::new();
        let token = issue(id, SECRET, 24).unwrap();
        assert_eq!(verify(&token, SECRET).unwrap(), id);
    }

    #[test]
    fn expired_token_is_distinguishable() {
        // Negative TTL puts exp well past the default leeway.
        let token = issue(ObjectId::new(), SECRET, -2).unwrap();
        assert_eq!(verify(&token, SECRET).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn garbage_token_is_malformed() {
        assert_eq!(
            verify("definitely-not-a-jwt", SECRET).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn wrong_secret_is_unverifiable() {
        let token = issue(ObjectId::new(), SECRET, 24).unwrap();
        assert_eq!(
            verify(&token, "other-secret").unwrap_err(),
            TokenError::Unverifiable
        );
    }

    #[test]
    fn reset_token_hash_is_deterministic_and_opaque() {
        let (raw, hashed) = generate_reset_token();
        assert_eq!(raw.len(), 40);
        assert_eq!(hashed, hash_reset_token(&raw));
        assert_ne!(raw, hashed);
    }

    #[test]
    fn distinct_reset_tokens_are_generated() {
        let (a, _) = generate_reset_token();
        let (b, _) = generate_reset_token();
        assert_ne!(a, b);
    }
}
