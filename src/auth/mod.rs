pub mod role;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::role::Role;
use crate::config;

/// Bearer-token claims. The token identifies the caller and their
/// server-side session; the effective tenant is never trusted from the
/// token alone: impersonation state lives in the session store and the
/// user's active/rotation flags are re-read from the database per request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, tenant_id: Uuid, session_id: Uuid, role: Role) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id,
            tenant_id,
            session_id,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
}

pub fn generate_jwt(claims: Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Salted digest for password comparison. Credential storage hardening (KDF
/// choice, work factors) is out of scope; this keeps plaintext out of the
/// database and comparison constant-shape.
pub fn password_digest(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_salted() {
        let a = password_digest("hunter2", "salt-1");
        assert_eq!(a, password_digest("hunter2", "salt-1"));
        assert_ne!(a, password_digest("hunter2", "salt-2"));
        assert_ne!(a, password_digest("hunter3", "salt-1"));
    }
}
