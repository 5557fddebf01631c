//! Token codec.
//!
//! Three kinds of credential come out of here:
//! - access tokens: HS256 JWTs carrying `{sub, role, email}`, verified statelessly
//! - refresh tokens: HS256 JWTs carrying `{sub, tokenId}`, signed with a separate
//!   secret; only `tokenId` is ever persisted
//! - one-time tokens: 32 random bytes, hex encoded, persisted only as a SHA-256 digest

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, RefreshTokenClaims, User, UserId},
};

/// Length of a raw one-time token in bytes (before hex encoding)
pub const ONE_TIME_TOKEN_BYTES: usize = 32;

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Lifetime of refresh tokens, also used as the ledger record TTL
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Generate JWT access token
    pub fn issue_access_token(&self, user: &User) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user.id,
            role: user.role,
            email: user.email.clone(),
            jti: Uuid::new_v4(),
            exp: (now + self.access_ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
    }

    /// Verify signature and expiry of an access token. No store lookup.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Fresh refresh-token identifier. Random, not derived from any secret.
    pub fn new_token_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate JWT refresh token embedding `token_id`
    pub fn issue_refresh_token(&self, user_id: UserId, token_id: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = RefreshTokenClaims {
            sub: user_id,
            token_id: token_id.to_string(),
            exp: (now + self.refresh_ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.refresh_encoding)?)
    }

    /// Verify signature and expiry of a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Generate a raw one-time token for verify/reset links.
pub fn generate_one_time_token() -> String {
    let bytes: [u8; ONE_TIME_TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// One-way digest under which a one-time token is stored.
pub fn digest_one_time_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
