//! Token ledger: persisted lifecycle of refresh, verify and reset tokens.
//!
//! Access tokens never touch the ledger. Every other credential has exactly
//! one record here, and that record is the only source of truth for whether
//! the credential may still be used.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use uuid::Uuid;

use super::{
    errors::{AuthError, AuthResult},
    models::UserId,
};
use crate::db::TokenRepository;

/// Kind of ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Refresh,
    Verify,
    Reset,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Refresh => "refresh",
            TokenKind::Verify => "verify",
            TokenKind::Reset => "reset",
        }
    }

    /// Refresh records are keyed by token id; one-time records by digest.
    pub fn accepts(self, key: &TokenKey) -> bool {
        matches!(
            (self, key),
            (TokenKind::Refresh, TokenKey::Id(_))
                | (TokenKind::Verify | TokenKind::Reset, TokenKey::Hash(_))
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refresh" => Ok(TokenKind::Refresh),
            "verify" => Ok(TokenKind::Verify),
            "reset" => Ok(TokenKind::Reset),
            other => Err(format!("unknown token kind: {other}")),
        }
    }
}

/// The lookup key of a record. Exactly one is stored per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKey {
    /// Identifier embedded in a signed refresh token
    Id(String),
    /// SHA-256 digest of a one-time token
    Hash(String),
}

impl TokenKey {
    fn label(&self) -> &'static str {
        match self {
            TokenKey::Id(_) => "token id",
            TokenKey::Hash(_) => "token hash",
        }
    }
}

/// One issued credential artifact
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub id: Uuid,
    pub key: TokenKey,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// `!revoked && !used && expires_at > now`
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.used && self.expires_at > now
    }

    /// Usability against the current clock. Always re-derived, never cached.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

/// Insert payload for a ledger record
#[derive(Debug, Clone)]
pub struct NewTokenRecord {
    pub key: TokenKey,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// Ledger facade over a [`TokenRepository`]
#[derive(Clone)]
pub struct TokenLedger {
    repo: Arc<dyn TokenRepository>,
}

impl TokenLedger {
    pub fn new(repo: Arc<dyn TokenRepository>) -> Self {
        Self { repo }
    }

    /// Record a newly issued credential.
    ///
    /// # Errors
    ///
    /// * `AuthError::MismatchedTokenKey` - `key` is not the right kind of key for `kind`
    pub async fn issue(
        &self,
        kind: TokenKind,
        owner: UserId,
        key: TokenKey,
        ttl: Duration,
    ) -> AuthResult<TokenRecord> {
        if !kind.accepts(&key) {
            return Err(AuthError::MismatchedTokenKey {
                kind: kind.as_str(),
                key: key.label(),
            });
        }

        self.repo
            .insert_token(NewTokenRecord {
                key,
                user_id: owner,
                kind,
                expires_at: Utc::now() + ttl,
            })
            .await
    }

    /// Look up a record regardless of its state.
    pub async fn find(
        &self,
        kind: TokenKind,
        owner: Option<UserId>,
        key: &TokenKey,
    ) -> AuthResult<Option<TokenRecord>> {
        self.repo.find_token(kind, owner, key).await
    }

    /// Look up a record and keep it only if it is currently usable.
    pub async fn find_usable(
        &self,
        kind: TokenKind,
        owner: Option<UserId>,
        key: &TokenKey,
    ) -> AuthResult<Option<TokenRecord>> {
        Ok(self
            .find(kind, owner, key)
            .await?
            .filter(TokenRecord::is_usable))
    }

    /// Consume a one-time record. Returns `false` if it was already used or revoked.
    pub async fn mark_used(&self, record: &TokenRecord) -> AuthResult<bool> {
        self.repo.mark_token_used(record.id).await
    }

    /// Revoke one record. Returns `false` if it was already revoked.
    pub async fn revoke(&self, record: &TokenRecord) -> AuthResult<bool> {
        self.repo.revoke_token(record.id).await
    }

    /// Revoke every record of `owner`, optionally only of one kind.
    /// Returns how many records changed.
    pub async fn revoke_all(&self, owner: UserId, kind: Option<TokenKind>) -> AuthResult<u64> {
        self.repo.revoke_user_tokens(owner, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn ledger() -> TokenLedger {
        TokenLedger::new(Arc::new(MemoryStore::new()))
    }

    fn record(revoked: bool, used: bool, expires_in: Duration) -> TokenRecord {
        let now = Utc::now();
        TokenRecord {
            id: Uuid::new_v4(),
            key: TokenKey::Hash("digest".to_string()),
            user_id: Uuid::new_v4(),
            kind: TokenKind::Verify,
            expires_at: now + expires_in,
            revoked,
            used,
            created_at: now,
        }
    }

    #[test]
    fn test_usability_predicate() {
        let now = Utc::now();
        assert!(record(false, false, Duration::hours(1)).is_usable_at(now));
        assert!(!record(true, false, Duration::hours(1)).is_usable_at(now));
        assert!(!record(false, true, Duration::hours(1)).is_usable_at(now));
        assert!(!record(false, false, Duration::seconds(-1)).is_usable_at(now));
    }

    #[test]
    fn test_kind_key_pairing() {
        assert!(TokenKind::Refresh.accepts(&TokenKey::Id("a".into())));
        assert!(!TokenKind::Refresh.accepts(&TokenKey::Hash("a".into())));
        assert!(TokenKind::Verify.accepts(&TokenKey::Hash("a".into())));
        assert!(!TokenKind::Reset.accepts(&TokenKey::Id("a".into())));
    }

    #[test]
    fn test_kind_parses_from_storage_form() {
        for kind in [TokenKind::Refresh, TokenKind::Verify, TokenKind::Reset] {
            assert_eq!(kind.as_str().parse::<TokenKind>(), Ok(kind));
        }
        assert!("session".parse::<TokenKind>().is_err());
    }

    #[tokio::test]
    async fn test_issue_rejects_mismatched_key() {
        let result = ledger()
            .issue(
                TokenKind::Refresh,
                Uuid::new_v4(),
                TokenKey::Hash("digest".into()),
                Duration::days(7),
            )
            .await;

        assert!(matches!(result, Err(AuthError::MismatchedTokenKey { .. })));
    }

    #[tokio::test]
    async fn test_issue_find_and_revoke() {
        let ledger = ledger();
        let owner = Uuid::new_v4();
        let key = TokenKey::Id("tid-1".to_string());

        let record = ledger
            .issue(TokenKind::Refresh, owner, key.clone(), Duration::days(7))
            .await
            .unwrap();
        assert!(record.is_usable());

        let found = ledger
            .find_usable(TokenKind::Refresh, Some(owner), &key)
            .await
            .unwrap();
        assert_eq!(found.as_ref().map(|r| r.id), Some(record.id));

        // Owner filter applies
        let other_owner = ledger
            .find(TokenKind::Refresh, Some(Uuid::new_v4()), &key)
            .await
            .unwrap();
        assert!(other_owner.is_none());

        assert!(ledger.revoke(&record).await.unwrap());
        // Idempotent: second revoke reports no change but does not fail
        assert!(!ledger.revoke(&record).await.unwrap());

        let after = ledger
            .find_usable(TokenKind::Refresh, Some(owner), &key)
            .await
            .unwrap();
        assert!(after.is_none());

        let still_there = ledger
            .find(TokenKind::Refresh, None, &key)
            .await
            .unwrap()
            .unwrap();
        assert!(still_there.revoked);
    }

    #[tokio::test]
    async fn test_mark_used_is_single_shot() {
        let ledger = ledger();
        let owner = Uuid::new_v4();
        let key = TokenKey::Hash("digest".to_string());

        let record = ledger
            .issue(TokenKind::Reset, owner, key.clone(), Duration::hours(1))
            .await
            .unwrap();

        assert!(ledger.mark_used(&record).await.unwrap());
        assert!(!ledger.mark_used(&record).await.unwrap());
        assert!(
            ledger
                .find_usable(TokenKind::Reset, Some(owner), &key)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_revoke_all_by_kind() {
        let ledger = ledger();
        let owner = Uuid::new_v4();

        for i in 0..3 {
            ledger
                .issue(
                    TokenKind::Refresh,
                    owner,
                    TokenKey::Id(format!("tid-{i}")),
                    Duration::days(7),
                )
                .await
                .unwrap();
        }
        let verify = ledger
            .issue(
                TokenKind::Verify,
                owner,
                TokenKey::Hash("v".into()),
                Duration::hours(24),
            )
            .await
            .unwrap();

        assert_eq!(
            ledger
                .revoke_all(owner, Some(TokenKind::Refresh))
                .await
                .unwrap(),
            3
        );
        assert!(
            ledger
                .find_usable(TokenKind::Verify, Some(owner), &verify.key)
                .await
                .unwrap()
                .is_some()
        );

        assert_eq!(ledger.revoke_all(owner, None).await.unwrap(), 1);
        assert_eq!(ledger.revoke_all(owner, None).await.unwrap(), 0);
    }
}
