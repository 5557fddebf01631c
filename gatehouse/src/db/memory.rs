//! In-memory store implementing every repository trait.
//!
//! Used by tests and by the server's `--memory` mode. All state sits behind
//! one async mutex, so each trait call is atomic with respect to the others.

use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ContentRepository, StoreHealth, TokenRepository, UserRepository};
use crate::auth::{
    AuthError, AuthResult, Credentials, NewTokenRecord, NewUser, Role, TokenKey, TokenKind,
    TokenRecord, User, UserId,
};
use crate::content::{
    Content, ContentAuthor, ContentId, ContentPatch, ContentResult, ContentView, NewContent,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, (User, String)>,
    tokens: Vec<TokenRecord>,
    content: HashMap<ContentId, Content>,
}

impl State {
    fn email_in_use(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|(user, _)| user.email == email && Some(user.id) != except)
    }

    fn modify_user(&mut self, user_id: UserId, change: impl FnOnce(&mut User)) -> Option<User> {
        self.users.get_mut(&user_id).map(|(user, _)| {
            change(user);
            user.updated_at = Utc::now();
            user.clone()
        })
    }
}

fn keys_match(stored: &TokenKey, wanted: &TokenKey) -> bool {
    match (stored, wanted) {
        (TokenKey::Id(a), TokenKey::Id(b)) => a == b,
        (TokenKey::Hash(a), TokenKey::Hash(b)) => a.as_bytes().ct_eq(b.as_bytes()).into(),
        _ => false,
    }
}

/// Shared in-memory backing store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger records, in any state
    pub async fn token_count(&self) -> usize {
        self.state.lock().await.tokens.len()
    }

    async fn modify_user(
        &self,
        user_id: UserId,
        change: impl FnOnce(&mut User) + Send,
    ) -> Option<User> {
        self.state.lock().await.modify_user(user_id, change)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> AuthResult<User> {
        let mut state = self.state.lock().await;
        if state.email_in_use(&new_user.email, None) {
            return Err(AuthError::EmailTaken);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            role: Role::default(),
            email_verified: false,
            last_login_at: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        state
            .users
            .insert(user.id, (user.clone(), new_user.password_hash));
        Ok(user)
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|(user, _)| user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(user, _)| user.email == email)
            .map(|(user, _)| user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> AuthResult<Option<Credentials>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(user, _)| user.email == email)
            .map(|(user, hash)| Credentials {
                user: user.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn list_users(&self) -> AuthResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().map(|(u, _)| u.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn set_email_verified(&self, user_id: UserId, verified: bool) -> AuthResult<()> {
        self.modify_user(user_id, |u| u.email_verified = verified)
            .await;
        Ok(())
    }

    async fn update_last_login(&self, user_id: UserId) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some((user, _)) = state.users.get_mut(&user_id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some((user, hash)) = state.users.get_mut(&user_id) {
            *hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_name(&self, user_id: UserId, name: &str) -> AuthResult<Option<User>> {
        let name = name.to_string();
        Ok(self.modify_user(user_id, move |u| u.name = name).await)
    }

    async fn update_email(&self, user_id: UserId, email: &str) -> AuthResult<Option<User>> {
        let mut state = self.state.lock().await;
        if state.email_in_use(email, Some(user_id)) {
            return Err(AuthError::EmailTaken);
        }
        Ok(state.modify_user(user_id, |u| {
            u.email = email.to_string();
            u.email_verified = false;
        }))
    }

    async fn update_role(&self, user_id: UserId, role: Role) -> AuthResult<Option<User>> {
        Ok(self.modify_user(user_id, |u| u.role = role).await)
    }

    async fn soft_delete_user(&self, user_id: UserId) -> AuthResult<Option<User>> {
        Ok(self.modify_user(user_id, |u| u.is_deleted = true).await)
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn insert_token(&self, token: NewTokenRecord) -> AuthResult<TokenRecord> {
        let record = TokenRecord {
            id: Uuid::new_v4(),
            key: token.key,
            user_id: token.user_id,
            kind: token.kind,
            expires_at: token.expires_at,
            revoked: false,
            used: false,
            created_at: Utc::now(),
        };
        self.state.lock().await.tokens.push(record.clone());
        Ok(record)
    }

    async fn find_token(
        &self,
        kind: TokenKind,
        owner: Option<UserId>,
        key: &TokenKey,
    ) -> AuthResult<Option<TokenRecord>> {
        let state = self.state.lock().await;
        // Insertion order doubles as creation order.
        Ok(state
            .tokens
            .iter()
            .rev()
            .find(|t| {
                t.kind == kind
                    && owner.is_none_or(|owner| t.user_id == owner)
                    && keys_match(&t.key, key)
            })
            .cloned())
    }

    async fn mark_token_used(&self, token_id: Uuid) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.tokens.iter_mut().find(|t| t.id == token_id) {
            Some(t) if !t.used && !t.revoked => {
                t.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_token(&self, token_id: Uuid) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.tokens.iter_mut().find(|t| t.id == token_id) {
            Some(t) if !t.revoked => {
                t.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_user_tokens(&self, owner: UserId, kind: Option<TokenKind>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut changed = 0;
        for t in state.tokens.iter_mut().filter(|t| {
            t.user_id == owner && !t.revoked && kind.is_none_or(|kind| t.kind == kind)
        }) {
            t.revoked = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn insert_content(&self, content: NewContent) -> ContentResult<Content> {
        let now = Utc::now();
        let item = Content {
            id: Uuid::new_v4(),
            title: content.title,
            body: content.body,
            author_id: content.author_id,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.content.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_content(&self, content_id: ContentId) -> ContentResult<Option<Content>> {
        Ok(self.state.lock().await.content.get(&content_id).cloned())
    }

    async fn list_active_content(&self) -> ContentResult<Vec<ContentView>> {
        let state = self.state.lock().await;
        let mut items: Vec<ContentView> = state
            .content
            .values()
            .filter(|c| !c.is_deleted)
            .filter_map(|c| {
                let (author, _) = state.users.get(&c.author_id)?;
                Some(ContentView {
                    id: c.id,
                    title: c.title.clone(),
                    body: c.body.clone(),
                    author: ContentAuthor {
                        id: author.id,
                        name: author.name.clone(),
                        email: author.email.clone(),
                        role: author.role,
                    },
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                })
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn update_content(
        &self,
        content_id: ContentId,
        patch: ContentPatch,
    ) -> ContentResult<Option<Content>> {
        let mut state = self.state.lock().await;
        Ok(state
            .content
            .get_mut(&content_id)
            .filter(|c| !c.is_deleted)
            .map(|c| {
                if let Some(title) = patch.title {
                    c.title = title;
                }
                if let Some(body) = patch.body {
                    c.body = body;
                }
                c.updated_at = Utc::now();
                c.clone()
            }))
    }

    async fn soft_delete_content(&self, content_id: ContentId) -> ContentResult<bool> {
        let mut state = self.state.lock().await;
        match state.content.get_mut(&content_id) {
            Some(c) if !c.is_deleted => {
                c.is_deleted = true;
                c.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn health_check(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();

        let result = store.create_user(new_user("a@example.com")).await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_email_change_clears_verification() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        store.set_email_verified(user.id, true).await.unwrap();

        let updated = store
            .update_email(user.id, "b@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.email, "b@example.com");
        assert!(!updated.email_verified);
    }

    #[tokio::test]
    async fn test_email_change_conflict() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("a@example.com")).await.unwrap();
        store.create_user(new_user("b@example.com")).await.unwrap();

        let result = store.update_email(a.id, "b@example.com").await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));

        // Keeping your own address is not a conflict.
        assert!(store.update_email(a.id, "a@example.com").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_email_claims_have_one_winner() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..8 {
            let user = store
                .create_user(new_user(&format!("user{i}@example.com")))
                .await
                .unwrap();
            ids.push(user.id);
        }

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move { store.update_email(id, "shared@example.com").await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Some(_)) => winners += 1,
                Err(AuthError::EmailTaken) => {}
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(winners, 1);

        let holders = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .filter(|u| u.email == "shared@example.com")
            .count();
        assert_eq!(holders, 1);
    }

    #[tokio::test]
    async fn test_find_token_returns_latest() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let key = TokenKey::Hash("same".to_string());
        for _ in 0..2 {
            store
                .insert_token(NewTokenRecord {
                    key: key.clone(),
                    user_id: owner,
                    kind: TokenKind::Reset,
                    expires_at: Utc::now() + Duration::hours(1),
                })
                .await
                .unwrap();
        }
        let latest = store.state.lock().await.tokens[1].id;

        let found = store
            .find_token(TokenKind::Reset, Some(owner), &key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, latest);
        assert!(
            store
                .find_token(TokenKind::Verify, Some(owner), &key)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_content_listing_skips_deleted() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("a@example.com")).await.unwrap();
        let first = store
            .insert_content(NewContent {
                title: "One".to_string(),
                body: "Body".to_string(),
                author_id: author.id,
            })
            .await
            .unwrap();
        store
            .insert_content(NewContent {
                title: "Two".to_string(),
                body: "Body".to_string(),
                author_id: author.id,
            })
            .await
            .unwrap();

        assert!(store.soft_delete_content(first.id).await.unwrap());
        assert!(!store.soft_delete_content(first.id).await.unwrap());

        let listed = store.list_active_content().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Two");
        assert_eq!(listed[0].author.email, "a@example.com");

        let patched = store
            .update_content(first.id, ContentPatch::default())
            .await
            .unwrap();
        assert!(patched.is_none());
    }
}
