//! Account manager implementation.

use std::sync::Arc;

use crate::{
    auth::{
        AuthError, AuthManager, AuthResult, ProfileUpdate, Role, User, UserId,
        validation::{normalize_email, validate_name},
    },
    db::UserRepository,
};

/// Profile and user administration service.
///
/// Role checks for the administration operations happen at the HTTP
/// boundary; this type trusts its caller.
#[derive(Clone)]
pub struct AccountManager {
    users: Arc<dyn UserRepository>,
    auth: Arc<AuthManager>,
}

impl AccountManager {
    pub fn new(users: Arc<dyn UserRepository>, auth: Arc<AuthManager>) -> Self {
        Self { users, auth }
    }

    async fn require_user(&self, user_id: UserId) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// The caller's own user view
    pub async fn profile(&self, user_id: UserId) -> AuthResult<User> {
        self.require_user(user_id).await
    }

    /// Update the caller's name and/or email.
    ///
    /// An email change clears the verified flag, supersedes outstanding
    /// verification links and mails a new one to the new address.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Malformed name or email
    /// * `AuthError::EmailTaken` - Another user holds the new email
    /// * `AuthError::UserNotFound` - The caller no longer exists
    pub async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> AuthResult<User> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let email = update.email.as_deref().map(normalize_email).transpose()?;

        let mut user = self.require_user(user_id).await?;

        // Email first: it is the only write that can conflict.
        let email_changed = match email.filter(|email| *email != user.email) {
            Some(email) => {
                user = self
                    .users
                    .update_email(user_id, &email)
                    .await?
                    .ok_or(AuthError::UserNotFound)?;
                true
            }
            None => false,
        };

        if let Some(name) = name {
            user = self
                .users
                .update_name(user_id, &name)
                .await?
                .ok_or(AuthError::UserNotFound)?;
        }

        if email_changed {
            log::info!("User {} changed email, verification reset", user_id);
            self.auth.start_email_verification(&user, true).await?;
        }

        Ok(user)
    }

    /// All users, soft-deleted included
    pub async fn list_users(&self) -> AuthResult<Vec<User>> {
        self.users.list_users().await
    }

    pub async fn get_user(&self, user_id: UserId) -> AuthResult<User> {
        self.require_user(user_id).await
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - `role` is not one of the known roles
    /// * `AuthError::UserNotFound` - No such user
    pub async fn update_role(&self, user_id: UserId, role: &str) -> AuthResult<User> {
        let role: Role = role.parse()?;
        let user = self
            .users
            .update_role(user_id, role)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        log::info!("User {} is now {}", user_id, role);
        Ok(user)
    }

    /// Soft-delete a user and revoke every ledger record they own.
    pub async fn deactivate(&self, user_id: UserId) -> AuthResult<User> {
        let user = self
            .users
            .soft_delete_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let revoked = self.auth.ledger().revoke_all(user_id, None).await?;

        log::info!("Deactivated user {}, {} token(s) revoked", user_id, revoked);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AuthConfig, RegisterRequest, TokenKind},
        db::MemoryStore,
        mail::{RecordingMailer, templates::extract_token},
    };

    async fn setup() -> (AccountManager, Arc<AuthManager>, Arc<RecordingMailer>, User) {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let config = AuthConfig::new(
            "access-secret-access-secret-access",
            "refresh-secret-refresh-secret-refresh",
            "pepper-pepper-pepper",
            "http://localhost:4000",
        )
        .with_hash_cost(1024, 1);
        let auth = Arc::new(
            AuthManager::new(store.clone(), store.clone(), mailer.clone(), config).unwrap(),
        );
        let user = auth
            .register(RegisterRequest {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        (AccountManager::new(store, auth.clone()), auth, mailer, user)
    }

    #[tokio::test]
    async fn test_profile_name_update() {
        let (accounts, _, _, user) = setup().await;

        let updated = accounts
            .update_profile(
                user.id,
                ProfileUpdate {
                    name: Some("  Alicia ".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_email_change_restarts_verification() {
        let (accounts, auth, mailer, user) = setup().await;
        let first = extract_token(&mailer.last_to("alice@example.com").await.unwrap()).unwrap();
        auth.verify_email(&first, "alice@example.com").await.unwrap();

        let updated = accounts
            .update_profile(
                user.id,
                ProfileUpdate {
                    name: None,
                    email: Some("Alice.New@Example.com".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "alice.new@example.com");
        assert!(!updated.email_verified);

        let mail = mailer.last_to("alice.new@example.com").await.unwrap();
        assert_eq!(mail.subject, "Verify your new email");
        let token = extract_token(&mail).unwrap();
        auth.verify_email(&token, "alice.new@example.com")
            .await
            .unwrap();
        assert!(accounts.profile(user.id).await.unwrap().email_verified);
    }

    #[tokio::test]
    async fn test_unchanged_email_keeps_verification() {
        let (accounts, _, mailer, user) = setup().await;
        let sent_before = mailer.sent().await.len();

        accounts
            .update_profile(
                user.id,
                ProfileUpdate {
                    name: None,
                    email: Some("ALICE@example.com".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(mailer.sent().await.len(), sent_before);
    }

    #[tokio::test]
    async fn test_conflicting_email_leaves_profile_untouched() {
        let (accounts, auth, _, user) = setup().await;
        auth.register(RegisterRequest {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();

        let result = accounts
            .update_profile(
                user.id,
                ProfileUpdate {
                    name: Some("Mallory".to_string()),
                    email: Some("bob@example.com".to_string()),
                },
            )
            .await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));

        let stored = accounts.profile(user.id).await.unwrap();
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_name_and_email_change_together() {
        let (accounts, _, mailer, user) = setup().await;

        let updated = accounts
            .update_profile(
                user.id,
                ProfileUpdate {
                    name: Some("Alicia".to_string()),
                    email: Some("alicia@example.com".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.email, "alicia@example.com");
        assert!(mailer.last_to("alicia@example.com").await.is_some());
    }

    #[tokio::test]
    async fn test_update_role_rejects_unknown_role() {
        let (accounts, _, _, user) = setup().await;

        let err = accounts.update_role(user.id, "superuser").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(ref m) if m == "Invalid role"));

        let updated = accounts.update_role(user.id, "Editor").await.unwrap();
        assert_eq!(updated.role, Role::Editor);
    }

    #[tokio::test]
    async fn test_deactivate_revokes_everything() {
        let (accounts, auth, _, user) = setup().await;

        let deactivated = accounts.deactivate(user.id).await.unwrap();
        assert!(deactivated.is_deleted);

        // Registration left one verify record; it must now be revoked.
        let revoked_again = auth
            .ledger()
            .revoke_all(user.id, Some(TokenKind::Verify))
            .await
            .unwrap();
        assert_eq!(revoked_again, 0);

        assert!(matches!(
            accounts.deactivate(uuid::Uuid::new_v4()).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
