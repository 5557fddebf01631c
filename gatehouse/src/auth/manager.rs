//! Authentication manager implementation.

use super::{
    config::AuthConfig,
    errors::{AuthError, AuthResult},
    ledger::{TokenKey, TokenKind, TokenLedger},
    models::{
        LoginRequest, NewUser, PasswordResetConfirm, Principal, RegisterRequest, SessionTokens,
        User,
    },
    password::CredentialHasher,
    tokens::{TokenCodec, digest_one_time_token, generate_one_time_token},
    validation::{normalize_email, validate_name, validate_password},
};
use crate::{
    db::{TokenRepository, UserRepository},
    mail::{Mailer, OutgoingMail, templates},
};
use std::sync::Arc;

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    ledger: TokenLedger,
    codec: TokenCodec,
    hasher: CredentialHasher,
    mailer: Arc<dyn Mailer>,
    config: AuthConfig,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Errors
    ///
    /// * `AuthError::HashingFailed` - The configured hashing cost is rejected by Argon2
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        mailer: Arc<dyn Mailer>,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        let codec = TokenCodec::new(
            &config.access_secret,
            &config.refresh_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        );
        let hasher = CredentialHasher::new(
            config.pepper.clone(),
            config.hash_memory_kib,
            config.hash_iterations,
        )?;

        Ok(Self {
            users,
            ledger: TokenLedger::new(tokens),
            codec,
            hasher,
            mailer,
            config,
        })
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Register a new user
    ///
    /// The account starts as an unverified `Viewer`. No tokens are issued;
    /// a verification link is mailed instead.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Name, email or password malformed
    /// * `AuthError::EmailTaken` - Email already exists
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<User> {
        let name = validate_name(&request.name)?;
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = self
            .users
            .create_user(NewUser {
                name,
                email,
                password_hash,
            })
            .await?;

        log::info!("Registered user {}", user.id);
        self.start_email_verification(&user, false).await?;

        Ok(user)
    }

    /// Supersede any outstanding verification for `user` and mail a new link.
    ///
    /// `new_address` switches the mail wording for profile email changes.
    pub async fn start_email_verification(&self, user: &User, new_address: bool) -> AuthResult<()> {
        self.ledger
            .revoke_all(user.id, Some(TokenKind::Verify))
            .await?;

        let raw = generate_one_time_token();
        self.ledger
            .issue(
                TokenKind::Verify,
                user.id,
                TokenKey::Hash(digest_one_time_token(&raw)),
                self.config.verify_token_ttl,
            )
            .await?;

        self.deliver(templates::verification_mail(
            &self.config.base_url,
            &raw,
            &user.email,
            new_address,
        ))
        .await;
        Ok(())
    }

    /// Confirm an email address with a mailed one-time token
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidOrExpiredToken` - Unknown email, or the token is
    ///   wrong, expired, revoked or already used
    pub async fn verify_email(&self, token: &str, email: &str) -> AuthResult<()> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidOrExpiredToken)?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let record = self
            .ledger
            .find_usable(
                TokenKind::Verify,
                Some(user.id),
                &TokenKey::Hash(digest_one_time_token(token)),
            )
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !self.ledger.mark_used(&record).await? {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        self.users.set_email_verified(user.id, true).await?;

        log::info!("Verified email for user {}", user.id);
        Ok(())
    }

    /// Login with email and password
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown or deactivated user, or wrong password
    /// * `AuthError::EmailNotVerified` - Email not yet confirmed
    pub async fn login(&self, request: LoginRequest) -> AuthResult<(User, SessionTokens)> {
        let email = normalize_email(&request.email).map_err(|_| AuthError::InvalidCredentials)?;
        let credentials = self
            .users
            .find_credentials(&email)
            .await?
            .filter(|c| !c.user.is_deleted)
            .ok_or(AuthError::InvalidCredentials)?;

        if !credentials.user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }
        self.hasher
            .verify(&request.password, &credentials.password_hash)?;

        let user = credentials.user;
        let tokens = self.create_session(&user).await?;
        self.users.update_last_login(user.id).await?;

        Ok((user, tokens))
    }

    /// Mint an access token and a ledger-backed refresh token for `user`
    async fn create_session(&self, user: &User) -> AuthResult<SessionTokens> {
        let access_token = self.codec.issue_access_token(user)?;

        let token_id = TokenCodec::new_token_id();
        let refresh_token = self.codec.issue_refresh_token(user.id, &token_id)?;
        self.ledger
            .issue(
                TokenKind::Refresh,
                user.id,
                TokenKey::Id(token_id),
                self.codec.refresh_ttl(),
            )
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Rotate a refresh token into a new access/refresh pair
    ///
    /// The presented token is revoked; presenting it again fails.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Bad signature, expired, already rotated
    ///   or revoked, or the owner is gone
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<SessionTokens> {
        let claims = self.codec.verify_refresh_token(refresh_token)?;

        let Some(record) = self
            .ledger
            .find_usable(
                TokenKind::Refresh,
                Some(claims.sub),
                &TokenKey::Id(claims.token_id),
            )
            .await?
        else {
            log::warn!("Rejected unusable refresh token for user {}", claims.sub);
            return Err(AuthError::InvalidToken);
        };

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or(AuthError::InvalidToken)?;

        // Losing this race means another request already rotated the token.
        if !self.ledger.revoke(&record).await? {
            log::warn!("Concurrent reuse of refresh token for user {}", user.id);
            return Err(AuthError::InvalidToken);
        }

        self.create_session(&user).await
    }

    /// Revoke the session behind a refresh token
    ///
    /// Unknown or already revoked sessions count as logged out.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - The token does not verify
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let claims = self.codec.verify_refresh_token(refresh_token)?;

        if let Some(record) = self
            .ledger
            .find(
                TokenKind::Refresh,
                Some(claims.sub),
                &TokenKey::Id(claims.token_id),
            )
            .await?
        {
            self.ledger.revoke(&record).await?;
        }
        Ok(())
    }

    /// Start a password reset. Never reveals whether the email is registered.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };
        let Some(user) = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|u| !u.is_deleted)
        else {
            return Ok(());
        };

        let raw = generate_one_time_token();
        self.ledger
            .issue(
                TokenKind::Reset,
                user.id,
                TokenKey::Hash(digest_one_time_token(&raw)),
                self.config.reset_token_ttl,
            )
            .await?;

        self.deliver(templates::password_reset_mail(
            &self.config.base_url,
            &raw,
            &user.email,
        ))
        .await;
        Ok(())
    }

    /// Set a new password with a mailed reset token.
    ///
    /// Every refresh token of the user is revoked afterwards.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidOrExpiredToken` - Unknown email or unusable token
    /// * `AuthError::Validation` - New password malformed
    pub async fn reset_password(&self, request: PasswordResetConfirm) -> AuthResult<()> {
        let email = normalize_email(&request.email).map_err(|_| AuthError::InvalidOrExpiredToken)?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        validate_password(&request.password)?;

        let record = self
            .ledger
            .find_usable(
                TokenKind::Reset,
                Some(user.id),
                &TokenKey::Hash(digest_one_time_token(&request.token)),
            )
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        // Hash before claiming so a hashing failure leaves the link usable.
        let password_hash = self.hasher.hash(&request.password)?;
        if !self.ledger.mark_used(&record).await? {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        self.users.update_password(user.id, &password_hash).await?;
        let revoked = self
            .ledger
            .revoke_all(user.id, Some(TokenKind::Refresh))
            .await?;

        log::info!(
            "Password reset for user {}, {} session(s) revoked",
            user.id,
            revoked
        );
        Ok(())
    }

    /// Resolve a bearer access token into the caller's identity
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Bad signature or expired
    /// * `AuthError::AccountUnavailable` - User missing or deactivated
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<Principal> {
        let claims = self.codec.verify_access_token(access_token)?;
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or(AuthError::AccountUnavailable)?;

        Ok(Principal::from(&user))
    }

    async fn deliver(&self, mail: OutgoingMail) {
        let to = mail.to.clone();
        if let Err(e) = self.mailer.send(mail).await {
            log::warn!("Failed to send mail to {}: {}", to, e);
        }
    }
}
