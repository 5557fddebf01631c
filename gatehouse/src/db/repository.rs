//! Repository trait definitions for testability and dependency injection.
//!
//! Services only ever see these traits. PostgreSQL implementations live
//! here; an in-memory implementation lives in [`super::memory`].

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::auth::{
    AuthError, AuthResult, Credentials, NewTokenRecord, NewUser, Role, TokenKey, TokenKind,
    TokenRecord, User, UserId,
};
use crate::content::{
    Content, ContentAuthor, ContentId, ContentPatch, ContentResult, ContentView, NewContent,
};

/// Trait for user/identity repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user with the default role.
    ///
    /// Fails with `AuthError::EmailTaken` if the email is already stored.
    async fn create_user(&self, user: NewUser) -> AuthResult<User>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Find user by normalized email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Find user and password hash by normalized email
    async fn find_credentials(&self, email: &str) -> AuthResult<Option<Credentials>>;

    /// All users, soft-deleted included
    async fn list_users(&self) -> AuthResult<Vec<User>>;

    /// Mark the user's email verified or unverified
    async fn set_email_verified(&self, user_id: UserId, verified: bool) -> AuthResult<()>;

    /// Update user's last login timestamp
    async fn update_last_login(&self, user_id: UserId) -> AuthResult<()>;

    /// Replace the password hash
    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AuthResult<()>;

    /// Change the display name
    async fn update_name(&self, user_id: UserId, name: &str) -> AuthResult<Option<User>>;

    /// Change the email and clear the verified flag.
    ///
    /// Fails with `AuthError::EmailTaken` if another user holds it.
    async fn update_email(&self, user_id: UserId, email: &str) -> AuthResult<Option<User>>;

    /// Change the role
    async fn update_role(&self, user_id: UserId, role: Role) -> AuthResult<Option<User>>;

    /// Soft-delete the user
    async fn soft_delete_user(&self, user_id: UserId) -> AuthResult<Option<User>>;
}

/// Trait for token ledger storage
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Insert a ledger record
    async fn insert_token(&self, token: NewTokenRecord) -> AuthResult<TokenRecord>;

    /// Most recent record matching kind, key and (optionally) owner
    async fn find_token(
        &self,
        kind: TokenKind,
        owner: Option<UserId>,
        key: &TokenKey,
    ) -> AuthResult<Option<TokenRecord>>;

    /// Set `used` if neither used nor revoked; reports whether it changed
    async fn mark_token_used(&self, token_id: Uuid) -> AuthResult<bool>;

    /// Set `revoked` if not already; reports whether it changed
    async fn revoke_token(&self, token_id: Uuid) -> AuthResult<bool>;

    /// Revoke all of a user's records, optionally of one kind
    async fn revoke_user_tokens(&self, owner: UserId, kind: Option<TokenKind>) -> AuthResult<u64>;
}

/// Trait for content storage
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a content item
    async fn insert_content(&self, content: NewContent) -> ContentResult<Content>;

    /// Find an item, soft-deleted included
    async fn find_content(&self, content_id: ContentId) -> ContentResult<Option<Content>>;

    /// All non-deleted items with their authors, newest first
    async fn list_active_content(&self) -> ContentResult<Vec<ContentView>>;

    /// Apply a partial update
    async fn update_content(
        &self,
        content_id: ContentId,
        patch: ContentPatch,
    ) -> ContentResult<Option<Content>>;

    /// Soft-delete an item; reports whether it changed
    async fn soft_delete_content(&self, content_id: ContentId) -> ContentResult<bool>;
}

const USER_COLUMNS: &str = "id, name, email, role, email_verified, last_login_at, is_deleted, created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, token_id, token_hash, user_id, kind, expires_at, revoked, used, created_at";

const CONTENT_COLUMNS: &str = "id, title, body, author_id, is_deleted, created_at, updated_at";

fn decode_error(message: impl Into<String>) -> sqlx::Error {
    let message: String = message.into();
    sqlx::Error::Decode(message.into())
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role
            .parse()
            .map_err(|_| decode_error(format!("unknown role: {role}")))?,
        email_verified: row.try_get("email_verified")?,
        last_login_at: row.try_get("last_login_at")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<TokenRecord, sqlx::Error> {
    let token_id: Option<String> = row.try_get("token_id")?;
    let token_hash: Option<String> = row.try_get("token_hash")?;
    let key = match (token_id, token_hash) {
        (Some(id), None) => TokenKey::Id(id),
        (None, Some(hash)) => TokenKey::Hash(hash),
        _ => return Err(decode_error("token row must carry exactly one key")),
    };
    let kind: String = row.try_get("kind")?;

    Ok(TokenRecord {
        id: row.try_get("id")?,
        key,
        user_id: row.try_get("user_id")?,
        kind: kind.parse().map_err(decode_error)?,
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
        used: row.try_get("used")?,
        created_at: row.try_get("created_at")?,
    })
}

fn content_from_row(row: &PgRow) -> Result<Content, sqlx::Error> {
    Ok(Content {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Map a unique-constraint violation on `users.email` to `EmailTaken`.
fn email_conflict(err: sqlx::Error) -> AuthError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AuthError::EmailTaken,
        _ => AuthError::Database(err),
    }
}

/// Default PostgreSQL implementation of `UserRepository`
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: NewUser) -> AuthResult<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, name, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Role::default().as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(email_conflict)?;

        Ok(user_from_row(&row)?)
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_credentials(&self, email: &str) -> AuthResult<Option<Credentials>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Credentials {
                user: user_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn set_email_verified(&self, user_id: UserId, verified: bool) -> AuthResult<()> {
        sqlx::query("UPDATE users SET email_verified = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(verified)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_last_login(&self, user_id: UserId) -> AuthResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_name(&self, user_id: UserId, name: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn update_email(&self, user_id: UserId, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET email = $2, email_verified = FALSE, updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(email_conflict)?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn update_role(&self, user_id: UserId, role: Role) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn soft_delete_user(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

/// Default PostgreSQL implementation of `TokenRepository`
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn insert_token(&self, token: NewTokenRecord) -> AuthResult<TokenRecord> {
        let (token_id, token_hash) = match &token.key {
            TokenKey::Id(id) => (Some(id.as_str()), None),
            TokenKey::Hash(hash) => (None, Some(hash.as_str())),
        };

        let row = sqlx::query(&format!(
            "INSERT INTO tokens (id, token_id, token_hash, user_id, kind, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(token_id)
        .bind(token_hash)
        .bind(token.user_id)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token_from_row(&row)?)
    }

    async fn find_token(
        &self,
        kind: TokenKind,
        owner: Option<UserId>,
        key: &TokenKey,
    ) -> AuthResult<Option<TokenRecord>> {
        let (column, value) = match key {
            TokenKey::Id(id) => ("token_id", id),
            TokenKey::Hash(hash) => ("token_hash", hash),
        };

        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens
             WHERE kind = $1 AND {column} = $2 AND ($3::uuid IS NULL OR user_id = $3)
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(kind.as_str())
        .bind(value)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(token_from_row).transpose()?)
    }

    async fn mark_token_used(&self, token_id: Uuid) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE tokens SET used = TRUE WHERE id = $1 AND used = FALSE AND revoked = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_token(&self, token_id: Uuid) -> AuthResult<bool> {
        let result = sqlx::query("UPDATE tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_user_tokens(&self, owner: UserId, kind: Option<TokenKind>) -> AuthResult<u64> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked = TRUE
             WHERE user_id = $1 AND revoked = FALSE AND ($2::text IS NULL OR kind = $2)",
        )
        .bind(owner)
        .bind(kind.map(TokenKind::as_str))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Default PostgreSQL implementation of `ContentRepository`
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn insert_content(&self, content: NewContent) -> ContentResult<Content> {
        let row = sqlx::query(&format!(
            "INSERT INTO content (id, title, body, author_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&content.title)
        .bind(&content.body)
        .bind(content.author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(content_from_row(&row)?)
    }

    async fn find_content(&self, content_id: ContentId) -> ContentResult<Option<Content>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE id = $1"
        ))
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(content_from_row).transpose()?)
    }

    async fn list_active_content(&self) -> ContentResult<Vec<ContentView>> {
        let rows = sqlx::query(
            "SELECT c.id, c.title, c.body, c.created_at, c.updated_at,
                    u.id AS author_id, u.name AS author_name, u.email AS author_email,
                    u.role AS author_role
             FROM content c
             JOIN users u ON u.id = c.author_id
             WHERE c.is_deleted = FALSE
             ORDER BY c.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let role: String = row.try_get("author_role")?;
            items.push(ContentView {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                body: row.try_get("body")?,
                author: ContentAuthor {
                    id: row.try_get("author_id")?,
                    name: row.try_get("author_name")?,
                    email: row.try_get("author_email")?,
                    role: role
                        .parse()
                        .map_err(|_| decode_error(format!("unknown role: {role}")))?,
                },
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(items)
    }

    async fn update_content(
        &self,
        content_id: ContentId,
        patch: ContentPatch,
    ) -> ContentResult<Option<Content>> {
        let row = sqlx::query(&format!(
            "UPDATE content
             SET title = COALESCE($2, title), body = COALESCE($3, body), updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE
             RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(content_id)
        .bind(patch.title)
        .bind(patch.body)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(content_from_row).transpose()?)
    }

    async fn soft_delete_content(&self, content_id: ContentId) -> ContentResult<bool> {
        let result = sqlx::query(
            "UPDATE content SET is_deleted = TRUE, updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
