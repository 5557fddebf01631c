//! Content manager implementation.

use std::sync::Arc;

use super::{
    errors::{ContentError, ContentResult},
    models::{Content, ContentId, ContentPatch, ContentView, NewContent},
};
use crate::{
    auth::{CONTENT_AUTHORS, Principal, authorize, authorize_owned_mutation},
    db::ContentRepository,
};

fn require_text(field: &str, value: &str) -> ContentResult<()> {
    if value.trim().is_empty() {
        return Err(ContentError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Content service
#[derive(Clone)]
pub struct ContentManager {
    repo: Arc<dyn ContentRepository>,
}

impl ContentManager {
    pub fn new(repo: Arc<dyn ContentRepository>) -> Self {
        Self { repo }
    }

    /// All live content, newest first
    pub async fn list(&self) -> ContentResult<Vec<ContentView>> {
        self.repo.list_active_content().await
    }

    pub async fn get(&self, content_id: ContentId) -> ContentResult<Content> {
        self.repo
            .find_content(content_id)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or(ContentError::NotFound)
    }

    /// Create content authored by `caller`.
    ///
    /// # Errors
    ///
    /// * `ContentError::Forbidden` - Caller is a Viewer
    /// * `ContentError::Validation` - Empty title or body
    pub async fn create(
        &self,
        caller: &Principal,
        title: String,
        body: String,
    ) -> ContentResult<Content> {
        authorize(caller.role, CONTENT_AUTHORS).map_err(|_| ContentError::Forbidden("Forbidden"))?;
        require_text("title", &title)?;
        require_text("body", &body)?;

        let content = self
            .repo
            .insert_content(NewContent {
                title,
                body,
                author_id: caller.id,
            })
            .await?;

        log::info!("User {} created content {}", caller.id, content.id);
        Ok(content)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// * `ContentError::NotFound` - Missing or deleted
    /// * `ContentError::Forbidden` - Viewer, or an Editor who is not the author
    /// * `ContentError::Validation` - A supplied field is empty
    pub async fn update(
        &self,
        caller: &Principal,
        content_id: ContentId,
        patch: ContentPatch,
    ) -> ContentResult<Content> {
        let existing = self.get(content_id).await?;
        authorize_owned_mutation(caller, existing.author_id)
            .map_err(|_| ContentError::Forbidden("Cannot update others' content"))?;

        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }
        if let Some(body) = &patch.body {
            require_text("body", body)?;
        }

        self.repo
            .update_content(content_id, patch)
            .await?
            .ok_or(ContentError::NotFound)
    }

    /// Soft-delete under the same ownership rules as [`Self::update`].
    pub async fn delete(&self, caller: &Principal, content_id: ContentId) -> ContentResult<()> {
        let existing = self.get(content_id).await?;
        authorize_owned_mutation(caller, existing.author_id)
            .map_err(|_| ContentError::Forbidden("Cannot delete others' content"))?;

        if !self.repo.soft_delete_content(content_id).await? {
            return Err(ContentError::NotFound);
        }

        log::info!("User {} deleted content {}", caller.id, content_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{NewUser, Role},
        db::{MemoryStore, UserRepository},
    };

    async fn principal(store: &MemoryStore, email: &str, role: Role) -> Principal {
        let user = store
            .create_user(NewUser {
                name: "Author".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let user = store.update_role(user.id, role).await.unwrap().unwrap();
        Principal::from(&user)
    }

    fn manager(store: &MemoryStore) -> ContentManager {
        ContentManager::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_viewer_cannot_create() {
        let store = MemoryStore::new();
        let viewer = principal(&store, "v@example.com", Role::Viewer).await;

        let result = manager(&store)
            .create(&viewer, "Title".to_string(), "Body".to_string())
            .await;
        assert!(matches!(result, Err(ContentError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let store = MemoryStore::new();
        let editor = principal(&store, "e@example.com", Role::Editor).await;
        let content = manager(&store);

        let result = content.create(&editor, " ".to_string(), "Body".to_string()).await;
        assert!(matches!(result, Err(ContentError::Validation(_))));

        let item = content
            .create(&editor, "Title".to_string(), "Body".to_string())
            .await
            .unwrap();
        let result = content
            .update(
                &editor,
                item.id,
                ContentPatch {
                    title: None,
                    body: Some(String::new()),
                },
            )
            .await;
        assert!(matches!(result, Err(ContentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_ownership_rules() {
        let store = MemoryStore::new();
        let owner = principal(&store, "owner@example.com", Role::Editor).await;
        let other = principal(&store, "other@example.com", Role::Editor).await;
        let admin = principal(&store, "admin@example.com", Role::Admin).await;
        let content = manager(&store);

        let item = content
            .create(&owner, "Title".to_string(), "Body".to_string())
            .await
            .unwrap();

        let result = content
            .update(
                &other,
                item.id,
                ContentPatch {
                    title: Some("Hijacked".to_string()),
                    body: None,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(ContentError::Forbidden("Cannot update others' content"))
        ));

        let updated = content
            .update(
                &owner,
                item.id,
                ContentPatch {
                    title: Some("Edited".to_string()),
                    body: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Edited");
        assert_eq!(updated.body, "Body");

        assert!(matches!(
            content.delete(&other, item.id).await,
            Err(ContentError::Forbidden("Cannot delete others' content"))
        ));
        content.delete(&admin, item.id).await.unwrap();

        assert!(matches!(
            content.get(item.id).await,
            Err(ContentError::NotFound)
        ));
        assert!(matches!(
            content.delete(&admin, item.id).await,
            Err(ContentError::NotFound)
        ));
        assert!(content.list().await.unwrap().is_empty());
    }
}
