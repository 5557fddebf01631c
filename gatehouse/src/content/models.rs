//! Content data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Role, UserId};

/// Content ID type
pub type ContentId = Uuid;

/// Stored content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: ContentId,
    pub title: String,
    pub body: String,
    pub author_id: UserId,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public summary of a content author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAuthor {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Content item joined with its author, as listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    pub id: ContentId,
    pub title: String,
    pub body: String,
    pub author: ContentAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload
#[derive(Debug, Clone)]
pub struct NewContent {
    pub title: String,
    pub body: String,
    pub author_id: UserId,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}
