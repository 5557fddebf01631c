//! Content module: role-gated, author-owned content items.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{ContentError, ContentResult};
pub use manager::ContentManager;
pub use models::{Content, ContentAuthor, ContentId, ContentPatch, ContentView, NewContent};
