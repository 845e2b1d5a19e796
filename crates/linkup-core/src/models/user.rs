use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::row::{field_id, field_str};

/// Denormalized author info shown next to posts, comments and notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    /// Storage path of the avatar, resolved to a URL by the blob store
    pub image: Option<String>,
}

impl UserSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
        }
    }

    /// Decode a joined `users` row (`{id, name, image}`)
    pub fn from_value(row: &Value) -> Option<Self> {
        Some(Self {
            id: field_id(row, "id")?,
            name: field_str(row, "name").unwrap_or_default(),
            image: field_str(row, "image"),
        })
    }

    /// Placeholder used when the author lookup failed
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.name.is_empty()
    }
}
