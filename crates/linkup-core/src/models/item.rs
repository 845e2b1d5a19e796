use std::collections::BTreeSet;

use serde_json::Value;
use uuid::Uuid;

use super::change::Table;
use super::row::{field_id, field_str, field_timestamp, saturating_count, value_id};
use super::user::UserSummary;
use crate::constants::LOCAL_ID_PREFIX;

/// Synthesize an id for an item the server has not stored yet
pub fn local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Post,
    Comment { post_id: String },
}

/// A post or a comment as displayed in a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub kind: ItemKind,
    pub user_id: String,
    pub author: UserSummary,
    /// Unix milliseconds
    pub created_at: u64,
    /// Post body (rich text) or comment text
    pub body: String,
    /// Storage path of the attached image or video
    pub file: Option<String>,
    /// Ids of users who liked this post
    pub likes: BTreeSet<String>,
    pub comment_count: u32,
}

impl Item {
    /// Decode a `posts` row. Joined relations are optional: realtime rows
    /// carry none of them, so the post starts with no likes and no comments.
    pub fn post_from_value(row: &Value) -> Option<Self> {
        let id = field_id(row, "id")?;
        let user_id = field_id(row, "userId").unwrap_or_default();

        let likes = row
            .get("post_likes")
            .and_then(|v| v.as_array())
            .map(|likes| {
                likes
                    .iter()
                    .filter_map(|like| like.get("userId").and_then(value_id))
                    .collect()
            })
            .unwrap_or_default();

        // Either the `comments(count)` aggregate or the full comment list
        let comment_count = match row.get("comments").and_then(|v| v.as_array()) {
            Some(comments) => match comments.first().and_then(|c| c.get("count")) {
                Some(count) => saturating_count(count.as_u64().unwrap_or(0)),
                None => saturating_count(comments.len()),
            },
            None => 0,
        };

        Some(Self {
            author: author_from_row(row, &user_id),
            id,
            kind: ItemKind::Post,
            user_id,
            created_at: field_timestamp(row, "created_at").unwrap_or(0),
            body: field_str(row, "body").unwrap_or_default(),
            file: field_str(row, "file"),
            likes,
            comment_count,
        })
    }

    /// Decode a `comments` row
    pub fn comment_from_value(row: &Value) -> Option<Self> {
        let id = field_id(row, "id")?;
        let post_id = field_id(row, "postId")?;
        let user_id = field_id(row, "userId").unwrap_or_default();

        Some(Self {
            author: author_from_row(row, &user_id),
            id,
            kind: ItemKind::Comment { post_id },
            user_id,
            created_at: field_timestamp(row, "created_at").unwrap_or(0),
            body: field_str(row, "text").unwrap_or_default(),
            file: None,
            likes: BTreeSet::new(),
            comment_count: 0,
        })
    }

    pub fn from_table_row(table: Table, row: &Value) -> Option<Self> {
        match table {
            Table::Posts => Self::post_from_value(row),
            Table::Comments => Self::comment_from_value(row),
            _ => None,
        }
    }

    /// Comment shown immediately while the insert is in flight
    pub fn placeholder_comment(
        post_id: &str,
        author: UserSummary,
        text: &str,
        created_at: u64,
    ) -> Self {
        Self {
            id: local_id(),
            kind: ItemKind::Comment {
                post_id: post_id.to_string(),
            },
            user_id: author.id.clone(),
            author,
            created_at,
            body: text.to_string(),
            file: None,
            likes: BTreeSet::new(),
            comment_count: 0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        is_local_id(&self.id)
    }

    pub fn post_id(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Post => None,
            ItemKind::Comment { post_id } => Some(post_id),
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.contains(user_id)
    }

    /// Merge the fields present in `patch`. Absent fields stay untouched.
    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        if let Some(body) = &patch.body {
            self.body = body.clone();
        }
        if let Some(file) = &patch.file {
            self.file = file.clone();
        }
    }
}

fn author_from_row(row: &Value, user_id: &str) -> UserSummary {
    row.get("user")
        .and_then(UserSummary::from_value)
        .unwrap_or_else(|| UserSummary {
            id: user_id.to_string(),
            ..UserSummary::default()
        })
}

/// In-place update of the mutable fields of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub id: String,
    pub body: Option<String>,
    /// `Some(None)` clears the attachment
    pub file: Option<Option<String>>,
}

impl ItemPatch {
    pub fn from_value(table: Table, row: &Value) -> Option<Self> {
        let id = field_id(row, "id")?;
        let body_key = match table {
            Table::Comments => "text",
            _ => "body",
        };
        let body = row
            .get(body_key)
            .map(|v| v.as_str().unwrap_or_default().to_string());
        let file = row
            .get("file")
            .map(|v| v.as_str().map(|s| s.to_string()));
        Some(Self { id, body, file })
    }
}

/// A post together with its full comment list (newest first)
#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub post: Item,
    pub comments: Vec<Item>,
}

impl PostDetail {
    pub fn from_value(row: &Value) -> Option<Self> {
        let mut post = Item::post_from_value(row)?;
        let mut comments: Vec<Item> = row
            .get("comments")
            .and_then(|v| v.as_array())
            .map(|rows| rows.iter().filter_map(Item::comment_from_value).collect())
            .unwrap_or_default();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        post.comment_count = saturating_count(comments.len());
        Some(Self { post, comments })
    }
}
