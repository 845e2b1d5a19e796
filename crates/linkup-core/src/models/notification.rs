use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::row::{field_id, field_str, field_timestamp};
use super::user::UserSummary;
use crate::constants::COMMENT_NOTIFICATION_TITLE;

/// Navigation target stored as a JSON string in the `data` column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "postId", default, deserialize_with = "lenient_id")]
    pub post_id: Option<String>,
    #[serde(rename = "commentId", default, deserialize_with = "lenient_id")]
    pub comment_id: Option<String>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(super::row::value_id(&value))
}

impl NotificationPayload {
    pub fn parse(data: &str) -> Self {
        serde_json::from_str(data).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub sender: UserSummary,
    pub title: String,
    pub created_at: u64,
    pub payload: NotificationPayload,
}

impl Notification {
    /// Decode a `notifications` row, with the `sender` join when present
    pub fn from_value(row: &Value) -> Option<Self> {
        let sender_id = field_id(row, "senderId").unwrap_or_default();
        let sender = row
            .get("sender")
            .and_then(UserSummary::from_value)
            .unwrap_or_else(|| UserSummary {
                id: sender_id.clone(),
                ..UserSummary::default()
            });

        Some(Self {
            id: field_id(row, "id")?,
            sender_id,
            receiver_id: field_id(row, "receiverId").unwrap_or_default(),
            sender,
            title: field_str(row, "title").unwrap_or_default(),
            created_at: field_timestamp(row, "created_at").unwrap_or(0),
            payload: field_str(row, "data")
                .map(|data| NotificationPayload::parse(&data))
                .unwrap_or_default(),
        })
    }
}

/// Insert payload for the `notifications` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNotification {
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "receiverId")]
    pub receiver_id: String,
    pub title: String,
    /// JSON-encoded `NotificationPayload`
    pub data: String,
}

impl NewNotification {
    pub fn comment(sender_id: &str, receiver_id: &str, post_id: &str, comment_id: &str) -> Self {
        let payload = NotificationPayload {
            post_id: Some(post_id.to_string()),
            comment_id: Some(comment_id.to_string()),
        };
        Self {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            title: COMMENT_NOTIFICATION_TITLE.to_string(),
            data: serde_json::to_string(&payload).unwrap_or_default(),
        }
    }
}
