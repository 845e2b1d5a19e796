//! Outgoing records and the local drafts they are built from.

use serde::Serialize;

use crate::constants::folders;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLike {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "postId")]
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "postId")]
    pub post_id: String,
    pub text: String,
}

/// File attached to a draft: either picked on the device or already stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAttachment {
    Local { uri: String, is_image: bool },
    Stored { path: String },
}

impl MediaAttachment {
    pub fn is_image(&self) -> bool {
        match self {
            MediaAttachment::Local { is_image, .. } => *is_image,
            MediaAttachment::Stored { path } => path.contains(folders::POST_IMAGES),
        }
    }
}

/// Post being created, or edited when `id` is set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub id: Option<String>,
    pub body: String,
    pub media: Option<MediaAttachment>,
}

impl PostDraft {
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty() && self.media.is_none()
    }
}

/// Upsert payload for the `posts` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub body: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub bio: String,
    pub image: Option<MediaAttachment>,
}

impl ProfileDraft {
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.phone_number, &self.address, &self.bio]
            .iter()
            .all(|field| !field.trim().is_empty())
            && self.image.is_some()
    }
}

/// Update payload for the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub bio: String,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_post() {
        assert!(PostDraft::default().is_blank());
        assert!(PostDraft {
            body: "   ".to_string(),
            ..PostDraft::default()
        }
        .is_blank());
        assert!(!PostDraft {
            media: Some(MediaAttachment::Stored {
                path: "/postImages/1.png".to_string()
            }),
            ..PostDraft::default()
        }
        .is_blank());
    }

    #[test]
    fn test_stored_media_type_from_folder() {
        let image = MediaAttachment::Stored {
            path: "/postImages/1.png".to_string(),
        };
        let video = MediaAttachment::Stored {
            path: "/postVideos/1.mp4".to_string(),
        };
        assert!(image.is_image());
        assert!(!video.is_image());
    }

    #[test]
    fn test_post_record_omits_missing_id() {
        let record = PostRecord {
            id: None,
            user_id: "u1".to_string(),
            body: "hi".to_string(),
            file: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["userId"], "u1");
    }
}
