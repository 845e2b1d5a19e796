//! Post composer and profile editor submissions.
//!
//! Both validate locally, upload a picked file first, then write the row.
//! Failures are reported as alerts and returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::blob::media_folder;
use crate::backend::{with_timeout, Backend};
use crate::constants::{alerts, folders};
use crate::error::{CoreError, CoreResult};
use crate::events::{emit, CoreEvent, EventSender};
use crate::models::{Item, MediaAttachment, PostDraft, PostRecord, ProfileDraft, ProfileUpdate};

pub struct Composer {
    backend: Arc<dyn Backend>,
    events: EventSender,
    timeout: Duration,
}

impl Composer {
    pub fn new(backend: Arc<dyn Backend>, events: EventSender, timeout: Duration) -> Self {
        Self {
            backend,
            events,
            timeout,
        }
    }

    /// Create the post, or edit it when the draft carries an id
    pub async fn submit_post(&self, user_id: &str, draft: &PostDraft) -> CoreResult<Item> {
        self.try_submit_post(user_id, draft)
            .await
            .map_err(|err| self.report(err, alerts::POST_TITLE))
    }

    async fn try_submit_post(&self, user_id: &str, draft: &PostDraft) -> CoreResult<Item> {
        if draft.is_blank() {
            return Err(CoreError::validation(alerts::EMPTY_POST));
        }

        let file = match &draft.media {
            None => None,
            Some(MediaAttachment::Stored { path }) => Some(path.clone()),
            Some(MediaAttachment::Local { uri, is_image }) => {
                let folder = media_folder(*is_image);
                Some(self.upload(folder, uri, *is_image).await?)
            }
        };

        let record = PostRecord {
            id: draft.id.clone(),
            user_id: user_id.to_string(),
            body: draft.body.clone(),
            file,
        };
        let post = with_timeout("upsert_post", self.timeout, self.backend.upsert_post(&record)).await?;
        tracing::info!("Saved post {}", post.id);
        Ok(post)
    }

    /// Update the user's profile. A failed image upload drops the image
    /// instead of failing the update.
    pub async fn update_profile(
        &self,
        user_id: &str,
        draft: &ProfileDraft,
    ) -> CoreResult<ProfileUpdate> {
        if !draft.is_complete() {
            let err = CoreError::validation(alerts::INCOMPLETE_PROFILE);
            return Err(self.report(err, alerts::PROFILE_TITLE));
        }

        let image = match &draft.image {
            None => None,
            Some(MediaAttachment::Stored { path }) => Some(path.clone()),
            Some(MediaAttachment::Local { uri, .. }) => {
                match self.upload(folders::PROFILES, uri, true).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!("Profile image upload failed, saving without it: {}", e);
                        None
                    }
                }
            }
        };

        let update = ProfileUpdate {
            name: draft.name.clone(),
            phone_number: draft.phone_number.clone(),
            address: draft.address.clone(),
            bio: draft.bio.clone(),
            image,
        };
        with_timeout(
            "update_user",
            self.timeout,
            self.backend.update_user(user_id, &update),
        )
        .await
        .map_err(|err| self.report(err, alerts::PROFILE_TITLE))?;
        Ok(update)
    }

    async fn upload(&self, folder: &str, uri: &str, is_image: bool) -> CoreResult<String> {
        with_timeout(
            "upload_blob",
            self.timeout,
            self.backend.upload_blob(folder, uri, is_image),
        )
        .await
    }

    fn report(&self, err: CoreError, title: &str) -> CoreError {
        if let Some(alert) = err.alert(title) {
            emit(&self.events, CoreEvent::Alert(alert));
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};
    use crate::models::UserSummary;
    use std::sync::mpsc::{self, Receiver};

    fn composer() -> (Arc<MemoryBackend>, Composer, Receiver<CoreEvent>) {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user(UserSummary::new("me", "Me"));
        let (tx, rx) = mpsc::channel();
        let composer = Composer::new(backend.clone(), tx, Duration::from_secs(5));
        (backend, composer, rx)
    }

    fn complete_profile(image: MediaAttachment) -> ProfileDraft {
        ProfileDraft {
            name: "Me".to_string(),
            phone_number: "555".to_string(),
            address: "Somewhere 1".to_string(),
            bio: "hello".to_string(),
            image: Some(image),
        }
    }

    #[tokio::test]
    async fn test_blank_post_is_rejected() {
        let (backend, composer, rx) = composer();
        let result = composer.submit_post("me", &PostDraft::default()).await;

        assert!(matches!(result, Err(CoreError::Validation { .. })));
        assert_eq!(backend.call_count(Operation::UpsertPost), 0);
        let alert = rx.try_recv().unwrap();
        assert_eq!(
            alert,
            CoreEvent::Alert(crate::events::Alert::new("Post", "Post a file or add a comment"))
        );
    }

    #[tokio::test]
    async fn test_local_video_is_uploaded_before_insert() {
        let (backend, composer, _rx) = composer();
        let draft = PostDraft {
            id: None,
            body: "clip".to_string(),
            media: Some(MediaAttachment::Local {
                uri: "file:///tmp/clip.mov".to_string(),
                is_image: false,
            }),
        };

        let post = composer.submit_post("me", &draft).await.unwrap();
        let file = post.file.unwrap();
        assert!(file.starts_with("/postVideos/"));
        assert!(file.ends_with(".mp4"));
        assert_eq!(backend.blobs(), vec![file]);
        assert_eq!(post.author.name, "Me");
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_post() {
        let (backend, composer, rx) = composer();
        backend.fail(Operation::UploadBlob);
        let draft = PostDraft {
            id: None,
            body: String::new(),
            media: Some(MediaAttachment::Local {
                uri: "file:///tmp/a.jpg".to_string(),
                is_image: true,
            }),
        };

        assert!(composer.submit_post("me", &draft).await.is_err());
        assert_eq!(backend.call_count(Operation::UpsertPost), 0);
        assert!(matches!(rx.try_recv(), Ok(CoreEvent::Alert(_))));
    }

    #[tokio::test]
    async fn test_edit_keeps_post_id() {
        let (backend, composer, _rx) = composer();
        let created = composer
            .submit_post(
                "me",
                &PostDraft {
                    body: "first".to_string(),
                    ..PostDraft::default()
                },
            )
            .await
            .unwrap();

        let edited = composer
            .submit_post(
                "me",
                &PostDraft {
                    id: Some(created.id.clone()),
                    body: "second".to_string(),
                    media: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.id, created.id);
        assert_eq!(backend.post(&created.id).unwrap().body, "second");
    }

    #[tokio::test]
    async fn test_incomplete_profile_is_rejected() {
        let (backend, composer, _rx) = composer();
        let mut draft = complete_profile(MediaAttachment::Stored {
            path: "/profiles/1.png".to_string(),
        });
        draft.bio = " ".to_string();

        let result = composer.update_profile("me", &draft).await;
        assert_eq!(result, Err(CoreError::validation("Please fill all fields")));
        assert_eq!(backend.call_count(Operation::UpdateUser), 0);
    }

    #[tokio::test]
    async fn test_profile_image_upload_failure_clears_image() {
        let (backend, composer, rx) = composer();
        backend.fail(Operation::UploadBlob);
        let draft = complete_profile(MediaAttachment::Local {
            uri: "file:///tmp/me.jpg".to_string(),
            is_image: true,
        });

        let update = composer.update_profile("me", &draft).await.unwrap();
        assert_eq!(update.image, None);
        assert_eq!(backend.profile("me").unwrap().name, "Me");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_profile_image_goes_to_profiles_folder() {
        let (backend, composer, _rx) = composer();
        let draft = complete_profile(MediaAttachment::Local {
            uri: "file:///tmp/me.jpg".to_string(),
            is_image: true,
        });

        let update = composer.update_profile("me", &draft).await.unwrap();
        let image = update.image.unwrap();
        assert!(image.starts_with("/profiles/"));
        assert_eq!(backend.profile("me").unwrap().image, Some(image));
    }
}
