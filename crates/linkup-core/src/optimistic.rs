//! Optimistic mutations: apply locally, send, then confirm or roll back.
//!
//! Every mutation follows the same sequence. The predicted change goes into
//! the screen's store and the UI is told to redraw before the request is
//! sent. The request runs under the mutation timeout; on failure the store
//! restores the captured state and an alert is raised.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{with_timeout, Backend};
use crate::constants::alerts;
use crate::error::{CoreError, CoreResult};
use crate::events::{emit, CoreEvent, EventSender, ScreenKind};
use crate::models::row::now_millis;
use crate::models::{Item, NewComment, NewLike, NewNotification, UserSummary};
use crate::store::{MutationId, MutationKind, PendingMutation, ServerResult, SharedFeed};

pub struct MutationCoordinator {
    backend: Arc<dyn Backend>,
    events: EventSender,
    timeout: Duration,
}

impl MutationCoordinator {
    pub fn new(backend: Arc<dyn Backend>, events: EventSender, timeout: Duration) -> Self {
        Self {
            backend,
            events,
            timeout,
        }
    }

    /// Like or unlike a post for `user_id`. Returns the new liked state.
    pub async fn toggle_like(
        &self,
        store: &SharedFeed,
        screen: ScreenKind,
        post_id: &str,
        user_id: &str,
    ) -> CoreResult<bool> {
        let liked = store
            .borrow()
            .get(post_id)
            .map(|post| post.is_liked_by(user_id))
            .ok_or_else(|| CoreError::not_found(post_id))?;

        let kind = if liked {
            MutationKind::LikeRemove {
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
            }
        } else {
            MutationKind::LikeAdd {
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
            }
        };
        let id = self.apply(store, screen, kind)?;

        let result = if liked {
            with_timeout(
                "delete_like",
                self.timeout,
                self.backend.delete_like(post_id, user_id),
            )
            .await
        } else {
            let like = NewLike {
                user_id: user_id.to_string(),
                post_id: post_id.to_string(),
            };
            with_timeout("insert_like", self.timeout, self.backend.insert_like(&like)).await
        };

        self.settle(store, screen, &id, result, |_| ServerResult::Ack, alerts::POST_TITLE)?;
        Ok(!liked)
    }

    /// Post a comment. A placeholder is shown at once and swapped for the
    /// stored comment when the insert returns.
    pub async fn add_comment(
        &self,
        store: &SharedFeed,
        post: &Item,
        author: &UserSummary,
        text: &str,
    ) -> CoreResult<Item> {
        let text = text.trim();
        if text.is_empty() {
            let err = CoreError::validation(alerts::EMPTY_COMMENT);
            self.alert(&err, alerts::COMMENT_TITLE);
            return Err(err);
        }

        let placeholder = Item::placeholder_comment(&post.id, author.clone(), text, now_millis());
        let id = self.apply(
            store,
            ScreenKind::PostDetail,
            MutationKind::CommentAdd { placeholder },
        )?;

        let comment = NewComment {
            user_id: author.id.clone(),
            post_id: post.id.clone(),
            text: text.to_string(),
        };
        let result = with_timeout(
            "insert_comment",
            self.timeout,
            self.backend.insert_comment(&comment),
        )
        .await;

        let stored = self.settle(
            store,
            ScreenKind::PostDetail,
            &id,
            result,
            |stored: &Item| ServerResult::Comment(stored.clone()),
            alerts::COMMENT_TITLE,
        )?;
        self.notify_author(post, &stored);
        Ok(stored)
    }

    pub async fn delete_comment(&self, store: &SharedFeed, comment_id: &str) -> CoreResult<()> {
        let id = self.apply(
            store,
            ScreenKind::PostDetail,
            MutationKind::CommentRemove {
                comment_id: comment_id.to_string(),
            },
        )?;
        let result = with_timeout(
            "delete_comment",
            self.timeout,
            self.backend.delete_comment(comment_id),
        )
        .await;
        self.settle(
            store,
            ScreenKind::PostDetail,
            &id,
            result,
            |_| ServerResult::Ack,
            alerts::ERROR_TITLE,
        )
    }

    pub async fn delete_post(
        &self,
        store: &SharedFeed,
        screen: ScreenKind,
        post_id: &str,
    ) -> CoreResult<()> {
        let id = self.apply(
            store,
            screen,
            MutationKind::PostDelete {
                post_id: post_id.to_string(),
            },
        )?;
        let result = with_timeout("delete_post", self.timeout, self.backend.delete_post(post_id)).await;
        self.settle(store, screen, &id, result, |_| ServerResult::Ack, alerts::POST_TITLE)?;

        emit(
            &self.events,
            CoreEvent::PostDeleted {
                post_id: post_id.to_string(),
            },
        );
        Ok(())
    }

    fn apply(
        &self,
        store: &SharedFeed,
        screen: ScreenKind,
        kind: MutationKind,
    ) -> CoreResult<MutationId> {
        let id = store
            .borrow_mut()
            .apply_optimistic(PendingMutation::new(kind))?;
        emit(&self.events, CoreEvent::FeedChanged { screen });
        Ok(id)
    }

    /// Confirm on success, roll back and alert on failure
    fn settle<T>(
        &self,
        store: &SharedFeed,
        screen: ScreenKind,
        id: &MutationId,
        result: CoreResult<T>,
        server_result: impl FnOnce(&T) -> ServerResult,
        title: &str,
    ) -> CoreResult<T> {
        match result {
            Ok(value) => {
                store.borrow_mut().confirm(id, server_result(&value));
                emit(&self.events, CoreEvent::FeedChanged { screen });
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("Mutation {} failed, rolling back: {}", id, err);
                store.borrow_mut().rollback(id);
                emit(&self.events, CoreEvent::FeedChanged { screen });
                self.alert(&err, title);
                Err(err)
            }
        }
    }

    fn alert(&self, err: &CoreError, title: &str) {
        if let Some(alert) = err.alert(title) {
            emit(&self.events, CoreEvent::Alert(alert));
        }
    }

    /// Tell the post author about a new comment. Runs detached: a failure
    /// is logged and never touches the comment.
    fn notify_author(&self, post: &Item, comment: &Item) {
        if post.user_id.is_empty() || post.user_id == comment.user_id {
            return;
        }

        let notification =
            NewNotification::comment(&comment.user_id, &post.user_id, &post.id, &comment.id);
        let backend = self.backend.clone();
        let limit = self.timeout;
        tokio::spawn(async move {
            let result = with_timeout(
                "insert_notification",
                limit,
                backend.insert_notification(&notification),
            )
            .await;
            if let Err(e) = result {
                tracing::warn!("Failed to notify post author: {}", e);
            }
        });
    }
}
