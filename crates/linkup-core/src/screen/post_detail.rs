//! One post with its comments.

use std::sync::Arc;

use futures::FutureExt;

use super::{next_event, report_lost_channel, Backlog, Claim, Received, ScreenScope, Slot};
use crate::backend::{
    with_timeout, Backend, ReconnectPolicy, SubscribeRequest, Subscription, SubscriptionEvent,
};
use crate::config::CoreConfig;
use crate::constants::alerts;
use crate::error::{CoreError, CoreResult};
use crate::events::{emit, CoreEvent, EventSender, ScreenKind};
use crate::models::{ChangeEvent, Item, PostDetail, Table, UserSummary};
use crate::normalizer::normalize_change;
use crate::optimistic::MutationCoordinator;
use crate::store::{shared_feed, SharedFeed};

pub struct PostDetailScreen {
    post_id: String,
    /// Comment to scroll to when opened from a notification
    highlight: Option<String>,
    user: UserSummary,
    backend: Arc<dyn Backend>,
    config: CoreConfig,
    events: EventSender,
    /// Holds the single post, so likes and deletes share the feed machinery
    post: SharedFeed,
    comments: SharedFeed,
    mutations: MutationCoordinator,
    lifecycle: ScreenScope,
    channel: Slot<Option<Subscription>>,
    backlog: Backlog<SubscriptionEvent>,
}

impl PostDetailScreen {
    pub async fn mount(
        post_id: &str,
        highlight: Option<String>,
        user: UserSummary,
        backend: Arc<dyn Backend>,
        config: &CoreConfig,
        events: EventSender,
    ) -> CoreResult<Self> {
        let screen = Self {
            post_id: post_id.to_string(),
            highlight,
            user,
            post: shared_feed(1),
            comments: shared_feed(config.page_increment),
            mutations: MutationCoordinator::new(
                backend.clone(),
                events.clone(),
                config.mutation_timeout(),
            ),
            backend,
            config: config.clone(),
            events,
            lifecycle: ScreenScope::new(),
            channel: Slot::empty(),
            backlog: Backlog::new(),
        };

        let subscription = Subscription::open(
            screen.backend.clone(),
            SubscribeRequest::inserts(Table::Comments).with_filter("postId", post_id),
            ReconnectPolicy::from_config(&screen.config.reconnect),
        )
        .await?;
        screen.channel.put(Some(subscription));

        let detail = screen.fetch_detail().await.map_err(|err| {
            if let Some(alert) = err.alert(alerts::POST_TITLE) {
                emit(&screen.events, CoreEvent::Alert(alert));
            }
            err
        })?;
        screen.post.borrow_mut().load_all(vec![detail.post]);
        screen.comments.borrow_mut().load_all(detail.comments);
        screen.changed();
        Ok(screen)
    }

    async fn fetch_detail(&self) -> CoreResult<PostDetail> {
        let result = with_timeout(
            "fetch_post_details",
            self.config.fetch_timeout(),
            self.backend.fetch_post_details(&self.post_id),
        )
        .await;
        self.lifecycle.ensure_alive()?;
        result
    }

    // ===== Getters =====

    pub fn post(&self) -> Option<Item> {
        self.post.borrow().get(&self.post_id).cloned()
    }

    /// Newest first
    pub fn comments(&self) -> Vec<Item> {
        self.comments.borrow().items().to_vec()
    }

    pub fn highlight(&self) -> Option<&str> {
        self.highlight.as_deref()
    }

    /// Comment authors and the post owner may delete a comment
    pub fn can_delete_comment(&self, comment: &Item) -> bool {
        if comment.user_id == self.user.id {
            return true;
        }
        self.post
            .borrow()
            .get(&self.post_id)
            .map_or(false, |post| post.user_id == self.user.id)
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle.is_alive()
    }

    // ===== Realtime =====

    /// Wait for the next new comment and apply it. Returns Ok(false) once
    /// the channel is gone. Safe to cancel at any await.
    pub async fn pump(&self) -> CoreResult<bool> {
        match self.receive().await? {
            Received::Event(claim) => {
                self.apply(claim).await?;
                Ok(true)
            }
            Received::Lost => Ok(true),
            Received::Idle => Ok(false),
        }
    }

    /// Apply the comments already queued without waiting for new ones
    pub async fn pump_ready(&self) -> usize {
        let mut handled = 0;
        loop {
            let Some(Ok(received)) = self.receive().now_or_never() else {
                break;
            };
            match received {
                Received::Event(claim) => {
                    if self.apply(claim).await.is_err() {
                        break;
                    }
                }
                Received::Lost => {}
                Received::Idle => break,
            }
            handled += 1;
        }
        handled
    }

    async fn receive(&self) -> CoreResult<Received<'_, SubscriptionEvent>> {
        self.lifecycle.ensure_alive()?;
        if let Some(claim) = self.backlog.take(&self.lifecycle) {
            return Ok(Received::Event(claim));
        }
        let Some(mut guard) = self.channel.take(&self.lifecycle) else {
            return Ok(Received::Idle);
        };
        let Some(channel) = guard.get_mut() else {
            return Ok(Received::Idle);
        };
        if channel.is_none() {
            return Ok(Received::Idle);
        }

        let event = tokio::select! {
            biased;
            _ = self.lifecycle.closed() => return Err(CoreError::Unmounted),
            event = next_event(channel) => event,
        };

        let Some(event) = event else {
            if let Some(subscription) = channel.take() {
                report_lost_channel(&self.events, subscription.request().table);
                subscription.unsubscribe();
            }
            return Ok(Received::Lost);
        };
        Ok(Received::Event(self.backlog.claim(&self.lifecycle, event)))
    }

    async fn apply(&self, claim: Claim<'_, SubscriptionEvent>) -> CoreResult<()> {
        let result = self.handle(claim.event()).await;
        claim.finish();
        result
    }

    async fn handle(&self, event: &SubscriptionEvent) -> CoreResult<()> {
        match event {
            SubscriptionEvent::Change(raw) => {
                let Some(event) = normalize_change(raw, self.backend.as_ref()).await else {
                    return Ok(());
                };
                self.lifecycle.ensure_alive()?;
                self.apply_comment(event);
                Ok(())
            }
            SubscriptionEvent::Resubscribed => self.refresh().await,
        }
    }

    fn apply_comment(&self, event: ChangeEvent) {
        if let ChangeEvent::Insert { item, .. } = &event {
            if item.post_id() != Some(self.post_id.as_str()) {
                tracing::debug!("Ignoring comment {} for another post", item.id);
                return;
            }
        }
        if self.comments.borrow_mut().apply_change_event(event) {
            self.changed();
        }
    }

    async fn refresh(&self) -> CoreResult<()> {
        let detail = self.fetch_detail().await?;
        self.post.borrow_mut().merge_window(vec![detail.post]);
        let added = self.comments.borrow_mut().merge_window(detail.comments);
        tracing::info!("Refreshed post {}, {} missed comments", self.post_id, added);
        self.changed();
        Ok(())
    }

    // ===== Mutations =====

    pub async fn toggle_like(&self) -> CoreResult<bool> {
        self.lifecycle.ensure_alive()?;
        self.mutations
            .toggle_like(&self.post, ScreenKind::PostDetail, &self.post_id, &self.user.id)
            .await
    }

    pub async fn add_comment(&self, text: &str) -> CoreResult<Item> {
        self.lifecycle.ensure_alive()?;
        let post = self
            .post()
            .ok_or_else(|| CoreError::not_found(&self.post_id))?;
        self.mutations
            .add_comment(&self.comments, &post, &self.user, text)
            .await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> CoreResult<()> {
        self.lifecycle.ensure_alive()?;
        let comment = self
            .comments
            .borrow()
            .get(comment_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(comment_id))?;
        if !self.can_delete_comment(&comment) {
            return Err(self.deny(alerts::CANNOT_DELETE_COMMENT, alerts::ERROR_TITLE));
        }
        self.mutations.delete_comment(&self.comments, comment_id).await
    }

    /// Delete the post. On success `CoreEvent::PostDeleted` tells the shell
    /// to close the screen.
    pub async fn delete_post(&self) -> CoreResult<()> {
        self.lifecycle.ensure_alive()?;
        let post = self
            .post()
            .ok_or_else(|| CoreError::not_found(&self.post_id))?;
        if post.user_id != self.user.id {
            return Err(self.deny(alerts::CANNOT_DELETE_POST, alerts::POST_TITLE));
        }
        self.mutations
            .delete_post(&self.post, ScreenKind::PostDetail, &self.post_id)
            .await
    }

    fn deny(&self, message: &str, title: &str) -> CoreError {
        let err = CoreError::validation(message);
        if let Some(alert) = err.alert(title) {
            emit(&self.events, CoreEvent::Alert(alert));
        }
        err
    }

    // ===== Lifecycle =====

    pub fn unmount(&self) {
        if !self.lifecycle.close() {
            return;
        }
        self.channel.release();
        self.backlog.clear();
        tracing::debug!("Unmounted detail screen for post {}", self.post_id);
    }

    fn changed(&self) {
        emit(
            &self.events,
            CoreEvent::FeedChanged {
                screen: ScreenKind::PostDetail,
            },
        );
    }
}

impl Drop for PostDetailScreen {
    fn drop(&mut self) {
        self.unmount();
    }
}
