//! Home and profile feeds.

use std::sync::Arc;

use futures::FutureExt;

use super::{
    next_event, report_lost_channel, Backlog, Claim, PageRequest, Received, Release, ScreenScope,
    Slot,
};
use crate::backend::{
    with_timeout, Backend, ReconnectPolicy, ResourceKind, SubscribeRequest, Subscription,
    SubscriptionEvent,
};
use crate::config::CoreConfig;
use crate::constants::alerts;
use crate::error::{CoreError, CoreResult};
use crate::events::{emit, CoreEvent, EventSender, ScreenKind};
use crate::models::{ChangeEvent, Item, Table};
use crate::normalizer::normalize_change;
use crate::optimistic::MutationCoordinator;
use crate::store::{shared_feed, shared_notifications, PageOutcome, SharedFeed, SharedNotifications};

/// Which posts a feed shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// Everyone's posts, plus the notification badge
    Home,
    /// Posts by one user
    Profile { user_id: String },
}

impl FeedScope {
    fn owner_id(&self) -> Option<&str> {
        match self {
            FeedScope::Home => None,
            FeedScope::Profile { user_id } => Some(user_id),
        }
    }

    fn screen(&self) -> ScreenKind {
        match self {
            FeedScope::Home => ScreenKind::Home,
            FeedScope::Profile { .. } => ScreenKind::Profile,
        }
    }
}

struct FeedChannels {
    posts: Option<Subscription>,
    /// Home only
    notifications: Option<Subscription>,
}

impl Release for FeedChannels {
    fn release(self) {
        self.posts.release();
        self.notifications.release();
    }
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Posts,
    Notifications,
}

type Incoming = (Source, SubscriptionEvent);

pub struct FeedScreen {
    scope: FeedScope,
    /// Signed-in user
    user_id: String,
    backend: Arc<dyn Backend>,
    config: CoreConfig,
    events: EventSender,
    store: SharedFeed,
    notifications: SharedNotifications,
    mutations: MutationCoordinator,
    lifecycle: ScreenScope,
    channels: Slot<FeedChannels>,
    backlog: Backlog<Incoming>,
}

impl FeedScreen {
    /// Subscribe to post changes, then load the first page.
    ///
    /// Subscribing first means nothing committed between the fetch and the
    /// subscription is missed. A failed first page is reported and can be
    /// retried with `load_more`.
    pub async fn mount(
        scope: FeedScope,
        user_id: &str,
        backend: Arc<dyn Backend>,
        config: &CoreConfig,
        events: EventSender,
    ) -> CoreResult<Self> {
        let screen = Self {
            store: shared_feed(config.page_increment),
            notifications: shared_notifications(),
            mutations: MutationCoordinator::new(
                backend.clone(),
                events.clone(),
                config.mutation_timeout(),
            ),
            scope,
            user_id: user_id.to_string(),
            backend,
            config: config.clone(),
            events,
            lifecycle: ScreenScope::new(),
            channels: Slot::empty(),
            backlog: Backlog::new(),
        };

        let policy = ReconnectPolicy::from_config(&screen.config.reconnect);
        let posts = Subscription::open(
            screen.backend.clone(),
            SubscribeRequest::all(Table::Posts),
            policy.clone(),
        )
        .await?;
        let notifications = match screen.scope {
            FeedScope::Home => Some(
                Subscription::open(
                    screen.backend.clone(),
                    SubscribeRequest::inserts(Table::Notifications)
                        .with_filter("receiverId", &screen.user_id),
                    policy,
                )
                .await?,
            ),
            FeedScope::Profile { .. } => None,
        };
        screen.channels.put(FeedChannels {
            posts: Some(posts),
            notifications,
        });

        if let Err(e) = screen.load_more().await {
            tracing::warn!("First page failed for {:?}: {}", screen.scope, e);
        }
        Ok(screen)
    }

    // ===== Getters =====

    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    pub fn items(&self) -> Vec<Item> {
        self.store.borrow().items().to_vec()
    }

    pub fn store(&self) -> SharedFeed {
        self.store.clone()
    }

    pub fn more_available(&self) -> bool {
        self.store.borrow().more_available()
    }

    /// Hand this to `NotificationsScreen::mount` so opening it clears the badge
    pub fn notifications(&self) -> SharedNotifications {
        self.notifications.clone()
    }

    pub fn unread_notifications(&self) -> u32 {
        self.notifications.borrow().unread()
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle.is_alive()
    }

    // ===== Pagination =====

    /// End-of-list trigger. Returns None when nothing was fetched because
    /// the feed is exhausted or a page is already in flight.
    pub async fn load_more(&self) -> CoreResult<Option<PageOutcome>> {
        self.lifecycle.ensure_alive()?;
        let Some(limit) = self.store.borrow_mut().request_next() else {
            return Ok(None);
        };
        let request = PageRequest::new(&self.store);

        tracing::debug!("Fetching {:?} window of {}", self.scope, limit);
        let result = with_timeout(
            "fetch_page",
            self.config.fetch_timeout(),
            self.backend
                .fetch_page(ResourceKind::Posts, limit, self.scope.owner_id()),
        )
        .await;
        if !self.lifecycle.is_alive() {
            tracing::debug!("Dropping page response for unmounted {:?} feed", self.scope);
            return Err(CoreError::Unmounted);
        }

        match result {
            Ok(page) => {
                let outcome = self.store.borrow_mut().apply_page(page);
                request.settle();
                self.changed();
                Ok(Some(outcome))
            }
            Err(err) => {
                self.store.borrow_mut().fail_page();
                request.settle();
                if let Some(alert) = err.alert(alerts::FEED_TITLE) {
                    emit(&self.events, CoreEvent::Alert(alert));
                }
                Err(err)
            }
        }
    }

    /// Refetch the current window after a reconnect. Missed inserts and
    /// edits merge in by id; the cursor is left alone.
    async fn refresh(&self) -> CoreResult<()> {
        let limit = self
            .store
            .borrow()
            .cursor()
            .requested()
            .max(self.config.page_increment);
        let result = with_timeout(
            "fetch_page",
            self.config.fetch_timeout(),
            self.backend
                .fetch_page(ResourceKind::Posts, limit, self.scope.owner_id()),
        )
        .await;
        self.lifecycle.ensure_alive()?;

        let page = result.map_err(|e| {
            tracing::warn!("Refresh after reconnect failed: {}", e);
            e
        })?;
        let added = self.store.borrow_mut().merge_window(page);
        tracing::info!("Refreshed {:?} feed, {} missed posts", self.scope, added);
        self.changed();
        Ok(())
    }

    // ===== Realtime =====

    /// Wait for the next realtime event and apply it.
    ///
    /// Returns Ok(false) when the screen has no live channel left. Safe to
    /// cancel: the channels go back to the screen, and an event whose apply
    /// was interrupted is applied first by the next pump.
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

    /// Apply every event already queued. Receiving never waits, but the
    /// lookups and refetches those events need are awaited. Returns how
    /// many were handled.
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

    /// Take the next event, from the backlog first
    async fn receive(&self) -> CoreResult<Received<'_, Incoming>> {
        self.lifecycle.ensure_alive()?;
        if let Some(claim) = self.backlog.take(&self.lifecycle) {
            return Ok(Received::Event(claim));
        }
        let Some(mut guard) = self.channels.take(&self.lifecycle) else {
            return Ok(Received::Idle);
        };
        let Some(channels) = guard.get_mut() else {
            return Ok(Received::Idle);
        };
        if channels.posts.is_none() && channels.notifications.is_none() {
            return Ok(Received::Idle);
        }

        let (source, event) = tokio::select! {
            biased;
            _ = self.lifecycle.closed() => return Err(CoreError::Unmounted),
            event = next_event(&mut channels.posts) => (Source::Posts, event),
            event = next_event(&mut channels.notifications) => (Source::Notifications, event),
        };

        let Some(event) = event else {
            let lost = match source {
                Source::Posts => channels.posts.take(),
                Source::Notifications => channels.notifications.take(),
            };
            if let Some(subscription) = lost {
                report_lost_channel(&self.events, subscription.request().table);
                subscription.unsubscribe();
            }
            return Ok(Received::Lost);
        };
        Ok(Received::Event(self.backlog.claim(&self.lifecycle, (source, event))))
    }

    async fn apply(&self, claim: Claim<'_, Incoming>) -> CoreResult<()> {
        let (source, event) = claim.event();
        let result = self.handle(*source, event).await;
        claim.finish();
        result
    }

    async fn handle(&self, source: Source, event: &SubscriptionEvent) -> CoreResult<()> {
        match (source, event) {
            (Source::Posts, SubscriptionEvent::Change(raw)) => {
                let Some(event) = normalize_change(raw, self.backend.as_ref()).await else {
                    return Ok(());
                };
                self.lifecycle.ensure_alive()?;
                self.apply_change(event);
                Ok(())
            }
            (Source::Posts, SubscriptionEvent::Resubscribed) => self.refresh().await,
            (Source::Notifications, SubscriptionEvent::Change(raw)) => {
                let unread = {
                    let mut notifications = self.notifications.borrow_mut();
                    notifications
                        .handle_change(raw)
                        .then(|| notifications.unread())
                };
                if let Some(unread) = unread {
                    emit(&self.events, CoreEvent::NotificationBadge { unread });
                }
                Ok(())
            }
            // Only the count matters here and missed inserts cannot be recounted
            (Source::Notifications, SubscriptionEvent::Resubscribed) => Ok(()),
        }
    }

    fn apply_change(&self, event: ChangeEvent) {
        if let (FeedScope::Profile { user_id }, ChangeEvent::Insert { item, .. }) =
            (&self.scope, &event)
        {
            if item.user_id != *user_id {
                return;
            }
        }
        if self.store.borrow_mut().apply_change_event(event) {
            self.changed();
        }
    }

    pub fn clear_notification_badge(&self) {
        self.notifications.borrow_mut().clear_badge();
        emit(&self.events, CoreEvent::NotificationBadge { unread: 0 });
    }

    // ===== Mutations =====

    pub async fn toggle_like(&self, post_id: &str) -> CoreResult<bool> {
        self.lifecycle.ensure_alive()?;
        self.mutations
            .toggle_like(&self.store, self.scope.screen(), post_id, &self.user_id)
            .await
    }

    /// Delete one of the signed-in user's posts
    pub async fn delete_post(&self, post_id: &str) -> CoreResult<()> {
        self.lifecycle.ensure_alive()?;
        let owner = self.store.borrow().get(post_id).map(|p| p.user_id.clone());
        match owner {
            None => return Err(CoreError::not_found(post_id)),
            Some(owner) if owner != self.user_id => {
                let err = CoreError::validation(alerts::CANNOT_DELETE_POST);
                if let Some(alert) = err.alert(alerts::POST_TITLE) {
                    emit(&self.events, CoreEvent::Alert(alert));
                }
                return Err(err);
            }
            Some(_) => {}
        }
        self.mutations
            .delete_post(&self.store, self.scope.screen(), post_id)
            .await
    }

    // ===== Lifecycle =====

    /// Release the realtime channels. Fetches still in flight discard their
    /// responses.
    pub fn unmount(&self) {
        if !self.lifecycle.close() {
            return;
        }
        self.channels.release();
        self.backlog.clear();
        tracing::debug!("Unmounted {:?} feed", self.scope);
    }

    fn changed(&self) {
        emit(
            &self.events,
            CoreEvent::FeedChanged {
                screen: self.scope.screen(),
            },
        );
    }
}

impl Drop for FeedScreen {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};
    use crate::config::ReconnectConfig;
    use crate::models::{ItemKind, RawChange, UserSummary};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    fn post(id: &str, user_id: &str, created_at: u64) -> Item {
        Item {
            id: id.to_string(),
            kind: ItemKind::Post,
            user_id: user_id.to_string(),
            author: UserSummary::default(),
            created_at,
            body: format!("post {}", id),
            file: None,
            likes: BTreeSet::new(),
            comment_count: 0,
        }
    }

    fn test_config() -> CoreConfig {
        CoreConfig {
            reconnect: ReconnectConfig {
                initial_backoff_ms: 1,
                max_backoff_ms: 4,
                multiplier: 2,
                max_attempts: Some(3),
            },
            ..CoreConfig::default()
        }
    }

    fn seeded_backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user(UserSummary::new("me", "Me"));
        backend.add_user(UserSummary::new("u1", "U1"));
        backend.add_post(post("A", "u1", 40));
        backend.add_post(post("B", "me", 30));
        backend.add_post(post("C", "u1", 20));
        backend.add_post(post("D", "me", 10));
        backend
    }

    async fn mount(
        backend: &Arc<MemoryBackend>,
        scope: FeedScope,
    ) -> (FeedScreen, Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel();
        let screen = FeedScreen::mount(scope, "me", backend.clone(), &test_config(), tx)
            .await
            .unwrap();
        (screen, rx)
    }

    fn ids(screen: &FeedScreen) -> Vec<String> {
        screen.items().into_iter().map(|i| i.id).collect()
    }

    fn post_row(id: &str, user_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "userId": user_id,
            "body": "fresh",
            "created_at": "2024-05-01T10:00:00+00:00"
        })
    }

    #[tokio::test]
    async fn test_realtime_insert_lands_on_top_of_first_page() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        assert_eq!(ids(&screen), vec!["A", "B", "C", "D"]);

        assert_eq!(backend.publish(RawChange::insert(Table::Posts, post_row("E", "u1"))), 1);
        assert!(screen.pump().await.unwrap());

        assert_eq!(ids(&screen), vec!["E", "A", "B", "C", "D"]);
        let top = &screen.items()[0];
        assert_eq!(top.author.name, "U1");
        assert!(top.likes.is_empty());
        assert_eq!(top.comment_count, 0);
    }

    #[tokio::test]
    async fn test_redelivered_insert_does_not_duplicate() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;

        backend.publish(RawChange::insert(Table::Posts, post_row("E", "u1")));
        backend.publish(RawChange::insert(Table::Posts, post_row("E", "u1")));
        assert_eq!(screen.pump_ready().await, 2);
        assert_eq!(ids(&screen), vec!["E", "A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_realtime_update_and_delete() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;

        backend.publish(RawChange::update(
            Table::Posts,
            json!({"id": "B", "body": "edited"}),
        ));
        backend.publish(RawChange::delete(Table::Posts, json!({"id": "C"})));
        backend.publish(RawChange::delete(Table::Posts, json!({"id": "Z"})));
        assert_eq!(screen.pump_ready().await, 3);

        assert_eq!(ids(&screen), vec!["A", "B", "D"]);
        assert_eq!(screen.items()[1].body, "edited");
    }

    #[tokio::test]
    async fn test_rapid_end_of_list_triggers_fetch_once() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        assert_eq!(backend.call_count(Operation::FetchPage), 1);

        let gate = backend.hold_fetches();
        let release = async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        };
        let (a, b, c, d, e, _) = tokio::join!(
            screen.load_more(),
            screen.load_more(),
            screen.load_more(),
            screen.load_more(),
            screen.load_more(),
            release
        );

        let issued = [a, b, c, d, e]
            .into_iter()
            .filter(|r| matches!(r, Ok(Some(_))))
            .count();
        assert_eq!(issued, 1);
        assert_eq!(backend.call_count(Operation::FetchPage), 2);
    }

    #[tokio::test]
    async fn test_pagination_stops_when_exhausted() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        assert!(screen.more_available());

        let outcome = screen.load_more().await.unwrap().unwrap();
        assert_eq!(outcome.added, 0);
        assert!(!screen.more_available());

        assert_eq!(screen.load_more().await.unwrap(), None);
        assert_eq!(backend.call_count(Operation::FetchPage), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_feed_open() {
        let backend = seeded_backend();
        let (screen, rx) = mount(&backend, FeedScope::Home).await;
        backend.fail(Operation::FetchPage);

        assert!(screen.load_more().await.is_err());
        assert!(screen.more_available());
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, CoreEvent::Alert(ref a) if a.title == "Feed")));

        backend.recover(Operation::FetchPage);
        assert!(screen.load_more().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unmount_releases_subscriptions() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        assert_eq!(backend.live_subscriptions(), 2);

        screen.unmount();
        assert_eq!(backend.live_subscriptions(), 0);
        assert_eq!(
            backend.publish(RawChange::insert(Table::Posts, post_row("E", "u1"))),
            0
        );
        assert_eq!(screen.pump().await, Err(CoreError::Unmounted));
        assert_eq!(ids(&screen), vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_dropping_screen_releases_subscriptions() {
        let backend = seeded_backend();
        {
            let (_screen, _rx) = mount(&backend, FeedScope::Home).await;
            assert_eq!(backend.live_subscriptions(), 2);
        }
        assert_eq!(backend.live_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_unmount_wakes_waiting_pump() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;

        let unmount = async {
            tokio::task::yield_now().await;
            screen.unmount();
        };
        let (pumped, _) = tokio::join!(screen.pump(), unmount);
        assert_eq!(pumped, Err(CoreError::Unmounted));
        assert_eq!(backend.live_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_page_arriving_after_unmount_is_dropped() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        backend.add_post(post("F", "u1", 50));

        let gate = backend.hold_fetches();
        let unmount = async {
            tokio::task::yield_now().await;
            screen.unmount();
            gate.add_permits(1);
        };
        let (result, _) = tokio::join!(screen.load_more(), unmount);

        assert_eq!(result, Err(CoreError::Unmounted));
        assert_eq!(ids(&screen), vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_reconnect_refetches_missed_posts() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;

        backend.drop_connections();
        backend.add_post(post("N", "u1", 60));

        assert!(screen.pump().await.unwrap());
        assert_eq!(ids(&screen), vec!["N", "A", "B", "C", "D"]);
        assert_eq!(backend.call_count(Operation::FetchPage), 2);

        // Second pump re-establishes the notification channel
        assert!(screen.pump().await.unwrap());
        assert_eq!(backend.live_subscriptions(), 2);
    }

    #[tokio::test]
    async fn test_insert_survives_slow_author_lookup() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        backend.slow_lookups();

        backend.publish(RawChange::insert(Table::Posts, post_row("E", "u1")));
        assert_eq!(screen.pump_ready().await, 1);
        assert_eq!(ids(&screen), vec!["E", "A", "B", "C", "D"]);
        assert_eq!(screen.items()[0].author.name, "U1");

        // Dropped mid-lookup, the next pump picks the insert up again
        backend.publish(RawChange::insert(Table::Posts, post_row("F", "u1")));
        assert!(screen.pump().now_or_never().is_none());
        assert_eq!(ids(&screen), vec!["E", "A", "B", "C", "D"]);
        assert!(screen.pump().await.unwrap());
        assert_eq!(ids(&screen), vec!["F", "E", "A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_cancelled_pump_keeps_resubscribe_refresh() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        backend.drop_connections();
        backend.add_post(post("N", "u1", 60));

        let gate = backend.hold_fetches();
        let first = tokio::time::timeout(Duration::from_millis(50), screen.pump()).await;
        assert!(first.is_err());
        assert_eq!(ids(&screen), vec!["A", "B", "C", "D"]);

        gate.add_permits(1);
        assert!(screen.pump().await.unwrap());
        assert_eq!(ids(&screen), vec!["N", "A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_refresh_during_page_fetch_keeps_pagination_open() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user(UserSummary::new("u1", "U1"));
        for n in 0..12u64 {
            backend.add_post(post(&format!("p{:02}", n), "u1", 100 - n));
        }
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;
        assert_eq!(screen.items().len(), 4);

        let page_gate = backend.hold_fetches();
        backend.drop_connections();
        let reconnect = async {
            // The page fetch already waits on `page_gate`; let the refresh through
            let refresh_gate = backend.hold_fetches();
            refresh_gate.add_permits(1);
            assert!(screen.pump().await.unwrap());
            assert_eq!(screen.items().len(), 8);
            page_gate.add_permits(1);
            refresh_gate
        };
        let (page, refresh_gate) = tokio::join!(screen.load_more(), reconnect);

        assert_eq!(
            page.unwrap(),
            Some(PageOutcome {
                returned: 8,
                added: 4,
                more_available: true,
            })
        );
        refresh_gate.add_permits(1);
        screen.load_more().await.unwrap();
        assert_eq!(screen.items().len(), 12);
    }

    #[tokio::test]
    async fn test_gave_up_channel_is_reported() {
        let backend = seeded_backend();
        let (screen, rx) = mount(&backend, FeedScope::Profile {
            user_id: "me".to_string(),
        })
        .await;

        backend.fail(Operation::Subscribe);
        backend.drop_connections();
        assert!(screen.pump().await.unwrap());
        assert!(!screen.pump().await.unwrap());

        let lost = rx
            .try_iter()
            .any(|e| e == CoreEvent::LiveUpdatesLost { table: "posts".to_string() });
        assert!(lost);
    }

    #[tokio::test]
    async fn test_notification_insert_bumps_badge() {
        let backend = seeded_backend();
        let (screen, rx) = mount(&backend, FeedScope::Home).await;

        let mine = json!({"id": 1, "senderId": "u1", "receiverId": "me", "title": "commented on your post"});
        let theirs = json!({"id": 2, "senderId": "me", "receiverId": "u1", "title": "commented on your post"});
        assert_eq!(backend.publish(RawChange::insert(Table::Notifications, mine)), 1);
        assert_eq!(backend.publish(RawChange::insert(Table::Notifications, theirs)), 0);

        assert_eq!(screen.pump_ready().await, 1);
        assert_eq!(screen.unread_notifications(), 1);
        assert!(rx
            .try_iter()
            .any(|e| e == CoreEvent::NotificationBadge { unread: 1 }));

        screen.clear_notification_badge();
        assert_eq!(screen.unread_notifications(), 0);
    }

    #[tokio::test]
    async fn test_profile_feed_only_shows_owner_posts() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Profile {
            user_id: "me".to_string(),
        })
        .await;
        assert_eq!(ids(&screen), vec!["B", "D"]);
        assert!(!screen.more_available());
        assert_eq!(backend.live_subscriptions(), 1);

        backend.publish(RawChange::insert(Table::Posts, post_row("X", "u1")));
        backend.publish(RawChange::insert(Table::Posts, post_row("Y", "me")));
        assert_eq!(screen.pump_ready().await, 2);
        assert_eq!(ids(&screen), vec!["Y", "B", "D"]);
    }

    #[tokio::test]
    async fn test_like_and_delete_through_screen() {
        let backend = seeded_backend();
        let (screen, _rx) = mount(&backend, FeedScope::Home).await;

        assert!(screen.toggle_like("A").await.unwrap());
        assert!(backend.post("A").unwrap().is_liked_by("me"));

        let denied = screen.delete_post("A").await;
        assert_eq!(denied, Err(CoreError::validation("You can only delete your own posts")));
        assert_eq!(backend.call_count(Operation::DeletePost), 0);

        screen.delete_post("B").await.unwrap();
        assert_eq!(ids(&screen), vec!["A", "C", "D"]);
        assert!(backend.post("B").is_none());
    }
}
