//! Screens: each owns its stores and realtime channels from mount to unmount.
//!
//! A screen lives on the UI task. The shell calls `pump` (or `pump_ready`
//! between frames) to feed realtime changes into the stores, and drains
//! `CoreEvent`s to know what to redraw. Unmounting releases every channel
//! and makes in-flight fetches discard their responses.
//!
//! Applying an event may await an author lookup or a refetch. A received
//! event sits in the screen's `Backlog` until it has been applied, so a
//! pump dropped halfway through loses nothing.

pub mod feed;
pub mod notifications;
pub mod post_detail;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use tokio::sync::watch;

use crate::backend::{Backend, Subscription, SubscriptionEvent};
use crate::constants::alerts;
use crate::error::{CoreError, CoreResult};
use crate::events::{emit, CoreEvent, EventSender};
use crate::models::Table;
use crate::store::SharedFeed;

pub use feed::{FeedScope, FeedScreen};
pub use notifications::NotificationsScreen;
pub use post_detail::PostDetailScreen;

/// Mounted/unmounted flag plus a signal that wakes pending pumps on unmount
pub(crate) struct ScreenScope {
    alive: Cell<bool>,
    shutdown: watch::Sender<bool>,
}

impl ScreenScope {
    pub(crate) fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            alive: Cell::new(true),
            shutdown,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub(crate) fn ensure_alive(&self) -> CoreResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(CoreError::Unmounted)
        }
    }

    /// Returns false if the screen was already closed
    pub(crate) fn close(&self) -> bool {
        if !self.alive.replace(false) {
            return false;
        }
        self.shutdown.send_replace(true);
        true
    }

    /// Resolves once the screen is unmounted
    pub(crate) async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Something that must be torn down explicitly when its screen goes away
pub(crate) trait Release {
    fn release(self);
}

impl Release for Subscription<dyn Backend> {
    fn release(self) {
        self.unsubscribe();
    }
}

impl<T: Release> Release for Option<T> {
    fn release(self) {
        if let Some(inner) = self {
            inner.release();
        }
    }
}

/// Holder for a screen's channels.
///
/// A pump takes the value out for the duration of an await and the guard
/// puts it back on drop, or releases it when the screen unmounted meanwhile.
/// No `RefCell` borrow is held across an await.
pub(crate) struct Slot<T: Release> {
    value: RefCell<Option<T>>,
}

impl<T: Release> Slot<T> {
    pub(crate) fn empty() -> Self {
        Self {
            value: RefCell::new(None),
        }
    }

    pub(crate) fn put(&self, value: T) {
        if let Some(previous) = self.value.replace(Some(value)) {
            previous.release();
        }
    }

    /// None while another pump holds the value, or after release
    pub(crate) fn take<'a>(&'a self, scope: &'a ScreenScope) -> Option<SlotGuard<'a, T>> {
        let value = self.value.borrow_mut().take()?;
        Some(SlotGuard {
            slot: self,
            scope,
            value: Some(value),
        })
    }

    pub(crate) fn release(&self) {
        let value = self.value.borrow_mut().take();
        value.release();
    }
}

pub(crate) struct SlotGuard<'a, T: Release> {
    slot: &'a Slot<T>,
    scope: &'a ScreenScope,
    value: Option<T>,
}

impl<T: Release> SlotGuard<'_, T> {
    pub(crate) fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }
}

impl<T: Release> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        if self.scope.is_alive() {
            *self.slot.value.borrow_mut() = Some(value);
        } else {
            value.release();
        }
    }
}

/// Events taken off a channel whose apply has not completed
pub(crate) struct Backlog<E: Clone> {
    queue: RefCell<VecDeque<E>>,
}

impl<E: Clone> Backlog<E> {
    pub(crate) fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// Oldest event left behind by an interrupted pump
    pub(crate) fn take<'a>(&'a self, scope: &'a ScreenScope) -> Option<Claim<'a, E>> {
        let event = self.queue.borrow_mut().pop_front()?;
        Some(self.claim(scope, event))
    }

    /// Track a freshly received event until it is applied
    pub(crate) fn claim<'a>(&'a self, scope: &'a ScreenScope, event: E) -> Claim<'a, E> {
        Claim {
            backlog: self,
            scope,
            event,
            finished: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub(crate) fn clear(&self) {
        self.queue.borrow_mut().clear();
    }
}

/// An event being applied. Dropped unfinished, it goes back to the front
/// of the backlog while the screen is still mounted.
pub(crate) struct Claim<'a, E: Clone> {
    backlog: &'a Backlog<E>,
    scope: &'a ScreenScope,
    event: E,
    finished: bool,
}

impl<E: Clone> Claim<'_, E> {
    pub(crate) fn event(&self) -> &E {
        &self.event
    }

    /// Applied, or failed in a way a retry would not fix
    pub(crate) fn finish(mut self) {
        self.finished = true;
    }
}

impl<E: Clone> Drop for Claim<'_, E> {
    fn drop(&mut self) {
        if self.finished || !self.scope.is_alive() {
            return;
        }
        tracing::debug!("Pump dropped while applying an event, keeping it for the next pump");
        self.backlog.queue.borrow_mut().push_front(self.event.clone());
    }
}

/// What one receive step produced
pub(crate) enum Received<'a, E: Clone> {
    Event(Claim<'a, E>),
    /// A channel gave up reconnecting and was reported
    Lost,
    /// No live channel left, or another pump holds them
    Idle,
}

/// Next event of an optional channel; pending forever once it is gone
pub(crate) async fn next_event(
    subscription: &mut Option<Subscription<dyn Backend>>,
) -> Option<SubscriptionEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

/// A channel gave up reconnecting: tell the user the list may go stale
pub(crate) fn report_lost_channel(events: &EventSender, table: Table) {
    tracing::error!("Live updates on {} lost", table);
    emit(
        events,
        CoreEvent::LiveUpdatesLost {
            table: table.to_string(),
        },
    );
    let err = CoreError::SubscriptionClosed {
        table: table.to_string(),
    };
    if let Some(alert) = err.alert(alerts::FEED_TITLE) {
        emit(events, CoreEvent::Alert(alert));
    }
}

/// Clears the pagination in-flight flag if a page request is abandoned
/// before its response was applied.
pub(crate) struct PageRequest<'a> {
    store: &'a SharedFeed,
    settled: bool,
}

impl<'a> PageRequest<'a> {
    pub(crate) fn new(store: &'a SharedFeed) -> Self {
        Self {
            store,
            settled: false,
        }
    }

    pub(crate) fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PageRequest<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(mut store) = self.store.try_borrow_mut() {
            store.fail_page();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct Tracked(Rc<Cell<u32>>);

    impl Release for Tracked {
        fn release(self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_guard_restores_while_alive() {
        let scope = ScreenScope::new();
        let released = Rc::new(Cell::new(0));
        let slot = Slot::empty();
        slot.put(Tracked(released.clone()));

        {
            let guard = slot.take(&scope);
            assert!(guard.is_some());
            // Held by the guard
            assert!(slot.take(&scope).is_none());
        }
        assert!(slot.take(&scope).is_some());
        assert_eq!(released.get(), 0);
    }

    #[test]
    fn test_guard_releases_after_close() {
        let scope = ScreenScope::new();
        let released = Rc::new(Cell::new(0));
        let slot = Slot::empty();
        slot.put(Tracked(released.clone()));

        let guard = slot.take(&scope);
        assert!(scope.close());
        assert!(!scope.close());
        slot.release();
        assert_eq!(released.get(), 0);

        drop(guard);
        assert_eq!(released.get(), 1);
        assert!(slot.take(&scope).is_none());
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let scope = ScreenScope::new();
        scope.close();
        scope.closed().await;
        assert_eq!(scope.ensure_alive(), Err(CoreError::Unmounted));
    }

    #[test]
    fn test_unfinished_claim_returns_to_front() {
        let scope = ScreenScope::new();
        let backlog = Backlog::new();
        drop(backlog.claim(&scope, 2));
        drop(backlog.claim(&scope, 1));
        assert_eq!(backlog.len(), 2);

        let claim = backlog.take(&scope).unwrap();
        assert_eq!(*claim.event(), 1);
        claim.finish();
        let claim = backlog.take(&scope).unwrap();
        assert_eq!(*claim.event(), 2);
        claim.finish();
        assert!(backlog.take(&scope).is_none());
    }

    #[test]
    fn test_claim_dropped_after_close_is_discarded() {
        let scope = ScreenScope::new();
        let backlog = Backlog::new();
        let claim = backlog.claim(&scope, "change");
        scope.close();
        drop(claim);
        assert_eq!(backlog.len(), 0);
    }

    #[test]
    fn test_abandoned_page_request_clears_in_flight() {
        let store = crate::store::shared_feed(4);
        store.borrow_mut().request_next();
        {
            let _request = PageRequest::new(&store);
        }
        assert!(!store.borrow().cursor().is_in_flight());
    }
}
