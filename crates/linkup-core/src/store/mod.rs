//! Per-screen stores. Screens share them as `Rc<RefCell<_>>` on the UI task.

pub mod feed_store;
pub mod mutation;
pub mod notification_store;
pub mod pagination;

use std::cell::RefCell;
use std::rc::Rc;

pub use feed_store::{FeedStore, PageOutcome};
pub use mutation::{MutationId, MutationKind, MutationState, PendingMutation, Rollback, ServerResult};
pub use notification_store::NotificationStore;
pub use pagination::PaginationCursor;

pub type SharedFeed = Rc<RefCell<FeedStore>>;

pub fn shared_feed(page_increment: usize) -> SharedFeed {
    Rc::new(RefCell::new(FeedStore::new(page_increment)))
}

/// Owned by the home feed, which counts inserts; the notifications screen
/// lists and clears through the same store.
pub type SharedNotifications = Rc<RefCell<NotificationStore>>;

pub fn shared_notifications() -> SharedNotifications {
    Rc::new(RefCell::new(NotificationStore::new()))
}
