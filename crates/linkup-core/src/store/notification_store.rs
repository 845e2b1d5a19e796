use std::collections::HashSet;

use crate::models::{ChangeKind, Notification, RawChange, Table};

/// Notifications for the signed-in user plus the unread badge count.
pub struct NotificationStore {
    items: Vec<Notification>,
    /// Ids already counted, so a redelivered insert does not bump the badge
    seen: HashSet<String>,
    unread: u32,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            unread: 0,
        }
    }

    // ===== Getters =====

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    // ===== Mutations =====

    /// Count a realtime notification insert. Returns whether the badge moved.
    pub fn handle_change(&mut self, change: &RawChange) -> bool {
        if change.kind != ChangeKind::Insert
            || Table::from_name(&change.table) != Some(Table::Notifications)
        {
            return false;
        }
        let Some(id) = change.row_id() else {
            tracing::warn!("Notification insert without id");
            return false;
        };
        if !self.seen.insert(id) {
            return false;
        }

        if let Some(notification) = change.new.as_ref().and_then(Notification::from_value) {
            self.add_item(notification);
        }
        self.unread += 1;
        true
    }

    /// Replace the list with a fetched one, newest first
    pub fn replace(&mut self, notifications: Vec<Notification>) {
        self.items.clear();
        for notification in notifications {
            self.seen.insert(notification.id.clone());
            self.add_item(notification);
        }
    }

    pub fn clear_badge(&mut self) {
        self.unread = 0;
    }

    fn add_item(&mut self, notification: Notification) {
        if self.items.iter().any(|n| n.id == notification.id) {
            return;
        }
        let pos = self
            .items
            .partition_point(|n| n.created_at > notification.created_at);
        self.items.insert(pos, notification);
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}
