use std::sync::Arc;

use super::ScreenScope;
use crate::backend::{with_timeout, Backend};
use crate::config::CoreConfig;
use crate::constants::alerts;
use crate::error::CoreResult;
use crate::events::{emit, CoreEvent, EventSender, ScreenKind};
use crate::models::Notification;
use crate::store::SharedNotifications;

/// The signed-in user's notifications, newest first.
pub struct NotificationsScreen {
    user_id: String,
    backend: Arc<dyn Backend>,
    config: CoreConfig,
    events: EventSender,
    store: SharedNotifications,
    lifecycle: ScreenScope,
}

impl NotificationsScreen {
    /// Opening the screen resets the unread badge on `store`, then loads
    /// the list.
    pub async fn mount(
        user_id: &str,
        store: SharedNotifications,
        backend: Arc<dyn Backend>,
        config: &CoreConfig,
        events: EventSender,
    ) -> CoreResult<Self> {
        let screen = Self {
            user_id: user_id.to_string(),
            backend,
            config: config.clone(),
            events,
            store,
            lifecycle: ScreenScope::new(),
        };
        screen.store.borrow_mut().clear_badge();
        emit(&screen.events, CoreEvent::NotificationBadge { unread: 0 });
        screen.refresh().await?;
        Ok(screen)
    }

    pub async fn refresh(&self) -> CoreResult<()> {
        self.lifecycle.ensure_alive()?;
        let result = with_timeout(
            "fetch_notifications",
            self.config.fetch_timeout(),
            self.backend.fetch_notifications(&self.user_id),
        )
        .await;
        self.lifecycle.ensure_alive()?;

        let notifications = result.map_err(|err| {
            if let Some(alert) = err.alert(alerts::ERROR_TITLE) {
                emit(&self.events, CoreEvent::Alert(alert));
            }
            err
        })?;
        tracing::debug!("Loaded {} notifications", notifications.len());
        self.store.borrow_mut().replace(notifications);
        emit(
            &self.events,
            CoreEvent::FeedChanged {
                screen: ScreenKind::Notifications,
            },
        );
        Ok(())
    }

    pub fn items(&self) -> Vec<Notification> {
        self.store.borrow().items().to_vec()
    }

    pub fn unmount(&self) {
        self.lifecycle.close();
    }
}
