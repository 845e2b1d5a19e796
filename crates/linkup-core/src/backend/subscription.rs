use std::sync::Arc;
use std::time::Duration;

use super::{Backend, ChangeFeed, ChangeReceiver, SubscribeRequest};
use crate::config::ReconnectConfig;
use crate::error::CoreResult;
use crate::models::RawChange;

/// Exponential backoff between resubscribe attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    multiplier: u32,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_backoff_ms),
            max: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
            multiplier: config.multiplier.max(1),
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, or None once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max_attempts) = self.max_attempts {
            if self.attempt >= max_attempts {
                return None;
            }
        }
        let factor = self.multiplier.saturating_pow(self.attempt);
        let delay = self.initial.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    Change(RawChange),
    /// The channel dropped and was re-established; changes may have been
    /// missed in between.
    Resubscribed,
}

/// Live realtime channel owned by one screen.
///
/// `next` is cancel-safe while connected. Cancelling it during a reconnect
/// only restarts the pending backoff.
pub struct Subscription<F: ChangeFeed + ?Sized = dyn Backend> {
    feed: Arc<F>,
    request: SubscribeRequest,
    rx: Option<ChangeReceiver>,
    policy: ReconnectPolicy,
}

impl<F: ChangeFeed + ?Sized> Subscription<F> {
    pub async fn open(
        feed: Arc<F>,
        request: SubscribeRequest,
        policy: ReconnectPolicy,
    ) -> CoreResult<Self> {
        let rx = feed.subscribe_changes(&request).await?;
        tracing::debug!(
            "Subscribed to {} (filter: {:?})",
            request.table,
            request.filter_expr()
        );
        Ok(Self {
            feed,
            request,
            rx: Some(rx),
            policy,
        })
    }

    pub fn request(&self) -> &SubscribeRequest {
        &self.request
    }

    /// Next change, reconnecting with backoff when the channel drops.
    /// Returns None once the reconnect policy gives up.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        loop {
            if let Some(rx) = self.rx.as_mut() {
                if let Some(change) = rx.recv().await {
                    self.policy.reset();
                    return Some(SubscriptionEvent::Change(change));
                }
                tracing::warn!("Realtime channel on {} dropped", self.request.table);
                self.rx = None;
            }

            let Some(delay) = self.policy.next_delay() else {
                tracing::error!(
                    "Giving up on {} after {} reconnect attempts",
                    self.request.table,
                    self.policy.attempts()
                );
                return None;
            };
            tokio::time::sleep(delay).await;

            match self.feed.subscribe_changes(&self.request).await {
                Ok(rx) => {
                    tracing::info!(
                        "Resubscribed to {} after {} attempt(s)",
                        self.request.table,
                        self.policy.attempts()
                    );
                    self.rx = Some(rx);
                    return Some(SubscriptionEvent::Resubscribed);
                }
                Err(e) => {
                    tracing::warn!("Resubscribe to {} failed: {}", self.request.table, e);
                }
            }
        }
    }

    /// Release the channel so the backend stops delivering to it
    pub fn unsubscribe(mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
        tracing::debug!("Unsubscribed from {}", self.request.table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};
    use crate::models::Table;
    use serde_json::json;

    fn fast_policy(max_attempts: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy::from_config(&ReconnectConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            multiplier: 2,
            max_attempts,
        })
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut policy = ReconnectPolicy::from_config(&ReconnectConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            multiplier: 2,
            max_attempts: Some(5),
        });
        let delays: Vec<u64> = std::iter::from_fn(|| policy.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_delivers_matching_changes() {
        let backend = Arc::new(MemoryBackend::new());
        let mut sub = Subscription::open(
            backend.clone(),
            SubscribeRequest::all(Table::Posts),
            fast_policy(None),
        )
        .await
        .unwrap();

        backend.publish(RawChange::insert(Table::Comments, json!({"id": 1, "postId": 1})));
        backend.publish(RawChange::insert(Table::Posts, json!({"id": 2})));

        match sub.next().await {
            Some(SubscriptionEvent::Change(change)) => {
                assert_eq!(change.row_id(), Some("2".to_string()))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resubscribes_after_drop() {
        let backend = Arc::new(MemoryBackend::new());
        let mut sub = Subscription::open(
            backend.clone(),
            SubscribeRequest::all(Table::Posts),
            fast_policy(None),
        )
        .await
        .unwrap();

        backend.drop_connections();
        assert_eq!(sub.next().await, Some(SubscriptionEvent::Resubscribed));
        assert_eq!(backend.live_subscriptions(), 1);

        backend.publish(RawChange::insert(Table::Posts, json!({"id": 3})));
        assert!(matches!(sub.next().await, Some(SubscriptionEvent::Change(_))));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let backend = Arc::new(MemoryBackend::new());
        let mut sub = Subscription::open(
            backend.clone(),
            SubscribeRequest::all(Table::Posts),
            fast_policy(Some(2)),
        )
        .await
        .unwrap();

        backend.fail(Operation::Subscribe);
        backend.drop_connections();
        assert_eq!(sub.next().await, None);
        // initial subscribe + two failed retries
        assert_eq!(backend.call_count(Operation::Subscribe), 3);
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_channel() {
        let backend = Arc::new(MemoryBackend::new());
        let sub = Subscription::open(
            backend.clone(),
            SubscribeRequest::all(Table::Posts),
            fast_policy(None),
        )
        .await
        .unwrap();
        assert_eq!(backend.live_subscriptions(), 1);

        sub.unsubscribe();
        assert_eq!(backend.live_subscriptions(), 0);
    }
}
