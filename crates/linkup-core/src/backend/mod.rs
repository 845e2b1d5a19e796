//! Capability contracts of the managed backend.
//!
//! The client never talks to the database, storage or realtime transport
//! directly; adapters implement these traits and the rest of the crate only
//! sees decoded models.

pub mod blob;
pub mod memory;
pub mod subscription;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::{CoreError, CoreResult};
use crate::models::row::field_id;
use crate::models::{
    ChangeKind, Item, NewComment, NewLike, NewNotification, Notification, PostDetail, PostRecord,
    ProfileUpdate, RawChange, Table, UserSummary,
};

pub use memory::MemoryBackend;
pub use subscription::{ReconnectPolicy, Subscription, SubscriptionEvent};

/// Paginated collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Owner id filters by author
    Posts,
    /// Owner id is the parent post
    Comments,
}

/// Which change kinds a channel delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Insert,
}

/// `column=eq.value` row filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub table: Table,
    pub events: EventFilter,
    pub filter: Option<RowFilter>,
}

impl SubscribeRequest {
    pub fn all(table: Table) -> Self {
        Self {
            table,
            events: EventFilter::All,
            filter: None,
        }
    }

    pub fn inserts(table: Table) -> Self {
        Self {
            table,
            events: EventFilter::Insert,
            filter: None,
        }
    }

    pub fn with_filter(mut self, column: &str, value: &str) -> Self {
        self.filter = Some(RowFilter {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Filter expression in the provider's `column=eq.value` syntax
    pub fn filter_expr(&self) -> Option<String> {
        self.filter
            .as_ref()
            .map(|f| format!("{}=eq.{}", f.column, f.value))
    }

    pub fn matches(&self, change: &RawChange) -> bool {
        if change.table != self.table.as_str() {
            return false;
        }
        if self.events == EventFilter::Insert && change.kind != ChangeKind::Insert {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) => change
                .row()
                .and_then(|row| field_id(row, &filter.column))
                .map_or(false, |value| value == filter.value),
        }
    }
}

/// Stream of raw changes. The channel closing means the connection dropped;
/// dropping the receiver releases the subscription.
pub type ChangeReceiver = UnboundedReceiver<RawChange>;

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn lookup_user(&self, user_id: &str) -> CoreResult<UserSummary>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe_changes(&self, request: &SubscribeRequest) -> CoreResult<ChangeReceiver>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file, returning its storage path
    async fn upload_blob(&self, folder: &str, local_uri: &str, is_image: bool)
        -> CoreResult<String>;

    fn resolve_blob_url(&self, path: &str) -> Option<String>;
}

/// Queries and mutations of the managed backend.
#[async_trait]
pub trait Backend: UserLookup + ChangeFeed + BlobStore {
    /// Newest-first window of at most `limit` items
    async fn fetch_page(
        &self,
        kind: ResourceKind,
        limit: usize,
        owner_id: Option<&str>,
    ) -> CoreResult<Vec<Item>>;

    async fn fetch_post_details(&self, post_id: &str) -> CoreResult<PostDetail>;

    async fn fetch_notifications(&self, receiver_id: &str) -> CoreResult<Vec<Notification>>;

    async fn insert_like(&self, like: &NewLike) -> CoreResult<()>;

    async fn delete_like(&self, post_id: &str, user_id: &str) -> CoreResult<()>;

    /// Returns the stored comment with its server-assigned id
    async fn insert_comment(&self, comment: &NewComment) -> CoreResult<Item>;

    async fn delete_comment(&self, comment_id: &str) -> CoreResult<()>;

    async fn delete_post(&self, post_id: &str) -> CoreResult<()>;

    async fn upsert_post(&self, post: &PostRecord) -> CoreResult<Item>;

    async fn insert_notification(&self, notification: &NewNotification)
        -> CoreResult<Notification>;

    async fn update_user(&self, user_id: &str, update: &ProfileUpdate) -> CoreResult<()>;
}

/// Run a backend call under a deadline
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, call: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", operation, limit);
            Err(CoreError::Timeout {
                operation: operation.to_string(),
                secs: limit.as_secs(),
            })
        }
    }
}
