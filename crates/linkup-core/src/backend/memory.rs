//! In-process backend used for previews and tests.
//!
//! Keeps tables in memory, records how often each operation ran, and can be
//! told to fail operations or to hold page fetches until released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Semaphore;

use super::blob::{public_url, storage_path};
use super::{
    Backend, BlobStore, ChangeFeed, ChangeReceiver, ResourceKind, SubscribeRequest, UserLookup,
};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::row::{now_millis, saturating_count};
use crate::models::{
    Item, ItemKind, NewComment, NewLike, NewNotification, Notification, NotificationPayload,
    PostDetail, PostRecord, ProfileUpdate, RawChange, UserSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchPage,
    FetchPostDetails,
    FetchNotifications,
    LookupUser,
    Subscribe,
    UploadBlob,
    InsertLike,
    DeleteLike,
    InsertComment,
    DeleteComment,
    DeletePost,
    UpsertPost,
    InsertNotification,
    UpdateUser,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, UserSummary>,
    /// Newest first
    posts: Vec<Item>,
    comments: Vec<Item>,
    notifications: Vec<Notification>,
    profiles: HashMap<String, ProfileUpdate>,
    blobs: Vec<String>,
    subscribers: Vec<(SubscribeRequest, UnboundedSender<RawChange>)>,
    calls: HashMap<Operation, usize>,
    failing: HashSet<Operation>,
    /// Lookups suspend once before answering
    slow_lookups: bool,
    next_id: u64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("srv-{}", self.next_id)
    }

    fn author(&self, user_id: &str) -> UserSummary {
        self.users.get(user_id).cloned().unwrap_or_else(|| UserSummary {
            id: user_id.to_string(),
            ..UserSummary::default()
        })
    }
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    storage_public_url: String,
    storage_bucket: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::from_config(&CoreConfig {
            storage_public_url: "http://localhost:54321".to_string(),
            ..CoreConfig::default()
        })
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fetch_gate: Mutex::new(None),
            storage_public_url: config.storage_public_url.clone(),
            storage_bucket: config.storage_bucket.clone(),
        }
    }

    // ===== Seeding =====

    pub fn add_user(&self, user: UserSummary) {
        self.state.lock().users.insert(user.id.clone(), user);
    }

    /// Store a post, keeping the table sorted newest first
    pub fn add_post(&self, post: Item) {
        let mut state = self.state.lock();
        let pos = state
            .posts
            .partition_point(|p| p.created_at > post.created_at);
        state.posts.insert(pos, post);
    }

    pub fn add_comment(&self, comment: Item) {
        let mut state = self.state.lock();
        let pos = state
            .comments
            .partition_point(|c| c.created_at > comment.created_at);
        state.comments.insert(pos, comment);
    }

    pub fn add_notification(&self, notification: Notification) {
        self.state.lock().notifications.insert(0, notification);
    }

    // ===== Fault injection =====

    pub fn fail(&self, op: Operation) {
        self.state.lock().failing.insert(op);
    }

    pub fn recover(&self, op: Operation) {
        self.state.lock().failing.remove(&op);
    }

    /// Make page and detail fetches wait for a permit on the returned
    /// semaphore. Each fetch consumes one permit.
    pub fn hold_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.fetch_gate.lock() = Some(gate.clone());
        gate
    }

    /// Make user lookups yield to the runtime before answering, the way a
    /// network round trip would.
    pub fn slow_lookups(&self) {
        self.state.lock().slow_lookups = true;
    }

    // ===== Realtime =====

    /// Deliver a change to every live subscriber whose request matches.
    /// Returns how many subscribers received it.
    pub fn publish(&self, change: RawChange) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state
            .subscribers
            .iter()
            .filter(|(request, _)| request.matches(&change))
            .filter(|(_, tx)| tx.send(change.clone()).is_ok())
            .count()
    }

    pub fn live_subscriptions(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    /// Simulate the realtime connection dropping
    pub fn drop_connections(&self) {
        self.state.lock().subscribers.clear();
    }

    // ===== Inspection =====

    pub fn call_count(&self, op: Operation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn post(&self, post_id: &str) -> Option<Item> {
        self.state.lock().posts.iter().find(|p| p.id == post_id).cloned()
    }

    pub fn comments_for(&self, post_id: &str) -> Vec<Item> {
        self.state
            .lock()
            .comments
            .iter()
            .filter(|c| c.post_id() == Some(post_id))
            .cloned()
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    pub fn profile(&self, user_id: &str) -> Option<ProfileUpdate> {
        self.state.lock().profiles.get(user_id).cloned()
    }

    pub fn blobs(&self) -> Vec<String> {
        self.state.lock().blobs.clone()
    }

    /// Count the call and fail it if the operation is marked failing
    fn begin(&self, op: Operation) -> CoreResult<()> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        if state.failing.contains(&op) {
            return Err(CoreError::network(format!("{:?} failed", op)));
        }
        Ok(())
    }

    async fn wait_for_gate(&self) -> CoreResult<()> {
        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| CoreError::network("fetch gate closed"))?;
            permit.forget();
        }
        Ok(())
    }

    fn with_author(&self, mut item: Item) -> Item {
        let state = self.state.lock();
        item.author = state.author(&item.user_id);
        if item.kind == ItemKind::Post {
            item.comment_count = saturating_count(
                state
                    .comments
                    .iter()
                    .filter(|c| c.post_id() == Some(item.id.as_str()))
                    .count(),
            );
        }
        item
    }
}

#[async_trait]
impl UserLookup for MemoryBackend {
    async fn lookup_user(&self, user_id: &str) -> CoreResult<UserSummary> {
        self.begin(Operation::LookupUser)?;
        let slow = self.state.lock().slow_lookups;
        if slow {
            tokio::task::yield_now().await;
        }
        self.state
            .lock()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(user_id))
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe_changes(&self, request: &SubscribeRequest) -> CoreResult<ChangeReceiver> {
        self.begin(Operation::Subscribe)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().subscribers.push((request.clone(), tx));
        Ok(rx)
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload_blob(
        &self,
        folder: &str,
        local_uri: &str,
        is_image: bool,
    ) -> CoreResult<String> {
        self.begin(Operation::UploadBlob)?;
        if local_uri.is_empty() {
            return Err(CoreError::network("Uploading file failed"));
        }
        let path = storage_path(folder, is_image, now_millis());
        self.state.lock().blobs.push(path.clone());
        Ok(path)
    }

    fn resolve_blob_url(&self, path: &str) -> Option<String> {
        public_url(&self.storage_public_url, &self.storage_bucket, path)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_page(
        &self,
        kind: ResourceKind,
        limit: usize,
        owner_id: Option<&str>,
    ) -> CoreResult<Vec<Item>> {
        self.begin(Operation::FetchPage)?;
        self.wait_for_gate().await?;

        let rows: Vec<Item> = {
            let state = self.state.lock();
            match kind {
                ResourceKind::Posts => state
                    .posts
                    .iter()
                    .filter(|p| owner_id.map_or(true, |owner| p.user_id == owner))
                    .take(limit)
                    .cloned()
                    .collect(),
                ResourceKind::Comments => state
                    .comments
                    .iter()
                    .filter(|c| owner_id.map_or(true, |post| c.post_id() == Some(post)))
                    .take(limit)
                    .cloned()
                    .collect(),
            }
        };
        Ok(rows.into_iter().map(|item| self.with_author(item)).collect())
    }

    async fn fetch_post_details(&self, post_id: &str) -> CoreResult<PostDetail> {
        self.begin(Operation::FetchPostDetails)?;
        self.wait_for_gate().await?;

        let post = self.post(post_id).ok_or_else(|| CoreError::not_found(post_id))?;
        let comments: Vec<Item> = self
            .comments_for(post_id)
            .into_iter()
            .map(|c| self.with_author(c))
            .collect();
        let mut post = self.with_author(post);
        post.comment_count = saturating_count(comments.len());
        Ok(PostDetail { post, comments })
    }

    async fn fetch_notifications(&self, receiver_id: &str) -> CoreResult<Vec<Notification>> {
        self.begin(Operation::FetchNotifications)?;
        let state = self.state.lock();
        let mut notifications: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.receiver_id == receiver_id)
            .cloned()
            .map(|mut n| {
                n.sender = state.author(&n.sender_id);
                n
            })
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn insert_like(&self, like: &NewLike) -> CoreResult<()> {
        self.begin(Operation::InsertLike)?;
        let mut state = self.state.lock();
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == like.post_id)
            .ok_or_else(|| CoreError::not_found(&like.post_id))?;
        post.likes.insert(like.user_id.clone());
        Ok(())
    }

    async fn delete_like(&self, post_id: &str, user_id: &str) -> CoreResult<()> {
        self.begin(Operation::DeleteLike)?;
        let mut state = self.state.lock();
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            post.likes.remove(user_id);
        }
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> CoreResult<Item> {
        self.begin(Operation::InsertComment)?;
        let mut state = self.state.lock();
        let stored = Item {
            id: state.allocate_id(),
            kind: ItemKind::Comment {
                post_id: comment.post_id.clone(),
            },
            user_id: comment.user_id.clone(),
            author: state.author(&comment.user_id),
            created_at: now_millis(),
            body: comment.text.clone(),
            file: None,
            likes: Default::default(),
            comment_count: 0,
        };
        state.comments.insert(0, stored.clone());
        Ok(stored)
    }

    async fn delete_comment(&self, comment_id: &str) -> CoreResult<()> {
        self.begin(Operation::DeleteComment)?;
        self.state.lock().comments.retain(|c| c.id != comment_id);
        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> CoreResult<()> {
        self.begin(Operation::DeletePost)?;
        self.state.lock().posts.retain(|p| p.id != post_id);
        Ok(())
    }

    async fn upsert_post(&self, record: &PostRecord) -> CoreResult<Item> {
        self.begin(Operation::UpsertPost)?;
        let mut state = self.state.lock();

        if let Some(id) = &record.id {
            if let Some(existing) = state.posts.iter_mut().find(|p| &p.id == id) {
                existing.body = record.body.clone();
                existing.file = record.file.clone();
                return Ok(existing.clone());
            }
        }

        let id = match &record.id {
            Some(id) => id.clone(),
            None => state.allocate_id(),
        };
        let post = Item {
            id,
            kind: ItemKind::Post,
            user_id: record.user_id.clone(),
            author: state.author(&record.user_id),
            created_at: now_millis(),
            body: record.body.clone(),
            file: record.file.clone(),
            likes: Default::default(),
            comment_count: 0,
        };
        state.posts.insert(0, post.clone());
        Ok(post)
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> CoreResult<Notification> {
        self.begin(Operation::InsertNotification)?;
        let mut state = self.state.lock();
        let stored = Notification {
            id: state.allocate_id(),
            sender_id: notification.sender_id.clone(),
            receiver_id: notification.receiver_id.clone(),
            sender: state.author(&notification.sender_id),
            title: notification.title.clone(),
            created_at: now_millis(),
            payload: NotificationPayload::parse(&notification.data),
        };
        state.notifications.insert(0, stored.clone());
        Ok(stored)
    }

    async fn update_user(&self, user_id: &str, update: &ProfileUpdate) -> CoreResult<()> {
        self.begin(Operation::UpdateUser)?;
        let mut state = self.state.lock();
        if let Some(user) = state.users.get_mut(user_id) {
            user.name = update.name.clone();
            user.image = update.image.clone();
        }
        state.profiles.insert(user_id.to_string(), update.clone());
        Ok(())
    }
}
