use std::collections::{HashMap, HashSet};

use super::mutation::{MutationId, MutationKind, MutationState, PendingMutation, Rollback, ServerResult};
use super::pagination::PaginationCursor;
use crate::error::{CoreError, CoreResult};
use crate::models::{ChangeEvent, Item};

/// Result of merging one page response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub returned: usize,
    /// Items the store did not hold when the page was requested
    pub added: usize,
    pub more_available: bool,
}

/// Ordered, duplicate-free list of posts or comments for one screen.
///
/// Merges page responses, realtime changes and optimistic mutations. Every
/// entry point is keyed by id, so repeated or reordered delivery of the same
/// input leaves the list unchanged.
pub struct FeedStore {
    /// Newest first. Realtime inserts go to the front regardless of timestamp.
    items: Vec<Item>,
    pending: HashMap<MutationId, PendingMutation>,
    cursor: PaginationCursor,
    /// Ids held when the in-flight page was requested. Refreshes and
    /// realtime inserts that land while it is in flight do not count
    /// against that page.
    page_baseline: Option<HashSet<String>>,
    loaded: bool,
}

impl FeedStore {
    pub fn new(page_increment: usize) -> Self {
        Self {
            items: Vec::new(),
            pending: HashMap::new(),
            cursor: PaginationCursor::new(page_increment),
            page_baseline: None,
            loaded: false,
        }
    }

    // ===== Getters =====

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn more_available(&self) -> bool {
        self.cursor.more_available()
    }

    pub fn is_pending(&self, id: &MutationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ===== Pagination =====

    /// Window size for the next fetch, None when exhausted or already fetching
    pub fn request_next(&mut self) -> Option<usize> {
        let limit = self.cursor.request_next()?;
        self.page_baseline = Some(self.items.iter().map(|i| i.id.clone()).collect());
        Some(limit)
    }

    pub fn fail_page(&mut self) {
        self.page_baseline = None;
        self.cursor.fail();
    }

    /// Apply the response to the in-flight page request.
    ///
    /// The first page replaces the list. Later pages merge by id. The
    /// collection counts as exhausted when the server returned fewer rows
    /// than the window asked for, or when nothing in the page was new at
    /// the time it was requested.
    pub fn apply_page(&mut self, page: Vec<Item>) -> PageOutcome {
        let requested = self.cursor.requested();
        let returned = page.len();
        let baseline = self
            .page_baseline
            .take()
            .unwrap_or_else(|| self.items.iter().map(|i| i.id.clone()).collect());
        let added = page
            .iter()
            .map(|i| i.id.as_str())
            .filter(|id| !baseline.contains(*id))
            .collect::<HashSet<_>>()
            .len();
        self.merge_window(page);

        let exhausted = returned < requested || added == 0;
        self.cursor.complete(exhausted);
        tracing::debug!(
            "Applied page: requested={} returned={} added={} exhausted={}",
            requested,
            returned,
            added,
            exhausted
        );

        PageOutcome {
            returned,
            added,
            more_available: self.cursor.more_available(),
        }
    }

    /// Merge a refreshed window without touching the cursor.
    /// Returns how many items were new.
    pub fn merge_window(&mut self, page: Vec<Item>) -> usize {
        if !self.loaded {
            self.loaded = true;
            return self.replace(page);
        }

        let mut added = 0;
        for incoming in page {
            match self.position(&incoming.id) {
                Some(index) => Self::refresh_item(&self.pending, &mut self.items[index], incoming),
                None => {
                    self.insert_by_time(incoming);
                    added += 1;
                }
            }
        }
        added
    }

    /// Load a collection that is not paginated (comments of one post)
    pub fn load_all(&mut self, items: Vec<Item>) {
        self.replace(items);
        self.loaded = true;
        self.cursor.complete(true);
    }

    fn replace(&mut self, page: Vec<Item>) -> usize {
        self.items.clear();
        for item in page {
            if !self.contains(&item.id) {
                self.items.push(item);
            }
        }
        self.items.len()
    }

    /// Insert a fetched item before the first older one
    fn insert_by_time(&mut self, item: Item) {
        let pos = self
            .items
            .iter()
            .position(|i| i.created_at < item.created_at)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    /// Take the server's copy, keeping pending like predictions on top of it
    fn refresh_item(
        pending: &HashMap<MutationId, PendingMutation>,
        existing: &mut Item,
        incoming: Item,
    ) {
        let mut likes = incoming.likes;
        for mutation in pending.values() {
            match &mutation.kind {
                MutationKind::LikeAdd { post_id, user_id } if *post_id == existing.id => {
                    likes.insert(user_id.clone());
                }
                MutationKind::LikeRemove { post_id, user_id } if *post_id == existing.id => {
                    likes.remove(user_id);
                }
                _ => {}
            }
        }

        if !incoming.author.is_empty() {
            existing.author = incoming.author;
        }
        existing.body = incoming.body;
        existing.file = incoming.file;
        existing.comment_count = incoming.comment_count;
        existing.likes = likes;
    }

    // ===== Realtime =====

    /// Apply a normalized change. Returns whether the list changed.
    pub fn apply_change_event(&mut self, event: ChangeEvent) -> bool {
        match event {
            ChangeEvent::Insert { item, .. } => {
                if self.contains(&item.id) {
                    tracing::debug!("Duplicate insert for {}, ignoring", item.id);
                    return false;
                }
                self.items.insert(0, item);
                true
            }
            ChangeEvent::Update { patch, .. } => {
                match self.items.iter_mut().find(|i| i.id == patch.id) {
                    Some(item) => {
                        item.apply_patch(&patch);
                        true
                    }
                    // Not loaded into this window
                    None => false,
                }
            }
            ChangeEvent::Delete { id, .. } => {
                self.forget_pending_reinsert(&id);
                self.remove(&id)
            }
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// The server deleted an item we removed optimistically; a later
    /// rollback must not bring it back.
    fn forget_pending_reinsert(&mut self, id: &str) {
        for mutation in self.pending.values_mut() {
            if let Rollback::Reinsert { item, .. } = &mutation.rollback {
                if item.id == id {
                    mutation.rollback = Rollback::Nothing;
                }
            }
        }
    }

    // ===== Optimistic mutations =====

    /// Apply the predicted change and record the mutation as pending.
    /// The rollback value is captured before anything is modified.
    pub fn apply_optimistic(&mut self, mut mutation: PendingMutation) -> CoreResult<MutationId> {
        if self.pending.contains_key(&mutation.id) {
            tracing::debug!("Mutation {} already applied", mutation.id);
            return Ok(mutation.id);
        }

        mutation.rollback = match &mutation.kind {
            MutationKind::LikeAdd { post_id, user_id }
            | MutationKind::LikeRemove { post_id, user_id } => {
                let adding = matches!(mutation.kind, MutationKind::LikeAdd { .. });
                let post = self
                    .items
                    .iter_mut()
                    .find(|i| i.id == *post_id)
                    .ok_or_else(|| CoreError::not_found(post_id))?;
                let was_member = post.likes.contains(user_id);
                if adding {
                    post.likes.insert(user_id.clone());
                } else {
                    post.likes.remove(user_id);
                }
                Rollback::LikeMembership {
                    post_id: post_id.clone(),
                    user_id: user_id.clone(),
                    was_member,
                }
            }
            MutationKind::CommentAdd { placeholder } => {
                if !self.contains(&placeholder.id) {
                    self.items.insert(0, placeholder.clone());
                }
                Rollback::RemovePlaceholder {
                    id: placeholder.id.clone(),
                }
            }
            MutationKind::CommentRemove { comment_id: id }
            | MutationKind::PostDelete { post_id: id } => {
                let index = self.position(id).ok_or_else(|| CoreError::not_found(id))?;
                let item = self.items.remove(index);
                Rollback::Reinsert { index, item }
            }
        };

        let id = mutation.id;
        self.pending.insert(id, mutation);
        Ok(id)
    }

    /// The server accepted the mutation. Unknown or already settled ids are
    /// ignored.
    pub fn confirm(&mut self, id: &MutationId, result: ServerResult) -> Option<PendingMutation> {
        let Some(mut mutation) = self.pending.remove(id) else {
            tracing::debug!("Ignoring confirm for settled mutation {}", id);
            return None;
        };

        match (&mutation.kind, result) {
            (MutationKind::CommentAdd { placeholder }, ServerResult::Comment(stored)) => {
                self.reconcile_placeholder(&placeholder.id, stored);
            }
            (MutationKind::CommentRemove { comment_id: id }, _)
            | (MutationKind::PostDelete { post_id: id }, _) => {
                // A refresh may have brought it back while pending
                self.remove(id);
            }
            _ => {}
        }

        mutation.finish(MutationState::Confirmed);
        Some(mutation)
    }

    /// Swap the placeholder's local id for the stored one. If realtime
    /// already delivered the stored comment, the placeholder is dropped.
    fn reconcile_placeholder(&mut self, local_id: &str, stored: Item) {
        let Some(pos) = self.position(local_id) else {
            return;
        };
        if self.contains(&stored.id) {
            self.items.remove(pos);
            return;
        }

        let placeholder = &mut self.items[pos];
        let author = if stored.author.name.is_empty() {
            placeholder.author.clone()
        } else {
            stored.author.clone()
        };
        *placeholder = Item { author, ..stored };
    }

    /// The server rejected the mutation: restore the captured state.
    /// Unknown or already settled ids are ignored.
    pub fn rollback(&mut self, id: &MutationId) -> Option<PendingMutation> {
        let Some(mut mutation) = self.pending.remove(id) else {
            tracing::debug!("Ignoring rollback for settled mutation {}", id);
            return None;
        };

        match mutation.rollback.clone() {
            Rollback::Nothing => {}
            Rollback::LikeMembership {
                post_id,
                user_id,
                was_member,
            } => {
                if let Some(post) = self.items.iter_mut().find(|i| i.id == post_id) {
                    if was_member {
                        post.likes.insert(user_id);
                    } else {
                        post.likes.remove(&user_id);
                    }
                }
            }
            Rollback::RemovePlaceholder { id } => {
                self.remove(&id);
            }
            Rollback::Reinsert { index, item } => {
                if !self.contains(&item.id) {
                    let index = index.min(self.items.len());
                    self.items.insert(index, item);
                }
            }
        }

        tracing::info!("Rolled back mutation {} ({})", mutation.id, mutation.kind.target_id());
        mutation.finish(MutationState::RolledBack);
        Some(mutation)
    }
}
