use std::fmt;

use uuid::Uuid;

use crate::models::Item;

/// Correlation id of an optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Uuid);

impl MutationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Local change predicted for a user action
#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    LikeAdd { post_id: String, user_id: String },
    LikeRemove { post_id: String, user_id: String },
    CommentAdd { placeholder: Item },
    CommentRemove { comment_id: String },
    PostDelete { post_id: String },
}

impl MutationKind {
    /// Id of the item the mutation touches
    pub fn target_id(&self) -> &str {
        match self {
            MutationKind::LikeAdd { post_id, .. }
            | MutationKind::LikeRemove { post_id, .. }
            | MutationKind::PostDelete { post_id } => post_id,
            MutationKind::CommentAdd { placeholder } => &placeholder.id,
            MutationKind::CommentRemove { comment_id } => comment_id,
        }
    }
}

/// Prior state captured before the optimistic change was applied
#[derive(Debug, Clone, PartialEq)]
pub enum Rollback {
    /// Not captured yet, or nothing left to restore
    Nothing,
    /// Restore one user's membership in a likes set
    LikeMembership {
        post_id: String,
        user_id: String,
        was_member: bool,
    },
    RemovePlaceholder { id: String },
    /// Put a removed item back where it was
    Reinsert { index: usize, item: Item },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Confirmed,
    RolledBack,
}

impl MutationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MutationState::Pending)
    }
}

/// Server outcome passed to `FeedStore::confirm`
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResult {
    Ack,
    /// Stored comment carrying the authoritative id
    Comment(Item),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub rollback: Rollback,
    state: MutationState,
}

impl PendingMutation {
    pub fn new(kind: MutationKind) -> Self {
        Self {
            id: MutationId::new(),
            kind,
            rollback: Rollback::Nothing,
            state: MutationState::Pending,
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Move to a terminal state. Returns false if already terminal.
    pub(crate) fn finish(&mut self, state: MutationState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }
}
