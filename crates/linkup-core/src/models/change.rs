use serde_json::Value;

use super::item::{Item, ItemPatch};
use super::row::field_id;
use crate::constants::tables;

/// Backend tables the client reads or subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Posts,
    Comments,
    PostLikes,
    Notifications,
    Users,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Posts => tables::POSTS,
            Table::Comments => tables::COMMENTS,
            Table::PostLikes => tables::POST_LIKES,
            Table::Notifications => tables::NOTIFICATIONS,
            Table::Users => tables::USERS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            tables::POSTS => Some(Table::Posts),
            tables::COMMENTS => Some(Table::Comments),
            tables::POST_LIKES => Some(Table::PostLikes),
            tables::NOTIFICATIONS => Some(Table::Notifications),
            tables::USERS => Some(Table::Users),
            _ => None,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Row-level change as delivered by the realtime channel, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChange {
    pub kind: ChangeKind,
    pub table: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl RawChange {
    /// Decode a change payload (`{eventType, table, old, new}`).
    /// Empty `old`/`new` objects are treated as absent.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let kind = ChangeKind::from_name(payload.get("eventType")?.as_str()?)?;
        let table = payload.get("table")?.as_str()?.to_string();
        let row = |key: &str| {
            payload
                .get(key)
                .filter(|v| v.as_object().map_or(false, |o| !o.is_empty()))
                .cloned()
        };
        Some(Self {
            kind,
            table,
            old: row("old"),
            new: row("new"),
        })
    }

    pub fn insert(table: Table, row: Value) -> Self {
        Self {
            kind: ChangeKind::Insert,
            table: table.as_str().to_string(),
            old: None,
            new: Some(row),
        }
    }

    pub fn update(table: Table, row: Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            table: table.as_str().to_string(),
            old: None,
            new: Some(row),
        }
    }

    pub fn delete(table: Table, old: Value) -> Self {
        Self {
            kind: ChangeKind::Delete,
            table: table.as_str().to_string(),
            old: Some(old),
            new: None,
        }
    }

    /// The row a filter applies to: `new` for inserts/updates, `old` for deletes
    pub fn row(&self) -> Option<&Value> {
        match self.kind {
            ChangeKind::Delete => self.old.as_ref(),
            _ => self.new.as_ref(),
        }
    }

    pub fn row_id(&self) -> Option<String> {
        self.row().and_then(|row| field_id(row, "id"))
    }
}

/// Normalized change applied to a feed store.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert { table: Table, item: Item },
    Update { table: Table, patch: ItemPatch },
    Delete { table: Table, id: String },
}

impl ChangeEvent {
    pub fn table(&self) -> Table {
        match self {
            ChangeEvent::Insert { table, .. }
            | ChangeEvent::Update { table, .. }
            | ChangeEvent::Delete { table, .. } => *table,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Insert { item, .. } => &item.id,
            ChangeEvent::Update { patch, .. } => &patch.id,
            ChangeEvent::Delete { id, .. } => id,
        }
    }
}
