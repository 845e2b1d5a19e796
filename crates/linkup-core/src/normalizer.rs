//! Turns raw realtime rows into `ChangeEvent`s a feed store can apply.

use crate::backend::UserLookup;
use crate::error::CoreError;
use crate::models::{ChangeEvent, ChangeKind, Item, ItemPatch, RawChange, Table, UserSummary};

/// Normalize a change on `posts` or `comments`.
///
/// Returns None for rows without an id and for tables that do not feed a
/// store. Inserts are enriched with the author's summary; a failed lookup
/// leaves an empty author instead of dropping the event.
pub async fn normalize_change<L>(raw: &RawChange, lookup: &L) -> Option<ChangeEvent>
where
    L: UserLookup + ?Sized,
{
    let Some(table) = Table::from_name(&raw.table) else {
        tracing::debug!("Ignoring change on unknown table {}", raw.table);
        return None;
    };
    if !matches!(table, Table::Posts | Table::Comments) {
        tracing::debug!("Ignoring change on {}: not an item table", table);
        return None;
    }

    match raw.kind {
        ChangeKind::Insert => {
            let row = raw.new.as_ref()?;
            let Some(mut item) = Item::from_table_row(table, row) else {
                tracing::debug!("Ignoring {} insert without id", table);
                return None;
            };
            if item.author.name.is_empty() && !item.user_id.is_empty() {
                item.author = enrich_author(lookup, &item.user_id).await;
            }
            Some(ChangeEvent::Insert { table, item })
        }
        ChangeKind::Update => {
            let Some(patch) = raw
                .new
                .as_ref()
                .and_then(|row| ItemPatch::from_value(table, row))
            else {
                tracing::debug!("Ignoring {} update without id", table);
                return None;
            };
            Some(ChangeEvent::Update { table, patch })
        }
        ChangeKind::Delete => {
            let Some(id) = raw.old.as_ref().and(raw.row_id()) else {
                tracing::debug!("Ignoring {} delete without id", table);
                return None;
            };
            Some(ChangeEvent::Delete { table, id })
        }
    }
}

async fn enrich_author<L>(lookup: &L, user_id: &str) -> UserSummary
where
    L: UserLookup + ?Sized,
{
    match lookup.lookup_user(user_id).await {
        Ok(author) => author,
        Err(e) => {
            let err = CoreError::Enrichment {
                message: format!("author {}: {}", user_id, e),
            };
            tracing::warn!("{}, using placeholder", err);
            UserSummary::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreResult;
    use async_trait::async_trait;
    use serde_json::json;

    struct Directory {
        reachable: bool,
    }

    #[async_trait]
    impl UserLookup for Directory {
        async fn lookup_user(&self, user_id: &str) -> CoreResult<UserSummary> {
            if self.reachable {
                Ok(UserSummary::new(user_id, "Ada"))
            } else {
                Err(CoreError::network("users unreachable"))
            }
        }
    }

    const ONLINE: Directory = Directory { reachable: true };
    const OFFLINE: Directory = Directory { reachable: false };

    #[tokio::test]
    async fn test_insert_is_enriched() {
        let raw = RawChange::insert(Table::Posts, json!({"id": 1, "userId": "u1", "body": "hi"}));
        match normalize_change(&raw, &ONLINE).await {
            Some(ChangeEvent::Insert { item, .. }) => {
                assert_eq!(item.author.name, "Ada");
                assert!(item.likes.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_the_insert() {
        let raw = RawChange::insert(Table::Posts, json!({"id": 1, "userId": "u1"}));
        match normalize_change(&raw, &OFFLINE).await {
            Some(ChangeEvent::Insert { item, .. }) => {
                assert_eq!(item.id, "1");
                assert!(item.author.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insert_without_id_is_ignored() {
        let raw = RawChange::insert(Table::Posts, json!({"userId": "u1"}));
        assert_eq!(normalize_change(&raw, &ONLINE).await, None);
    }

    #[tokio::test]
    async fn test_update_carries_only_present_fields() {
        let raw = RawChange::update(Table::Posts, json!({"id": 4, "body": "edited"}));
        match normalize_change(&raw, &ONLINE).await {
            Some(ChangeEvent::Update { patch, .. }) => {
                assert_eq!(patch.body.as_deref(), Some("edited"));
                assert_eq!(patch.file, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_requires_old_row() {
        let raw = RawChange::delete(Table::Comments, json!({"id": 8}));
        assert_eq!(
            normalize_change(&raw, &ONLINE).await,
            Some(ChangeEvent::Delete {
                table: Table::Comments,
                id: "8".to_string()
            })
        );

        let mut missing = raw.clone();
        missing.old = None;
        assert_eq!(normalize_change(&missing, &ONLINE).await, None);
    }

    #[tokio::test]
    async fn test_notification_rows_are_not_items() {
        let raw = RawChange::insert(Table::Notifications, json!({"id": 1}));
        assert_eq!(normalize_change(&raw, &ONLINE).await, None);
    }
}
