//! Keeps an in-memory entity list in step with a store collection.
//!
//! [`SyncHook`] owns the subscription and the [`SyncState`]; the board
//! flavours ([`WhiteboardSync`], [`TopicBoardSync`]) build their operations
//! on it. [`LocalTopicBoard`] is the single-device flavour with no store
//! subscription at all.

mod interaction;
mod local;
mod state;
mod topics;
mod whiteboard;

pub use interaction::{Canvas, Interaction, Point, Size};
pub use local::{LocalTopicBoard, LOCAL_TOPICS_KEY};
pub use state::SyncState;
pub use topics::TopicBoardSync;
pub use whiteboard::{BoardLayout, NoteDraft, NoteUpdate, WhiteboardSync};

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::Entity;
use crate::error::{BoardError, Result};
use crate::storage::{RemoteStore, StorePath, Subscription};

/// Subscription plus reconciled views for one collection path.
///
/// The subscription is released when the hook is dropped or closed.
pub struct SyncHook<E: Entity> {
    store: Arc<dyn RemoteStore>,
    collection: StorePath,
    subscription: Subscription,
    state: SyncState<E>,
}

impl<E: Entity> SyncHook<E> {
    /// Subscribe to `collection` and load its current contents.
    pub async fn connect(store: Arc<dyn RemoteStore>, collection: StorePath) -> Result<Self> {
        let subscription = store.subscribe(&collection).await?;
        let mut hook = Self {
            store,
            collection,
            subscription,
            state: SyncState::new(),
        };
        hook.sync_pending();
        Ok(hook)
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn collection(&self) -> &StorePath {
        &self.collection
    }

    pub fn state(&self) -> &SyncState<E> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SyncState<E> {
        &mut self.state
    }

    pub fn entity_path(&self, id: &str) -> Result<StorePath> {
        self.collection.child(id)
    }

    /// Apply every snapshot that has already arrived. Returns how many.
    pub fn sync_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(snapshot) = self.subscription.try_next() {
            self.state.apply_snapshot(&snapshot);
            applied += 1;
        }
        if applied > 0 {
            debug!(collection = %self.collection, applied, "applied snapshots");
        }
        applied
    }

    /// Wait for the next snapshot and apply it. Returns whether the local
    /// view changed.
    pub async fn next_change(&mut self) -> Result<bool> {
        match self.subscription.next().await {
            Some(snapshot) => Ok(self.state.apply_snapshot(&snapshot)),
            None => Err(BoardError::SubscriptionClosed(self.collection.to_string())),
        }
    }

    /// Error unless the latest snapshot has `id`.
    pub fn require_remote(&self, id: &str) -> Result<()> {
        match self.state.remote_entity(id) {
            Some(_) => Ok(()),
            None => Err(BoardError::EntityNotFound(id.to_string())),
        }
    }

    /// Insert a record into the collection through `transact`, so concurrent
    /// inserts from other clients are never dropped.
    pub async fn insert(&mut self, id: &str, record: Value) -> Result<()> {
        let outcome = self
            .store
            .transact(&self.collection, &mut |current| {
                insert_record(current, id, record.clone())
            })
            .await?;

        if !outcome.committed {
            return Err(BoardError::Storage(format!(
                "{} does not hold a collection",
                self.collection
            )));
        }
        self.sync_pending();
        Ok(())
    }

    /// Direct partial write of `fields` on one entity.
    pub async fn update(&mut self, id: &str, fields: Map<String, Value>) -> Result<()> {
        let path = self.entity_path(id)?;
        self.store.update(&path, fields).await?;
        self.sync_pending();
        Ok(())
    }

    /// Direct removal of one entity and everything nested under it.
    pub async fn remove(&mut self, id: &str) -> Result<()> {
        let path = self.entity_path(id)?;
        self.store.remove(&path).await?;
        self.sync_pending();
        Ok(())
    }

    /// Release the subscription now rather than on drop.
    pub async fn close(self) {
        self.store.unsubscribe(self.subscription.id()).await;
    }
}

/// Add `record` under `id` to a `{id: record}` collection value. Declines when
/// the value is something other than a collection.
pub(crate) fn insert_record(current: Value, id: &str, record: Value) -> Option<Value> {
    let mut records = match current {
        Value::Null => Map::new(),
        Value::Object(records) => records,
        _ => return None,
    };
    records.insert(id.to_string(), record);
    Some(Value::Object(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Note;
    use crate::storage::LoroStore;
    use serde_json::json;

    async fn hook(store: &Arc<LoroStore>) -> SyncHook<Note> {
        let store: Arc<dyn RemoteStore> = store.clone();
        SyncHook::connect(store, StorePath::parse("notes").unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_insert_record_into_empty_and_existing() {
        let first = insert_record(Value::Null, "a", json!({"content": "1"})).unwrap();
        let second = insert_record(first, "b", json!({"content": "2"})).unwrap();
        assert_eq!(second.as_object().unwrap().len(), 2);
        assert!(insert_record(json!("scalar"), "c", json!({})).is_none());
    }

    #[tokio::test]
    async fn test_connect_loads_existing_contents() {
        let store = Arc::new(LoroStore::in_memory());
        store
            .set(&StorePath::parse("notes/a").unwrap(), json!({"content": "hello"}))
            .await
            .unwrap();

        let hook = hook(&store).await;
        assert_eq!(hook.state().local().len(), 1);
        assert_eq!(hook.state().local()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_create_and_delete_sequence_matches_store() {
        let store = Arc::new(LoroStore::in_memory());
        let mut hook = hook(&store).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let id = store.allocate_key(hook.collection());
            hook.insert(&id, Note::text(&id, format!("note {}", i)).encode())
                .await
                .unwrap();
            ids.push(id);
        }
        hook.remove(&ids[1]).await.unwrap();
        hook.remove(&ids[3]).await.unwrap();

        let remote = store.get(hook.collection()).await.unwrap();
        let decoded: Vec<Note> = crate::entity::decode_collection(&remote);
        assert_eq!(hook.state().local(), decoded.as_slice());
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].content, "note 0");
        assert_eq!(decoded[2].content, "note 4");
    }

    #[tokio::test]
    async fn test_other_client_writes_arrive_via_next_change() {
        let store = Arc::new(LoroStore::in_memory());
        let mut hook = hook(&store).await;

        store
            .set(&StorePath::parse("notes/x").unwrap(), json!({"content": "remote"}))
            .await
            .unwrap();

        assert!(hook.next_change().await.unwrap());
        assert_eq!(hook.state().local()[0].content, "remote");
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let store = Arc::new(LoroStore::in_memory());
        let hook = hook(&store).await;
        hook.close().await;

        // Nothing left to notify; the write still succeeds.
        store
            .set(&StorePath::parse("notes/x").unwrap(), json!({"content": "x"}))
            .await
            .unwrap();
    }
}
