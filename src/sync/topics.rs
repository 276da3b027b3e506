use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use super::SyncHook;
use crate::config::TopicOrder;
use crate::entity::{display_timestamp, Entity, Topic, TopicNote};
use crate::error::{BoardError, Result};
use crate::storage::{RemoteStore, StorePath};

/// Topics with their notes, kept in sync with one store collection.
pub struct TopicBoardSync {
    hook: SyncHook<Topic>,
    order: TopicOrder,
}

impl TopicBoardSync {
    pub async fn connect(
        store: Arc<dyn RemoteStore>,
        collection: StorePath,
        order: TopicOrder,
    ) -> Result<Self> {
        let hook = SyncHook::connect(store, collection).await?;
        Ok(Self { hook, order })
    }

    /// Topics in display order.
    pub fn topics(&self) -> Vec<&Topic> {
        let topics = self.hook.state().local().iter();
        match self.order {
            TopicOrder::Insertion => topics.collect(),
            TopicOrder::NewestFirst => topics.rev().collect(),
        }
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.hook.state().local_entity(id)
    }

    pub fn hook(&self) -> &SyncHook<Topic> {
        &self.hook
    }

    pub fn sync_pending(&mut self) -> usize {
        self.hook.sync_pending()
    }

    pub async fn next_change(&mut self) -> Result<bool> {
        self.hook.next_change().await
    }

    pub async fn add_topic(&mut self, title: &str) -> Result<Topic> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::Validation("topic title is empty".to_string()));
        }

        let topic = Topic {
            id: self.hook.store().allocate_key(self.hook.collection()),
            title: title.to_string(),
            created_at: display_timestamp(),
            notes: Vec::new(),
        };

        self.hook.insert(&topic.id, topic.encode()).await?;
        info!(id = %topic.id, title = %topic.title, "created topic");
        Ok(topic)
    }

    /// Remove a topic and every note in it.
    pub async fn delete_topic(&mut self, id: &str) -> Result<()> {
        self.hook.require_remote(id)?;
        self.hook.remove(id).await?;
        info!(id, "deleted topic");
        Ok(())
    }

    /// Append a note to a topic. Fails with `EntityNotFound` if the topic is
    /// gone by the time the write lands, rather than recreating it.
    pub async fn add_note(&mut self, topic_id: &str, content: &str) -> Result<TopicNote> {
        if content.trim().is_empty() {
            return Err(BoardError::Validation("note is empty".to_string()));
        }

        let topic_path = self.hook.entity_path(topic_id)?;
        let notes_path = topic_path.child("notes")?;
        let note = TopicNote {
            id: self.hook.store().allocate_key(&notes_path),
            content: content.to_string(),
            timestamp: display_timestamp(),
        };
        let record = note.encode();

        let outcome = self
            .hook
            .store()
            .transact(&topic_path, &mut |current| {
                let Value::Object(mut topic) = current else {
                    return None;
                };
                let notes = match topic.remove("notes") {
                    Some(Value::Object(notes)) => notes,
                    _ => Map::new(),
                };
                let notes = super::insert_record(Value::Object(notes), &note.id, record.clone())?;
                topic.insert("notes".to_string(), notes);
                Some(Value::Object(topic))
            })
            .await?;

        if !outcome.committed {
            return Err(BoardError::EntityNotFound(topic_id.to_string()));
        }
        self.hook.sync_pending();
        info!(topic = topic_id, id = %note.id, "added note");
        Ok(note)
    }

    pub async fn delete_note(&mut self, topic_id: &str, note_id: &str) -> Result<()> {
        let exists = self
            .hook
            .state()
            .remote_entity(topic_id)
            .is_some_and(|t| t.note(note_id).is_some());
        if !exists {
            return Err(BoardError::EntityNotFound(note_id.to_string()));
        }

        let path = self
            .hook
            .entity_path(topic_id)?
            .join(&format!("notes/{}", note_id))?;
        self.hook.store().remove(&path).await?;
        self.hook.sync_pending();
        info!(topic = topic_id, id = note_id, "deleted note");
        Ok(())
    }

    pub async fn close(self) {
        self.hook.close().await;
    }
}
