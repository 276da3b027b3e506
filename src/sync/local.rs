use tracing::warn;
use uuid::Uuid;

use crate::entity::{display_timestamp, Topic, TopicNote};
use crate::error::{BoardError, Result};
use crate::storage::KeyValueStore;

pub const LOCAL_TOPICS_KEY: &str = "thought-board-topics";

/// Topic board persisted on this device only, as one JSON array under
/// [`LOCAL_TOPICS_KEY`]. There is one writer, so plain read-modify-write is
/// enough here.
pub struct LocalTopicBoard<S: KeyValueStore> {
    store: S,
    topics: Vec<Topic>,
}

impl<S: KeyValueStore> LocalTopicBoard<S> {
    pub fn load(store: S) -> Result<Self> {
        let topics = match store.get(LOCAL_TOPICS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "stored topics are unreadable, starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Ok(Self { store, topics })
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    fn save(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.topics)?;
        self.store.set(LOCAL_TOPICS_KEY, &raw)
    }

    /// New topics go to the end.
    pub fn add_topic(&mut self, title: &str) -> Result<Topic> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::Validation("topic title is empty".to_string()));
        }

        let topic = Topic {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: display_timestamp(),
            notes: Vec::new(),
        };
        self.topics.push(topic.clone());
        self.save()?;
        Ok(topic)
    }

    pub fn delete_topic(&mut self, id: &str) -> Result<()> {
        let before = self.topics.len();
        self.topics.retain(|t| t.id != id);
        if self.topics.len() == before {
            return Err(BoardError::EntityNotFound(id.to_string()));
        }
        self.save()
    }

    pub fn add_note(&mut self, topic_id: &str, content: &str) -> Result<TopicNote> {
        if content.trim().is_empty() {
            return Err(BoardError::Validation("note is empty".to_string()));
        }

        let topic = self
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| BoardError::EntityNotFound(topic_id.to_string()))?;

        let note = TopicNote {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            timestamp: display_timestamp(),
        };
        topic.notes.push(note.clone());
        self.save()?;
        Ok(note)
    }

    pub fn delete_note(&mut self, topic_id: &str, note_id: &str) -> Result<()> {
        let topic = self
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| BoardError::EntityNotFound(topic_id.to_string()))?;

        let before = topic.notes.len();
        topic.notes.retain(|n| n.id != note_id);
        if topic.notes.len() == before {
            return Err(BoardError::EntityNotFound(note_id.to_string()));
        }
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    #[test]
    fn test_topics_persist_across_loads() {
        let tmp = TempDir::new().unwrap();
        let mut board = LocalTopicBoard::load(LocalStore::open(tmp.path()).unwrap()).unwrap();
        let topic = board.add_topic("Groceries").unwrap();
        board.add_note(&topic.id, "milk").unwrap();
        drop(board);

        let board = LocalTopicBoard::load(LocalStore::open(tmp.path()).unwrap()).unwrap();
        assert_eq!(board.topics().len(), 1);
        assert_eq!(board.topics()[0].notes[0].content, "milk");
    }

    #[test]
    fn test_new_topics_go_last() {
        let mut board = LocalTopicBoard::load(LocalStore::in_memory().unwrap()).unwrap();
        board.add_topic("one").unwrap();
        board.add_topic("two").unwrap();
        assert_eq!(board.topics()[1].title, "two");
    }

    #[test]
    fn test_delete_topic_and_note() {
        let mut board = LocalTopicBoard::load(LocalStore::in_memory().unwrap()).unwrap();
        let keep = board.add_topic("keep").unwrap();
        let drop_me = board.add_topic("drop").unwrap();
        let a = board.add_note(&keep.id, "a").unwrap();
        board.add_note(&keep.id, "b").unwrap();

        board.delete_topic(&drop_me.id).unwrap();
        board.delete_note(&keep.id, &a.id).unwrap();

        assert_eq!(board.topics().len(), 1);
        assert_eq!(board.topic(&keep.id).unwrap().notes.len(), 1);
        assert!(matches!(
            board.delete_topic(&drop_me.id),
            Err(BoardError::EntityNotFound(_))
        ));
        assert!(matches!(
            board.add_note(&drop_me.id, "orphan"),
            Err(BoardError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_unreadable_value_starts_empty() {
        let store = LocalStore::in_memory().unwrap();
        store.set(LOCAL_TOPICS_KEY, "{not json").unwrap();
        let board = LocalTopicBoard::load(store).unwrap();
        assert!(board.topics().is_empty());
    }

    #[test]
    fn test_reads_records_without_timestamps() {
        let store = LocalStore::in_memory().unwrap();
        store
            .set(
                LOCAL_TOPICS_KEY,
                r#"[{"id":"t","title":"Old","notes":[{"id":"n","content":"x"}]}]"#,
            )
            .unwrap();
        let board = LocalTopicBoard::load(store).unwrap();
        assert_eq!(board.topic("t").unwrap().notes[0].content, "x");
    }
}
