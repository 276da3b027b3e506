// src/entity/topic.rs
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{str_field, Entity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNote {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A titled group of notes. Notes live inside the topic record, so removing
/// the topic removes them with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub notes: Vec<TopicNote>,
}

impl Topic {
    pub fn note(&self, note_id: &str) -> Option<&TopicNote> {
        self.notes.iter().find(|n| n.id == note_id)
    }
}

impl TopicNote {
    pub(crate) fn encode(&self) -> Value {
        json!({
            "content": self.content,
            "timestamp": self.timestamp,
        })
    }

    fn decode(fallback_id: &str, record: &Value) -> Option<Self> {
        let record = record.as_object()?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(fallback_id)
            .to_string();

        Some(TopicNote {
            id,
            content: str_field(record, "content"),
            timestamp: str_field(record, "timestamp"),
        })
    }
}

/// Notes are normally a `{id: note}` map. Records written by the array-shaped
/// layout come back as a list whose items carry their own `id`.
fn decode_notes(value: Option<&Value>) -> Vec<TopicNote> {
    match value {
        Some(Value::Object(notes)) => {
            let mut decoded: Vec<TopicNote> = notes
                .iter()
                .filter_map(|(id, record)| TopicNote::decode(id, record))
                .collect();
            decoded.sort_by(|a, b| a.id.cmp(&b.id));
            decoded
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, record)| TopicNote::decode(&index.to_string(), record))
            .collect(),
        _ => Vec::new(),
    }
}

impl Entity for Topic {
    fn id(&self) -> &str {
        &self.id
    }

    fn decode(id: &str, record: &Value) -> Option<Self> {
        let record = record.as_object()?;

        Some(Topic {
            id: id.to_string(),
            title: str_field(record, "title"),
            created_at: str_field(record, "createdAt"),
            notes: decode_notes(record.get("notes")),
        })
    }

    fn encode(&self) -> Value {
        let notes: Map<String, Value> = self
            .notes
            .iter()
            .map(|n| (n.id.clone(), n.encode()))
            .collect();

        let mut record = json!({
            "title": self.title,
            "createdAt": self.created_at,
        });
        if !notes.is_empty() {
            record["notes"] = Value::Object(notes);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_topic() -> Topic {
        Topic {
            id: "t1".to_string(),
            title: "Retro".to_string(),
            created_at: "Oct 19, 2026".to_string(),
            notes: vec![
                TopicNote {
                    id: "n1".to_string(),
                    content: "ship it".to_string(),
                    timestamp: "9:00 AM".to_string(),
                },
                TopicNote {
                    id: "n2".to_string(),
                    content: "fewer meetings".to_string(),
                    timestamp: "9:05 AM".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let topic = sample_topic();
        let decoded = Topic::decode(&topic.id, &topic.encode()).unwrap();
        assert_eq!(decoded, topic);
    }

    #[test]
    fn test_encode_nests_notes_by_id() {
        let wire = sample_topic().encode();
        assert_eq!(wire["notes"]["n2"]["content"], "fewer meetings");
        assert!(wire["notes"]["n2"].get("id").is_none());
    }

    #[test]
    fn test_empty_topic_omits_notes() {
        let mut topic = sample_topic();
        topic.notes.clear();
        assert!(topic.encode().get("notes").is_none());
    }

    #[test]
    fn test_decode_missing_fields() {
        let topic = Topic::decode("t", &json!({"title": "Old"})).unwrap();
        assert_eq!(topic.created_at, "");
        assert!(topic.notes.is_empty());
    }

    #[test]
    fn test_decode_array_shaped_notes() {
        let record = json!({
            "title": "Legacy",
            "notes": [
                {"id": "a", "content": "one"},
                {"content": "two"},
            ],
        });
        let topic = Topic::decode("t", &record).unwrap();
        assert_eq!(topic.notes.len(), 2);
        assert_eq!(topic.notes[0].id, "a");
        assert_eq!(topic.notes[1].id, "1");
        assert_eq!(topic.notes[1].timestamp, "");
    }

    #[test]
    fn test_local_json_without_timestamps_deserializes() {
        let raw = r#"[{"id":"t","title":"Ideas","notes":[{"id":"n","content":"hi"}]}]"#;
        let topics: Vec<Topic> = serde_json::from_str(raw).unwrap();
        assert_eq!(topics[0].created_at, "");
        assert_eq!(topics[0].notes[0].timestamp, "");
    }
}
