mod note;
mod topic;

pub use note::{Note, NoteColor, NoteKind, Rotation};
pub use topic::{Topic, TopicNote};

use serde_json::{Map, Value};

/// An entity persisted in the store as `id -> record` (the id is the map key,
/// never a field of the record).
pub trait Entity: Clone + std::fmt::Debug + PartialEq {
    fn id(&self) -> &str;

    /// Decode one record. Missing fields get defaults; `None` means the
    /// record is not an object at all.
    fn decode(id: &str, record: &Value) -> Option<Self>;

    fn encode(&self) -> Value;
}

/// Project a `{id: record}` snapshot into a list ordered by key.
///
/// Keys are allocated as UUIDv7, so key order is creation order.
pub fn decode_collection<E: Entity>(snapshot: &Value) -> Vec<E> {
    let Value::Object(records) = snapshot else {
        if !snapshot.is_null() {
            tracing::warn!("ignoring non-object collection snapshot");
        }
        return Vec::new();
    };

    let mut entities: Vec<E> = records
        .iter()
        .filter_map(|(id, record)| {
            let entity = E::decode(id, record);
            if entity.is_none() {
                tracing::warn!(id = %id, "skipping malformed record");
            }
            entity
        })
        .collect();

    entities.sort_by(|a, b| a.id().cmp(b.id()));
    entities
}

/// Encode a list back into its `{id: record}` wire form.
pub fn encode_collection<E: Entity>(entities: &[E]) -> Value {
    let records: Map<String, Value> = entities
        .iter()
        .map(|e| (e.id().to_string(), e.encode()))
        .collect();
    Value::Object(records)
}

/// Creation time as shown on a note or topic. Display only, not sortable.
pub fn display_timestamp() -> String {
    chrono::Local::now().format("%b %-d, %Y %-I:%M %p").to_string()
}

pub(crate) fn str_field(record: &Map<String, Value>, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

pub(crate) fn f64_field(record: &Map<String, Value>, key: &str) -> f64 {
    record.get(key).and_then(Value::as_f64).unwrap_or_default()
}
