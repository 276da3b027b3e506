use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use loro::{Container, Frontiers, LoroDoc, LoroMap, LoroValue, ValueOrContainer};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{RemoteStore, StorePath, Subscription, SubscriptionId, TransactionOutcome, Transform};
use crate::error::{BoardError, Result};

pub const BOARD_DIR: &str = ".thoughtboard";
const BOARD_DB: &str = "board.loro";
const BOARD_LOCK: &str = "board.lock";
const ROOT_MAP: &str = "root";

/// Conflicting attempts before `transact` gives up.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 25;

/// The snapshot file plus the lock file that serializes processes sharing it.
struct BoardFile {
    path: PathBuf,
    lock: PathBuf,
}

impl BoardFile {
    fn in_dir(board_dir: &Path) -> Self {
        Self {
            path: board_dir.join(BOARD_DB),
            lock: board_dir.join(BOARD_LOCK),
        }
    }

    /// The lock is released when the returned file is dropped.
    fn lock_exclusive(&self) -> Result<File> {
        let file = self.open_lock()?;
        file.lock()?;
        Ok(file)
    }

    fn lock_shared(&self) -> Result<File> {
        let file = self.open_lock()?;
        file.lock_shared()?;
        Ok(file)
    }

    fn open_lock(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock)?)
    }

    fn read(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&self.path)?))
    }

    /// Swap in `bytes` with a rename so a reader never sees half a snapshot.
    fn write(&self, bytes: &[u8]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

struct Subscriber {
    id: SubscriptionId,
    path: StorePath,
    sender: mpsc::UnboundedSender<Value>,
}

struct Inner {
    doc: LoroDoc,
    file: Option<BoardFile>,
    subscribers: Vec<Subscriber>,
    next_subscription: SubscriptionId,
}

/// A [`RemoteStore`] backed by a loro document.
///
/// Objects become nested loro maps and arrays become maps keyed by index, so
/// the store has no ordered-array type. Nested maps are mergeable: every
/// client that creates `a/b` gets the same container, so concurrent writers
/// under a fresh key do not shadow each other.
///
/// With a backing file, every write holds `board.lock` while it merges what
/// other processes saved, applies its change and swaps in the new snapshot.
pub struct LoroStore {
    inner: Mutex<Inner>,
    last_key_ms: AtomicU64,
}

impl LoroStore {
    /// Initialize a new board in `root`
    pub fn init(root: &Path) -> Result<Self> {
        let board_dir = root.join(BOARD_DIR);

        if board_dir.exists() {
            return Err(BoardError::AlreadyInitialized);
        }

        fs::create_dir_all(&board_dir)?;

        let file = BoardFile::in_dir(&board_dir);
        let doc = LoroDoc::new();
        file.write(&doc.export(loro::ExportMode::Snapshot)?)?;

        Ok(Self::from_doc(doc, Some(file)))
    }

    /// Open an existing board in `root`
    pub fn open(root: &Path) -> Result<Self> {
        let file = BoardFile::in_dir(&root.join(BOARD_DIR));

        if !file.path.exists() {
            return Err(BoardError::NotInitialized);
        }

        let doc = LoroDoc::new();
        {
            let _lock = file.lock_shared()?;
            if let Some(bytes) = file.read()? {
                doc.import(&bytes)?;
            }
        }

        Ok(Self::from_doc(doc, Some(file)))
    }

    /// A store that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self::from_doc(LoroDoc::new(), None)
    }

    fn from_doc(doc: LoroDoc, file: Option<BoardFile>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                doc,
                file,
                subscribers: Vec::new(),
                next_subscription: 1,
            }),
            last_key_ms: AtomicU64::new(0),
        }
    }

    /// Merge changes other processes saved to the backing file. Subscribers
    /// are notified when anything new arrived.
    pub async fn refresh(&self) -> Result<bool> {
        self.inner.lock().await.pull()
    }
}

impl Inner {
    fn read(&self, path: &StorePath) -> Value {
        let root = loro_to_json(&self.doc.get_map(ROOT_MAP).get_deep_value());
        path.segments()
            .iter()
            .fold(root, |value, segment| match value {
                Value::Object(mut fields) => fields.remove(segment).unwrap_or(Value::Null),
                _ => Value::Null,
            })
    }

    /// Walk to the map holding `segments`, creating maps where needed.
    fn map_at(&self, segments: &[String]) -> Result<LoroMap> {
        let mut map = self.doc.get_map(ROOT_MAP);
        for segment in segments {
            map = child_map(&map, segment)?;
        }
        Ok(map)
    }

    fn write(&self, path: &StorePath, value: &Value) -> Result<()> {
        match path.segments().split_last() {
            Some((key, parents)) => {
                if value.is_null() && self.read(path).is_null() {
                    return Ok(());
                }
                let parent = self.map_at(parents)?;
                put_value(&parent, key, value)
            }
            None => {
                let root = self.doc.get_map(ROOT_MAP);
                let fields = match value {
                    Value::Object(fields) => fields.clone(),
                    Value::Null => Map::new(),
                    other => {
                        return Err(BoardError::Storage(format!(
                            "root must hold an object, got {}",
                            other
                        )))
                    }
                };
                replace_fields(&root, &fields)
            }
        }
    }

    /// Run `change` against the freshest state and make it durable.
    ///
    /// `change` returns whether it wrote anything; `false` skips the save.
    /// The whole cycle holds the board lock, and any error rolls the
    /// document back to where `change` started. Subscribers hear about
    /// the whole board when other processes' changes were merged, or about
    /// `changed` when only its value moved.
    fn apply<F>(&mut self, changed: &StorePath, change: F) -> Result<bool>
    where
        F: FnOnce(&Inner) -> Result<bool>,
    {
        let _lock = match &self.file {
            Some(file) => Some(file.lock_exclusive()?),
            None => None,
        };

        let merged = self.import_from_disk()?;
        self.doc.commit();
        let version = self.doc.state_frontiers();
        let before = self.read(changed);

        let result = change(&*self).and_then(|wrote| {
            if wrote {
                self.doc.commit();
                self.write_to_disk()?;
            }
            Ok(wrote)
        });

        let wrote = match result {
            Ok(wrote) => wrote,
            Err(e) => {
                self.rollback(&version);
                if merged {
                    self.notify(&StorePath::root());
                }
                return Err(e);
            }
        };

        if merged {
            debug!("merged external changes");
            self.notify(&StorePath::root());
        } else if wrote && self.read(changed) != before {
            self.notify(changed);
        }
        Ok(wrote)
    }

    /// Merge the backing file under a shared lock.
    fn pull(&mut self) -> Result<bool> {
        let changed = match &self.file {
            Some(file) => {
                let _lock = file.lock_shared()?;
                self.import_from_disk()?
            }
            None => false,
        };
        if changed {
            debug!("merged external changes");
            self.notify(&StorePath::root());
        }
        Ok(changed)
    }

    fn rollback(&self, version: &Frontiers) {
        self.doc.commit();
        if let Err(e) = self.doc.revert_to(version) {
            warn!(error = %e, "could not roll back a failed write");
        }
        self.doc.commit();
    }

    /// Returns true when the file held changes this document had not seen.
    fn import_from_disk(&self) -> Result<bool> {
        let Some(file) = &self.file else {
            return Ok(false);
        };
        let Some(bytes) = file.read()? else {
            return Ok(false);
        };

        let before = self.doc.oplog_vv();
        self.doc.import(&bytes)?;
        Ok(self.doc.oplog_vv() != before)
    }

    fn write_to_disk(&self) -> Result<()> {
        if let Some(file) = &self.file {
            file.write(&self.doc.export(loro::ExportMode::Snapshot)?)?;
        }
        Ok(())
    }

    fn notify(&mut self, changed: &StorePath) {
        let mut snapshots = Vec::new();
        for sub in &self.subscribers {
            if sub.path.overlaps(changed) {
                snapshots.push((sub.id, self.read(&sub.path)));
            }
        }

        let mut closed = Vec::new();
        for (id, snapshot) in snapshots {
            if let Some(sub) = self.subscribers.iter().find(|s| s.id == id) {
                if sub.sender.send(snapshot).is_err() {
                    closed.push(id);
                }
            }
        }

        if !closed.is_empty() {
            debug!(count = closed.len(), "dropping closed subscriptions");
            self.subscribers.retain(|s| !closed.contains(&s.id));
        }
    }
}

#[async_trait]
impl RemoteStore for LoroStore {
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_subscription;
        inner.next_subscription += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        // Receiver is alive; the initial send cannot fail.
        let _ = sender.send(inner.read(path));

        inner.subscribers.push(Subscriber {
            id,
            path: path.clone(),
            sender,
        });
        debug!(id, path = %path, "subscribed");

        Ok(Subscription::new(id, path.clone(), receiver))
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().await;
        inner.subscribers.retain(|s| s.id != id);
        debug!(id, "unsubscribed");
    }

    async fn get(&self, path: &StorePath) -> Result<Value> {
        Ok(self.inner.lock().await.read(path))
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.apply(path, |inner| {
            inner.write(path, &value)?;
            Ok(true)
        })?;
        Ok(())
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.apply(path, |inner| {
            for (key, value) in &fields {
                inner.write(&path.join(key)?, value)?;
            }
            Ok(true)
        })?;
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<()> {
        self.set(path, Value::Null).await
    }

    /// UUIDv7 keys with a strictly increasing millisecond part, so key order
    /// is allocation order even for bursts within one millisecond.
    fn allocate_key(&self, _parent: &StorePath) -> String {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut last = self.last_key_ms.load(Ordering::Relaxed);
        let ms = loop {
            let next = now.max(last + 1);
            match self.last_key_ms.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(actual) => last = actual,
            }
        };

        let ts = uuid::Timestamp::from_unix(
            uuid::NoContext,
            ms / 1000,
            ((ms % 1000) * 1_000_000) as u32,
        );
        uuid::Uuid::new_v7(ts).to_string()
    }

    async fn transact(
        &self,
        path: &StorePath,
        transform: &mut Transform<'_>,
    ) -> Result<TransactionOutcome> {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let current = {
                let mut inner = self.inner.lock().await;
                inner.pull()?;
                inner.read(path)
            };

            let Some(next) = transform(current.clone()) else {
                debug!(path = %path, "transaction declined by transform");
                return Ok(TransactionOutcome {
                    committed: false,
                    snapshot: current,
                });
            };

            let mut inner = self.inner.lock().await;
            let committed = inner.apply(path, |inner| {
                if inner.read(path) != current {
                    return Ok(false);
                }
                inner.write(path, &next)?;
                Ok(true)
            })?;

            if !committed {
                debug!(path = %path, attempt, "transaction conflict, retrying");
                continue;
            }
            return Ok(TransactionOutcome {
                committed: true,
                snapshot: inner.read(path),
            });
        }

        Err(BoardError::TransactionAborted {
            path: path.to_string(),
            attempts: MAX_TRANSACTION_ATTEMPTS,
        })
    }
}

/// The map under `key`, created as a mergeable container so that clients
/// creating the same key concurrently end up sharing it.
fn child_map(parent: &LoroMap, key: &str) -> Result<LoroMap> {
    match parent.get(key) {
        Some(ValueOrContainer::Container(Container::Map(existing))) => {
            // A plain map written before maps were mergeable stays in use.
            Ok(parent.ensure_mergeable_map(key).unwrap_or(existing))
        }
        Some(_) => {
            parent.delete(key)?;
            Ok(parent.ensure_mergeable_map(key)?)
        }
        None => Ok(parent.ensure_mergeable_map(key)?),
    }
}

fn existing_keys(map: &LoroMap) -> Vec<String> {
    match map.get_deep_value() {
        LoroValue::Map(fields) => fields.iter().map(|(k, _)| k.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Make `map` hold exactly `fields`.
fn replace_fields(map: &LoroMap, fields: &Map<String, Value>) -> Result<()> {
    for key in existing_keys(map) {
        if !fields.contains_key(&key) {
            map.delete(&key)?;
        }
    }
    for (key, value) in fields {
        put_value(map, key, value)?;
    }
    Ok(())
}

fn put_value(map: &LoroMap, key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => map.delete(key)?,
        Value::Bool(b) => map.insert(key, *b)?,
        Value::Number(n) => match n.as_i64() {
            Some(i) => map.insert(key, i)?,
            None => map.insert(key, n.as_f64().unwrap_or_default())?,
        },
        Value::String(s) => map.insert(key, s.as_str())?,
        Value::Object(fields) => replace_fields(&child_map(map, key)?, fields)?,
        Value::Array(items) => {
            let indexed: Map<String, Value> = items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect();
            replace_fields(&child_map(map, key)?, &indexed)?
        }
    }
    Ok(())
}

/// Convert a loro value to JSON. Empty maps read as absent.
fn loro_to_json(value: &LoroValue) -> Value {
    match value {
        LoroValue::Bool(b) => Value::Bool(*b),
        LoroValue::I64(n) => Value::from(*n),
        LoroValue::Double(d) => serde_json::Number::from_f64(*d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        LoroValue::String(s) => Value::String(s.to_string()),
        LoroValue::List(items) => Value::Array(items.iter().map(loro_to_json).collect()),
        LoroValue::Map(fields) => {
            let object: Map<String, Value> = fields
                .iter()
                .filter_map(|(k, v)| {
                    let v = loro_to_json(v);
                    (!v.is_null()).then(|| (k.to_string(), v))
                })
                .collect();
            if object.is_empty() {
                Value::Null
            } else {
                Value::Object(object)
            }
        }
        _ => Value::Null,
    }
}
