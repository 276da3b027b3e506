//! Store collaborators.
//!
//! [`RemoteStore`] is the shared, subscribable key-value store every client
//! writes through; [`LoroStore`] implements it on a loro document.
//! [`KeyValueStore`] is the single-device store used when there is no shared
//! store; [`LocalStore`] implements it on SQLite.

mod local_store;
mod loro_store;
mod path;

pub use local_store::{KeyValueStore, LocalStore};
pub use loro_store::{LoroStore, BOARD_DIR, MAX_TRANSACTION_ATTEMPTS};
pub use path::StorePath;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::Result;

pub type SubscriptionId = u64;

/// A live feed of snapshots for one path.
///
/// Receives the current value right after subscribing, then the full value
/// again after every write at or under the path, in commit order. Dropping
/// the handle releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    path: StorePath,
    receiver: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        path: StorePath,
        receiver: mpsc::UnboundedReceiver<Value>,
    ) -> Self {
        Self { id, path, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Wait for the next snapshot. `None` once the store has dropped us.
    pub async fn next(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// A snapshot that has already arrived, if any.
    pub fn try_next(&mut self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }
}

/// Result of [`RemoteStore::transact`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// False when the transform declined to write.
    pub committed: bool,
    /// Value at the path after the transaction.
    pub snapshot: Value,
}

/// Transform applied by [`RemoteStore::transact`]. Receives the current value
/// (`Null` when absent); returning `None` aborts without writing. May run more
/// than once, so it must not have side effects beyond its own state.
pub type Transform<'a> = dyn FnMut(Value) -> Option<Value> + Send + 'a;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription>;

    async fn unsubscribe(&self, id: SubscriptionId);

    async fn get(&self, path: &StorePath) -> Result<Value>;

    /// Overwrite the value at `path`. `Null` removes it.
    async fn set(&self, path: &StorePath, value: Value) -> Result<()>;

    /// Merge the named fields into `path`, leaving siblings alone. Keys may
    /// be relative paths (`notes/abc`).
    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<()>;

    async fn remove(&self, path: &StorePath) -> Result<()>;

    /// A fresh key for a new child of `parent`. Keys sort in allocation order.
    fn allocate_key(&self, parent: &StorePath) -> String;

    /// Read, transform and write `path` atomically, retrying the whole cycle
    /// when another writer changed the value in between.
    async fn transact(
        &self,
        path: &StorePath,
        transform: &mut Transform<'_>,
    ) -> Result<TransactionOutcome>;
}
