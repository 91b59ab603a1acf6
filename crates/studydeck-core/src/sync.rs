//! Per-tool state synchronization.
//!
//! A [`StateSync`] makes one tool's transient state durable:
//! - `load` runs once per mount; until it completes every save is dropped,
//!   so defaults never overwrite state that has not been read yet
//! - `save` is fire-and-forget, either immediate or debounced
//! - `clear` cancels any pending debounced save, then deletes the row
//!
//! Writes go through a single writer task per adapter, so they reach the
//! store in the order they were issued. Every write carries the number of
//! clears issued before it; the writer drops saves from before the latest
//! clear, which covers a debounced save whose timer fired just as `clear`
//! tried to cancel it. Store failures are logged and
//! swallowed; losing resume state is acceptable, surfacing it is not.

use crate::scheduler::Debouncer;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use studydeck_types::{ToolKey, ToolKind};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Quiet period before a debounced save is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Keyed store for opaque per-tool state blobs.
pub trait ToolStateStore: Send + Sync + 'static {
    fn load(&self, key: &ToolKey) -> Result<Option<Value>>;
    /// Insert or overwrite the row for `key`.
    fn save(&self, key: &ToolKey, state: &Value) -> Result<()>;
    fn clear(&self, key: &ToolKey) -> Result<()>;
}

/// When a change is written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePolicy {
    /// Write every change as it happens.
    Immediate,
    /// Write only after the state has been quiet for the given duration.
    Debounced(Duration),
}

impl SavePolicy {
    /// Quiz and flashcards debounce navigation; the tutor changes rarely.
    pub fn for_tool(tool: ToolKind, debounce: Duration) -> Self {
        match tool {
            ToolKind::Quiz | ToolKind::Flashcards => SavePolicy::Debounced(debounce),
            ToolKind::Tutor => SavePolicy::Immediate,
        }
    }
}

#[derive(Debug)]
enum WriteOp {
    Save { state: Value, epoch: u64 },
    Clear { epoch: u64 },
}

/// Load/save/clear protocol for one tool instance.
pub struct StateSync<T> {
    key: ToolKey,
    policy: SavePolicy,
    store: Arc<dyn ToolStateStore>,
    writer: mpsc::UnboundedSender<WriteOp>,
    debouncer: Debouncer<ToolKey>,
    loaded: bool,
    suppressed: bool,
    /// Clears issued so far.
    epoch: AtomicU64,
    _state: PhantomData<fn() -> T>,
}

impl<T> StateSync<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create an adapter and spawn its writer task. Must run inside a tokio runtime.
    pub fn new(store: Arc<dyn ToolStateStore>, key: ToolKey, policy: SavePolicy) -> Self {
        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store.clone(), key, rx));

        Self {
            key,
            policy,
            store,
            writer,
            debouncer: Debouncer::new(),
            loaded: false,
            suppressed: false,
            epoch: AtomicU64::new(0),
            _state: PhantomData,
        }
    }

    pub fn key(&self) -> &ToolKey {
        &self.key
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Fetch the saved state and open the save gate.
    ///
    /// Missing, unreadable or malformed state all yield `None`.
    pub async fn load(&mut self) -> Option<T> {
        let store = self.store.clone();
        let key = self.key;
        let fetched = tokio::task::spawn_blocking(move || store.load(&key)).await;

        let state = match fetched {
            Ok(Ok(Some(raw))) => match serde_json::from_value(raw) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(target: "studydeck::sync", "Ignoring malformed {} state: {}", self.key, e);
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(target: "studydeck::sync", "Failed to load {} state: {}", self.key, e);
                None
            }
            Err(e) => {
                warn!(target: "studydeck::sync", "State load task for {} failed: {}", self.key, e);
                None
            }
        };

        self.loaded = true;
        debug!(target: "studydeck::sync", "Loaded {} (found: {})", self.key, state.is_some());
        state
    }

    /// Open the save gate without reading anything (nothing to resume).
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Drop saves while set; used while the flashcard carousel animates.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    /// Persist `state` according to the save policy.
    pub fn save(&self, state: &T) {
        if !self.loaded {
            trace!(target: "studydeck::sync", "Dropping save for {} before load", self.key);
            return;
        }
        if self.suppressed {
            trace!(target: "studydeck::sync", "Dropping suppressed save for {}", self.key);
            return;
        }

        let value = match serde_json::to_value(state) {
            Ok(value) => value,
            Err(e) => {
                warn!(target: "studydeck::sync", "Failed to encode {} state: {}", self.key, e);
                return;
            }
        };

        let op = WriteOp::Save {
            state: value,
            epoch: self.epoch.load(Ordering::SeqCst),
        };
        match self.policy {
            SavePolicy::Immediate => self.enqueue(op),
            SavePolicy::Debounced(delay) => {
                let writer = self.writer.clone();
                self.debouncer.schedule(self.key, delay, async move {
                    let _ = writer.send(op);
                });
            }
        }
    }

    /// Delete the saved state, discarding any save still waiting out its debounce.
    pub fn clear(&self) {
        if self.debouncer.cancel(&self.key) {
            debug!(target: "studydeck::sync", "Cancelled pending save for {} before clear", self.key);
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.enqueue(WriteOp::Clear { epoch });
    }

    /// Whether a debounced save is still waiting.
    pub fn has_pending_save(&self) -> bool {
        self.debouncer.is_pending(&self.key)
    }

    fn enqueue(&self, op: WriteOp) {
        if self.writer.send(op).is_err() {
            warn!(target: "studydeck::sync", "State writer for {} is gone", self.key);
        }
    }
}

async fn run_writer(
    store: Arc<dyn ToolStateStore>,
    key: ToolKey,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
) {
    let mut cleared = 0;
    while let Some(op) = rx.recv().await {
        let result = match &op {
            WriteOp::Save { epoch, .. } if *epoch < cleared => {
                debug!(target: "studydeck::sync", "Dropping save for {} issued before a clear", key);
                continue;
            }
            WriteOp::Save { state, .. } => store.save(&key, state),
            WriteOp::Clear { epoch } => {
                cleared = cleared.max(*epoch);
                store.clear(&key)
            }
        };
        match result {
            Ok(()) => trace!(target: "studydeck::sync", "Applied {:?} for {}", op, key),
            Err(e) => warn!(target: "studydeck::sync", "Failed to write {} state: {}", key, e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A store call, in the order it happened.
    #[derive(Debug, Clone, PartialEq)]
    pub enum StoreCall {
        Load,
        Save(Value),
        Clear,
    }

    /// In-memory store that records every call.
    #[derive(Default)]
    pub struct RecordingStore {
        pub calls: Mutex<Vec<StoreCall>>,
        pub rows: Mutex<HashMap<ToolKey, Value>>,
        pub fail_writes: bool,
    }

    impl RecordingStore {
        pub fn calls(&self) -> Vec<StoreCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn saves(&self) -> Vec<Value> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    StoreCall::Save(v) => Some(v),
                    _ => None,
                })
                .collect()
        }

        pub fn put(&self, key: ToolKey, value: Value) {
            self.rows.lock().unwrap().insert(key, value);
        }
    }

    impl ToolStateStore for RecordingStore {
        fn load(&self, key: &ToolKey) -> Result<Option<Value>> {
            self.calls.lock().unwrap().push(StoreCall::Load);
            Ok(self.rows.lock().unwrap().get(key).cloned())
        }

        fn save(&self, key: &ToolKey, state: &Value) -> Result<()> {
            self.calls.lock().unwrap().push(StoreCall::Save(state.clone()));
            if self.fail_writes {
                return Err(crate::StudyError::Validation("store offline".into()));
            }
            self.rows.lock().unwrap().insert(*key, state.clone());
            Ok(())
        }

        fn clear(&self, key: &ToolKey) -> Result<()> {
            self.calls.lock().unwrap().push(StoreCall::Clear);
            self.rows.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
