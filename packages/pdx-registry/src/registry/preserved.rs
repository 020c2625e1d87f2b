//! Out-of-band storage for fields a local type could not read.
//!
//! Entries are keyed by owner identity and expire a fixed TTL after their
//! last refresh. Each entry remembers the [`TaskId`] of the expiry task that
//! will remove it; an expiry that fires for a task id the entry no longer
//! carries is ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::expiry::{ExpiryScheduler, TaskId};
use crate::types::PdxField;

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an object that may own preserved fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocates a process-unique identity. Ids are never reused.
    pub fn next() -> Self {
        Self(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for OwnerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Objects that can own preserved fields.
///
/// The identity must stay the same for as long as the object is alive.
pub trait PdxOwner {
    fn owner_id(&self) -> OwnerId;
}

impl PdxOwner for OwnerId {
    fn owner_id(&self) -> OwnerId {
        *self
    }
}

/// Raw bytes of one field that was present on the wire but absent locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadField {
    /// Field as declared by the remote type
    pub field: PdxField,
    /// Encoded value, exactly as received
    pub bytes: Vec<u8>,
}

impl UnreadField {
    pub fn new(field: PdxField, bytes: Vec<u8>) -> Self {
        Self { field, bytes }
    }
}

/// Unread fields captured while deserializing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedData {
    type_id: i32,
    merged_type_id: i32,
    fields: Vec<UnreadField>,
}

impl PreservedData {
    /// # Arguments
    /// * `type_id` - Remote type id the object was read with
    /// * `merged_type_id` - Id of the merged type, 0 if not yet assigned
    /// * `fields` - Unread fields in remote wire order
    pub fn new(type_id: i32, merged_type_id: i32, fields: Vec<UnreadField>) -> Self {
        Self {
            type_id,
            merged_type_id,
            fields,
        }
    }

    /// Remote type id the fields were read under.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub fn merged_type_id(&self) -> i32 {
        self.merged_type_id
    }

    pub fn unread_fields(&self) -> &[UnreadField] {
        &self.fields
    }

    /// Bytes of the unread field called `name`.
    pub fn field_bytes(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|f| f.field.name == name)
            .map(|f| f.bytes.as_slice())
    }

    /// Total number of preserved bytes.
    pub fn byte_len(&self) -> usize {
        self.fields.iter().map(|f| f.bytes.len()).sum()
    }
}

struct Entry {
    data: Arc<PreservedData>,
    task: TaskId,
    refreshed_at: Instant,
}

struct StoreInner {
    entries: RwLock<HashMap<OwnerId, Entry>>,
    scheduler: Arc<dyn ExpiryScheduler>,
    ttl: Duration,
}

impl StoreInner {
    fn remove_expired(&self, owner: OwnerId, task: TaskId) -> bool {
        let mut entries = self.entries.write();
        let current = entries.get(&owner).map(|entry| entry.task);
        match current {
            Some(tracked) if tracked == task => {
                entries.remove(&owner);
                tracing::debug!("Preserved data of {} expired ({})", owner, task);
                true
            }
            Some(tracked) => {
                tracing::trace!(
                    "Ignoring stale expiry {} for {}, entry now tracked by {}",
                    task,
                    owner,
                    tracked
                );
                false
            }
            None => {
                tracing::trace!("Ignoring expiry {} for {}, entry already gone", task, owner);
                false
            }
        }
    }
}

/// Preserved-field table with TTL eviction.
///
/// Guarded by its own lock, independent of the schema and enum tables.
pub(crate) struct PreservedDataStore {
    inner: Arc<StoreInner>,
}

impl PreservedDataStore {
    pub(crate) fn new(scheduler: Arc<dyn ExpiryScheduler>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: RwLock::new(HashMap::new()),
                scheduler,
                ttl,
            }),
        }
    }

    fn schedule_expiry(&self, owner: OwnerId) -> TaskId {
        let store: Weak<StoreInner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule_once(
            self.inner.ttl,
            Box::new(move |task| {
                if let Some(store) = store.upgrade() {
                    store.remove_expired(owner, task);
                }
            }),
        )
    }

    /// Stores `data` for `owner`, replacing and re-arming any existing entry.
    pub(crate) fn set(&self, owner: OwnerId, data: PreservedData) {
        let mut entries = self.inner.entries.write();
        let task = self.schedule_expiry(owner);
        let data = Arc::new(data);

        match entries.get_mut(&owner) {
            Some(entry) => {
                self.inner.scheduler.cancel(entry.task);
                tracing::debug!(
                    "Reset expiry of {}: {} replaced by {}",
                    owner,
                    entry.task,
                    task
                );
                entry.data = data;
                entry.task = task;
                entry.refreshed_at = Instant::now();
            }
            None => {
                tracing::debug!("Scheduled expiry {} for new preserved data of {}", task, owner);
                entries.insert(
                    owner,
                    Entry {
                        data,
                        task,
                        refreshed_at: Instant::now(),
                    },
                );
            }
        }
    }

    pub(crate) fn get(&self, owner: OwnerId) -> Option<Arc<PreservedData>> {
        let entries = self.inner.entries.read();
        entries.get(&owner).map(|entry| Arc::clone(&entry.data))
    }

    /// Wall-clock time of the last `set` for `owner`.
    pub(crate) fn refreshed_at(&self, owner: OwnerId) -> Option<Instant> {
        let entries = self.inner.entries.read();
        entries.get(&owner).map(|entry| entry.refreshed_at)
    }

    /// Removes the entry of `owner` if it is still tracked by `task`.
    #[cfg(test)]
    pub(crate) fn remove_expired(&self, owner: OwnerId, task: TaskId) -> bool {
        self.inner.remove_expired(owner, task)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Drops every entry and cancels its pending expiry.
    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.inner.entries.write();
        let removed = entries.len();
        for (_, entry) in entries.drain() {
            self.inner.scheduler.cancel(entry.task);
        }
        removed
    }
}
