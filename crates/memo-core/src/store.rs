//! The todo store: the authoritative ordered list of task records, all of
//! its state transitions, and the (de)serialization of the whole list
//! through an opaque storage port under one fixed key.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::item::TodoItem;
use crate::storage::StorageAdapter;
use crate::watch::{ChangeEvent, ChangeKind, ChangeListener};

pub struct TodoStore {
    items: Vec<TodoItem>,
    storage: Box<dyn StorageAdapter>,
    key: String,
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl TodoStore {
    /// Construct from a caller-supplied sequence. Records keep the given
    /// order and receive dense ids 0..N-1; nothing is sorted and nothing is
    /// persisted until the first mutation.
    pub fn initialize(
        storage: Box<dyn StorageAdapter>,
        key: impl Into<String>,
        mut items: Vec<TodoItem>,
    ) -> Self {
        for (index, item) in items.iter_mut().enumerate() {
            item.id = index;
        }
        Self {
            items,
            storage,
            key: key.into(),
            listeners: Vec::new(),
        }
    }

    /// The startup path: load the persisted list, drop records already
    /// soft-deleted, and build the store from the survivors. A corrupt blob
    /// is preserved under `<key>.corrupt` and the store starts empty.
    #[instrument(skip(storage))]
    pub fn rehydrate(storage: Box<dyn StorageAdapter>, key: &str) -> Result<Self, StoreError> {
        let items = match load_items(storage.as_ref(), key) {
            Ok(items) => items,
            Err(StoreError::CorruptStore { key, source }) => {
                warn!(key = %key, error = %source, "persisted list is corrupt; starting empty");
                stash_corrupt_blob(storage.as_ref(), &key)?;
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let survivors: Vec<TodoItem> = items.into_iter().filter(|item| !item.deleted).collect();
        info!(key, count = survivors.len(), "rehydrated todo list");
        Ok(Self::initialize(storage, key, survivors))
    }

    /// Subscribe to store-changed events.
    pub fn watch(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    /// The full backing sequence, soft-deleted records included.
    pub fn records(&self) -> &[TodoItem] {
        &self.items
    }

    /// Records currently shown to the user: non-deleted, in due order.
    /// Purely derived; no side effect.
    pub fn visible(&self) -> Vec<&TodoItem> {
        self.items.iter().filter(|item| !item.deleted).collect()
    }

    /// Backing-sequence length, soft-deleted records included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current positional id of the record carrying `uid`, if it is still
    /// present and not soft-deleted. Batch callers capture uids up front
    /// and re-resolve here instead of holding positional ids across
    /// mutations.
    pub fn position_of(&self, uid: Uuid) -> Option<usize> {
        self.items
            .iter()
            .find(|item| item.uid == uid && !item.deleted)
            .map(|item| item.id)
    }

    pub fn get(&self, id: usize) -> Result<&TodoItem, StoreError> {
        self.items.get(id).ok_or(StoreError::IdOutOfRange {
            id,
            len: self.items.len(),
        })
    }

    /// Append a new record, re-sort by due date, reindex, persist.
    /// Returns the new record's positional id. An empty title is fine.
    #[instrument(skip(self, title, due), fields(key = %self.key))]
    pub fn add(
        &mut self,
        title: impl Into<String>,
        due: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let item = TodoItem::new(title, due);
        let uid = item.uid;
        debug!(title = %item.title, due = %item.due, "adding todo");

        self.items.push(item);
        self.resort();
        self.persist()?;
        self.notify(ChangeKind::Added);

        let id = self
            .items
            .iter()
            .find(|item| item.uid == uid)
            .map(|item| item.id)
            .unwrap_or_default();
        Ok(id)
    }

    /// Overwrite `title` and `due` at positional `id`, then re-sort,
    /// reindex, persist. Editing reopens the record: `done` is reset.
    #[instrument(skip(self, title, due), fields(key = %self.key))]
    pub fn edit(
        &mut self,
        id: usize,
        title: impl Into<String>,
        due: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(id)
            .ok_or(StoreError::IdOutOfRange { id, len })?;

        item.title = title.into();
        item.due = due;
        item.done = false;

        self.resort();
        self.persist()?;
        self.notify(ChangeKind::Edited);
        Ok(())
    }

    /// Flip `done` in place and persist. Done does not participate in
    /// ordering, so there is no re-sort. Returns the new `done` value.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn toggle_done(&mut self, id: usize) -> Result<bool, StoreError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(id)
            .ok_or(StoreError::IdOutOfRange { id, len })?;

        item.done = !item.done;
        let done = item.done;

        self.persist()?;
        self.notify(ChangeKind::Toggled);
        Ok(done)
    }

    /// Soft-delete: flag the record at positional `id` and keep it in the
    /// backing sequence. Every mutator runs the same resort + reindex pass,
    /// even though a tombstone flag cannot change the order.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn delete(&mut self, id: usize) -> Result<(), StoreError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(id)
            .ok_or(StoreError::IdOutOfRange { id, len })?;

        item.deleted = true;

        self.resort();
        self.persist()?;
        self.notify(ChangeKind::Deleted);
        Ok(())
    }

    /// Physically drop soft-deleted records from the backing sequence.
    /// Returns how many were dropped.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn purge(&mut self) -> Result<usize, StoreError> {
        let before = self.items.len();
        self.items.retain(|item| !item.deleted);
        let dropped = before - self.items.len();

        if dropped > 0 {
            self.resort();
            self.persist()?;
            self.notify(ChangeKind::Purged);
        }

        info!(dropped, "purged soft-deleted todos");
        Ok(dropped)
    }

    /// Stable sort ascending by due date (equal due dates keep their
    /// relative order), then dense reindex so `id` matches position again.
    fn resort(&mut self) {
        self.items.sort_by_key(|item| item.due);
        for (index, item) in self.items.iter_mut().enumerate() {
            item.id = index;
        }
    }

    /// Encode the full sequence, tombstones included, and overwrite the
    /// blob under the fixed key.
    fn persist(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.items).map_err(StoreError::Encode)?;
        self.storage.set(&self.key, &bytes)?;
        debug!(key = %self.key, count = self.items.len(), bytes = bytes.len(), "persisted todo list");
        Ok(())
    }

    fn notify(&self, kind: ChangeKind) {
        let event = ChangeEvent {
            kind,
            visible_len: self.items.iter().filter(|item| !item.deleted).count(),
        };
        for listener in &self.listeners {
            listener.on_change(&event);
        }
    }
}

/// Decode the full persisted sequence, soft-deleted records included. A key
/// that was never written is an empty list; a malformed blob is a
/// recoverable [`StoreError::CorruptStore`].
pub fn load_items(storage: &dyn StorageAdapter, key: &str) -> Result<Vec<TodoItem>, StoreError> {
    let Some(bytes) = storage.get(key)? else {
        debug!(key, "no persisted list; treating as empty");
        return Ok(Vec::new());
    };

    serde_json::from_slice(&bytes).map_err(|source| StoreError::CorruptStore {
        key: key.to_string(),
        source,
    })
}

fn stash_corrupt_blob(storage: &dyn StorageAdapter, key: &str) -> Result<(), StoreError> {
    if let Some(bytes) = storage.get(key)? {
        let stash_key = format!("{key}.corrupt");
        storage.set(&stash_key, &bytes)?;
        info!(key, stash_key = %stash_key, "preserved corrupt blob for diagnostics");
    }
    Ok(())
}
