//! Ghost type identity tags
//!
//! Ghost interfaces have no host representation, so an object's guest type
//! identity is attached out of band: a process-wide table maps object
//! identity to a [`GuestTypeTag`] without keeping the object alive.
//!
//! The table is keyed by the object's allocation address and holds only a
//! `Weak` to it. A live `Weak` pins the allocation (not the value), so an
//! address cannot be reused while its entry exists; entries whose object has
//! been dropped answer "no tag" and are swept every few inserts.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use corvid_sdk::{BridgeError, BridgeResult};
use dashmap::DashMap;
use once_cell::race::OnceBox;

use crate::defaults::TAG_PURGE_INTERVAL;
use crate::host::HostRef;
use crate::types::GuestTypeTag;

struct TagEntry {
    target: Weak<dyn Any + Send + Sync>,
    tag: GuestTypeTag,
}

impl TagEntry {
    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

struct TagTable {
    entries: DashMap<usize, TagEntry>,
    inserts: AtomicUsize,
}

/// Weak, identity-keyed tag store.
pub struct TagStore {
    table: OnceBox<TagTable>,
    purge_interval: usize,
}

static GLOBAL: TagStore = TagStore::new(TAG_PURGE_INTERVAL);

/// The process-wide tag store.
pub fn global() -> &'static TagStore {
    &GLOBAL
}

fn identity<T>(object: &Arc<T>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

impl TagStore {
    /// A store that sweeps dead entries every `purge_interval` inserts
    /// (0 disables sweeping).
    pub const fn new(purge_interval: usize) -> Self {
        Self {
            table: OnceBox::new(),
            purge_interval,
        }
    }

    fn table(&self) -> &TagTable {
        // concurrent first callers each build a table; exactly one is installed
        self.table.get_or_init(|| {
            tracing::debug!("installing ghost tag table");
            Box::new(TagTable {
                entries: DashMap::new(),
                inserts: AtomicUsize::new(0),
            })
        })
    }

    /// Attach `tag` to `object`, replacing any previous tag.
    pub fn set_tag<T: Any + Send + Sync>(&self, object: &Arc<T>, tag: GuestTypeTag) {
        let table = self.table();
        let key = identity(object);
        let target: Weak<dyn Any + Send + Sync> = Arc::downgrade(object) as Weak<T>;
        tracing::trace!(key, tag = %tag, "set ghost tag");
        table.entries.insert(key, TagEntry { target, tag });

        let inserts = table.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if self.purge_interval != 0 && inserts % self.purge_interval == 0 {
            self.purge();
        }
    }

    /// The tag attached to `object`, if any.
    pub fn get_tag<T: Any + Send + Sync>(&self, object: &Arc<T>) -> Option<GuestTypeTag> {
        let tag = self
            .table()
            .entries
            .get(&identity(object))
            .filter(|entry| entry.is_live())
            .map(|entry| entry.tag.clone());
        tracing::trace!(key = identity(object), found = tag.is_some(), "get ghost tag");
        tag
    }

    /// Whether `object` carries a tag assignable to `tag` at array rank `rank`.
    pub fn is_ghost_array_instance<T: Any + Send + Sync>(
        &self,
        object: &Arc<T>,
        tag: &GuestTypeTag,
        rank: u32,
    ) -> bool {
        let target = tag.make_array_type(rank);
        self.get_tag(object)
            .map_or(false, |actual| actual.is_assignable_to(&target))
    }

    /// Guest checked cast of `object` to the `rank`-dimensional array of ghost
    /// `tag`. A null reference always passes.
    pub fn cast_ghost_array(
        &self,
        object: Option<&HostRef>,
        tag: &GuestTypeTag,
        rank: u32,
    ) -> BridgeResult<()> {
        match object {
            None => Ok(()),
            Some(obj) if self.is_ghost_array_instance(obj, tag, rank) => Ok(()),
            Some(obj) => Err(throw_class_cast(obj.class_name(), tag, rank)),
        }
    }

    /// Entries whose object is still alive.
    pub fn live_entries(&self) -> usize {
        self.table()
            .entries
            .iter()
            .filter(|entry| entry.is_live())
            .count()
    }

    /// All entries, including ones awaiting a sweep.
    pub fn len(&self) -> usize {
        self.table().entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose object is gone; returns how many were removed.
    pub fn purge(&self) -> usize {
        let table = self.table();
        let before = table.entries.len();
        table.entries.retain(|_, entry| entry.is_live());
        let removed = before.saturating_sub(table.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "purged ghost tags");
        }
        removed
    }
}

/// The guest class-cast failure for a failed ghost array cast.
pub fn throw_class_cast(class_name: &str, tag: &GuestTypeTag, rank: u32) -> BridgeError {
    let mut message = format!("{} cannot be cast to ", class_name);
    message.push_str(&"[".repeat(rank as usize));
    message.push('L');
    message.push_str(tag.name());
    message.push(';');
    BridgeError::ClassCast(message)
}
