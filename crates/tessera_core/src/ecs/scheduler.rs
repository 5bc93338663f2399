//! # System Scheduler
//!
//! Keeps the priority-ordered system list plus the queues that make it safe
//! to add, remove or re-prioritize systems while a pass is running.
//!
//! ```text
//!            add (outside pass)            remove (outside pass)
//!   ───────────────────────────► ordered ───────────────────────────► gone
//!            add (inside pass)    ▲         remove (inside pass)
//!   ──────► pending_add ──────────┘ ordered ──► pending_remove ─────► gone
//!                 next update                  end of pass
//! ```
//!
//! While a pass runs ([`begin_pass`](Scheduler::begin_pass) to
//! [`end_pass`](Scheduler::end_pass)) every structural change is queued, so
//! the ordered list keeps its shape and can be walked by index. Each system
//! is lent out of its entry for the duration of one hook
//! ([`take_system`](Scheduler::take_system) /
//! [`restore_system`](Scheduler::restore_system)). The scheduler never calls
//! system hooks itself; the manager does, because hooks need `&mut Manager`.

use std::any::TypeId;
use std::collections::HashMap;

use super::system::{System, SystemId};

/// One registered system and its ordering key.
pub(crate) struct SystemEntry {
    pub(crate) id: SystemId,
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) priority: i32,
    pub(crate) sequence: u64,
    /// `None` while one of its hooks runs.
    pub(crate) system: Option<Box<dyn System>>,
}

impl SystemEntry {
    fn key(&self) -> (i32, u64) {
        (self.priority, self.sequence)
    }
}

/// Priority-ordered system list with deferred mutation.
#[derive(Default)]
pub(crate) struct Scheduler {
    ordered: Vec<SystemEntry>,
    pending_add: Vec<SystemEntry>,
    pending_remove: Vec<SystemId>,
    pending_priority: Vec<(SystemId, i32)>,
    by_type: HashMap<TypeId, SystemId>,
    by_name: HashMap<&'static str, SystemId>,
    next_id: u32,
    next_sequence: u64,
    updating: bool,
}

impl Scheduler {
    /// Whether a pass is running.
    pub(crate) const fn is_updating(&self) -> bool {
        self.updating
    }

    /// Number of systems currently known, pending ones included.
    pub(crate) fn len(&self) -> usize {
        self.by_type.len()
    }

    pub(crate) fn id_of_type(&self, type_id: TypeId) -> Option<SystemId> {
        self.by_type.get(&type_id).copied()
    }

    pub(crate) fn id_of_name(&self, name: &str) -> Option<SystemId> {
        self.by_name.get(name).copied()
    }

    /// Ids of the ordered list, in run order.
    pub(crate) fn ordered_ids(&self) -> Vec<SystemId> {
        self.ordered.iter().map(|entry| entry.id).collect()
    }

    /// Builds an entry with the next dense id. Returns `None` if a system of
    /// this type, or another type with the same short name, is already known.
    pub(crate) fn make_entry<S: System>(&mut self, system: S) -> Option<SystemEntry> {
        let type_id = TypeId::of::<S>();
        let name = super::system::short_type_name(std::any::type_name::<S>());
        if self.by_type.contains_key(&type_id) || self.by_name.contains_key(name) {
            return None;
        }

        let id = SystemId::new(self.next_id);
        self.next_id += 1;
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.by_type.insert(type_id, id);
        self.by_name.insert(name, id);

        Some(SystemEntry {
            id,
            name,
            type_id,
            priority: system.priority(),
            sequence,
            system: Some(Box::new(system)),
        })
    }

    /// Inserts into the ordered list after every entry with a lower or
    /// equal key.
    pub(crate) fn insert(&mut self, entry: SystemEntry) {
        let key = entry.key();
        let at = self.ordered.partition_point(|other| other.key() <= key);
        self.ordered.insert(at, entry);
    }

    /// Queues an entry for the start of the next update.
    pub(crate) fn defer_add(&mut self, entry: SystemEntry) {
        self.pending_add.push(entry);
    }

    pub(crate) fn take_pending_adds(&mut self) -> Vec<SystemEntry> {
        std::mem::take(&mut self.pending_add)
    }

    /// Records a priority change, applied by [`apply_priorities`](Self::apply_priorities).
    pub(crate) fn set_priority(&mut self, id: SystemId, priority: i32) -> bool {
        if !self.by_type.values().any(|known| *known == id) {
            return false;
        }
        self.pending_priority.push((id, priority));
        true
    }

    /// Applies queued priority changes and re-sorts if any were queued.
    pub(crate) fn apply_priorities(&mut self) {
        if self.pending_priority.is_empty() {
            return;
        }

        for (id, priority) in std::mem::take(&mut self.pending_priority) {
            if let Some(entry) = self
                .ordered
                .iter_mut()
                .chain(self.pending_add.iter_mut())
                .find(|entry| entry.id == id)
            {
                entry.priority = priority;
            }
        }
        // Stable, and the sequence breaks ties.
        self.ordered.sort_by_key(SystemEntry::key);
    }

    /// Unlinks a system outside a pass. A system still waiting in the
    /// add queue is unlinked too; it was never initialized.
    pub(crate) fn remove(&mut self, id: SystemId) -> Option<(SystemEntry, bool)> {
        if let Some(at) = self.pending_add.iter().position(|entry| entry.id == id) {
            let entry = self.pending_add.remove(at);
            self.forget(&entry);
            return Some((entry, false));
        }

        let at = self.ordered.iter().position(|entry| entry.id == id)?;
        let entry = self.ordered.remove(at);
        self.forget(&entry);
        Some((entry, true))
    }

    /// Queues a removal during a pass. Returns `false` for an unknown id.
    pub(crate) fn defer_remove(&mut self, id: SystemId) -> bool {
        if !self.by_type.values().any(|known| *known == id) {
            return false;
        }
        if !self.pending_remove.contains(&id) {
            self.pending_remove.push(id);
        }
        true
    }

    pub(crate) fn take_pending_removes(&mut self) -> Vec<SystemId> {
        std::mem::take(&mut self.pending_remove)
    }

    /// Marks the start of a pass. Until [`end_pass`](Self::end_pass) every
    /// change to the ordered list must go through the pending queues.
    pub(crate) fn begin_pass(&mut self) {
        self.updating = true;
    }

    pub(crate) fn end_pass(&mut self) {
        self.updating = false;
    }

    /// Number of entries in the ordered list.
    pub(crate) fn ordered_len(&self) -> usize {
        self.ordered.len()
    }

    /// Position of a system in the ordered list.
    pub(crate) fn position(&self, id: SystemId) -> Option<usize> {
        self.ordered.iter().position(|entry| entry.id == id)
    }

    /// Lends out the system at `index`. `None` past the end or while the
    /// system is already lent out.
    pub(crate) fn take_system(&mut self, index: usize) -> Option<(SystemId, Box<dyn System>)> {
        let entry = self.ordered.get_mut(index)?;
        Some((entry.id, entry.system.take()?))
    }

    /// Returns a lent system to its entry. Dropped if the entry is gone.
    pub(crate) fn restore_system(&mut self, index: usize, id: SystemId, system: Box<dyn System>) {
        let index = match self.ordered.get(index) {
            Some(entry) if entry.id == id => Some(index),
            _ => self.position(id),
        };
        if let Some(entry) = index.and_then(|index| self.ordered.get_mut(index)) {
            entry.system = Some(system);
        }
    }

    /// Drains the ordered list, in run order, and resets the registries.
    /// Systems still waiting to be added are dropped; they were never
    /// initialized.
    pub(crate) fn drain(&mut self) -> Vec<SystemEntry> {
        let entries = std::mem::take(&mut self.ordered);
        self.pending_add.clear();
        self.pending_remove.clear();
        self.pending_priority.clear();
        self.by_type.clear();
        self.by_name.clear();
        entries
    }

    fn forget(&mut self, entry: &SystemEntry) {
        self.by_type.remove(&entry.type_id);
        if self.by_name.get(entry.name) == Some(&entry.id) {
            self.by_name.remove(entry.name);
        }
    }
}
