//! Generational handle table.
//!
//! Slots hold `(generation, entry)` and a handle is `(index, generation)`.
//! Freeing a slot bumps its generation, so a handle kept after close never
//! resolves to the object that later reuses the index. A slot whose
//! generation cannot be bumped any further is retired instead of reused.
//!
//! Every entry records the owner that created it. A lookup by any other owner
//! fails exactly like a stale handle. The table keeps an owner → slots index
//! so [`HandleTable::release_owner`] can free everything one channel holds
//! when it goes away.

use std::collections::{BTreeSet, HashMap};

use cryptex_proto::{ErrorCode, Handle};
use thiserror::Error;

/// Identifies the channel (or local context) a handle belongs to.
pub type OwnerId = u64;

/// Errors raised by [`HandleTable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// No free slot within the configured capacity
    #[error("handle table full ({capacity} live handles)")]
    Full {
        /// Configured capacity
        capacity: usize,
    },

    /// Handle is null, stale, unknown, or owned by someone else
    #[error("invalid handle {handle:?}")]
    InvalidHandle {
        /// The rejected handle
        handle: Handle,
    },

    /// The same handle was passed for two distinct roles
    #[error("handle {handle:?} passed for two roles")]
    Aliased {
        /// The repeated handle
        handle: Handle,
    },
}

impl TableError {
    /// Boundary code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Full { .. } => ErrorCode::InsufficientSpace,
            Self::InvalidHandle { .. } => ErrorCode::InvalidHandle,
            Self::Aliased { .. } => ErrorCode::InvalidParameter,
        }
    }
}

impl From<TableError> for ErrorCode {
    fn from(err: TableError) -> Self {
        err.code()
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<(OwnerId, T)>,
}

/// Arena of owner-scoped objects addressed by generational handles.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    /// Reusable slot indices, most recently freed last
    free: Vec<u32>,
    owners: HashMap<OwnerId, BTreeSet<u32>>,
    capacity: usize,
    live: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table holding at most `capacity` live entries.
    pub fn new(capacity: usize) -> Self {
        Self { slots: Vec::new(), free: Vec::new(), owners: HashMap::new(), capacity, live: 0 }
    }

    /// Maximum number of live entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries across all owners.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no entry is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of live entries held by `owner`.
    pub fn owner_len(&self, owner: OwnerId) -> usize {
        self.owners.get(&owner).map_or(0, BTreeSet::len)
    }

    /// Live handles held by `owner`, in slot order.
    pub fn owned_handles(&self, owner: OwnerId) -> Vec<Handle> {
        self.owners
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|&index| {
                let slot = self.slots.get(index as usize)?;
                slot.entry.as_ref().map(|_| Handle::new(index, slot.generation))
            })
            .collect()
    }

    /// Fail unless `needed` more entries fit.
    ///
    /// Callers that build an object before inserting it check this first so
    /// a full table fails without side effects.
    pub fn ensure_space(&self, needed: usize) -> Result<(), TableError> {
        if self.live + needed > self.capacity {
            return Err(TableError::Full { capacity: self.capacity });
        }
        Ok(())
    }

    /// Insert `value` for `owner` and mint its handle.
    pub fn insert(&mut self, owner: OwnerId, value: T) -> Result<Handle, TableError> {
        self.ensure_space(1)?;

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| TableError::Full { capacity: self.capacity })?;
                self.slots.push(Slot { generation: 1, entry: None });
                index
            },
        };

        let slot = &mut self.slots[index as usize];
        slot.entry = Some((owner, value));
        let handle = Handle::new(index, slot.generation);

        self.owners.entry(owner).or_default().insert(index);
        self.live += 1;
        Ok(handle)
    }

    /// Resolve `handle` for `owner`.
    pub fn get(&self, owner: OwnerId, handle: Handle) -> Result<&T, TableError> {
        match self.slots.get(handle.index() as usize) {
            Some(Slot { generation, entry: Some((slot_owner, value)) })
                if !handle.is_null() && *generation == handle.generation() && *slot_owner == owner =>
            {
                Ok(value)
            },
            _ => Err(TableError::InvalidHandle { handle }),
        }
    }

    /// Resolve `handle` for `owner`, mutably.
    pub fn get_mut(&mut self, owner: OwnerId, handle: Handle) -> Result<&mut T, TableError> {
        self.get(owner, handle)?;
        match self.slots.get_mut(handle.index() as usize) {
            Some(Slot { entry: Some((_, value)), .. }) => Ok(value),
            _ => Err(TableError::InvalidHandle { handle }),
        }
    }

    /// Resolve two distinct handles mutably at once.
    ///
    /// Both handles are validated before aliasing is checked, so a stale
    /// handle reports `InvalidHandle` even when repeated.
    pub fn get_pair_mut(
        &mut self,
        owner: OwnerId,
        first: Handle,
        second: Handle,
    ) -> Result<(&mut T, &mut T), TableError> {
        self.get(owner, first)?;
        self.get(owner, second)?;
        if first.index() == second.index() {
            return Err(TableError::Aliased { handle: first });
        }

        let (i, j) = (first.index() as usize, second.index() as usize);
        let (a, b) = if i < j {
            let (low, high) = self.slots.split_at_mut(j);
            (&mut low[i], &mut high[0])
        } else {
            let (low, high) = self.slots.split_at_mut(i);
            (&mut high[0], &mut low[j])
        };

        match (&mut a.entry, &mut b.entry) {
            (Some((_, a)), Some((_, b))) => Ok((a, b)),
            _ => Err(TableError::InvalidHandle { handle: first }),
        }
    }

    /// Remove the entry behind `handle` and return it.
    pub fn remove(&mut self, owner: OwnerId, handle: Handle) -> Result<T, TableError> {
        self.get(owner, handle)?;
        if let Some(indices) = self.owners.get_mut(&owner) {
            indices.remove(&handle.index());
            if indices.is_empty() {
                self.owners.remove(&owner);
            }
        }
        self.vacate(handle.index()).ok_or(TableError::InvalidHandle { handle })
    }

    /// Drop every entry held by `owner`, returning how many were freed.
    pub fn release_owner(&mut self, owner: OwnerId) -> usize {
        let Some(indices) = self.owners.remove(&owner) else {
            return 0;
        };
        indices.into_iter().filter_map(|index| self.vacate(index)).count()
    }

    fn vacate(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let (_, value) = slot.entry.take()?;
        self.live -= 1;

        // Retire slots that would wrap rather than reissue an old generation
        if slot.generation < u32::MAX {
            slot.generation += 1;
            self.free.push(index);
        }
        Some(value)
    }

    #[cfg(test)]
    fn set_generation(&mut self, index: u32, generation: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.generation = generation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_null() {
        let mut table = HandleTable::new(4);
        let handle = table.insert(1, "a").expect("space");
        assert!(!handle.is_null());
        assert_ne!(handle.to_raw(), 0);
        assert_eq!(table.get(1, Handle::NULL), Err(TableError::InvalidHandle { handle: Handle::NULL }));
    }

    #[test]
    fn closed_handle_stays_invalid_after_reuse() {
        let mut table = HandleTable::new(4);
        let old = table.insert(1, "old").expect("space");
        assert_eq!(table.remove(1, old), Ok("old"));

        let new = table.insert(1, "new").expect("space");
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(table.get(1, old).is_err());
        assert_eq!(table.get(1, new), Ok(&"new"));
        assert!(table.remove(1, old).is_err());
    }

    #[test]
    fn owners_are_isolated() {
        let mut table = HandleTable::new(4);
        let handle = table.insert(1, 10).expect("space");
        assert_eq!(table.get(2, handle), Err(TableError::InvalidHandle { handle }));
        assert!(table.remove(2, handle).is_err());
        assert_eq!(table.get(1, handle), Ok(&10));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = HandleTable::new(2);
        let a = table.insert(1, ()).expect("space");
        table.insert(2, ()).expect("space");
        assert_eq!(table.insert(1, ()), Err(TableError::Full { capacity: 2 }));
        assert_eq!(table.ensure_space(1), Err(TableError::Full { capacity: 2 }));

        table.remove(1, a).expect("live");
        assert!(table.ensure_space(1).is_ok());
        assert!(table.ensure_space(2).is_err());
    }

    #[test]
    fn release_owner_frees_only_that_owner() {
        let mut table = HandleTable::new(8);
        let mine: Vec<_> = (0..3).map(|i| table.insert(1, i).expect("space")).collect();
        let theirs = table.insert(2, 99).expect("space");

        assert_eq!(table.owner_len(1), 3);
        assert_eq!(table.owned_handles(1), mine);
        assert_eq!(table.release_owner(1), 3);
        assert_eq!(table.release_owner(1), 0);

        assert_eq!(table.len(), 1);
        assert!(mine.iter().all(|&h| table.get(1, h).is_err()));
        assert_eq!(table.get(2, theirs), Ok(&99));
    }

    #[test]
    fn pair_lookup() {
        let mut table = HandleTable::new(4);
        let a = table.insert(1, 1).expect("space");
        let b = table.insert(1, 2).expect("space");

        let (x, y) = table.get_pair_mut(1, b, a).expect("distinct");
        std::mem::swap(x, y);
        assert_eq!(table.get(1, a), Ok(&2));
        assert_eq!(table.get(1, b), Ok(&1));

        assert_eq!(table.get_pair_mut(1, a, a).map(|_| ()), Err(TableError::Aliased { handle: a }));
        table.remove(1, b).expect("live");
        assert_eq!(table.get_pair_mut(1, a, b).map(|_| ()), Err(TableError::InvalidHandle { handle: b }));
    }

    #[test]
    fn exhausted_generation_retires_slot() {
        let mut table = HandleTable::new(4);
        let first = table.insert(1, "a").expect("space");
        table.set_generation(first.index(), u32::MAX);
        let last = Handle::new(first.index(), u32::MAX);
        assert_eq!(table.remove(1, last), Ok("a"));

        let next = table.insert(1, "b").expect("space");
        assert_ne!(next.index(), first.index());
        assert!(table.get(1, last).is_err());
    }

    #[test]
    fn error_codes() {
        assert_eq!(TableError::Full { capacity: 1 }.code(), ErrorCode::InsufficientSpace);
        assert_eq!(TableError::InvalidHandle { handle: Handle::NULL }.code(), ErrorCode::InvalidHandle);
        assert_eq!(TableError::Aliased { handle: Handle::NULL }.code(), ErrorCode::InvalidParameter);
    }
}
