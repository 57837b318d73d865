//! Concurrent in-memory repository.
//!
//! # Responsibility
//! - Keep entities in insertion order with O(1) lookup by id.
//! - Serve concurrent readers and writers from independent threads.
//!
//! # Invariants
//! - Racing `add` calls on one id leave exactly one stored value, the first
//!   writer's, under `AddPolicy::KeepExisting`.
//! - `list_all` returns a copy; later writes never show up in it.

use crate::repo::{AddOutcome, AddPolicy, Lookup, Record, RepoError, RepoResult, Repository};
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

struct Slots<T> {
    items: Vec<T>,
    index: HashMap<Uuid, usize>,
}

/// Thread-safe store backed by an insertion-ordered vector.
pub struct InMemoryRepository<T> {
    policy: AddPolicy,
    slots: RwLock<Slots<T>>,
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::with_policy(AddPolicy::default())
    }

    pub fn with_policy(policy: AddPolicy) -> Self {
        Self {
            policy,
            slots: RwLock::new(Slots {
                items: Vec::new(),
                index: HashMap::new(),
            }),
        }
    }

    pub fn policy(&self) -> AddPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.read(|slots| slots.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, item: &T, policy: AddPolicy) -> RepoResult<AddOutcome> {
        item.check()?;

        let id = item.record_id();
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let outcome = match (slots.index.get(&id).copied(), policy) {
            (Some(_), AddPolicy::KeepExisting) => AddOutcome::Ignored,
            (Some(position), AddPolicy::Replace) => {
                slots.items[position] = item.clone();
                AddOutcome::Replaced
            }
            (None, _) => {
                let position = slots.items.len();
                slots.items.push(item.clone());
                slots.index.insert(id, position);
                AddOutcome::Inserted
            }
        };
        drop(slots);

        debug!("event=repo_add module=repo store=memory id={id} outcome={outcome:?}");
        Ok(outcome)
    }

    fn read<R>(&self, f: impl FnOnce(&Slots<T>) -> R) -> R {
        // Writers validate before locking, so poisoned slots are still consistent.
        let guard = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Repository<T> for InMemoryRepository<T> {
    fn get(&self, id: Uuid) -> RepoResult<T> {
        self.read(|slots| {
            slots
                .index
                .get(&id)
                .map(|position| slots.items[*position].clone())
        })
        .ok_or(RepoError::NotFound(Lookup::Id(id)))
    }

    fn find_by_title(&self, title: &str) -> RepoResult<T> {
        self.read(|slots| {
            slots
                .items
                .iter()
                .find(|item| item.record_title() == title)
                .cloned()
        })
        .ok_or_else(|| RepoError::NotFound(Lookup::Title(title.to_string())))
    }

    fn list_all(&self) -> RepoResult<Vec<T>> {
        Ok(self.read(|slots| slots.items.clone()))
    }

    fn add(&self, item: &T) -> RepoResult<AddOutcome> {
        self.store(item, self.policy)
    }

    fn upsert(&self, item: &T) -> RepoResult<AddOutcome> {
        self.store(item, AddPolicy::Replace)
    }

    fn commit(&self) -> RepoResult<()> {
        Ok(())
    }

    fn rollback(&self) -> RepoResult<()> {
        Ok(())
    }
}
