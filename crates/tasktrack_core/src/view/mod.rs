//! Unfinished / completed views reconciled from bus notifications.
//!
//! # Responsibility
//! - Seed both lists from a repository snapshot.
//! - Keep them consistent as `Saved` / `Deleted` notifications arrive.
//!
//! # Invariants
//! - An id appears at most once across both lists after any `Saved`.
//! - Lists keep arrival order; a replaced entry keeps its position.
//! - `Deleted` only touches `Unfinished`. A deleted item already in
//!   `Completed` stays there.
//! - Only the notification handlers mutate the lists.

use crate::bus::{HandlerResult, Notification, NotificationBus, Subscription};
use crate::model::todo::{Todo, TodoId, TodoVariant};
use crate::repo::{RepoResult, Repository};
use log::info;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Owner label used for the synchronizer's bus subscriptions.
pub const VIEW_OWNER: &str = "view_synchronizer";

#[derive(Debug, Default)]
struct ViewLists {
    unfinished: Vec<Todo>,
    completed: Vec<Todo>,
}

impl ViewLists {
    fn apply(&mut self, notification: &Notification) {
        match notification {
            Notification::Saved(item) => self.apply_saved(item),
            Notification::Deleted(item) => self.apply_deleted(item),
        }
    }

    fn apply_saved(&mut self, item: &Todo) {
        let (source, target) = if item.is_completed() {
            (&mut self.unfinished, &mut self.completed)
        } else {
            (&mut self.completed, &mut self.unfinished)
        };
        remove_by_id(source, item.id());
        replace_or_push(target, item.clone());
    }

    fn apply_deleted(&mut self, item: &Todo) {
        remove_by_id(&mut self.unfinished, item.id());
    }
}

fn remove_by_id(list: &mut Vec<Todo>, id: TodoId) {
    list.retain(|entry| entry.id() != id);
}

fn replace_or_push(list: &mut Vec<Todo>, item: Todo) {
    match list.iter_mut().find(|entry| entry.id() == item.id()) {
        Some(slot) => *slot = item,
        None => list.push(item),
    }
}

/// Maintains the unfinished and completed views of the todo set.
#[derive(Default)]
pub struct ViewSynchronizer {
    lists: Arc<RwLock<ViewLists>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ViewSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces both lists with the active items of `repo`, in its order.
    ///
    /// Deleted items are skipped; completed items go to `Completed`, the rest
    /// to `Unfinished`.
    pub fn initialize<T, R>(&self, repo: &R) -> RepoResult<()>
    where
        T: TodoVariant,
        R: Repository<T> + ?Sized,
    {
        let items = repo.list_all()?;
        let mut seeded = ViewLists::default();
        for item in items.into_iter().filter(|item| !item.is_deleted()) {
            let todo = item.into_todo();
            if todo.is_completed() {
                seeded.completed.push(todo);
            } else {
                seeded.unfinished.push(todo);
            }
        }

        info!(
            "event=view_init module=view status=ok unfinished={} completed={}",
            seeded.unfinished.len(),
            seeded.completed.len()
        );
        *self.write() = seeded;
        Ok(())
    }

    /// Starts reacting to `Saved` / `Deleted` on `bus`.
    pub fn attach(&self, bus: &NotificationBus) {
        let lists = Arc::clone(&self.lists);
        let subscription = bus.subscribe(VIEW_OWNER, move |notification| -> HandlerResult {
            lists
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(notification);
            Ok(())
        });
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    /// Releases every subscription made by [`ViewSynchronizer::attach`] on `bus`.
    ///
    /// Returns how many subscriptions were released.
    pub fn detach(&self, bus: &NotificationBus) -> usize {
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        subscriptions
            .into_iter()
            .map(|subscription| bus.unsubscribe(subscription))
            .filter(|released| *released)
            .count()
    }

    /// Snapshot of the unfinished list.
    pub fn unfinished(&self) -> Vec<Todo> {
        self.read().unfinished.clone()
    }

    /// Snapshot of the completed list.
    pub fn completed(&self) -> Vec<Todo> {
        self.read().completed.clone()
    }

    pub fn unfinished_ids(&self) -> Vec<TodoId> {
        self.read().unfinished.iter().map(TodoVariant::id).collect()
    }

    pub fn completed_ids(&self) -> Vec<TodoId> {
        self.read().completed.iter().map(TodoVariant::id).collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, ViewLists> {
        self.lists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ViewLists> {
        self.lists.write().unwrap_or_else(PoisonError::into_inner)
    }
}
