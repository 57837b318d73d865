//! In-process notification bus for todo changes.
//!
//! # Responsibility
//! - Deliver `Saved` / `Deleted` notifications to registered handlers.
//! - Hand out explicit subscription handles for deterministic teardown.
//!
//! # Invariants
//! - Delivery is synchronous, on the publisher's thread, in registration order.
//! - A failing handler stops delivery and its error reaches the publisher.
//! - Handlers registered or removed during a publish take effect on the
//!   next publish.

use crate::model::todo::{Todo, TodoVariant};
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Change broadcast after a todo is saved or soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Saved(Todo),
    Deleted(Todo),
}

impl Notification {
    pub fn todo(&self) -> &Todo {
        match self {
            Notification::Saved(todo) | Notification::Deleted(todo) => todo,
        }
    }

    fn event_name(&self) -> &'static str {
        match self {
            Notification::Saved(_) => "saved",
            Notification::Deleted(_) => "deleted",
        }
    }
}

/// Error a handler returns to abort delivery.
pub type HandlerResult = Result<(), String>;

type Handler = Arc<dyn Fn(&Notification) -> HandlerResult + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    Subscriber { owner: String, message: String },
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscriber { owner, message } => {
                write!(f, "subscriber `{owner}` failed: {message}")
            }
        }
    }
}

impl Error for BusError {}

/// Handle returned by [`NotificationBus::subscribe`].
///
/// Dropping the handle does not unsubscribe; pass it back to
/// [`NotificationBus::unsubscribe`].
#[must_use = "keep the subscription to unsubscribe it later"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct Entry {
    id: u64,
    owner: String,
    handler: Handler,
}

/// Synchronous publish/subscribe channel.
#[derive(Default)]
pub struct NotificationBus {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

static GLOBAL_BUS: Lazy<NotificationBus> = Lazy::new(NotificationBus::new);

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide bus shared by callers that do not carry their own.
    pub fn global() -> &'static NotificationBus {
        &GLOBAL_BUS
    }

    /// Registers `handler` under `owner` and returns its handle.
    pub fn subscribe<F>(&self, owner: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Notification) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let owner = owner.into();
        debug!("event=bus_subscribe module=bus owner={owner} subscription={id}");
        self.lock().push(Entry {
            id,
            owner,
            handler: Arc::new(handler),
        });
        Subscription { id }
    }

    /// Removes one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != subscription.id);
        before != entries.len()
    }

    /// Removes every subscription registered under `owner`.
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.owner != owner);
        let removed = before - entries.len();
        debug!("event=bus_unsubscribe module=bus owner={owner} removed={removed}");
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `notification` to every handler in registration order.
    ///
    /// # Errors
    /// - `BusError::Subscriber` from the first failing handler; handlers
    ///   after it are not called.
    pub fn publish(&self, notification: &Notification) -> Result<(), BusError> {
        let snapshot: Vec<(String, Handler)> = self
            .lock()
            .iter()
            .map(|entry| (entry.owner.clone(), Arc::clone(&entry.handler)))
            .collect();

        debug!(
            "event=bus_publish module=bus kind={} id={} subscribers={}",
            notification.event_name(),
            notification.todo().id(),
            snapshot.len()
        );

        for (owner, handler) in snapshot {
            if let Err(message) = handler(notification) {
                warn!(
                    "event=bus_publish module=bus status=error owner={owner} kind={}",
                    notification.event_name()
                );
                return Err(BusError::Subscriber { owner, message });
            }
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
