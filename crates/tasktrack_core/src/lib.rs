//! Core domain logic for the task tracker.
//! Entity model, repositories, change notifications, view lists and the
//! import/export codec live here; UI layers only call into this crate.

pub mod bus;
pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod view;

pub use bus::{BusError, Notification, NotificationBus, Subscription};
pub use codec::{decode, encode, CodecError};
pub use config::{ConfigError, TrackerConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::todo::{
    Bug, Feature, Image, Severity, TaskItem, Todo, TodoHeader, TodoId, TodoKind, TodoVariant,
    ValidationError,
};
pub use model::user::{User, UserId};
pub use repo::{
    AddOutcome, AddPolicy, InMemoryRepository, Lookup, RepoError, RepoResult, Repository,
    SqliteTodoRepository, SqliteUserRepository,
};
pub use service::context::UserContext;
pub use service::editor::{BugDraft, DraftHeader, Editable, FeatureDraft, TodoEditor};
pub use service::transfer::{export_to_path, import_from_path, import_text, ImportReport};
pub use service::{ServiceError, ServiceResult};
pub use view::ViewSynchronizer;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
