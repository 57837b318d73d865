//! Repository contracts and implementations.
//!
//! # Responsibility
//! - Define the keyed-store contract shared by every concrete entity type.
//! - Provide an in-memory store and SQLite stores over the shared-table schema.
//!
//! # Invariants
//! - `add` validates before storing and never overwrites under
//!   `AddPolicy::KeepExisting`; a duplicate id is a silent no-op.
//! - `list_all` and `find_by_title` follow insertion order.
//! - Repositories never publish notifications; callers do.

pub mod memory;
pub mod sqlite_todo;
pub mod sqlite_user;

use crate::db::DbError;
use crate::model::todo::{Bug, Feature, TaskItem, Todo, TodoKind, TodoVariant, ValidationError};
use crate::model::user::User;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub use memory::InMemoryRepository;
pub use sqlite_todo::SqliteTodoRepository;
pub use sqlite_user::SqliteUserRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Key that missed during a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(Uuid),
    Title(String),
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Title(title) => write!(f, "title `{title}`"),
        }
    }
}

#[derive(Debug)]
pub enum RepoError {
    NotFound(Lookup),
    Validation(ValidationError),
    Db(DbError),
    InvalidData(String),
    /// A stored row exists under the id but belongs to another variant.
    VariantMismatch {
        id: Uuid,
        expected: TodoKind,
        actual: TodoKind,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(lookup) => write!(f, "item not found: {lookup}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::VariantMismatch {
                id,
                expected,
                actual,
            } => write!(f, "item {id} is a {actual}, not a {expected}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::VariantMismatch { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// What `add` does when the id is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddPolicy {
    /// First writer wins; later adds are ignored.
    #[default]
    KeepExisting,
    /// Later adds replace the stored value at its original position.
    Replace,
}

/// Result of a single `add` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Ignored,
    Replaced,
}

/// Identity and lookup key of a storable entity.
pub trait Record: Clone + Send + Sync {
    fn record_id(&self) -> Uuid;
    /// Text matched by `find_by_title`.
    fn record_title(&self) -> &str;
    fn check(&self) -> Result<(), ValidationError>;
}

macro_rules! todo_record {
    ($($ty:ty),+) => {
        $(
            impl Record for $ty {
                fn record_id(&self) -> Uuid {
                    self.id()
                }

                fn record_title(&self) -> &str {
                    self.title()
                }

                fn check(&self) -> Result<(), ValidationError> {
                    self.validate()
                }
            }
        )+
    };
}

todo_record!(Todo, TaskItem, Feature, Bug);

impl Record for User {
    fn record_id(&self) -> Uuid {
        self.id
    }

    fn record_title(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

/// Keyed store for one concrete entity type.
pub trait Repository<T> {
    /// Returns the item stored under `id`.
    fn get(&self, id: Uuid) -> RepoResult<T>;
    /// Returns the earliest-inserted item whose title equals `title` exactly.
    fn find_by_title(&self, title: &str) -> RepoResult<T>;
    /// Returns an insertion-ordered snapshot.
    fn list_all(&self) -> RepoResult<Vec<T>>;
    /// Stores `item` unless its id is already present (see [`AddPolicy`]).
    fn add(&self, item: &T) -> RepoResult<AddOutcome>;
    /// Stores `item`, overwriting any value under its id in place.
    ///
    /// Used for revisions of an item the caller already holds; never
    /// returns `AddOutcome::Ignored`.
    fn upsert(&self, item: &T) -> RepoResult<AddOutcome>;
    /// Flushes pending writes to the durable store.
    fn commit(&self) -> RepoResult<()>;
    /// Discards every write made since the last `commit`.
    ///
    /// Stores without a pending state have nothing to discard.
    fn rollback(&self) -> RepoResult<()>;
}

impl<T, R: Repository<T> + ?Sized> Repository<T> for &R {
    fn get(&self, id: Uuid) -> RepoResult<T> {
        (**self).get(id)
    }

    fn find_by_title(&self, title: &str) -> RepoResult<T> {
        (**self).find_by_title(title)
    }

    fn list_all(&self) -> RepoResult<Vec<T>> {
        (**self).list_all()
    }

    fn add(&self, item: &T) -> RepoResult<AddOutcome> {
        (**self).add(item)
    }

    fn upsert(&self, item: &T) -> RepoResult<AddOutcome> {
        (**self).upsert(item)
    }

    fn commit(&self) -> RepoResult<()> {
        (**self).commit()
    }

    fn rollback(&self) -> RepoResult<()> {
        (**self).rollback()
    }
}

impl<T, R: Repository<T> + ?Sized> Repository<T> for Arc<R> {
    fn get(&self, id: Uuid) -> RepoResult<T> {
        (**self).get(id)
    }

    fn find_by_title(&self, title: &str) -> RepoResult<T> {
        (**self).find_by_title(title)
    }

    fn list_all(&self) -> RepoResult<Vec<T>> {
        (**self).list_all()
    }

    fn add(&self, item: &T) -> RepoResult<AddOutcome> {
        (**self).add(item)
    }

    fn upsert(&self, item: &T) -> RepoResult<AddOutcome> {
        (**self).upsert(item)
    }

    fn commit(&self) -> RepoResult<()> {
        (**self).commit()
    }

    fn rollback(&self) -> RepoResult<()> {
        (**self).rollback()
    }
}
