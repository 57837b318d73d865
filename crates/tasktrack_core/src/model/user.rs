//! User value referenced by todo authorship and assignment.

use crate::model::todo::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// A person who creates or is assigned todos.
///
/// Todos hold a copy of the user value; they never own the user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    /// Creates a user with a freshly generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Checks id and name before the user is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}
