//! Todo hierarchy: the shared header, the concrete variants and their union.
//!
//! # Responsibility
//! - Model `TaskItem`, `Feature` and `Bug` as distinct structs sharing one
//!   `TodoHeader`, and `Todo` as the tagged union over them.
//! - Translate variant tags and severities to and from their stored forms.
//!
//! # Invariants
//! - `id` is stable for the lifetime of an item; updates copy, never mutate.
//! - `title` must be non-blank before an item is accepted for save.
//! - Serialized todos carry a `$type` tag naming their concrete variant.

use crate::model::user::User;
use crate::model::now_epoch_ms;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier shared by every todo variant.
pub type TodoId = Uuid;

/// Validation failures raised before an entity is accepted for save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    EmptyTitle,
    EmptyName,
    NilId,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title cannot be empty"),
            Self::EmptyName => write!(f, "user name cannot be empty"),
            Self::NilId => write!(f, "id must not be nil"),
        }
    }
}

impl Error for ValidationError {}

/// Concrete variant tag of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TodoKind {
    TaskItem,
    Feature,
    Bug,
}

impl TodoKind {
    /// Every variant, in declaration order.
    pub const ALL: [TodoKind; 3] = [TodoKind::TaskItem, TodoKind::Feature, TodoKind::Bug];

    /// Tag text used by the codec and the `discriminator` column.
    pub fn as_str(self) -> &'static str {
        match self {
            TodoKind::TaskItem => "TaskItem",
            TodoKind::Feature => "Feature",
            TodoKind::Bug => "Bug",
        }
    }

    /// Parses a tag produced by [`TodoKind::as_str`]. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TaskItem" => Some(TodoKind::TaskItem),
            "Feature" => Some(TodoKind::Feature),
            "Bug" => Some(TodoKind::Bug),
            _ => None,
        }
    }
}

impl Display for TodoKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bug severity. Serialized by name, stored by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn ordinal(self) -> i64 {
        match self {
            Severity::Minor => 0,
            Severity::Major => 1,
            Severity::Critical => 2,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Severity::Minor),
            1 => Some(Severity::Major),
            2 => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Screenshot or other attachment owned by a bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    /// Opaque encoded payload (base64 text in practice).
    pub data: String,
}

impl Image {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
        }
    }
}

/// Fields shared by every todo variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoHeader {
    pub id: TodoId,
    pub title: String,
    /// Unix epoch milliseconds.
    pub created_date: i64,
    pub is_completed: bool,
    /// Soft-delete flag; deleted items stay in storage.
    pub is_deleted: bool,
    pub created_by: User,
    /// Tree edge to another todo. Cycles are not checked.
    pub parent: Option<TodoId>,
    /// Unix epoch milliseconds.
    pub due_date: Option<i64>,
}

impl TodoHeader {
    /// Creates an open, active header with a generated id stamped now.
    pub fn new(title: impl Into<String>, created_by: User) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            created_date: now_epoch_ms(),
            is_completed: false,
            is_deleted: false,
            created_by,
            parent: None,
            due_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        self.created_by.validate()
    }
}

/// Plain task with no fields beyond the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    #[serde(flatten)]
    pub header: TodoHeader,
}

impl TaskItem {
    fn validate_fields(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    pub fn new(title: impl Into<String>, created_by: User) -> Self {
        Self {
            header: TodoHeader::new(title, created_by),
        }
    }
}

/// Feature request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(flatten)]
    pub header: TodoHeader,
    pub description: String,
    pub component: String,
    pub priority: u32,
    pub assigned_to: User,
}

impl Feature {
    fn validate_fields(&self) -> Result<(), ValidationError> {
        self.assigned_to.validate()
    }
}

/// Bug report with ordered image attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    #[serde(flatten)]
    pub header: TodoHeader,
    pub description: String,
    pub severity: Severity,
    pub affected_version: String,
    pub affected_users: u32,
    pub assigned_to: User,
    pub images: Vec<Image>,
}

impl Bug {
    fn validate_fields(&self) -> Result<(), ValidationError> {
        self.assigned_to.validate()?;
        if self.images.iter().any(|image| image.id.is_nil()) {
            return Err(ValidationError::NilId);
        }
        Ok(())
    }

    /// Returns a copy with `image` appended after the existing attachments.
    pub fn with_image(&self, image: Image) -> Self {
        let mut next = self.clone();
        next.images.push(image);
        next
    }
}

/// Tagged union over the concrete todo variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Todo {
    TaskItem(TaskItem),
    Feature(Feature),
    Bug(Bug),
}

impl Todo {
    pub fn kind(&self) -> TodoKind {
        match self {
            Todo::TaskItem(_) => TodoKind::TaskItem,
            Todo::Feature(_) => TodoKind::Feature,
            Todo::Bug(_) => TodoKind::Bug,
        }
    }
}

impl From<TaskItem> for Todo {
    fn from(value: TaskItem) -> Self {
        Todo::TaskItem(value)
    }
}

impl From<Feature> for Todo {
    fn from(value: Feature) -> Self {
        Todo::Feature(value)
    }
}

impl From<Bug> for Todo {
    fn from(value: Bug) -> Self {
        Todo::Bug(value)
    }
}

/// Common behavior of `Todo` and each concrete variant.
///
/// Every `with_*` helper returns a new value with the same id; the receiver
/// is left untouched.
pub trait TodoVariant: Clone + Send + Sync + 'static {
    /// Variant served by a store of this type; `None` means every variant.
    const KIND: Option<TodoKind>;

    fn header(&self) -> &TodoHeader;
    fn header_mut(&mut self) -> &mut TodoHeader;
    fn into_todo(self) -> Todo;
    /// Narrows a union value; `None` when the variant does not match.
    fn from_todo(todo: Todo) -> Option<Self>;

    fn id(&self) -> TodoId {
        self.header().id
    }

    fn title(&self) -> &str {
        &self.header().title
    }

    fn is_completed(&self) -> bool {
        self.header().is_completed
    }

    fn is_deleted(&self) -> bool {
        self.header().is_deleted
    }

    /// Checks the header, nested users and attachment ids.
    fn validate(&self) -> Result<(), ValidationError>;

    fn with_title(&self, title: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.header_mut().title = title.into();
        next
    }

    fn with_completed(&self, is_completed: bool) -> Self {
        let mut next = self.clone();
        next.header_mut().is_completed = is_completed;
        next
    }

    fn with_parent(&self, parent: Option<TodoId>) -> Self {
        let mut next = self.clone();
        next.header_mut().parent = parent;
        next
    }

    fn with_due_date(&self, due_date: Option<i64>) -> Self {
        let mut next = self.clone();
        next.header_mut().due_date = due_date;
        next
    }

    /// Returns the soft-deleted copy of this item.
    fn mark_deleted(&self) -> Self {
        let mut next = self.clone();
        next.header_mut().is_deleted = true;
        next
    }
}

macro_rules! concrete_variant {
    ($ty:ident) => {
        impl TodoVariant for $ty {
            const KIND: Option<TodoKind> = Some(TodoKind::$ty);

            fn header(&self) -> &TodoHeader {
                &self.header
            }

            fn header_mut(&mut self) -> &mut TodoHeader {
                &mut self.header
            }

            fn into_todo(self) -> Todo {
                Todo::$ty(self)
            }

            fn from_todo(todo: Todo) -> Option<Self> {
                match todo {
                    Todo::$ty(value) => Some(value),
                    _ => None,
                }
            }

            fn validate(&self) -> Result<(), ValidationError> {
                self.header.validate()?;
                self.validate_fields()
            }
        }
    };
}

concrete_variant!(TaskItem);
concrete_variant!(Feature);
concrete_variant!(Bug);

impl TodoVariant for Todo {
    const KIND: Option<TodoKind> = None;

    fn header(&self) -> &TodoHeader {
        match self {
            Todo::TaskItem(item) => &item.header,
            Todo::Feature(item) => &item.header,
            Todo::Bug(item) => &item.header,
        }
    }

    fn header_mut(&mut self) -> &mut TodoHeader {
        match self {
            Todo::TaskItem(item) => &mut item.header,
            Todo::Feature(item) => &mut item.header,
            Todo::Bug(item) => &mut item.header,
        }
    }

    fn into_todo(self) -> Todo {
        self
    }

    fn from_todo(todo: Todo) -> Option<Self> {
        Some(todo)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Todo::TaskItem(item) => item.validate(),
            Todo::Feature(item) => item.validate(),
            Todo::Bug(item) => item.validate(),
        }
    }
}
