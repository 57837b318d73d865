//! Polymorphic import/export codec.
//!
//! # Responsibility
//! - Encode todo collections as a JSON array of `$type`-tagged objects.
//! - Decode such arrays back into their exact concrete variants.
//!
//! # Invariants
//! - Only `TaskItem`, `Feature` and `Bug` are accepted as declared types.
//!   Users and images appear only as nested, schema-typed values.
//! - Decoding is all-or-nothing: every tag is checked before any element is
//!   decoded, and no element is returned unless all of them decode and
//!   validate.
//! - An element may only carry the keys of its declared variant.
//! - `decode(encode(xs)) == xs`, ids included.

use crate::model::todo::{Todo, TodoKind, TodoVariant, ValidationError};
use log::{debug, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key carrying the concrete variant name of each element.
pub const TYPE_TAG: &str = "$type";

const HEADER_FIELDS: &[&str] = &[
    TYPE_TAG,
    "id",
    "title",
    "created_date",
    "is_completed",
    "is_deleted",
    "created_by",
    "parent",
    "due_date",
];

const FEATURE_FIELDS: &[&str] = &["description", "component", "priority", "assigned_to"];

const BUG_FIELDS: &[&str] = &[
    "description",
    "severity",
    "affected_version",
    "affected_users",
    "assigned_to",
    "images",
];

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug)]
pub enum CodecError {
    /// Text is not JSON, not an array, lacks a tag, or has malformed fields.
    Parse {
        index: Option<usize>,
        message: String,
    },
    /// Element declares a type outside the allow-list.
    TypeRejected { index: usize, declared: String },
    /// Element carries a key its declared variant does not have.
    UnexpectedField {
        index: usize,
        kind: TodoKind,
        field: String,
    },
    /// Element decoded but breaks an entity invariant.
    Invalid {
        index: usize,
        source: ValidationError,
    },
    Encode(serde_json::Error),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse {
                index: Some(index),
                message,
            } => write!(f, "malformed todo at index {index}: {message}"),
            Self::Parse {
                index: None,
                message,
            } => write!(f, "malformed todo file: {message}"),
            Self::TypeRejected { index, declared } => {
                write!(f, "type `{declared}` at index {index} is not importable")
            }
            Self::UnexpectedField { index, kind, field } => write!(
                f,
                "field `{field}` at index {index} does not belong to {}",
                kind.as_str()
            ),
            Self::Invalid { index, source } => write!(f, "invalid todo at index {index}: {source}"),
            Self::Encode(err) => write!(f, "failed to encode todos: {err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            Self::Parse { .. } | Self::TypeRejected { .. } | Self::UnexpectedField { .. } => None,
        }
    }
}

/// Encodes `items` as pretty-printed, tagged JSON.
pub fn encode(items: &[Todo]) -> CodecResult<String> {
    let text = serde_json::to_string_pretty(items).map_err(CodecError::Encode)?;
    debug!("event=codec_encode module=codec status=ok items={}", items.len());
    Ok(text)
}

/// Decodes tagged JSON produced by [`encode`].
///
/// # Errors
/// - `Parse` for malformed text, a non-array root, a missing/non-string tag,
///   or fields that do not fit the declared variant.
/// - `TypeRejected` for any tag outside the allow-list, reported before any
///   element is decoded.
/// - `UnexpectedField` for a key that belongs to another variant or to none.
/// - `Invalid` when a decoded element fails validation.
pub fn decode(text: &str) -> CodecResult<Vec<Todo>> {
    let root: Value = serde_json::from_str(text).map_err(|err| CodecError::Parse {
        index: None,
        message: err.to_string(),
    })?;
    let Value::Array(elements) = root else {
        return Err(CodecError::Parse {
            index: None,
            message: "expected a JSON array of todos".to_string(),
        });
    };

    let mut kinds = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match declared_kind(index, element) {
            Ok(kind) => kinds.push(kind),
            Err(err) => {
                warn!("event=codec_decode module=codec status=rejected error={err}");
                return Err(err);
            }
        }
    }
    for (index, (element, kind)) in elements.iter().zip(kinds).enumerate() {
        if let Err(err) = check_fields(index, kind, element) {
            warn!("event=codec_decode module=codec status=rejected error={err}");
            return Err(err);
        }
    }

    let mut items = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let todo: Todo = serde_json::from_value(element).map_err(|err| CodecError::Parse {
            index: Some(index),
            message: err.to_string(),
        })?;
        todo.validate()
            .map_err(|source| CodecError::Invalid { index, source })?;
        items.push(todo);
    }

    debug!("event=codec_decode module=codec status=ok items={}", items.len());
    Ok(items)
}

/// Reads and allow-list checks the declared type of one element.
fn declared_kind(index: usize, element: &Value) -> CodecResult<TodoKind> {
    let declared = element
        .get(TYPE_TAG)
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::Parse {
            index: Some(index),
            message: format!("missing string `{TYPE_TAG}` tag"),
        })?;

    TodoKind::parse(declared).ok_or_else(|| CodecError::TypeRejected {
        index,
        declared: declared.to_string(),
    })
}

/// Rejects keys outside the declared variant's field set.
fn check_fields(index: usize, kind: TodoKind, element: &Value) -> CodecResult<()> {
    let Some(object) = element.as_object() else {
        return Ok(());
    };
    let extra: &[&str] = match kind {
        TodoKind::TaskItem => &[],
        TodoKind::Feature => FEATURE_FIELDS,
        TodoKind::Bug => BUG_FIELDS,
    };

    match object
        .keys()
        .find(|key| !HEADER_FIELDS.contains(&key.as_str()) && !extra.contains(&key.as_str()))
    {
        Some(field) => Err(CodecError::UnexpectedField {
            index,
            kind,
            field: field.clone(),
        }),
        None => Ok(()),
    }
}
