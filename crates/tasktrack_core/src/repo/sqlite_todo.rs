//! SQLite repository over the shared `todos` table.
//!
//! # Responsibility
//! - Map each todo variant onto one row selected by `discriminator`, with
//!   bug images in the `images` child table.
//! - Serve one concrete variant per repository instance, or the whole
//!   hierarchy when instantiated with `Todo`.
//!
//! # Invariants
//! - Variant-only columns are written for their variant and NULL otherwise.
//! - Rows are returned in insertion (`rowid`) order; images in `position` order.
//! - Users referenced by a todo are stored if absent and never overwritten.

use crate::db::migrations::ensure_schema_ready;
use crate::db::{
    begin_pending_write, commit_pending_write, rollback_pending_write, within_savepoint,
};
use crate::model::todo::{
    Bug, Feature, Image, Severity, TaskItem, Todo, TodoHeader, TodoId, TodoKind, TodoVariant,
};
use crate::model::user::User;
use crate::repo::sqlite_user::{ensure_user, parse_uuid};
use crate::repo::{AddOutcome, AddPolicy, Lookup, RepoError, RepoResult, Repository};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::marker::PhantomData;
use uuid::Uuid;

const TODO_SELECT_SQL: &str = "SELECT
    t.id,
    t.discriminator,
    t.title,
    t.created_date,
    t.is_completed,
    t.is_deleted,
    t.created_by_id,
    creator.name AS created_by_name,
    t.parent_id,
    t.due_date,
    t.description,
    t.component,
    t.priority,
    t.severity,
    t.affected_version,
    t.affected_users,
    t.assigned_to_id,
    assignee.name AS assigned_to_name
FROM todos t
LEFT JOIN users creator ON creator.id = t.created_by_id
LEFT JOIN users assignee ON assignee.id = t.assigned_to_id
WHERE (?1 IS NULL OR t.discriminator = ?1)";

/// Todo store for variant `T` over a migrated connection.
pub struct SqliteTodoRepository<'conn, T> {
    conn: &'conn Connection,
    policy: AddPolicy,
    _variant: PhantomData<fn() -> T>,
}

impl<'conn, T: TodoVariant> SqliteTodoRepository<'conn, T> {
    /// Creates a repository; fails when the schema is not migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self {
            conn,
            policy: AddPolicy::default(),
            _variant: PhantomData,
        })
    }

    pub fn with_policy(mut self, policy: AddPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn discriminator_filter() -> Option<&'static str> {
        T::KIND.map(TodoKind::as_str)
    }

    fn query_todos(&self, clause: &str, key: Option<String>) -> RepoResult<Vec<T>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TODO_SELECT_SQL} {clause} ORDER BY t.rowid ASC;"))?;
        let mut rows = match key {
            Some(key) => stmt.query(params![Self::discriminator_filter(), key])?,
            None => stmt.query(params![Self::discriminator_filter()])?,
        };

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let mut todo = parse_todo_row(row)?;
            if let Todo::Bug(bug) = &mut todo {
                bug.images = load_images(self.conn, bug.header.id)?;
            }
            let id = todo.id();
            let item = T::from_todo(todo).ok_or_else(|| {
                RepoError::InvalidData(format!("row {id} does not match the requested variant"))
            })?;
            items.push(item);
        }
        Ok(items)
    }
}

impl<T: TodoVariant> Repository<T> for SqliteTodoRepository<'_, T> {
    fn get(&self, id: Uuid) -> RepoResult<T> {
        self.query_todos("AND t.id = ?2", Some(id.to_string()))?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound(Lookup::Id(id)))
    }

    fn find_by_title(&self, title: &str) -> RepoResult<T> {
        self.query_todos("AND t.title = ?2", Some(title.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(Lookup::Title(title.to_string())))
    }

    fn list_all(&self) -> RepoResult<Vec<T>> {
        self.query_todos("", None)
    }

    fn add(&self, item: &T) -> RepoResult<AddOutcome> {
        self.store(item, self.policy)
    }

    fn upsert(&self, item: &T) -> RepoResult<AddOutcome> {
        self.store(item, AddPolicy::Replace)
    }

    fn commit(&self) -> RepoResult<()> {
        commit_pending_write(self.conn)?;
        Ok(())
    }

    fn rollback(&self) -> RepoResult<()> {
        rollback_pending_write(self.conn)?;
        Ok(())
    }
}

impl<T: TodoVariant> SqliteTodoRepository<'_, T> {
    fn store(&self, item: &T, policy: AddPolicy) -> RepoResult<AddOutcome> {
        item.validate()?;
        let todo = item.clone().into_todo();
        let id = todo.id();
        begin_pending_write(self.conn)?;

        let outcome = within_savepoint(self.conn, || -> RepoResult<AddOutcome> {
            match (stored_kind(self.conn, id)?, policy) {
                (Some(actual), _) if actual != todo.kind() => Err(RepoError::VariantMismatch {
                    id,
                    expected: todo.kind(),
                    actual,
                }),
                (Some(_), AddPolicy::KeepExisting) => Ok(AddOutcome::Ignored),
                (Some(_), AddPolicy::Replace) => {
                    write_todo(self.conn, &todo, WriteMode::Update)?;
                    Ok(AddOutcome::Replaced)
                }
                (None, _) => {
                    write_todo(self.conn, &todo, WriteMode::Insert)?;
                    Ok(AddOutcome::Inserted)
                }
            }
        })?;

        debug!(
            "event=repo_add module=repo store=sqlite table=todos kind={} id={id} outcome={outcome:?}",
            todo.kind()
        );
        Ok(outcome)
    }
}

#[derive(Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
}

/// Variant-only columns; all `None` for a plain task.
#[derive(Default)]
struct VariantColumns<'a> {
    description: Option<&'a str>,
    component: Option<&'a str>,
    priority: Option<u32>,
    severity: Option<i64>,
    affected_version: Option<&'a str>,
    affected_users: Option<u32>,
    assigned_to: Option<&'a User>,
}

impl<'a> VariantColumns<'a> {
    fn of(todo: &'a Todo) -> Self {
        match todo {
            Todo::TaskItem(_) => Self::default(),
            Todo::Feature(feature) => Self {
                description: Some(&feature.description),
                component: Some(&feature.component),
                priority: Some(feature.priority),
                assigned_to: Some(&feature.assigned_to),
                ..Self::default()
            },
            Todo::Bug(bug) => Self {
                description: Some(&bug.description),
                severity: Some(bug.severity.ordinal()),
                affected_version: Some(&bug.affected_version),
                affected_users: Some(bug.affected_users),
                assigned_to: Some(&bug.assigned_to),
                ..Self::default()
            },
        }
    }
}

fn write_todo(conn: &Connection, todo: &Todo, mode: WriteMode) -> RepoResult<()> {
    let header = todo.header();
    let columns = VariantColumns::of(todo);

    ensure_user(conn, &header.created_by)?;
    if let Some(assignee) = columns.assigned_to {
        ensure_user(conn, assignee)?;
    }

    let sql = match mode {
        WriteMode::Insert => {
            "INSERT INTO todos (
                discriminator,
                title,
                created_date,
                is_completed,
                is_deleted,
                created_by_id,
                parent_id,
                due_date,
                description,
                component,
                priority,
                severity,
                affected_version,
                affected_users,
                assigned_to_id,
                id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);"
        }
        WriteMode::Update => {
            "UPDATE todos
             SET
                discriminator = ?1,
                title = ?2,
                created_date = ?3,
                is_completed = ?4,
                is_deleted = ?5,
                created_by_id = ?6,
                parent_id = ?7,
                due_date = ?8,
                description = ?9,
                component = ?10,
                priority = ?11,
                severity = ?12,
                affected_version = ?13,
                affected_users = ?14,
                assigned_to_id = ?15
             WHERE id = ?16;"
        }
    };

    conn.execute(
        sql,
        params![
            todo.kind().as_str(),
            header.title,
            header.created_date,
            header.is_completed,
            header.is_deleted,
            header.created_by.id.to_string(),
            header.parent.map(|parent| parent.to_string()),
            header.due_date,
            columns.description,
            columns.component,
            columns.priority,
            columns.severity,
            columns.affected_version,
            columns.affected_users,
            columns.assigned_to.map(|user| user.id.to_string()),
            header.id.to_string(),
        ],
    )?;

    if let Todo::Bug(bug) = todo {
        write_images(conn, bug)?;
    }
    Ok(())
}

fn write_images(conn: &Connection, bug: &Bug) -> RepoResult<()> {
    let bug_id = bug.header.id.to_string();
    conn.execute("DELETE FROM images WHERE bug_id = ?1;", [&bug_id])?;

    let mut stmt =
        conn.prepare("INSERT INTO images (id, bug_id, position, data) VALUES (?1, ?2, ?3, ?4);")?;
    for (position, image) in bug.images.iter().enumerate() {
        stmt.execute(params![
            image.id.to_string(),
            bug_id,
            i64::try_from(position).unwrap_or(i64::MAX),
            image.data,
        ])?;
    }
    Ok(())
}

fn load_images(conn: &Connection, bug_id: TodoId) -> RepoResult<Vec<Image>> {
    let mut stmt =
        conn.prepare("SELECT id, data FROM images WHERE bug_id = ?1 ORDER BY position ASC;")?;
    let mut rows = stmt.query([bug_id.to_string()])?;
    let mut images = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        images.push(Image {
            id: parse_uuid(&id_text, "images.id")?,
            data: row.get("data")?,
        });
    }
    Ok(images)
}

fn stored_kind(conn: &Connection, id: TodoId) -> RepoResult<Option<TodoKind>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT discriminator FROM todos WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    text.map(|value| parse_discriminator(&value)).transpose()
}

fn parse_discriminator(value: &str) -> RepoResult<TodoKind> {
    TodoKind::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid discriminator `{value}` in todos.discriminator"
        ))
    })
}

fn parse_todo_row(row: &Row<'_>) -> RepoResult<Todo> {
    let kind = parse_discriminator(&row.get::<_, String>("discriminator")?)?;
    let id_text: String = row.get("id")?;
    let parent = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "todos.parent_id"))
        .transpose()?;

    let header = TodoHeader {
        id: parse_uuid(&id_text, "todos.id")?,
        title: row.get("title")?,
        created_date: row.get("created_date")?,
        is_completed: row.get("is_completed")?,
        is_deleted: row.get("is_deleted")?,
        created_by: read_user(row, "created_by_id", "created_by_name")?,
        parent,
        due_date: row.get("due_date")?,
    };

    let todo = match kind {
        TodoKind::TaskItem => Todo::TaskItem(TaskItem { header }),
        TodoKind::Feature => Todo::Feature(Feature {
            header,
            description: required(row, "description")?,
            component: required(row, "component")?,
            priority: required(row, "priority")?,
            assigned_to: read_user(row, "assigned_to_id", "assigned_to_name")?,
        }),
        TodoKind::Bug => {
            let ordinal: i64 = required(row, "severity")?;
            let severity = Severity::from_ordinal(ordinal).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid severity `{ordinal}` in todos.severity"))
            })?;
            Todo::Bug(Bug {
                header,
                description: required(row, "description")?,
                severity,
                affected_version: required(row, "affected_version")?,
                affected_users: required(row, "affected_users")?,
                assigned_to: read_user(row, "assigned_to_id", "assigned_to_name")?,
                images: Vec::new(),
            })
        }
    };
    todo.validate()?;
    Ok(todo)
}

fn required<V: rusqlite::types::FromSql>(row: &Row<'_>, column: &'static str) -> RepoResult<V> {
    row.get::<_, Option<V>>(column)?
        .ok_or_else(|| RepoError::InvalidData(format!("missing todos.{column} for variant row")))
}

fn read_user(row: &Row<'_>, id_column: &'static str, name_column: &str) -> RepoResult<User> {
    let id_text: String = required(row, id_column)?;
    let name: Option<String> = row.get(name_column)?;
    let name = name.ok_or_else(|| {
        RepoError::InvalidData(format!("todos.{id_column} references missing user {id_text}"))
    })?;
    Ok(User::with_id(parse_uuid(&id_text, "todos user reference")?, name))
}
