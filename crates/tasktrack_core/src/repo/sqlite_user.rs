//! SQLite-backed user repository.

use crate::db::migrations::ensure_schema_ready;
use crate::db::{
    begin_pending_write, commit_pending_write, rollback_pending_write, within_savepoint,
};
use crate::model::user::User;
use crate::repo::{AddOutcome, AddPolicy, Lookup, RepoError, RepoResult, Repository};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT id, name FROM users";

/// User store over the `users` table. `find_by_title` matches `name`.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
    policy: AddPolicy,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self {
            conn,
            policy: AddPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: AddPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Repository<User> for SqliteUserRepository<'_> {
    fn get(&self, id: Uuid) -> RepoResult<User> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(read_user_row(row)),
            )
            .optional()?
            .ok_or(RepoError::NotFound(Lookup::Id(id)))?
    }

    fn find_by_title(&self, title: &str) -> RepoResult<User> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE name = ?1 ORDER BY rowid ASC LIMIT 1;"),
                [title],
                |row| Ok(read_user_row(row)),
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(Lookup::Title(title.to_string())))?
    }

    fn list_all(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(read_user_row(row)?);
        }
        Ok(users)
    }

    fn add(&self, item: &User) -> RepoResult<AddOutcome> {
        self.store(item, self.policy)
    }

    fn upsert(&self, item: &User) -> RepoResult<AddOutcome> {
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

impl SqliteUserRepository<'_> {
    fn store(&self, item: &User, policy: AddPolicy) -> RepoResult<AddOutcome> {
        item.validate()?;
        begin_pending_write(self.conn)?;

        let outcome = within_savepoint(self.conn, || -> RepoResult<AddOutcome> {
            let exists: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
                [item.id.to_string()],
                |row| row.get(0),
            )?;

            match (exists, policy) {
                (true, AddPolicy::KeepExisting) => Ok(AddOutcome::Ignored),
                (true, AddPolicy::Replace) => {
                    self.conn.execute(
                        "UPDATE users SET name = ?1 WHERE id = ?2;",
                        params![item.name, item.id.to_string()],
                    )?;
                    Ok(AddOutcome::Replaced)
                }
                (false, _) => {
                    self.conn.execute(
                        "INSERT INTO users (id, name) VALUES (?1, ?2);",
                        params![item.id.to_string(), item.name],
                    )?;
                    Ok(AddOutcome::Inserted)
                }
            }
        })?;

        debug!(
            "event=repo_add module=repo store=sqlite table=users id={} outcome={outcome:?}",
            item.id
        );
        Ok(outcome)
    }
}

/// Stores `user` unless a row with its id exists. Never overwrites.
pub(crate) fn ensure_user(conn: &Connection, user: &User) -> RepoResult<()> {
    user.validate()?;
    conn.execute(
        "INSERT INTO users (id, name) VALUES (?1, ?2) ON CONFLICT (id) DO NOTHING;",
        params![user.id.to_string(), user.name],
    )?;
    Ok(())
}

fn read_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "users.id")?;
    Ok(User::with_id(id, row.get::<_, String>("name")?))
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
