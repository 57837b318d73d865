//! Import/export of the whole todo set.
//!
//! # Invariants
//! - Import decodes and validates the entire payload before the repository
//!   is touched; a rejected file stores nothing.
//! - A store failure part way through rolls back every row the import wrote.
//! - Views learn about imported items through one `Saved` per newly stored,
//!   non-deleted item, published after the commit.

use crate::bus::{Notification, NotificationBus};
use crate::codec::{decode, encode};
use crate::model::todo::{Todo, TodoVariant};
use crate::repo::{AddOutcome, RepoResult, Repository};
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};
use std::path::Path;

/// Counts of what an import did with each decoded item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub replaced: usize,
    /// Items whose id was already stored and left untouched.
    pub ignored: usize,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.imported + self.replaced + self.ignored
    }
}

/// Encodes every stored todo and writes it to `path`. Returns the item count.
pub fn export_to_path<R>(repo: &R, path: impl AsRef<Path>) -> ServiceResult<usize>
where
    R: Repository<Todo> + ?Sized,
{
    let path = path.as_ref();
    let items = repo.list_all()?;
    let text = encode(&items)?;
    std::fs::write(path, text).map_err(|source| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "event=todo_export module=service status=ok items={}",
        items.len()
    );
    Ok(items.len())
}

/// Reads `path` and imports its todos.
pub fn import_from_path<R>(
    repo: &R,
    bus: &NotificationBus,
    path: impl AsRef<Path>,
) -> ServiceResult<ImportReport>
where
    R: Repository<Todo> + ?Sized,
{
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    import_text(repo, bus, &text)
}

/// Decodes `text`, stores every item, commits, then publishes `Saved` for
/// each stored, non-deleted item.
pub fn import_text<R>(repo: &R, bus: &NotificationBus, text: &str) -> ServiceResult<ImportReport>
where
    R: Repository<Todo> + ?Sized,
{
    let items = decode(text)?;

    let mut report = ImportReport::default();
    let stored = match store_all(repo, items, &mut report) {
        Ok(stored) => stored,
        Err(err) => {
            if let Err(undo_err) = repo.rollback() {
                warn!("event=todo_import module=service status=error rollback_error={undo_err}");
            }
            warn!("event=todo_import module=service status=rejected error={err}");
            return Err(err.into());
        }
    };
    repo.commit()?;

    for item in stored.into_iter().filter(|item| !item.is_deleted()) {
        bus.publish(&Notification::Saved(item))?;
    }

    info!(
        "event=todo_import module=service status=ok imported={} replaced={} ignored={}",
        report.imported, report.replaced, report.ignored
    );
    Ok(report)
}

/// Adds every item, returning those that were inserted or replaced.
fn store_all<R>(repo: &R, items: Vec<Todo>, report: &mut ImportReport) -> RepoResult<Vec<Todo>>
where
    R: Repository<Todo> + ?Sized,
{
    let mut stored = Vec::with_capacity(items.len());
    for item in items {
        match repo.add(&item)? {
            AddOutcome::Inserted => report.imported += 1,
            AddOutcome::Replaced => report.replaced += 1,
            AddOutcome::Ignored => {
                report.ignored += 1;
                continue;
            }
        }
        stored.push(item);
    }
    Ok(stored)
}
