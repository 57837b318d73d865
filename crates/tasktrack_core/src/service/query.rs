//! Read-only helpers over repository snapshots.

use crate::model::todo::TodoVariant;
use crate::repo::{RepoResult, Repository};

/// Active, unfinished items whose title contains `text`, ignoring case.
///
/// A blank `text` or `*` matches every active, unfinished item. The result is
/// a fresh vector in repository order.
pub fn search_unfinished<T, R>(repo: &R, text: &str) -> RepoResult<Vec<T>>
where
    T: TodoVariant,
    R: Repository<T> + ?Sized,
{
    let needle = text.trim().to_lowercase();
    let match_all = needle.is_empty() || needle == "*";

    Ok(repo
        .list_all()?
        .into_iter()
        .filter(|item| !item.is_completed() && !item.is_deleted())
        .filter(|item| match_all || item.title().to_lowercase().contains(&needle))
        .collect())
}

/// Active, unfinished items whose due date is before `now_ms`.
pub fn count_overdue<'a, T, I>(items: I, now_ms: i64) -> usize
where
    T: TodoVariant + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .filter(|item| !item.is_completed() && !item.is_deleted())
        .filter(|item| item.header().due_date.is_some_and(|due| due < now_ms))
        .count()
}
