//! Save and delete flow for one todo variant.
//!
//! # Responsibility
//! - Turn a draft into a new item, or into a revised copy of a prior item.
//! - Store and commit the result, then publish the matching notification.
//!
//! # Invariants
//! - A blank title is rejected before anything is stored or published.
//! - Revisions keep the prior id and creation metadata and overwrite the
//!   stored value regardless of the repository's `AddPolicy`.
//! - Notifications are published only after a successful commit.

use crate::bus::{Notification, NotificationBus};
use crate::model::todo::{
    Bug, Feature, Image, Severity, TaskItem, TodoHeader, TodoId, TodoVariant, ValidationError,
};
use crate::model::user::User;
use crate::model::{now_epoch_ms, DAY_MS};
use crate::repo::Repository;
use crate::service::context::UserContext;
use crate::service::ServiceResult;
use log::{info, warn};
use std::marker::PhantomData;

/// Default due-date horizon for new features and bugs.
pub const DEFAULT_DUE_DAYS: i64 = 10;

/// Header fields a user edits on every variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftHeader {
    pub title: String,
    pub is_completed: bool,
    pub parent: Option<TodoId>,
    /// `None` keeps the prior due date (or the variant default on create).
    pub due_date: Option<i64>,
}

impl DraftHeader {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    fn create_header(self, ctx: &UserContext, now_ms: i64) -> TodoHeader {
        let mut header = TodoHeader::new(self.title, ctx.current_user().clone());
        header.created_date = now_ms;
        header.is_completed = self.is_completed;
        header.parent = self.parent;
        header.due_date = self.due_date;
        header
    }

    fn revise_header(self, prior: &TodoHeader) -> TodoHeader {
        TodoHeader {
            title: self.title,
            is_completed: self.is_completed,
            parent: self.parent,
            due_date: self.due_date.or(prior.due_date),
            ..prior.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDraft {
    pub header: DraftHeader,
    pub description: String,
    pub component: String,
    pub priority: u32,
    /// `None` assigns the current user on create and keeps the prior assignee
    /// on revise.
    pub assigned_to: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugDraft {
    pub header: DraftHeader,
    pub description: String,
    pub severity: Severity,
    pub affected_version: String,
    pub affected_users: u32,
    pub assigned_to: Option<User>,
    pub images: Vec<Image>,
}

impl Default for BugDraft {
    fn default() -> Self {
        Self {
            header: DraftHeader::default(),
            description: String::new(),
            severity: Severity::Minor,
            affected_version: String::new(),
            affected_users: 0,
            assigned_to: None,
            images: Vec::new(),
        }
    }
}

/// Variant that can be created from, or revised by, a draft.
pub trait Editable: TodoVariant {
    type Draft;

    fn draft_title(draft: &Self::Draft) -> &str;
    fn create(ctx: &UserContext, draft: Self::Draft, now_ms: i64) -> Self;
    fn revise(&self, draft: Self::Draft) -> Self;
}

impl Editable for TaskItem {
    type Draft = DraftHeader;

    fn draft_title(draft: &DraftHeader) -> &str {
        &draft.title
    }

    fn create(ctx: &UserContext, draft: DraftHeader, now_ms: i64) -> Self {
        TaskItem {
            header: draft.create_header(ctx, now_ms),
        }
    }

    fn revise(&self, draft: DraftHeader) -> Self {
        TaskItem {
            header: draft.revise_header(&self.header),
        }
    }
}

impl Editable for Feature {
    type Draft = FeatureDraft;

    fn draft_title(draft: &FeatureDraft) -> &str {
        &draft.header.title
    }

    fn create(ctx: &UserContext, draft: FeatureDraft, now_ms: i64) -> Self {
        let mut header = draft.header.create_header(ctx, now_ms);
        header.due_date = header.due_date.or(Some(now_ms + DEFAULT_DUE_DAYS * DAY_MS));
        Feature {
            header,
            description: draft.description,
            component: draft.component,
            priority: draft.priority,
            assigned_to: draft
                .assigned_to
                .unwrap_or_else(|| ctx.current_user().clone()),
        }
    }

    fn revise(&self, draft: FeatureDraft) -> Self {
        Feature {
            header: draft.header.revise_header(&self.header),
            description: draft.description,
            component: draft.component,
            priority: draft.priority,
            assigned_to: draft
                .assigned_to
                .unwrap_or_else(|| self.assigned_to.clone()),
        }
    }
}

impl Editable for Bug {
    type Draft = BugDraft;

    fn draft_title(draft: &BugDraft) -> &str {
        &draft.header.title
    }

    fn create(ctx: &UserContext, draft: BugDraft, now_ms: i64) -> Self {
        let mut header = draft.header.create_header(ctx, now_ms);
        header.due_date = header.due_date.or(Some(now_ms + DEFAULT_DUE_DAYS * DAY_MS));
        Bug {
            header,
            description: draft.description,
            severity: draft.severity,
            affected_version: draft.affected_version,
            affected_users: draft.affected_users,
            assigned_to: draft
                .assigned_to
                .unwrap_or_else(|| ctx.current_user().clone()),
            images: draft.images,
        }
    }

    fn revise(&self, draft: BugDraft) -> Self {
        Bug {
            header: draft.header.revise_header(&self.header),
            description: draft.description,
            severity: draft.severity,
            affected_version: draft.affected_version,
            affected_users: draft.affected_users,
            assigned_to: draft
                .assigned_to
                .unwrap_or_else(|| self.assigned_to.clone()),
            images: draft.images,
        }
    }
}

/// Save/delete entry point for variant `T` stored in `R`.
pub struct TodoEditor<'bus, T, R> {
    repo: R,
    bus: &'bus NotificationBus,
    _variant: PhantomData<fn() -> T>,
}

impl<'bus, T, R> TodoEditor<'bus, T, R>
where
    T: Editable,
    R: Repository<T>,
{
    pub fn new(repo: R, bus: &'bus NotificationBus) -> Self {
        Self {
            repo,
            bus,
            _variant: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates a new item (no `prior`) or a revised copy of `prior`, stores
    /// it, commits, and publishes `Saved`.
    ///
    /// # Errors
    /// - `Validation(EmptyTitle)` for a blank draft title; nothing is stored.
    /// - Repository and bus errors unchanged.
    pub fn save(&self, ctx: &UserContext, prior: Option<&T>, draft: T::Draft) -> ServiceResult<T> {
        if T::draft_title(&draft).trim().is_empty() {
            warn!("event=todo_save module=service status=rejected reason=empty_title");
            return Err(ValidationError::EmptyTitle.into());
        }

        let (item, outcome) = match prior {
            Some(prior) => {
                let item = prior.revise(draft);
                let outcome = self.repo.upsert(&item)?;
                (item, outcome)
            }
            None => {
                let item = T::create(ctx, draft, now_epoch_ms());
                let outcome = self.repo.add(&item)?;
                (item, outcome)
            }
        };
        self.repo.commit()?;
        self.bus
            .publish(&Notification::Saved(item.clone().into_todo()))?;

        info!(
            "event=todo_save module=service status=ok id={} existing={} outcome={outcome:?}",
            item.id(),
            prior.is_some()
        );
        Ok(item)
    }

    /// Soft-deletes `prior`: stores the deleted copy, commits, and publishes
    /// `Deleted`.
    pub fn delete(&self, prior: &T) -> ServiceResult<T> {
        let deleted = prior.mark_deleted();
        let outcome = self.repo.upsert(&deleted)?;
        self.repo.commit()?;
        self.bus
            .publish(&Notification::Deleted(deleted.clone().into_todo()))?;

        info!(
            "event=todo_delete module=service status=ok id={} outcome={outcome:?}",
            deleted.id()
        );
        Ok(deleted)
    }
}
