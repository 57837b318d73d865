//! Explicit "current user" context threaded through save operations.

use crate::model::user::User;
use crate::repo::Repository;
use crate::service::ServiceResult;
use log::info;

/// Who is acting. Passed to every operation that stamps authorship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    current_user: User,
}

impl UserContext {
    pub fn new(current_user: User) -> Self {
        Self { current_user }
    }

    pub fn current_user(&self) -> &User {
        &self.current_user
    }

    /// Uses the earliest stored user, or creates and commits one named
    /// `default_name` when the store is empty.
    pub fn bootstrap<R>(users: &R, default_name: &str) -> ServiceResult<Self>
    where
        R: Repository<User> + ?Sized,
    {
        if let Some(user) = users.list_all()?.into_iter().next() {
            return Ok(Self::new(user));
        }

        let user = User::new(default_name);
        users.add(&user)?;
        users.commit()?;
        info!(
            "event=user_bootstrap module=service status=created user_id={}",
            user.id
        );
        Ok(Self::new(user))
    }
}
