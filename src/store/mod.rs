//! Persistence collaborators.
//!
//! The engine only talks to [`Store`]. [`PgStore`] backs the running service;
//! [`MemoryStore`] is a faithful in-process substitute used by tests.

pub mod memory;
pub mod postgres;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{ProjectQuery, ProjectScope, TaskQuery};
use crate::models::{
    Comment, Membership, NewComment, NewMembership, NewNotification, NewProject, NewTask,
    NewUser, Notification, Project, ProjectChanges, Task, TaskChanges, User, UserChanges,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::UniqueViolation(info.message().to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        StoreError::Connection(e.to_string())
    }
}

/// Activity counters for one user, restricted to projects the user can see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserStats {
    pub visible_projects: i64,
    pub owned_projects: i64,
    pub assigned_tasks: i64,
    pub completed_tasks: i64,
    pub authored_comments: i64,
    pub unread_notifications: i64,
}

/// Row-level persistence. Scoped lookups return `None` both when the row is
/// missing and when the scope does not admit it.
pub trait Store: Send + Sync {
    fn ping(&self) -> StoreResult<()>;

    fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn update_user(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>>;
    fn search_active_users(&self, search: Option<&str>, limit: i64) -> StoreResult<Vec<User>>;
    fn user_stats(&self, user_id: Uuid) -> StoreResult<UserStats>;

    fn insert_project(&self, project: NewProject) -> StoreResult<Project>;
    fn find_project(&self, id: Uuid, scope: &ProjectScope) -> StoreResult<Option<Project>>;
    fn list_projects(
        &self,
        query: &ProjectQuery,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Project>>;
    fn count_projects(&self, query: &ProjectQuery) -> StoreResult<i64>;
    fn update_project(&self, id: Uuid, changes: &ProjectChanges) -> StoreResult<Option<Project>>;
    /// Removes the project with its memberships, tasks and their comments.
    fn delete_project(&self, id: Uuid) -> StoreResult<bool>;

    /// Fails with [`StoreError::UniqueViolation`] when the pair already exists.
    fn insert_membership(&self, membership: NewMembership) -> StoreResult<Membership>;
    fn find_membership(&self, id: Uuid) -> StoreResult<Option<Membership>>;
    fn find_membership_for(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>>;
    fn memberships_of(&self, user_id: Uuid, project_ids: &[Uuid]) -> StoreResult<Vec<Membership>>;
    fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<(Membership, User)>>;
    fn delete_membership(&self, id: Uuid) -> StoreResult<bool>;

    fn insert_task(&self, task: NewTask) -> StoreResult<Task>;
    fn find_task(&self, id: Uuid, scope: &ProjectScope) -> StoreResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskQuery, limit: i64, offset: i64) -> StoreResult<Vec<Task>>;
    fn count_tasks(&self, query: &TaskQuery) -> StoreResult<i64>;
    fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<Option<Task>>;
    /// Removes the task with its comments.
    fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    /// Oldest first, each with its author.
    fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<(Comment, User)>>;
    fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;

    fn insert_notification(&self, notification: NewNotification) -> StoreResult<Notification>;
    /// Newest first.
    fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Notification>>;
    fn count_notifications(&self, user_id: Uuid, unread_only: bool) -> StoreResult<i64>;
    fn mark_notification_read(&self, id: Uuid, user_id: Uuid)
        -> StoreResult<Option<Notification>>;
    fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<usize>;
}

/// Escapes `LIKE` metacharacters and wraps the term for a substring match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
