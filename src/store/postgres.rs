use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sql_types;
use uuid::Uuid;

use super::{like_pattern, Store, StoreResult, UserStats};
use crate::access::{ProjectAccess, ProjectQuery, ProjectScope, TaskQuery};
use crate::models::{
    Comment, Membership, NewComment, NewMembership, NewNotification, NewProject, NewTask,
    NewUser, Notification, Project, ProjectChanges, Task, TaskChanges, TaskStatus, User,
    UserChanges,
};
use crate::schema::{comments, notifications, project_members, projects, tasks, users};
use crate::DbPool;

type PgConn = PooledConnection<ConnectionManager<PgConnection>>;

/// [`Store`] backed by the r2d2 connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<PgConn> {
        Ok(self.pool.get()?)
    }
}

fn member_project_ids(user_id: Uuid) -> project_members::BoxedQuery<'static, Pg, sql_types::Uuid> {
    project_members::table
        .filter(project_members::user_id.eq(user_id))
        .select(project_members::project_id)
        .into_boxed()
}

/// `ProjectScope` as a `WHERE` clause on `projects`.
fn scoped_projects(scope: &ProjectScope) -> projects::BoxedQuery<'static, Pg> {
    let query = projects::table.into_boxed();
    match scope.access {
        ProjectAccess::Owner => query.filter(projects::owner_id.eq(scope.actor_id)),
        ProjectAccess::Participant => query.filter(
            projects::owner_id
                .eq(scope.actor_id)
                .or(projects::id.eq_any(member_project_ids(scope.actor_id))),
        ),
    }
}

fn scoped_project_ids(scope: &ProjectScope) -> projects::BoxedQuery<'static, Pg, sql_types::Uuid> {
    scoped_projects(scope).select(projects::id)
}

fn filtered_projects(query: &ProjectQuery) -> projects::BoxedQuery<'static, Pg> {
    let mut rows = scoped_projects(&query.scope);
    if let Some(status) = query.status {
        rows = rows.filter(projects::status.eq(status));
    }
    if let Some(term) = query.search_term() {
        rows = rows.filter(projects::name.ilike(like_pattern(&term)));
    }
    rows
}

/// Task visibility is always derived from the parent project's scope.
fn filtered_tasks(query: &TaskQuery) -> tasks::BoxedQuery<'static, Pg> {
    let mut rows = tasks::table
        .into_boxed()
        .filter(tasks::project_id.eq_any(scoped_project_ids(&query.scope)));
    if let Some(project_id) = query.project_id {
        rows = rows.filter(tasks::project_id.eq(project_id));
    }
    let filter = &query.filter;
    if let Some(status) = filter.status {
        rows = rows.filter(tasks::status.eq(status));
    }
    if let Some(priority) = filter.priority {
        rows = rows.filter(tasks::priority.eq(priority));
    }
    if let Some(assignee_id) = filter.assignee_id {
        rows = rows.filter(tasks::assignee_id.eq(assignee_id));
    }
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(&term);
        rows = rows.filter(
            tasks::title.ilike(pattern.clone()).or(tasks::description
                .ilike(pattern)
                .assume_not_null()),
        );
    }
    rows
}

impl Store for PgStore {
    fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_user(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set(changes)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn search_active_users(&self, search: Option<&str>, limit: i64) -> StoreResult<Vec<User>> {
        let mut conn = self.conn()?;
        let mut query = users::table
            .filter(users::is_active.eq(true))
            .into_boxed();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(term);
            query = query.filter(
                users::email
                    .ilike(pattern.clone())
                    .or(users::full_name.ilike(pattern).assume_not_null()),
            );
        }
        Ok(query
            .order(users::email.asc())
            .limit(limit)
            .select(User::as_select())
            .load(&mut conn)?)
    }

    fn user_stats(&self, user_id: Uuid) -> StoreResult<UserStats> {
        let mut conn = self.conn()?;
        let visible = ProjectScope::visible_to(user_id);

        let visible_projects = scoped_projects(&visible).count().get_result(&mut conn)?;
        let owned_projects = projects::table
            .filter(projects::owner_id.eq(user_id))
            .count()
            .get_result(&mut conn)?;
        let assigned_tasks = tasks::table
            .filter(tasks::assignee_id.eq(user_id))
            .filter(tasks::project_id.eq_any(scoped_project_ids(&visible)))
            .count()
            .get_result(&mut conn)?;
        let completed_tasks = tasks::table
            .filter(tasks::assignee_id.eq(user_id))
            .filter(tasks::status.eq(TaskStatus::Done))
            .filter(tasks::project_id.eq_any(scoped_project_ids(&visible)))
            .count()
            .get_result(&mut conn)?;
        let authored_comments = comments::table
            .filter(comments::author_id.eq(user_id))
            .count()
            .get_result(&mut conn)?;
        let unread_notifications = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::read.eq(false))
            .count()
            .get_result(&mut conn)?;

        Ok(UserStats {
            visible_projects,
            owned_projects,
            assigned_tasks,
            completed_tasks,
            authored_comments,
            unread_notifications,
        })
    }

    fn insert_project(&self, project: NewProject) -> StoreResult<Project> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(projects::table)
            .values(&project)
            .returning(Project::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_project(&self, id: Uuid, scope: &ProjectScope) -> StoreResult<Option<Project>> {
        let mut conn = self.conn()?;
        Ok(scoped_projects(scope)
            .filter(projects::id.eq(id))
            .select(Project::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_projects(
        &self,
        query: &ProjectQuery,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Project>> {
        let mut conn = self.conn()?;
        Ok(filtered_projects(query)
            .order(projects::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(Project::as_select())
            .load(&mut conn)?)
    }

    fn count_projects(&self, query: &ProjectQuery) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(filtered_projects(query).count().get_result(&mut conn)?)
    }

    fn update_project(&self, id: Uuid, changes: &ProjectChanges) -> StoreResult<Option<Project>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(projects::table.find(id))
            .set(changes)
            .returning(Project::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(projects::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn insert_membership(&self, membership: NewMembership) -> StoreResult<Membership> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(project_members::table)
            .values(&membership)
            .returning(Membership::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_membership(&self, id: Uuid) -> StoreResult<Option<Membership>> {
        let mut conn = self.conn()?;
        Ok(project_members::table
            .find(id)
            .select(Membership::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn find_membership_for(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        let mut conn = self.conn()?;
        Ok(project_members::table
            .filter(project_members::project_id.eq(project_id))
            .filter(project_members::user_id.eq(user_id))
            .select(Membership::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn memberships_of(&self, user_id: Uuid, project_ids: &[Uuid]) -> StoreResult<Vec<Membership>> {
        let mut conn = self.conn()?;
        Ok(project_members::table
            .filter(project_members::user_id.eq(user_id))
            .filter(project_members::project_id.eq_any(project_ids.to_vec()))
            .select(Membership::as_select())
            .load(&mut conn)?)
    }

    fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<(Membership, User)>> {
        let mut conn = self.conn()?;
        Ok(project_members::table
            .inner_join(users::table)
            .filter(project_members::project_id.eq(project_id))
            .order(project_members::joined_at.asc())
            .select((Membership::as_select(), User::as_select()))
            .load(&mut conn)?)
    }

    fn delete_membership(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(project_members::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(tasks::table)
            .values(&task)
            .returning(Task::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_task(&self, id: Uuid, scope: &ProjectScope) -> StoreResult<Option<Task>> {
        let mut conn = self.conn()?;
        Ok(tasks::table
            .filter(tasks::id.eq(id))
            .filter(tasks::project_id.eq_any(scoped_project_ids(scope)))
            .select(Task::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_tasks(&self, query: &TaskQuery, limit: i64, offset: i64) -> StoreResult<Vec<Task>> {
        let mut conn = self.conn()?;
        Ok(filtered_tasks(query)
            .order((
                tasks::status.asc(),
                tasks::priority.desc(),
                tasks::due_date.asc().nulls_last(),
                tasks::created_at.asc(),
            ))
            .limit(limit)
            .offset(offset)
            .select(Task::as_select())
            .load(&mut conn)?)
    }

    fn count_tasks(&self, query: &TaskQuery) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(filtered_tasks(query).count().get_result(&mut conn)?)
    }

    fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<Option<Task>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(tasks::table.find(id))
            .set(changes)
            .returning(Task::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(tasks::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(comments::table)
            .values(&comment)
            .returning(Comment::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let mut conn = self.conn()?;
        Ok(comments::table
            .find(id)
            .select(Comment::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<(Comment, User)>> {
        let mut conn = self.conn()?;
        Ok(comments::table
            .inner_join(users::table)
            .filter(comments::task_id.eq(task_id))
            .order(comments::created_at.asc())
            .select((Comment::as_select(), User::as_select()))
            .load(&mut conn)?)
    }

    fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(comments::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn insert_notification(&self, notification: NewNotification) -> StoreResult<Notification> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(notifications::table)
            .values(&notification)
            .returning(Notification::as_returning())
            .get_result(&mut conn)?)
    }

    fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Notification>> {
        let mut conn = self.conn()?;
        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .into_boxed();
        if unread_only {
            query = query.filter(notifications::read.eq(false));
        }
        Ok(query
            .order(notifications::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(Notification::as_select())
            .load(&mut conn)?)
    }

    fn count_notifications(&self, user_id: Uuid, unread_only: bool) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .into_boxed();
        if unread_only {
            query = query.filter(notifications::read.eq(false));
        }
        Ok(query.count().get_result(&mut conn)?)
    }

    fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Notification>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::read.eq(true))
        .returning(Notification::as_returning())
        .get_result(&mut conn)
        .optional()?)
    }

    fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::read.eq(false)),
        )
        .set(notifications::read.eq(true))
        .execute(&mut conn)?)
    }
}
