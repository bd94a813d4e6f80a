use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, UserStats};
use crate::access::{self, ProjectQuery, ProjectScope, TaskQuery};
use crate::models::{
    Comment, Membership, NewComment, NewMembership, NewNotification, NewProject, NewTask,
    NewUser, Notification, Project, ProjectChanges, Task, TaskChanges, TaskStatus, User,
    UserChanges,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    memberships: Vec<Membership>,
    tasks: Vec<Task>,
    comments: Vec<Comment>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn is_member(&self, project_id: Uuid, user_id: Uuid) -> bool {
        self.memberships
            .iter()
            .any(|m| m.project_id == project_id && m.user_id == user_id)
    }

    fn project_admitted(&self, project_id: Uuid, scope: &ProjectScope) -> bool {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .is_some_and(|p| scope.admits(p.owner_id, self.is_member(p.id, scope.actor_id)))
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn matching_tasks(&self, query: &TaskQuery) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| query.admits(t, self.project_admitted(t.project_id, &query.scope)))
            .cloned()
            .collect();
        tasks.sort_by(access::task_order);
        tasks
    }

    fn matching_projects(&self, query: &ProjectQuery) -> Vec<Project> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .rev()
            .filter(|p| query.admits(p, self.is_member(p.id, query.scope.actor_id)))
            .cloned()
            .collect();
        projects.sort_by(access::project_order);
        projects
    }

    fn notifications_for(&self, user_id: Uuid, unread_only: bool) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }

    fn remove_comments_of(&mut self, task_ids: &[Uuid]) {
        self.comments.retain(|c| !task_ids.contains(&c.task_id));
    }
}

/// In-process [`Store`] with the same constraints and predicates as the
/// PostgreSQL schema. One lock guards every table.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Connection("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Connection("memory store lock poisoned".to_string()))
    }
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn count<T>(rows: &[T]) -> i64 {
    rows.len() as i64
}

impl Store for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.write()?;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let now = Utc::now().naive_utc();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read()?.user(id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.email == email).cloned())
    }

    fn update_user(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            changes.apply_to(user);
            user.clone()
        }))
    }

    fn search_active_users(&self, search: Option<&str>, limit: i64) -> StoreResult<Vec<User>> {
        let term = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let tables = self.read()?;
        let mut users: Vec<User> = tables
            .users
            .iter()
            .filter(|u| u.is_active)
            .filter(|u| match &term {
                Some(term) => {
                    u.email.to_lowercase().contains(term)
                        || u
                            .full_name
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(term))
                }
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(page(users, limit, 0))
    }

    fn user_stats(&self, user_id: Uuid) -> StoreResult<UserStats> {
        let tables = self.read()?;
        let visible = ProjectScope::visible_to(user_id);
        let assigned: Vec<&Task> = tables
            .tasks
            .iter()
            .filter(|t| t.assignee_id == Some(user_id))
            .filter(|t| tables.project_admitted(t.project_id, &visible))
            .collect();

        Ok(UserStats {
            visible_projects: count(&tables.matching_projects(&ProjectQuery::new(visible))),
            owned_projects: tables
                .projects
                .iter()
                .filter(|p| p.owner_id == user_id)
                .count() as i64,
            assigned_tasks: count(&assigned),
            completed_tasks: assigned
                .iter()
                .filter(|t| t.status == TaskStatus::Done)
                .count() as i64,
            authored_comments: tables
                .comments
                .iter()
                .filter(|c| c.author_id == user_id)
                .count() as i64,
            unread_notifications: count(&tables.notifications_for(user_id, true)),
        })
    }

    fn insert_project(&self, project: NewProject) -> StoreResult<Project> {
        let mut tables = self.write()?;
        let now = Utc::now().naive_utc();
        let row = Project {
            id: Uuid::new_v4(),
            name: project.name,
            description: project.description,
            status: project.status,
            owner_id: project.owner_id,
            start_date: project.start_date,
            end_date: project.end_date,
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(row.clone());
        Ok(row)
    }

    fn find_project(&self, id: Uuid, scope: &ProjectScope) -> StoreResult<Option<Project>> {
        let tables = self.read()?;
        Ok(tables
            .projects
            .iter()
            .find(|p| p.id == id)
            .filter(|p| scope.admits(p.owner_id, tables.is_member(p.id, scope.actor_id)))
            .cloned())
    }

    fn list_projects(
        &self,
        query: &ProjectQuery,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Project>> {
        Ok(page(self.read()?.matching_projects(query), limit, offset))
    }

    fn count_projects(&self, query: &ProjectQuery) -> StoreResult<i64> {
        Ok(count(&self.read()?.matching_projects(query)))
    }

    fn update_project(&self, id: Uuid, changes: &ProjectChanges) -> StoreResult<Option<Project>> {
        let mut tables = self.write()?;
        Ok(tables.projects.iter_mut().find(|p| p.id == id).map(|project| {
            changes.apply_to(project);
            project.clone()
        }))
    }

    fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }
        let task_ids: Vec<Uuid> = tables
            .tasks
            .iter()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        tables.remove_comments_of(&task_ids);
        tables.tasks.retain(|t| t.project_id != id);
        tables.memberships.retain(|m| m.project_id != id);
        Ok(true)
    }

    fn insert_membership(&self, membership: NewMembership) -> StoreResult<Membership> {
        let mut tables = self.write()?;
        if tables.is_member(membership.project_id, membership.user_id) {
            return Err(StoreError::UniqueViolation(
                "project_members_project_id_user_id_key".to_string(),
            ));
        }
        let row = Membership {
            id: Uuid::new_v4(),
            project_id: membership.project_id,
            user_id: membership.user_id,
            role: membership.role,
            joined_at: Utc::now().naive_utc(),
        };
        tables.memberships.push(row.clone());
        Ok(row)
    }

    fn find_membership(&self, id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(self
            .read()?
            .memberships
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    fn find_membership_for(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        Ok(self
            .read()?
            .memberships
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    fn memberships_of(&self, user_id: Uuid, project_ids: &[Uuid]) -> StoreResult<Vec<Membership>> {
        Ok(self
            .read()?
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && project_ids.contains(&m.project_id))
            .cloned()
            .collect())
    }

    fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<(Membership, User)>> {
        let tables = self.read()?;
        let mut members: Vec<(Membership, User)> = tables
            .memberships
            .iter()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| tables.user(m.user_id).map(|u| (m.clone(), u.clone())))
            .collect();
        members.sort_by(|a, b| a.0.joined_at.cmp(&b.0.joined_at));
        Ok(members)
    }

    fn delete_membership(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.memberships.len();
        tables.memberships.retain(|m| m.id != id);
        Ok(tables.memberships.len() != before)
    }

    fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut tables = self.write()?;
        if !tables.projects.iter().any(|p| p.id == task.project_id) {
            return Err(StoreError::Query(
                "insert on tasks violates foreign key tasks_project_id_fkey".to_string(),
            ));
        }
        let now = Utc::now().naive_utc();
        let row = Task {
            id: Uuid::new_v4(),
            project_id: task.project_id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            assignee_id: task.assignee_id,
            created_by: task.created_by,
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(row.clone());
        Ok(row)
    }

    fn find_task(&self, id: Uuid, scope: &ProjectScope) -> StoreResult<Option<Task>> {
        let tables = self.read()?;
        Ok(tables
            .tasks
            .iter()
            .find(|t| t.id == id)
            .filter(|t| tables.project_admitted(t.project_id, scope))
            .cloned())
    }

    fn list_tasks(&self, query: &TaskQuery, limit: i64, offset: i64) -> StoreResult<Vec<Task>> {
        Ok(page(self.read()?.matching_tasks(query), limit, offset))
    }

    fn count_tasks(&self, query: &TaskQuery) -> StoreResult<i64> {
        Ok(count(&self.read()?.matching_tasks(query)))
    }

    fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<Option<Task>> {
        let mut tables = self.write()?;
        Ok(tables.tasks.iter_mut().find(|t| t.id == id).map(|task| {
            changes.apply_to(task);
            task.clone()
        }))
    }

    fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        if tables.tasks.len() == before {
            return Ok(false);
        }
        tables.remove_comments_of(&[id]);
        Ok(true)
    }

    fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.write()?;
        let row = Comment {
            id: Uuid::new_v4(),
            task_id: comment.task_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: Utc::now().naive_utc(),
        };
        tables.comments.push(row.clone());
        Ok(row)
    }

    fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.read()?.comments.iter().find(|c| c.id == id).cloned())
    }

    fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<(Comment, User)>> {
        let tables = self.read()?;
        let mut comments: Vec<(Comment, User)> = tables
            .comments
            .iter()
            .filter(|c| c.task_id == task_id)
            .filter_map(|c| tables.user(c.author_id).map(|u| (c.clone(), u.clone())))
            .collect();
        comments.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at));
        Ok(comments)
    }

    fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() != before)
    }

    fn insert_notification(&self, notification: NewNotification) -> StoreResult<Notification> {
        let mut tables = self.write()?;
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            read: false,
            created_at: Utc::now().naive_utc(),
        };
        tables.notifications.push(row.clone());
        Ok(row)
    }

    fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Notification>> {
        Ok(page(
            self.read()?.notifications_for(user_id, unread_only),
            limit,
            offset,
        ))
    }

    fn count_notifications(&self, user_id: Uuid, unread_only: bool) -> StoreResult<i64> {
        Ok(count(&self.read()?.notifications_for(user_id, unread_only)))
    }

    fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Notification>> {
        let mut tables = self.write()?;
        Ok(tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.read = true;
                n.clone()
            }))
    }

    fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut tables = self.write()?;
        let mut updated = 0;
        for n in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProjectStatus, TaskPriority, UserRole};

    fn user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
                role: UserRole::User,
            })
            .unwrap()
    }

    fn project(store: &MemoryStore, owner: Uuid, name: &str) -> Project {
        store
            .insert_project(NewProject {
                name: name.to_string(),
                description: None,
                status: ProjectStatus::Active,
                owner_id: owner,
                start_date: None,
                end_date: None,
            })
            .unwrap()
    }

    fn task(store: &MemoryStore, project_id: Uuid, creator: Uuid, title: &str) -> Task {
        store
            .insert_task(NewTask {
                project_id,
                title: title.to_string(),
                description: None,
                status: TaskStatus::Todo,
                priority: TaskPriority::Medium,
                assignee_id: None,
                created_by: creator,
                due_date: None,
            })
            .unwrap()
    }

    #[test]
    fn test_duplicate_email_is_a_unique_violation() {
        let store = MemoryStore::new();
        user(&store, "a@example.com");

        let result = store.insert_user(NewUser {
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: None,
            role: UserRole::User,
        });

        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
    }

    #[test]
    fn test_duplicate_membership_is_a_unique_violation() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let member = user(&store, "member@example.com");
        let p = project(&store, owner.id, "Redesign");
        let membership = || NewMembership {
            project_id: p.id,
            user_id: member.id,
            role: "MEMBER".to_string(),
        };

        store.insert_membership(membership()).unwrap();
        let second = store.insert_membership(membership());

        assert!(matches!(second, Err(StoreError::UniqueViolation(_))));
        assert_eq!(store.list_members(p.id).unwrap().len(), 1);
    }

    #[test]
    fn test_scoped_lookups_hide_foreign_rows() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let outsider = user(&store, "x@example.com");
        let p = project(&store, owner.id, "Redesign");
        let t = task(&store, p.id, owner.id, "Wireframes");

        assert!(store
            .find_project(p.id, &ProjectScope::visible_to(owner.id))
            .unwrap()
            .is_some());
        assert!(store
            .find_project(p.id, &ProjectScope::visible_to(outsider.id))
            .unwrap()
            .is_none());
        assert!(store
            .find_task(t.id, &ProjectScope::visible_to(outsider.id))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_projects_list_newest_first() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let first = project(&store, owner.id, "First");
        let second = project(&store, owner.id, "Second");

        let listed = store
            .list_projects(&ProjectQuery::new(ProjectScope::visible_to(owner.id)), 10, 0)
            .unwrap();

        let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_delete_project_cascades() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let member = user(&store, "member@example.com");
        let p = project(&store, owner.id, "Redesign");
        store
            .insert_membership(NewMembership {
                project_id: p.id,
                user_id: member.id,
                role: "MEMBER".to_string(),
            })
            .unwrap();
        let t = task(&store, p.id, owner.id, "Wireframes");
        let c = store
            .insert_comment(NewComment {
                task_id: t.id,
                author_id: member.id,
                content: "On it".to_string(),
            })
            .unwrap();

        assert!(store.delete_project(p.id).unwrap());

        assert!(store.find_membership_for(p.id, member.id).unwrap().is_none());
        assert!(store
            .find_task(t.id, &ProjectScope::visible_to(owner.id))
            .unwrap()
            .is_none());
        assert!(store.find_comment(c.id).unwrap().is_none());
        assert!(!store.delete_project(p.id).unwrap());
    }

    #[test]
    fn test_mark_read_is_scoped_to_recipient() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice@example.com");
        let bob = user(&store, "bob@example.com");
        let n = store
            .insert_notification(NewNotification {
                user_id: alice.id,
                title: "Hello".to_string(),
                message: "World".to_string(),
                kind: "TASK_ASSIGNED".to_string(),
            })
            .unwrap();

        assert!(store.mark_notification_read(n.id, bob.id).unwrap().is_none());
        assert!(store.mark_notification_read(n.id, alice.id).unwrap().unwrap().read);
        assert_eq!(store.count_notifications(alice.id, true).unwrap(), 0);
    }

    #[test]
    fn test_search_active_users_skips_inactive() {
        let store = MemoryStore::new();
        let active = user(&store, "dana@example.com");
        let inactive = user(&store, "dan@example.com");
        let mut changes = UserChanges::at(Utc::now().naive_utc());
        changes.is_active = Some(false);
        store.update_user(inactive.id, &changes).unwrap();

        let found = store.search_active_users(Some("DAN"), 10).unwrap();

        let ids: Vec<Uuid> = found.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![active.id]);
    }

    #[test]
    fn test_search_treats_like_wildcards_literally() {
        let store = MemoryStore::new();
        let named = |email: &str, name: &str| {
            store
                .insert_user(NewUser {
                    email: email.to_string(),
                    password_hash: "hash".to_string(),
                    full_name: Some(name.to_string()),
                    role: UserRole::User,
                })
                .unwrap()
        };
        let underscore = named("rd@example.com", "R_D Lab");
        named("rnd@example.com", "RnD Lab");
        let percent = named("sale@example.com", "50% Off");
        named("fifty@example.com", "50 Off");

        let by_underscore = store.search_active_users(Some("r_d"), 10).unwrap();
        let by_percent = store.search_active_users(Some("50%"), 10).unwrap();

        assert_eq!(by_underscore.len(), 1);
        assert_eq!(by_underscore[0].id, underscore.id);
        assert_eq!(by_percent.len(), 1);
        assert_eq!(by_percent[0].id, percent.id);
    }
}
