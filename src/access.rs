//! Ownership- and membership-scoped access predicates.
//!
//! Every query path asks [`scope_for`] for the predicate that bounds what an
//! actor may touch. The in-memory store evaluates these predicates directly;
//! the PostgreSQL store renders the same values as `WHERE` clauses, so the two
//! cannot drift apart.

use std::cmp::Ordering;

use uuid::Uuid;

use crate::models::{Project, ProjectStatus, Task, TaskPriority, TaskStatus};

/// How much standing an actor needs in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectAccess {
    /// Owner or member.
    Participant,
    /// Owner only.
    Owner,
}

/// Operations the engine authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewProject,
    UpdateProject,
    DeleteProject,
    ManageMembers,
    ViewTask,
    CreateTask,
    UpdateTask,
    DeleteTask,
    CreateComment,
    DeleteComment,
}

impl Operation {
    pub fn required_access(self) -> ProjectAccess {
        match self {
            Operation::UpdateProject | Operation::DeleteProject | Operation::ManageMembers => {
                ProjectAccess::Owner
            }
            Operation::ViewProject
            | Operation::ViewTask
            | Operation::CreateTask
            | Operation::UpdateTask
            | Operation::DeleteTask
            | Operation::CreateComment
            | Operation::DeleteComment => ProjectAccess::Participant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ViewProject => "view_project",
            Operation::UpdateProject => "update_project",
            Operation::DeleteProject => "delete_project",
            Operation::ManageMembers => "manage_members",
            Operation::ViewTask => "view_task",
            Operation::CreateTask => "create_task",
            Operation::UpdateTask => "update_task",
            Operation::DeleteTask => "delete_task",
            Operation::CreateComment => "create_comment",
            Operation::DeleteComment => "delete_comment",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project-level predicate: which projects an actor reaches at a given access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectScope {
    pub actor_id: Uuid,
    pub access: ProjectAccess,
}

impl ProjectScope {
    pub fn visible_to(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            access: ProjectAccess::Participant,
        }
    }

    pub fn owned_by(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            access: ProjectAccess::Owner,
        }
    }

    /// `owner_id == actor`, widened by `OR is_member` for participant access.
    pub fn admits(&self, owner_id: Uuid, actor_is_member: bool) -> bool {
        match self.access {
            ProjectAccess::Owner => owner_id == self.actor_id,
            ProjectAccess::Participant => owner_id == self.actor_id || actor_is_member,
        }
    }
}

/// Builds the predicate for `operation`. The only place access rules live.
pub fn scope_for(actor_id: Uuid, operation: Operation) -> ProjectScope {
    match operation.required_access() {
        ProjectAccess::Owner => ProjectScope::owned_by(actor_id),
        ProjectAccess::Participant => ProjectScope::visible_to(actor_id),
    }
}

/// Conjunctive narrowing applied on top of a visibility scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn admits(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if let Some(assignee_id) = self.assignee_id {
            if task.assignee_id != Some(assignee_id) {
                return false;
            }
        }
        match self.search_term() {
            Some(term) => {
                contains_ci(&task.title, &term)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|d| contains_ci(d, &term))
            }
            None => true,
        }
    }

    /// Trimmed, non-empty search text.
    pub fn search_term(&self) -> Option<String> {
        normalized_search(self.search.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub scope: ProjectScope,
    pub project_id: Option<Uuid>,
    pub filter: TaskFilter,
}

impl TaskQuery {
    pub fn new(scope: ProjectScope) -> Self {
        Self {
            scope,
            project_id: None,
            filter: TaskFilter::default(),
        }
    }

    pub fn in_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_filter(mut self, filter: TaskFilter) -> Self {
        self.filter = filter;
        self
    }

    /// `project_admitted` is the scope evaluated against the task's project.
    pub fn admits(&self, task: &Task, project_admitted: bool) -> bool {
        project_admitted
            && self.project_id.map_or(true, |id| id == task.project_id)
            && self.filter.admits(task)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectQuery {
    pub scope: ProjectScope,
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
}

impl ProjectQuery {
    pub fn new(scope: ProjectScope) -> Self {
        Self {
            scope,
            status: None,
            search: None,
        }
    }

    pub fn admits(&self, project: &Project, actor_is_member: bool) -> bool {
        self.scope.admits(project.owner_id, actor_is_member)
            && self.status.map_or(true, |s| s == project.status)
            && self
                .search_term()
                .map_or(true, |term| contains_ci(&project.name, &term))
    }

    pub fn search_term(&self) -> Option<String> {
        normalized_search(self.search.as_deref())
    }
}

/// Task listing order: status ascending, priority descending, due date
/// ascending with undated tasks last.
pub fn task_order(a: &Task, b: &Task) -> Ordering {
    a.status
        .cmp(&b.status)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Project listing order: newest first.
pub fn project_order(a: &Project, b: &Project) -> Ordering {
    b.created_at.cmp(&a.created_at)
}

fn normalized_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn contains_ci(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}
