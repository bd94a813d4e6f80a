//! Tasks inherit visibility from their project: anyone who can see the
//! project can read, change and delete its tasks.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{Engine, EngineError, EngineResult, Issues};
use crate::access::{scope_for, Operation, ProjectScope, TaskFilter, TaskQuery};
use crate::helpers::{double_option, naive, non_blank, now};
use crate::models::{NewTask, Task, TaskChanges, TaskPriority, TaskStatus};
use crate::pagination::{PaginatedResponse, PaginationParams};

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateTaskInput {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    #[schema(example = "Draft landing page copy")]
    pub title: String,
    pub description: Option<String>,
    /// Defaults to TODO.
    #[schema(example = "TODO")]
    pub status: Option<String>,
    /// Defaults to MEDIUM.
    #[schema(example = "HIGH")]
    pub priority: Option<String>,
    /// Must be the project owner or a member.
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTaskInput {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[schema(example = "IN_PROGRESS")]
    pub status: Option<String>,
    #[schema(example = "URGENT")]
    pub priority: Option<String>,
    /// `null` unassigns.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStatusInput {
    #[schema(example = "DONE")]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskListParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<Uuid>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
}

impl Engine {
    /// Validates that `assignee_id` may hold tasks in `project_id`.
    fn check_assignee(
        &self,
        issues: &mut Issues,
        project_id: Uuid,
        assignee_id: Uuid,
    ) -> EngineResult<()> {
        if !self.can_see_project(project_id, assignee_id)? {
            warn!(project_id = %project_id, assignee_id = %assignee_id, "Rejected assignee outside project");
            issues.add(
                "assignee_id",
                "NOT_A_PROJECT_MEMBER",
                "Assignee must be the project owner or a member",
            );
        }
        Ok(())
    }

    fn check_transition(&self, issues: &mut Issues, from: TaskStatus, to: TaskStatus) {
        if !self.transitions.allows(from, to) {
            issues.add(
                "status",
                "INVALID_TRANSITION",
                format!("Cannot move a task from {} to {}", from, to),
            );
        }
    }

    /// Owner notification when a task lands in DONE.
    fn after_status_change(&self, actor_id: Uuid, before: TaskStatus, task: &Task) {
        if before == TaskStatus::Done || task.status != TaskStatus::Done {
            return;
        }
        match self
            .store
            .find_project(task.project_id, &ProjectScope::visible_to(actor_id))
        {
            Ok(Some(project)) => self.notify_completion(actor_id, &project, task),
            Ok(None) => {}
            Err(e) => warn!(task_id = %task.id, error = %e, "Could not load project for completion notice"),
        }
    }

    pub fn create_task(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        input: CreateTaskInput,
    ) -> EngineResult<Task> {
        let project = self.project_for(actor_id, project_id, Operation::CreateTask)?;

        let mut issues = Issues::check(&input);
        let title = non_blank(Some(input.title.as_str()));
        if title.is_none() {
            issues.add("title", "REQUIRED", "Title is required");
        }
        let status = issues.parse::<TaskStatus>("status", input.status.as_deref());
        let priority = issues.parse::<TaskPriority>("priority", input.priority.as_deref());
        if let Some(assignee_id) = input.assignee_id {
            self.check_assignee(&mut issues, project.id, assignee_id)?;
        }
        issues.into_result()?;

        let task = self.store.insert_task(NewTask {
            project_id: project.id,
            title: title.unwrap_or_default(),
            description: non_blank(input.description.as_deref()),
            status: status.unwrap_or(TaskStatus::Todo),
            priority: priority.unwrap_or(TaskPriority::Medium),
            assignee_id: input.assignee_id,
            created_by: actor_id,
            due_date: naive(input.due_date),
        })?;

        info!(task_id = %task.id, project_id = %project.id, actor_id = %actor_id, "Created task");
        self.notify_assignment(actor_id, &task);
        Ok(task)
    }

    /// Tasks in every visible project, or in `project_id` only.
    pub fn list_tasks(
        &self,
        actor_id: Uuid,
        project_id: Option<Uuid>,
        params: &TaskListParams,
        page: &PaginationParams,
    ) -> EngineResult<PaginatedResponse<Task>> {
        let mut query = TaskQuery::new(scope_for(actor_id, Operation::ViewTask));
        if let Some(project_id) = project_id {
            let project = self.project_for(actor_id, project_id, Operation::ViewProject)?;
            query = query.in_project(project.id);
        }

        let mut issues = Issues::default();
        let filter = TaskFilter {
            status: issues.parse("status", params.status.as_deref()),
            priority: issues.parse("priority", params.priority.as_deref()),
            assignee_id: params.assignee_id,
            search: params.search.clone(),
        };
        issues.into_result()?;
        let query = query.with_filter(filter);

        let total = self.store.count_tasks(&query)?;
        let (limit, offset) = page.limit_offset();
        let data = self.store.list_tasks(&query, limit, offset)?;
        Ok(PaginatedResponse::from_params(data, page, total))
    }

    pub fn get_task(&self, actor_id: Uuid, task_id: Uuid) -> EngineResult<Task> {
        self.task_for(actor_id, task_id, Operation::ViewTask)
    }

    pub fn update_task(
        &self,
        actor_id: Uuid,
        task_id: Uuid,
        input: UpdateTaskInput,
    ) -> EngineResult<Task> {
        let current = self.task_for(actor_id, task_id, Operation::UpdateTask)?;

        let mut issues = Issues::check(&input);
        let mut changes = TaskChanges::at(now());
        if let Some(raw) = input.title.as_deref() {
            changes.title = non_blank(Some(raw));
            if changes.title.is_none() {
                issues.add("title", "REQUIRED", "Title must not be blank");
            }
        }
        changes.status = issues.parse::<TaskStatus>("status", input.status.as_deref());
        if let Some(to) = changes.status {
            self.check_transition(&mut issues, current.status, to);
        }
        changes.priority = issues.parse::<TaskPriority>("priority", input.priority.as_deref());
        if let Some(Some(assignee_id)) = input.assignee_id {
            if current.assignee_id != Some(assignee_id) {
                self.check_assignee(&mut issues, current.project_id, assignee_id)?;
            }
        }
        issues.into_result()?;

        changes.description = input.description.map(|d| non_blank(d.as_deref()));
        changes.assignee_id = input.assignee_id;
        changes.due_date = input.due_date.map(naive);

        let task = self
            .store
            .update_task(current.id, &changes)?
            .ok_or(EngineError::NotFound)?;

        info!(task_id = %task.id, actor_id = %actor_id, status = %task.status, "Updated task");
        if task.assignee_id != current.assignee_id {
            self.notify_assignment(actor_id, &task);
        }
        self.after_status_change(actor_id, current.status, &task);
        Ok(task)
    }

    pub fn change_status(&self, actor_id: Uuid, task_id: Uuid, status: &str) -> EngineResult<Task> {
        let current = self.task_for(actor_id, task_id, Operation::UpdateTask)?;

        let mut issues = Issues::default();
        let to = issues.parse::<TaskStatus>("status", Some(status));
        if let Some(to) = to {
            self.check_transition(&mut issues, current.status, to);
        }
        issues.into_result()?;

        let mut changes = TaskChanges::at(now());
        changes.status = to;
        let task = self
            .store
            .update_task(current.id, &changes)?
            .ok_or(EngineError::NotFound)?;

        info!(task_id = %task.id, actor_id = %actor_id, from = %current.status, to = %task.status, "Changed task status");
        self.after_status_change(actor_id, current.status, &task);
        Ok(task)
    }

    /// Removes the task together with its comments.
    pub fn delete_task(&self, actor_id: Uuid, task_id: Uuid) -> EngineResult<()> {
        let task = self.task_for(actor_id, task_id, Operation::DeleteTask)?;
        if !self.store.delete_task(task.id)? {
            return Err(EngineError::NotFound);
        }

        info!(task_id = %task.id, project_id = %task.project_id, actor_id = %actor_id, "Deleted task");
        Ok(())
    }
}
