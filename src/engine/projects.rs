//! Project lifecycle. Reads are open to participants; every mutation is
//! owner-only.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::members::MemberView;
use super::{Engine, EngineError, EngineResult, Issues};
use crate::access::{scope_for, Operation, ProjectQuery};
use crate::helpers::{double_option, naive, non_blank, now};
use crate::models::{NewProject, Project, ProjectChanges, ProjectStatus};
use crate::pagination::{PaginatedResponse, PaginationParams};

pub const OWNER_ROLE: &str = "OWNER";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectInput {
    #[validate(length(max = 255, message = "Project name must be at most 255 characters"))]
    #[schema(example = "Redesign")]
    pub name: String,
    #[schema(example = "Marketing site redesign")]
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectInput {
    #[validate(length(max = 255, message = "Project name must be at most 255 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[schema(example = "COMPLETED")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectListParams {
    /// ACTIVE, COMPLETED or ARCHIVED.
    pub status: Option<String>,
    /// Case-insensitive substring of the project name.
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectWithRole {
    pub project: Project,
    /// `OWNER`, or the actor's membership role.
    #[schema(example = "DEVELOPER")]
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectDetail {
    pub project: Project,
    #[schema(example = "OWNER")]
    pub role: String,
    pub members: Vec<MemberView>,
}

fn check_dates(
    issues: &mut Issues,
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
) {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            issues.add(
                "end_date",
                "INVALID_DATE_RANGE",
                "End date must not be before start date",
            );
        }
    }
}

impl Engine {
    pub fn create_project(&self, actor_id: Uuid, input: CreateProjectInput) -> EngineResult<Project> {
        let mut issues = Issues::check(&input);
        let name = non_blank(Some(input.name.as_str()));
        if name.is_none() {
            issues.add("name", "REQUIRED", "Project name is required");
        }
        let (start_date, end_date) = (naive(input.start_date), naive(input.end_date));
        check_dates(&mut issues, start_date, end_date);
        issues.into_result()?;

        let project = self.store.insert_project(NewProject {
            name: name.unwrap_or_default(),
            description: non_blank(input.description.as_deref()),
            status: ProjectStatus::Active,
            owner_id: actor_id,
            start_date,
            end_date,
        })?;

        info!(project_id = %project.id, owner_id = %actor_id, name = %project.name, "Created project");
        Ok(project)
    }

    /// Visible projects, newest first, each tagged with the actor's role.
    pub fn list_projects(
        &self,
        actor_id: Uuid,
        params: &ProjectListParams,
        page: &PaginationParams,
    ) -> EngineResult<PaginatedResponse<ProjectWithRole>> {
        let mut issues = Issues::default();
        let status = issues.parse::<ProjectStatus>("status", params.status.as_deref());
        issues.into_result()?;

        let query = ProjectQuery {
            scope: scope_for(actor_id, Operation::ViewProject),
            status,
            search: params.search.clone(),
        };
        let total = self.store.count_projects(&query)?;
        let (limit, offset) = page.limit_offset();
        let projects = self.store.list_projects(&query, limit, offset)?;

        let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();
        let roles: HashMap<Uuid, String> = self
            .store
            .memberships_of(actor_id, &ids)?
            .into_iter()
            .map(|m| (m.project_id, m.role))
            .collect();

        let data = projects
            .into_iter()
            .map(|project| {
                let role = if project.owner_id == actor_id {
                    OWNER_ROLE.to_string()
                } else {
                    roles.get(&project.id).cloned().unwrap_or_default()
                };
                ProjectWithRole { project, role }
            })
            .collect();

        Ok(PaginatedResponse::from_params(data, page, total))
    }

    pub fn get_project(&self, actor_id: Uuid, project_id: Uuid) -> EngineResult<ProjectDetail> {
        let project = self.project_for(actor_id, project_id, Operation::ViewProject)?;
        let role = self.role_in(&project, actor_id)?;
        let members = self
            .store
            .list_members(project.id)?
            .into_iter()
            .map(MemberView::from)
            .collect();

        Ok(ProjectDetail {
            project,
            role,
            members,
        })
    }

    pub fn update_project(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        input: UpdateProjectInput,
    ) -> EngineResult<Project> {
        let current = self.project_for(actor_id, project_id, Operation::UpdateProject)?;

        let mut issues = Issues::check(&input);
        let status = issues.parse::<ProjectStatus>("status", input.status.as_deref());
        let name = match input.name.as_deref() {
            Some(raw) => {
                let trimmed = non_blank(Some(raw));
                if trimmed.is_none() {
                    issues.add("name", "REQUIRED", "Project name must not be blank");
                }
                trimmed
            }
            None => None,
        };
        let start_date = input.start_date.map(naive);
        let end_date = input.end_date.map(naive);
        check_dates(
            &mut issues,
            start_date.unwrap_or(current.start_date),
            end_date.unwrap_or(current.end_date),
        );
        issues.into_result()?;

        let changes = ProjectChanges {
            name,
            description: input.description.map(|d| non_blank(d.as_deref())),
            status,
            start_date,
            end_date,
            updated_at: now(),
        };
        let project = self
            .store
            .update_project(project_id, &changes)?
            .ok_or(EngineError::NotFound)?;

        info!(project_id = %project.id, actor_id = %actor_id, status = %project.status, "Updated project");
        Ok(project)
    }

    /// Removes the project together with its memberships, tasks and comments.
    pub fn delete_project(&self, actor_id: Uuid, project_id: Uuid) -> EngineResult<()> {
        let project = self.project_for(actor_id, project_id, Operation::DeleteProject)?;
        if !self.store.delete_project(project.id)? {
            return Err(EngineError::NotFound);
        }

        info!(project_id = %project.id, actor_id = %actor_id, "Deleted project");
        Ok(())
    }

    pub(crate) fn role_in(&self, project: &Project, user_id: Uuid) -> EngineResult<String> {
        if project.owner_id == user_id {
            return Ok(OWNER_ROLE.to_string());
        }
        Ok(self
            .store
            .find_membership_for(project.id, user_id)?
            .map(|m| m.role)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing;
    use chrono::Duration;

    #[test]
    fn test_creator_becomes_owner_of_active_project() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");

        let project = testing::project(&engine, owner.id, "Redesign");

        assert_eq!(project.owner_id, owner.id);
        assert_eq!(project.status, ProjectStatus::Active);
        let detail = engine.get_project(owner.id, project.id).unwrap();
        assert_eq!(detail.role, OWNER_ROLE);
        assert!(detail.members.is_empty());
    }

    #[test]
    fn test_create_rejects_blank_name_and_inverted_dates() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");
        let start = Utc::now();

        let err = engine
            .create_project(
                owner.id,
                CreateProjectInput {
                    name: "   ".to_string(),
                    description: None,
                    start_date: Some(start),
                    end_date: Some(start - Duration::days(1)),
                },
            )
            .unwrap_err();

        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "end_date"]);
    }

    #[test]
    fn test_listing_shows_exactly_owned_and_member_projects() {
        let engine = testing::engine();
        let alice = testing::user(&engine, "alice@example.com");
        let bob = testing::user(&engine, "bob@example.com");
        let owned = testing::project(&engine, alice.id, "Alice's");
        let joined = testing::project(&engine, bob.id, "Bob's shared");
        let _private = testing::project(&engine, bob.id, "Bob's private");
        engine
            .add_member(
                bob.id,
                joined.id,
                super::super::members::AddMemberInput {
                    user_id: Some(alice.id),
                    email: None,
                    role: Some("DESIGNER".to_string()),
                },
            )
            .unwrap();

        let page = engine
            .list_projects(alice.id, &ProjectListParams::default(), &PaginationParams::default())
            .unwrap();

        let listed: Vec<(Uuid, String)> = page
            .data
            .iter()
            .map(|p| (p.project.id, p.role.clone()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (joined.id, "DESIGNER".to_string()),
                (owned.id, OWNER_ROLE.to_string()),
            ]
        );
        assert_eq!(page.pagination.total_count, 2);
    }

    #[test]
    fn test_list_filters_by_status_and_rejects_unknown_status() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");
        let active = testing::project(&engine, owner.id, "Active");
        let done = testing::project(&engine, owner.id, "Done");
        engine
            .update_project(
                owner.id,
                done.id,
                UpdateProjectInput {
                    status: Some("COMPLETED".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let params = ProjectListParams {
            status: Some("active".to_string()),
            search: None,
        };
        let page = engine
            .list_projects(owner.id, &params, &PaginationParams::default())
            .unwrap();
        let ids: Vec<Uuid> = page.data.iter().map(|p| p.project.id).collect();
        assert_eq!(ids, vec![active.id]);

        let bad = ProjectListParams {
            status: Some("PAUSED".to_string()),
            search: None,
        };
        let err = engine
            .list_projects(owner.id, &bad, &PaginationParams::default())
            .unwrap_err();
        assert_eq!(err.issues()[0].code, "INVALID_ENUM");
    }

    #[test]
    fn test_members_cannot_mutate_project() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");
        let member = testing::user(&engine, "m@example.com");
        let project = testing::project(&engine, owner.id, "Redesign");
        testing::join(&engine, owner.id, project.id, member.id);

        assert!(engine.get_project(member.id, project.id).is_ok());
        assert!(matches!(
            engine.update_project(
                member.id,
                project.id,
                UpdateProjectInput {
                    name: Some("Hijacked".to_string()),
                    ..Default::default()
                }
            ),
            Err(EngineError::NotFound)
        ));
        assert!(matches!(
            engine.delete_project(member.id, project.id),
            Err(EngineError::NotFound)
        ));
    }

    #[test]
    fn test_update_checks_merged_date_range() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");
        let start = Utc::now();
        let project = engine
            .create_project(
                owner.id,
                CreateProjectInput {
                    name: "Dated".to_string(),
                    description: None,
                    start_date: Some(start),
                    end_date: None,
                },
            )
            .unwrap();

        let err = engine
            .update_project(
                owner.id,
                project.id,
                UpdateProjectInput {
                    end_date: Some(Some(start - Duration::days(2))),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.issues()[0].code, "INVALID_DATE_RANGE");

        let cleared = engine
            .update_project(
                owner.id,
                project.id,
                UpdateProjectInput {
                    start_date: Some(None),
                    end_date: Some(Some(start - Duration::days(2))),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.start_date.is_none());
    }

    #[test]
    fn test_completing_all_tasks_leaves_project_status_alone() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");
        let project = testing::project(&engine, owner.id, "Redesign");
        let task = engine
            .create_task(
                owner.id,
                project.id,
                super::super::tasks::CreateTaskInput {
                    title: "Only task".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        engine
            .change_status(owner.id, task.id, "DONE")
            .unwrap();

        let detail = engine.get_project(owner.id, project.id).unwrap();
        assert_eq!(detail.project.status, ProjectStatus::Active);
    }

    #[test]
    fn test_delete_project_cascades_to_tasks() {
        let engine = testing::engine();
        let owner = testing::user(&engine, "o@example.com");
        let project = testing::project(&engine, owner.id, "Redesign");
        let task = engine
            .create_task(
                owner.id,
                project.id,
                super::super::tasks::CreateTaskInput {
                    title: "Doomed".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        engine.delete_project(owner.id, project.id).unwrap();

        assert!(matches!(
            engine.get_task(owner.id, task.id),
            Err(EngineError::NotFound)
        ));
        assert!(matches!(
            engine.get_project(owner.id, project.id),
            Err(EngineError::NotFound)
        ));
    }
}
