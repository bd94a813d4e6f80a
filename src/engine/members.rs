//! Project roster. Anyone who can see the project can read it; only the
//! owner can change it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::users::normalize_email;
use super::{Engine, EngineError, EngineResult, Issues};
use crate::access::Operation;
use crate::helpers::non_blank;
use crate::models::{Membership, NewMembership, User};
use crate::store::StoreError;

pub const DEFAULT_MEMBER_ROLE: &str = "MEMBER";

/// Identifies the new member by `user_id` or by `email`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct AddMemberInput {
    pub user_id: Option<Uuid>,
    #[schema(example = "member@example.com")]
    pub email: Option<String>,
    /// Free-form, e.g. DEVELOPER, DESIGNER, LEAD. Defaults to MEMBER.
    #[validate(length(max = 50, message = "Role must be at most 50 characters"))]
    #[schema(example = "DEVELOPER")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberView {
    /// Membership row id; removal is by this id.
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "member@example.com")]
    pub email: String,
    #[schema(example = "John Doe")]
    pub full_name: Option<String>,
    #[schema(example = "DEVELOPER")]
    pub role: String,
    pub joined_at: NaiveDateTime,
}

impl From<(Membership, User)> for MemberView {
    fn from((membership, user): (Membership, User)) -> Self {
        Self {
            id: membership.id,
            user_id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: membership.role,
            joined_at: membership.joined_at,
        }
    }
}

fn already_member(field: &str) -> EngineError {
    EngineError::invalid(
        field,
        "ALREADY_MEMBER",
        "User is already a member of this project",
    )
}

impl Engine {
    pub fn list_members(&self, actor_id: Uuid, project_id: Uuid) -> EngineResult<Vec<MemberView>> {
        let project = self.project_for(actor_id, project_id, Operation::ViewProject)?;
        Ok(self
            .store
            .list_members(project.id)?
            .into_iter()
            .map(MemberView::from)
            .collect())
    }

    pub fn add_member(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        input: AddMemberInput,
    ) -> EngineResult<MemberView> {
        let project = self.project_for(actor_id, project_id, Operation::ManageMembers)?;

        let mut issues = Issues::check(&input);
        let lookup = match (input.user_id, input.email.as_deref()) {
            (Some(user_id), _) => Some(("user_id", self.store.find_user(user_id)?)),
            (None, Some(email)) => Some((
                "email",
                self.store.find_user_by_email(&normalize_email(email))?,
            )),
            (None, None) => None,
        };
        let (field, target) = match lookup {
            Some((field, Some(user))) if user.is_active => (field, Some(user)),
            Some((field, _)) => {
                issues.add(field, "USER_NOT_FOUND", "No active user matches");
                (field, None)
            }
            None => {
                issues.add("user_id", "REQUIRED", "Either user_id or email is required");
                ("user_id", None)
            }
        };
        issues.into_result()?;
        let user = target.ok_or(EngineError::NotFound)?;

        if self.can_see_project(project.id, user.id)? {
            warn!(project_id = %project.id, user_id = %user.id, "Attempted to add existing member");
            return Err(already_member(field));
        }

        let role = non_blank(input.role.as_deref())
            .unwrap_or_else(|| DEFAULT_MEMBER_ROLE.to_string());
        let membership = self
            .store
            .insert_membership(NewMembership {
                project_id: project.id,
                user_id: user.id,
                role,
            })
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    warn!(project_id = %project.id, user_id = %user.id, "Concurrent membership insert rejected");
                    already_member(field)
                }
                other => other.into(),
            })?;

        info!(project_id = %project.id, user_id = %user.id, role = %membership.role, "Added member to project");
        Ok(MemberView::from((membership, user)))
    }

    /// Removal is by membership row id, which must belong to `project_id`.
    pub fn remove_member(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        membership_id: Uuid,
    ) -> EngineResult<()> {
        let project = self.project_for(actor_id, project_id, Operation::ManageMembers)?;

        let membership = self
            .store
            .find_membership(membership_id)?
            .filter(|m| m.project_id == project.id)
            .ok_or(EngineError::NotFound)?;

        if !self.store.delete_membership(membership.id)? {
            return Err(EngineError::NotFound);
        }

        info!(project_id = %project.id, user_id = %membership.user_id, "Removed member from project");
        Ok(())
    }
}
