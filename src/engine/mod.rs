//! The access predicate engine.
//!
//! Every operation takes the acting user's id, asks [`scope_for`] for the
//! predicate that bounds it and hands that predicate to the injected
//! [`Store`]. Rows outside the predicate are indistinguishable from rows that
//! do not exist: both surface as [`EngineError::NotFound`].

pub mod comments;
pub mod members;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod users;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::access::{scope_for, Operation};
use crate::auth::password::{PasswordPolicy, PasswordService};
use crate::models::{Project, Task, UnknownVariant};
use crate::store::{Store, StoreError};
use crate::telemetry::metrics::record_access_decision;
use crate::workflow::TransitionPolicy;

/// One offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldIssue {
    #[schema(example = "assignee_id")]
    pub field: String,
    #[schema(example = "NOT_A_PROJECT_MEMBER")]
    pub code: String,
    #[schema(example = "Assignee must be the project owner or a member")]
    pub message: String,
}

impl FieldIssue {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Missing, or present but outside the actor's scope.
    #[error("Resource not found")]
    NotFound,

    #[error("Validation failed")]
    Validation(Vec<FieldIssue>),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EngineError::Validation(vec![FieldIssue::new(field, code, message)])
    }

    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            EngineError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        let mut issues = Issues::default();
        issues.extend_from(&errors);
        EngineError::Validation(issues.0)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Accumulates field issues so a request reports all of them at once.
#[derive(Debug, Default)]
pub(crate) struct Issues(Vec<FieldIssue>);

impl Issues {
    pub(crate) fn check<V: Validate>(input: &V) -> Self {
        let mut issues = Self::default();
        if let Err(errors) = input.validate() {
            issues.extend_from(&errors);
        }
        issues
    }

    fn extend_from(&mut self, errors: &ValidationErrors) {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (field, errs) in fields {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                self.0.push(FieldIssue::new(
                    field.to_string(),
                    err.code.to_uppercase(),
                    message,
                ));
            }
        }
    }

    pub(crate) fn add(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.0.push(FieldIssue::new(field, code, message));
    }

    /// Parses an optional enum field, recording an issue for unknown values.
    pub(crate) fn parse<T>(&mut self, field: &str, value: Option<&str>) -> Option<T>
    where
        T: FromStr<Err = UnknownVariant>,
    {
        match value.map(str::parse::<T>)? {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.add(field, "INVALID_ENUM", e.to_string());
                None
            }
        }
    }

    pub(crate) fn into_result(self) -> EngineResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(self.0))
        }
    }
}

/// Stateless per call; clones share the store.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    transitions: TransitionPolicy,
    password_policy: PasswordPolicy,
    passwords: PasswordService,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            transitions: TransitionPolicy::default(),
            password_policy: PasswordPolicy::default(),
            passwords: PasswordService::default(),
        }
    }

    pub fn with_transition_policy(mut self, transitions: TransitionPolicy) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy, hash_cost: u32) -> Self {
        self.password_policy = policy;
        self.passwords = PasswordService::new(hash_cost);
        self
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        self.transitions
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Turns a scoped lookup into the operation's decision.
    fn admit<T>(
        &self,
        actor_id: Uuid,
        operation: Operation,
        resource_id: Uuid,
        row: Option<T>,
    ) -> EngineResult<T> {
        record_access_decision(operation, row.is_some());
        match row {
            Some(row) => {
                debug!(actor_id = %actor_id, operation = %operation, resource_id = %resource_id, "Access granted");
                Ok(row)
            }
            None => {
                warn!(actor_id = %actor_id, operation = %operation, resource_id = %resource_id, "Access denied or resource missing");
                Err(EngineError::NotFound)
            }
        }
    }

    pub(crate) fn project_for(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        operation: Operation,
    ) -> EngineResult<Project> {
        let scope = scope_for(actor_id, operation);
        let row = self.store.find_project(project_id, &scope)?;
        self.admit(actor_id, operation, project_id, row)
    }

    pub(crate) fn task_for(
        &self,
        actor_id: Uuid,
        task_id: Uuid,
        operation: Operation,
    ) -> EngineResult<Task> {
        let scope = scope_for(actor_id, operation);
        let row = self.store.find_task(task_id, &scope)?;
        self.admit(actor_id, operation, task_id, row)
    }

    /// Whether `user_id` independently passes the visibility predicate for
    /// `project_id`, i.e. owns it or is a member.
    pub(crate) fn can_see_project(&self, project_id: Uuid, user_id: Uuid) -> EngineResult<bool> {
        let scope = scope_for(user_id, Operation::ViewProject);
        Ok(self.store.find_project(project_id, &scope)?.is_some())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3))]
        name: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_validation_errors_become_sorted_issues() {
        let input = Sample {
            name: "x".to_string(),
            email: "nope".to_string(),
        };

        let err: EngineError = input.validate().unwrap_err().into();
        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "name"]);
        assert_eq!(err.issues()[1].code, "LENGTH");
    }

    #[test]
    fn test_issue_parse_records_unknown_values() {
        let mut issues = Issues::default();
        let parsed: Option<crate::models::TaskStatus> = issues.parse("status", Some("BLOCKED"));
        let ok: Option<crate::models::TaskStatus> = issues.parse("status", Some("done"));
        let absent: Option<crate::models::TaskStatus> = issues.parse("status", None);

        assert!(parsed.is_none());
        assert_eq!(ok, Some(crate::models::TaskStatus::Done));
        assert!(absent.is_none());
        let err = issues.into_result().unwrap_err();
        assert_eq!(err.issues()[0].code, "INVALID_ENUM");
    }

    #[test]
    fn test_missing_project_is_not_found() {
        let engine = testing::engine();
        let result = engine.project_for(Uuid::new_v4(), Uuid::new_v4(), Operation::ViewProject);
        assert!(matches!(result, Err(EngineError::NotFound)));
    }
}
