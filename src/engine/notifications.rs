//! Per-user notification inbox.
//!
//! Notifications are a side effect of task assignment and completion. Writing
//! one never fails the operation that triggered it.

use serde::Deserialize;
use tracing::{info, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use super::{Engine, EngineError, EngineResult};
use crate::models::{NewNotification, Notification, Project, Task};
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::telemetry::metrics::record_notification_failure;

pub const TASK_ASSIGNED: &str = "TASK_ASSIGNED";
pub const TASK_COMPLETED: &str = "TASK_COMPLETED";

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    /// Only return unread notifications.
    #[serde(default)]
    pub unread_only: bool,
}

impl Engine {
    pub fn list_notifications(
        &self,
        actor_id: Uuid,
        params: &NotificationListParams,
        page: &PaginationParams,
    ) -> EngineResult<PaginatedResponse<Notification>> {
        let total = self
            .store
            .count_notifications(actor_id, params.unread_only)?;
        let (limit, offset) = page.limit_offset();
        let data = self
            .store
            .list_notifications(actor_id, params.unread_only, limit, offset)?;
        Ok(PaginatedResponse::from_params(data, page, total))
    }

    /// Another user's notification is reported as missing.
    pub fn mark_read(&self, actor_id: Uuid, notification_id: Uuid) -> EngineResult<Notification> {
        self.store
            .mark_notification_read(notification_id, actor_id)?
            .ok_or(EngineError::NotFound)
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&self, actor_id: Uuid) -> EngineResult<usize> {
        let updated = self.store.mark_all_notifications_read(actor_id)?;
        info!(user_id = %actor_id, updated, "Marked notifications read");
        Ok(updated)
    }

    pub(crate) fn notify_assignment(&self, actor_id: Uuid, task: &Task) {
        match task.assignee_id {
            Some(assignee_id) if assignee_id != actor_id => self.notify(
                assignee_id,
                TASK_ASSIGNED,
                "New task assigned",
                format!("You have been assigned to \"{}\"", task.title),
            ),
            _ => {}
        }
    }

    pub(crate) fn notify_completion(&self, actor_id: Uuid, project: &Project, task: &Task) {
        if project.owner_id != actor_id {
            self.notify(
                project.owner_id,
                TASK_COMPLETED,
                "Task completed",
                format!("\"{}\" in {} was marked done", task.title, project.name),
            );
        }
    }

    fn notify(&self, user_id: Uuid, kind: &'static str, title: &str, message: String) {
        let notification = NewNotification {
            user_id,
            title: title.to_string(),
            message,
            kind: kind.to_string(),
        };
        if let Err(e) = self.store.insert_notification(notification) {
            warn!(user_id = %user_id, kind, error = %e, "Failed to record notification");
            record_notification_failure(kind);
        }
    }
}
