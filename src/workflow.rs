//! Task status transitions.

use std::str::FromStr;

use crate::models::TaskStatus;

/// Whether task status changes must follow the board order.
///
/// `Permissive` accepts any status at any time. `Strict` accepts only
/// "unchanged" or the immediate next state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn allows(&self, from: TaskStatus, to: TaskStatus) -> bool {
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => from == to || next_status(from) == Some(to),
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, TransitionPolicy::Strict)
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" | "true" | "strict" | "1" => Ok(TransitionPolicy::Strict),
            "off" | "false" | "permissive" | "0" => Ok(TransitionPolicy::Permissive),
            other => Err(format!("expected on|off, got '{}'", other)),
        }
    }
}

pub fn next_status(status: TaskStatus) -> Option<TaskStatus> {
    match status {
        TaskStatus::Todo => Some(TaskStatus::InProgress),
        TaskStatus::InProgress => Some(TaskStatus::InReview),
        TaskStatus::InReview => Some(TaskStatus::Done),
        TaskStatus::Done => None,
    }
}
