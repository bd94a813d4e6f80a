//! Task discussion. Readable by anyone who can see the task; a comment can
//! only be deleted by its author.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::users::UserSummary;
use super::{Engine, EngineError, EngineResult, Issues};
use crate::access::Operation;
use crate::helpers::non_blank;
use crate::models::{Comment, NewComment, User};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCommentInput {
    #[validate(length(max = 5000, message = "Comment must be at most 5000 characters"))]
    #[schema(example = "Copy is ready for review")]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentView {
    pub id: Uuid,
    pub task_id: Uuid,
    pub content: String,
    pub author: UserSummary,
    pub created_at: NaiveDateTime,
}

impl From<(Comment, User)> for CommentView {
    fn from((comment, author): (Comment, User)) -> Self {
        Self {
            id: comment.id,
            task_id: comment.task_id,
            content: comment.content,
            author: UserSummary::from(author),
            created_at: comment.created_at,
        }
    }
}

impl Engine {
    pub fn add_comment(
        &self,
        actor_id: Uuid,
        task_id: Uuid,
        input: AddCommentInput,
    ) -> EngineResult<CommentView> {
        let task = self.task_for(actor_id, task_id, Operation::CreateComment)?;

        let mut issues = Issues::check(&input);
        let content = non_blank(Some(input.content.as_str()));
        if content.is_none() {
            issues.add("content", "REQUIRED", "Comment must not be empty");
        }
        issues.into_result()?;

        let author = self.current_user(actor_id)?;
        let comment = self.store.insert_comment(NewComment {
            task_id: task.id,
            author_id: author.id,
            content: content.unwrap_or_default(),
        })?;

        info!(comment_id = %comment.id, task_id = %task.id, actor_id = %actor_id, "Added comment");
        Ok(CommentView::from((comment, author)))
    }

    /// Oldest first.
    pub fn list_comments(&self, actor_id: Uuid, task_id: Uuid) -> EngineResult<Vec<CommentView>> {
        let task = self.task_for(actor_id, task_id, Operation::ViewTask)?;
        Ok(self
            .store
            .list_comments(task.id)?
            .into_iter()
            .map(CommentView::from)
            .collect())
    }

    /// Someone else's comment, or one on an invisible task, is reported as missing.
    pub fn delete_comment(&self, actor_id: Uuid, comment_id: Uuid) -> EngineResult<()> {
        let comment = self
            .store
            .find_comment(comment_id)?
            .ok_or(EngineError::NotFound)?;
        let task = self.task_for(actor_id, comment.task_id, Operation::DeleteComment)?;
        if comment.author_id != actor_id {
            warn!(comment_id = %comment.id, actor_id = %actor_id, "Attempted to delete another user's comment");
            return Err(EngineError::NotFound);
        }

        if !self.store.delete_comment(comment.id)? {
            return Err(EngineError::NotFound);
        }

        info!(comment_id = %comment.id, task_id = %task.id, actor_id = %actor_id, "Deleted comment");
        Ok(())
    }
}
