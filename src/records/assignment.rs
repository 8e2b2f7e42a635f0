//! Course assignments
//!
//! Assignments are authored by faculty in their owner namespace and only
//! reach the shared namespace while `visible_to_students` holds, so the
//! mirror itself is the publication mechanism.

use crate::error::StoreError;
use crate::records::{MirrorPolicy, Record};
use crate::session::Role;
use crate::visibility;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub course_code: String,
    /// Authoring faculty email
    pub created_by: String,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub visible_to_students: bool,
    /// Handout file names
    #[serde(default)]
    pub files: Vec<String>,
    /// Accepted submission form: text, file, or both
    #[serde(default = "default_submission_type")]
    pub submission_type: String,
}

fn default_submission_type() -> String {
    "text".to_string()
}

impl Record for Assignment {
    const COLLECTION: &'static str = "assignments";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn mirror_policy() -> MirrorPolicy {
        MirrorPolicy::WhenVisible
    }

    fn mirror_predicate(&self) -> bool {
        self.visible_to_students
    }

    fn listable_from_shared(&self, role: Role) -> bool {
        visibility::can_view_assignment(role, self)
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.id.trim().is_empty() {
            return Err(StoreError::Validation("assignment id is required".into()));
        }
        if self.title.trim().is_empty() {
            return Err(StoreError::Validation(
                "assignment title is required".into(),
            ));
        }
        if self.course_code.trim().is_empty() {
            return Err(StoreError::Validation(
                "assignment course code is required".into(),
            ));
        }
        if self.created_by.trim().is_empty() {
            return Err(StoreError::Validation(
                "assignment author is required".into(),
            ));
        }
        Ok(())
    }
}
