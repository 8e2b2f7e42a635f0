//! Assignment submissions
//!
//! One record per (assignment, student) pair. A resubmission replaces the
//! previous attempt through the store's natural-key matching rather than
//! piling up beside it. Submissions always mirror to the shared namespace
//! so faculty can review them; the list filter keeps other students out.

use crate::error::StoreError;
use crate::records::{Assignment, Record};
use crate::session::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// On-time arrival
    Submitted,
    /// Arrived after the deadline
    Late,
    Reviewed,
    PlagiarismFlagged,
    Graded,
}

impl SubmissionStatus {
    /// Pipeline stage: 0 entry, 1 under review, 2 final
    fn stage(&self) -> u8 {
        match self {
            SubmissionStatus::Submitted | SubmissionStatus::Late => 0,
            SubmissionStatus::Reviewed | SubmissionStatus::PlagiarismFlagged => 1,
            SubmissionStatus::Graded => 2,
        }
    }

    /// Transitions never move backward, and nothing returns to an entry
    /// status once review has begun.
    pub fn can_advance_to(&self, next: SubmissionStatus) -> bool {
        next.stage() > 0 && next.stage() >= self.stage()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_email: String,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub text_submission: String,
    /// Uploaded file names
    #[serde(default)]
    pub files: Vec<String>,
}

impl Submission {
    /// Build an attempt, classifying it late or on time against the
    /// assignment deadline. The deadline instant itself is on time.
    pub fn new(
        assignment: &Assignment,
        student_email: &str,
        text_submission: String,
        files: Vec<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let status = if submitted_at > assignment.due_date {
            SubmissionStatus::Late
        } else {
            SubmissionStatus::Submitted
        };
        Self {
            id: Uuid::new_v4().to_string(),
            assignment_id: assignment.id.clone(),
            student_email: student_email.trim().to_lowercase(),
            submitted_at,
            status,
            text_submission,
            files,
        }
    }

    /// Apply a review transition. Returns false and leaves the record
    /// untouched when the transition would move backward.
    pub fn advance_status(&mut self, next: SubmissionStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

impl Record for Submission {
    const COLLECTION: &'static str = "submissions";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn natural_key(&self) -> Option<String> {
        Some(format!("{}::{}", self.assignment_id, self.student_email))
    }

    fn listable_from_shared(&self, role: Role) -> bool {
        role.is_staff()
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.id.trim().is_empty() {
            return Err(StoreError::Validation("submission id is required".into()));
        }
        if self.assignment_id.trim().is_empty() {
            return Err(StoreError::Validation(
                "submission assignment id is required".into(),
            ));
        }
        if self.student_email.trim().is_empty() {
            return Err(StoreError::Validation(
                "submission student email is required".into(),
            ));
        }
        Ok(())
    }
}
