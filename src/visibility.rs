//! Visibility gate
//!
//! Per-principal read policy, kept in one place so the record store's
//! query path and the UI ask the same questions:
//! - capsule content is time-locked until `unlock_date`
//! - assignments are hidden from students until published
//! - submissions are readable by staff and the submitting student only
//!
//! Force release is deliberately shallow. It whitelists a capsule id for
//! this gate instance, which lives exactly as long as the app session.
//! The stored `unlock_date` is never rewritten, so the next session sees
//! the capsule sealed again.

use crate::records::{Assignment, Capsule, MediaFile, Submission};
use crate::session::{Principal, Role};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::Serialize;
use tracing::info;

/// Access decision with a caller-facing reason on deny
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Deny { reason: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    fn deny(reason: impl Into<String>) -> Self {
        AccessDecision::Deny {
            reason: reason.into(),
        }
    }
}

/// Whether a shared-namespace assignment is visible to this role
pub fn can_view_assignment(role: Role, assignment: &Assignment) -> bool {
    role.is_staff() || assignment.visible_to_students
}

/// A capsule as the caller is allowed to see it. Metadata is always
/// present; `notes` and `media_files` are withheld until release.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsuleView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub capsule_type: String,
    pub department: String,
    pub course_code: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub unlock_date: DateTime<Utc>,
    pub released: bool,
    pub notes: Option<String>,
    pub media_files: Option<Vec<MediaFile>>,
}

/// Session-scoped visibility checks
#[derive(Default)]
pub struct VisibilityGate {
    /// Capsule ids force-released for this session only
    force_released: DashSet<String>,
}

impl VisibilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unseal a capsule for the rest of this session without touching
    /// its stored unlock date.
    pub fn force_release(&self, capsule_id: &str) {
        info!(capsule_id = %capsule_id, "Capsule force-released for this session");
        self.force_released.insert(capsule_id.to_string());
    }

    pub fn is_force_released(&self, capsule_id: &str) -> bool {
        self.force_released.contains(capsule_id)
    }

    /// Project a capsule through the time lock at the current instant
    pub fn capsule_view(&self, capsule: &Capsule) -> CapsuleView {
        self.capsule_view_at(capsule, Utc::now())
    }

    /// Clock-injected variant of [`capsule_view`](Self::capsule_view)
    pub fn capsule_view_at(&self, capsule: &Capsule, now: DateTime<Utc>) -> CapsuleView {
        let released = capsule.is_released_at(now) || self.is_force_released(&capsule.id);
        CapsuleView {
            id: capsule.id.clone(),
            title: capsule.title.clone(),
            description: capsule.description.clone(),
            capsule_type: capsule.capsule_type.clone(),
            department: capsule.department.clone(),
            course_code: capsule.course_code.clone(),
            tags: capsule.tags.clone(),
            created_at: capsule.created_at,
            unlock_date: capsule.unlock_date,
            released,
            notes: released.then(|| capsule.notes.clone()),
            media_files: released.then(|| capsule.media_files.clone()),
        }
    }

    /// Whether this role may see a capsule record at all. Confidential
    /// capsules are limited to their authorized roles; the time lock on
    /// content is a separate check.
    pub fn capsule_access(&self, role: Role, capsule: &Capsule) -> AccessDecision {
        if capsule.is_confidential
            && !capsule.authorized_roles.is_empty()
            && !capsule.authorized_roles.contains(&role)
        {
            return AccessDecision::deny("Capsule restricted to authorized roles");
        }
        AccessDecision::Allow
    }

    pub fn assignment_access(&self, role: Role, assignment: &Assignment) -> AccessDecision {
        if !can_view_assignment(role, assignment) {
            return AccessDecision::deny(format!(
                "Assignment '{}' is not yet published",
                assignment.id
            ));
        }
        AccessDecision::Allow
    }

    pub fn submission_access(
        &self,
        principal: &Principal,
        submission: &Submission,
    ) -> AccessDecision {
        if principal.role.is_staff() {
            return AccessDecision::Allow;
        }
        if submission.student_email == principal.email {
            return AccessDecision::Allow;
        }
        AccessDecision::deny("Submission belongs to another student")
    }
}
