//! Academic capsules: time-locked document records
//!
//! A capsule's metadata is public from the moment it is saved; its
//! content (notes and media) stays sealed until `unlock_date`. Release
//! is always derived from the clock against that stored date. Nothing
//! ever writes a "released" flag, so a capsule re-seals if the date is
//! pushed out again.

use crate::error::StoreError;
use crate::records::Record;
use crate::session::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attached media metadata. File bytes live outside the vault; the hash
/// is recorded at upload time for later duplicate checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub file_name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// A time-locked academic document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capsule {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub unlock_date: DateTime<Utc>,
    /// Free-form kind: thesis, research, lecture, ...
    #[serde(default)]
    pub capsule_type: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Sealed content, withheld until release
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub media_files: Vec<MediaFile>,
    /// Roles allowed to see the capsule at all when confidential
    #[serde(default)]
    pub authorized_roles: Vec<Role>,
    #[serde(default)]
    pub is_confidential: bool,
}

impl Capsule {
    /// Whether the time lock has expired at the given instant. The
    /// boundary itself counts as released.
    pub fn is_released_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.unlock_date
    }
}

impl Record for Capsule {
    const COLLECTION: &'static str = "academicDocuments";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.id.trim().is_empty() {
            return Err(StoreError::Validation("capsule id is required".into()));
        }
        if self.title.trim().is_empty() {
            return Err(StoreError::Validation("capsule title is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn capsule_unlocking_at(unlock_date: DateTime<Utc>) -> Capsule {
        Capsule {
            id: "c1".to_string(),
            title: "Commencement address".to_string(),
            description: String::new(),
            created_at: unlock_date - Duration::days(365),
            unlock_date,
            capsule_type: "lecture".to_string(),
            department: String::new(),
            course_code: String::new(),
            tags: Vec::new(),
            notes: "sealed".to_string(),
            media_files: Vec::new(),
            authorized_roles: Vec::new(),
            is_confidential: false,
        }
    }

    #[test]
    fn test_release_boundary_is_inclusive() {
        let unlock = Utc::now();
        let capsule = capsule_unlocking_at(unlock);

        assert!(!capsule.is_released_at(unlock - Duration::seconds(1)));
        assert!(capsule.is_released_at(unlock));
        assert!(capsule.is_released_at(unlock + Duration::seconds(1)));
    }

    #[test]
    fn test_vault_payload_uses_camel_case_keys() {
        let capsule = capsule_unlocking_at(Utc::now());
        let json = serde_json::to_string(&capsule).unwrap();

        assert!(json.contains("\"unlockDate\""));
        assert!(json.contains("\"mediaFiles\""));
        assert!(json.contains("\"isConfidential\""));
    }

    #[test]
    fn test_validation_requires_id_and_title() {
        let mut capsule = capsule_unlocking_at(Utc::now());
        capsule.title = "  ".to_string();
        assert!(capsule.validate().is_err());

        capsule.title = "Titled".to_string();
        capsule.id = String::new();
        assert!(capsule.validate().is_err());
    }
}
