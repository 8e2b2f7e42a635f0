//! Dual-namespace record store
//!
//! Every typed collection lives as a JSON list under two key families:
//! the owner's `user_<principalId>_` prefix and the cross-principal
//! `shared_` prefix. Writes land in the owner namespace first and then
//! propagate to the shared namespace according to the record's
//! [`MirrorPolicy`]. Reads prefer the owner copy and fall back to the
//! shared one.
//!
//! Collections are whole-list values, so every mutation is a
//! read-modify-write cycle. A per-key lock map serializes those cycles;
//! two writers on the same key cannot interleave and drop each other's
//! entries.

pub mod assignment;
pub mod capsule;
pub mod submission;

pub use assignment::Assignment;
pub use capsule::{Capsule, MediaFile};
pub use submission::{Submission, SubmissionStatus};

use crate::error::StoreError;
use crate::session::{Role, Session, SHARED_NAMESPACE};
use crate::vault::Vault;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Collection key suffixes, in the order signup provisions them
pub const COLLECTION_NAMES: [&str; 3] = [
    Capsule::COLLECTION,
    Assignment::COLLECTION,
    Submission::COLLECTION,
];

/// How an owner-namespace write propagates to the shared namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorPolicy {
    /// Every save is mirrored
    Always,
    /// Mirrored while the record's predicate holds, retracted once it
    /// stops holding
    WhenVisible,
    /// The shared namespace is never touched
    Never,
}

/// Outcome of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// A payload storable in the dual-namespace store
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Collection key suffix, e.g. `academicDocuments`
    const COLLECTION: &'static str;

    fn record_id(&self) -> &str;

    /// Logical identity beyond `id`. A new record replaces an existing
    /// entry with the same natural key even when the ids differ.
    fn natural_key(&self) -> Option<String> {
        None
    }

    fn mirror_policy() -> MirrorPolicy {
        MirrorPolicy::Always
    }

    /// Whether a conditional mirror currently applies. Ignored unless the
    /// policy is [`MirrorPolicy::WhenVisible`].
    fn mirror_predicate(&self) -> bool {
        true
    }

    /// Whether this shared-namespace entry may appear in list results for
    /// the given caller role
    fn listable_from_shared(&self, _role: Role) -> bool {
        true
    }

    /// Field checks run before any storage touch
    fn validate(&self) -> Result<(), StoreError>;
}

fn collection_key<R: Record>(namespace: &str) -> String {
    format!("{}{}", namespace, R::COLLECTION)
}

/// Typed record operations over the vault
pub struct RecordStore {
    vault: Arc<Vault>,
    /// Per-collection-key write locks
    collection_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RecordStore {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            collection_locks: DashMap::new(),
        }
    }

    /// Insert or replace a record in the caller's namespace, then apply
    /// the record's mirror policy to the shared namespace.
    ///
    /// Replacement matches on `id` or on the record's natural key, so a
    /// resubmission lands on top of the previous attempt instead of
    /// accumulating next to it.
    pub fn upsert<R: Record>(
        &self,
        session: &Session,
        record: R,
    ) -> Result<UpsertOutcome, StoreError> {
        record.validate()?;
        let outcome = self.apply_upsert(&session.namespace, &record)?;
        match R::mirror_policy() {
            MirrorPolicy::Always => {
                self.apply_upsert(SHARED_NAMESPACE, &record)?;
            }
            MirrorPolicy::WhenVisible => {
                if record.mirror_predicate() {
                    self.apply_upsert(SHARED_NAMESPACE, &record)?;
                } else {
                    // Retract rather than leave a stale mirror behind.
                    self.remove_from::<R>(SHARED_NAMESPACE, record.record_id())?;
                }
            }
            MirrorPolicy::Never => {}
        }
        debug!(
            collection = R::COLLECTION,
            id = %record.record_id(),
            ?outcome,
            "Upserted record"
        );
        Ok(outcome)
    }

    /// Find a record by id, owner copy first, shared copy as fallback
    pub fn get_by_id<R: Record>(&self, session: &Session, id: &str) -> Option<R> {
        if let Some(record) = self.find_in(&collection_key::<R>(&session.namespace), id) {
            return Some(record);
        }
        self.find_in(&collection_key::<R>(SHARED_NAMESPACE), id)
    }

    /// Owner and shared copies of a record, for mirror auditing
    pub fn copies<R: Record>(&self, session: &Session, id: &str) -> (Option<R>, Option<R>) {
        let owner = self.find_in(&collection_key::<R>(&session.namespace), id);
        let shared = self.find_in(&collection_key::<R>(SHARED_NAMESPACE), id);
        (owner, shared)
    }

    /// Merge the owner and shared collections. The owner copy wins when
    /// both hold the same id; shared entries the caller's role may not
    /// list are skipped.
    pub fn list_all<R: Record>(&self, session: &Session) -> Vec<R> {
        let owner = self.load_list::<R>(&collection_key::<R>(&session.namespace));
        let mut seen: HashSet<String> =
            owner.iter().map(|r| r.record_id().to_string()).collect();
        let mut merged = owner;
        for record in self.load_list::<R>(&collection_key::<R>(SHARED_NAMESPACE)) {
            if !record.listable_from_shared(session.principal.role) {
                continue;
            }
            if seen.insert(record.record_id().to_string()) {
                merged.push(record);
            }
        }
        merged
    }

    /// Remove a record from both namespaces. Returns whether either copy
    /// existed.
    pub fn delete_by_id<R: Record>(&self, session: &Session, id: &str) -> Result<bool, StoreError> {
        let owner = self.remove_from::<R>(&session.namespace, id)?;
        let shared = self.remove_from::<R>(SHARED_NAMESPACE, id)?;
        Ok(owner || shared)
    }

    /// Delete an assignment and drop the shared submissions that reference
    /// it. Owner-namespace submission copies are not cascaded; students
    /// keep their local attempt history.
    pub fn delete_assignment(
        &self,
        session: &Session,
        assignment_id: &str,
    ) -> Result<bool, StoreError> {
        let removed = self.delete_by_id::<Assignment>(session, assignment_id)?;

        let key = collection_key::<Submission>(SHARED_NAMESPACE);
        let lock = self.lock_for(&key);
        let _guard = lock
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;
        let mut submissions = self.load_list::<Submission>(&key);
        let before = submissions.len();
        submissions.retain(|s| s.assignment_id != assignment_id);
        let dropped = before - submissions.len();
        if dropped > 0 {
            self.store_list(&key, &submissions)?;
            debug!(assignment_id = %assignment_id, dropped, "Cascaded shared submissions");
        }
        Ok(removed)
    }

    /// Apply a review transition to the shared copy of a submission.
    ///
    /// Grading happens on the copy faculty actually read. The student's
    /// owner copy is untouched and keeps the status it had at submission
    /// time. Returns whether the transition applied; backward transitions
    /// and unknown ids both report false.
    pub fn update_shared_submission_status(
        &self,
        submission_id: &str,
        next: SubmissionStatus,
    ) -> Result<bool, StoreError> {
        let key = collection_key::<Submission>(SHARED_NAMESPACE);
        let lock = self.lock_for(&key);
        let _guard = lock
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;

        let mut submissions = self.load_list::<Submission>(&key);
        let index = match submissions.iter().position(|s| s.id == submission_id) {
            Some(index) => index,
            None => return Ok(false),
        };
        if !submissions[index].advance_status(next) {
            return Ok(false);
        }
        self.store_list(&key, &submissions)?;
        debug!(submission_id = %submission_id, ?next, "Submission status advanced");
        Ok(true)
    }

    /// Submissions the caller may read for one assignment. Staff read the
    /// shared collection; students read their own attempts only.
    pub fn submissions_for_assignment(
        &self,
        session: &Session,
        assignment_id: &str,
    ) -> Vec<Submission> {
        if session.principal.role.is_staff() {
            self.load_list::<Submission>(&collection_key::<Submission>(SHARED_NAMESPACE))
                .into_iter()
                .filter(|s| s.assignment_id == assignment_id)
                .collect()
        } else {
            self.load_list::<Submission>(&collection_key::<Submission>(&session.namespace))
                .into_iter()
                .filter(|s| {
                    s.assignment_id == assignment_id
                        && s.student_email == session.principal.email
                })
                .collect()
        }
    }

    /// Boolean facade for callers that keep the platform's original
    /// storage contract: failures are logged, never thrown.
    pub fn save<R: Record>(&self, session: &Session, record: R) -> bool {
        match self.upsert(session, record) {
            Ok(_) => true,
            Err(e) => {
                error!(collection = R::COLLECTION, error = %e, "Save failed");
                false
            }
        }
    }

    /// Boolean facade over [`delete_by_id`](Self::delete_by_id)
    pub fn remove<R: Record>(&self, session: &Session, id: &str) -> bool {
        match self.delete_by_id::<R>(session, id) {
            Ok(removed) => removed,
            Err(e) => {
                error!(collection = R::COLLECTION, error = %e, "Delete failed");
                false
            }
        }
    }

    fn apply_upsert<R: Record>(
        &self,
        namespace: &str,
        record: &R,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = collection_key::<R>(namespace);
        let lock = self.lock_for(&key);
        let _guard = lock
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;

        let mut list = self.load_list::<R>(&key);
        let position = list.iter().position(|existing| {
            existing.record_id() == record.record_id()
                || (record.natural_key().is_some()
                    && existing.natural_key() == record.natural_key())
        });
        let outcome = match position {
            Some(index) => {
                list[index] = record.clone();
                UpsertOutcome::Replaced
            }
            None => {
                list.push(record.clone());
                UpsertOutcome::Inserted
            }
        };
        self.store_list(&key, &list)?;
        Ok(outcome)
    }

    fn remove_from<R: Record>(&self, namespace: &str, id: &str) -> Result<bool, StoreError> {
        let key = collection_key::<R>(namespace);
        let lock = self.lock_for(&key);
        let _guard = lock
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;

        let mut list = self.load_list::<R>(&key);
        let before = list.len();
        list.retain(|r| r.record_id() != id);
        if list.len() == before {
            return Ok(false);
        }
        self.store_list(&key, &list)?;
        Ok(true)
    }

    fn find_in<R: Record>(&self, key: &str, id: &str) -> Option<R> {
        self.load_list::<R>(key)
            .into_iter()
            .find(|record| record.record_id() == id)
    }

    /// Load a collection list. A missing or unreadable value degrades to
    /// an empty list; the platform never refuses to start over a corrupt
    /// collection.
    fn load_list<R: Record>(&self, key: &str) -> Vec<R> {
        let raw = match self.vault.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "Collection read failed, treating as empty");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Collection malformed, treating as empty");
            Vec::new()
        })
    }

    fn store_list<R: Record>(&self, key: &str, list: &[R]) -> Result<(), StoreError> {
        self.vault.put(key, &serde_json::to_string(list)?)
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.collection_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
