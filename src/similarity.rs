//! Content fingerprinting and text similarity
//!
//! Two independent checks, both advisory. They flag, never block:
//! - byte-level duplicate detection through a rolling content hash kept
//!   in a persisted fingerprint history
//! - token-set (Jaccard) comparison of submission text against earlier
//!   attempts on the same assignment
//!
//! The rolling hash is order-sensitive but only 32 bits wide, so equal
//! hashes are treated as a binary verdict (100 or 0), not a distance.

use crate::error::StoreError;
use crate::records::Submission;
use crate::vault::Vault;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Similarity above this counts as a duplicate
pub const DUPLICATE_SIMILARITY_THRESHOLD: u32 = 80;
/// Matches at or below this score are discarded
pub const MATCH_RETENTION_THRESHOLD: u32 = 20;
/// At most this many matches are kept per comparison
pub const MAX_RETAINED_MATCHES: usize = 5;
/// Tokens must be strictly longer than this to participate
const MIN_TOKEN_LENGTH: usize = 3;

/// Vault key for the fingerprint history
pub const FINGERPRINT_HISTORY_KEY: &str = "fileFingerprintHistory";

/// 32-bit order-sensitive rolling hash over raw bytes, rendered as
/// lowercase hex. Not cryptographic; collisions are possible and the
/// verdict is advisory.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hash: u32 = 0;
    for &byte in bytes {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
    }
    format!("{:08x}", hash)
}

/// Jaccard similarity of the two texts' token sets, as a whole
/// percentage. Tokens are lowercased and must be longer than three
/// characters; either side tokenizing to nothing scores 0.
pub fn similarity(a: &str, b: &str) -> u32 {
    let first = token_set(a);
    let second = token_set(b);
    if first.is_empty() || second.is_empty() {
        return 0;
    }
    let intersection = first.intersection(&second).count();
    let union = first.union(&second).count();
    (intersection * 100 / union) as u32
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|token| token.to_lowercase())
        .filter(|token| token.chars().count() > MIN_TOKEN_LENGTH)
        .collect()
}

/// An upload as handed over by the caller. Bytes never enter the vault;
/// only the fingerprint does.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Extract comparable text from an upload. Non-text payloads and invalid
/// UTF-8 yield `None`; a failed extraction contributes "no text" instead
/// of aborting the check run.
pub fn extract_text(file: &UploadedFile) -> Option<String> {
    if !file.mime_type.starts_with("text/") {
        return None;
    }
    String::from_utf8(file.bytes.clone()).ok()
}

/// A persisted fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRecord {
    pub file_name: String,
    pub content_hash: String,
    pub mime_type: String,
}

/// Duplicate verdict for one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFinding {
    pub file_name: String,
    pub content_hash: String,
    /// Binary score: 100 on a hash collision with another file, else 0
    pub similarity: u32,
    pub is_duplicate: bool,
    /// Name of the earlier file this one collided with
    pub matched_file: Option<String>,
}

/// Outcome of a duplicate check run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub findings: Vec<DuplicateFinding>,
    pub files_checked: usize,
    pub duplicates_found: usize,
}

/// One prior attempt scored against a new submission text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityMatch {
    pub submission_id: String,
    pub student_email: String,
    pub score: u32,
}

/// Score a submission text against prior attempts on the same
/// assignment. Scores above [`MATCH_RETENTION_THRESHOLD`] are kept,
/// highest first, capped at [`MAX_RETAINED_MATCHES`].
pub fn compare_against_prior(text: &str, prior: &[Submission]) -> Vec<SimilarityMatch> {
    let mut matches: Vec<SimilarityMatch> = prior
        .iter()
        .map(|submission| SimilarityMatch {
            submission_id: submission.id.clone(),
            student_email: submission.student_email.clone(),
            score: similarity(text, &submission.text_submission),
        })
        .filter(|m| m.score > MATCH_RETENTION_THRESHOLD)
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(MAX_RETAINED_MATCHES);
    matches
}

/// Duplicate detection over the persisted fingerprint history
pub struct SimilarityEngine {
    vault: Arc<Vault>,
    /// Serializes load-mutate-save cycles on the history key; two
    /// concurrent checks cannot drop each other's fingerprints.
    history_lock: Mutex<()>,
}

impl SimilarityEngine {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            history_lock: Mutex::new(()),
        }
    }

    /// Fingerprint each upload and compare it against every earlier
    /// fingerprint, including ones recorded earlier in this same run.
    ///
    /// A collision with a different file name flags a duplicate. The same
    /// name carrying the same bytes is a re-upload of the same work and
    /// passes quietly. Every processed fingerprint joins the history,
    /// deduplicated by (name, hash).
    pub fn check_files(&self, files: &[UploadedFile]) -> DuplicateReport {
        // Recover the guard even if a previous check panicked mid-cycle.
        let _guard = self.history_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut history = self.load_history();
        let mut findings = Vec::with_capacity(files.len());

        for file in files {
            let hash = content_hash(&file.bytes);
            let matched = history
                .iter()
                .find(|record| record.content_hash == hash && record.file_name != file.file_name)
                .map(|record| record.file_name.clone());
            let score = if matched.is_some() { 100 } else { 0 };
            findings.push(DuplicateFinding {
                file_name: file.file_name.clone(),
                content_hash: hash.clone(),
                similarity: score,
                is_duplicate: score > DUPLICATE_SIMILARITY_THRESHOLD,
                matched_file: matched,
            });

            let already_recorded = history
                .iter()
                .any(|record| record.file_name == file.file_name && record.content_hash == hash);
            if !already_recorded {
                history.push(FingerprintRecord {
                    file_name: file.file_name.clone(),
                    content_hash: hash,
                    mime_type: file.mime_type.clone(),
                });
            }
        }

        if let Err(e) = self.save_history(&history) {
            error!(error = %e, "Could not persist fingerprint history");
        }

        let duplicates_found = findings.iter().filter(|f| f.is_duplicate).count();
        debug!(
            files_checked = files.len(),
            duplicates_found, "Duplicate check complete"
        );
        DuplicateReport {
            files_checked: findings.len(),
            duplicates_found,
            findings,
        }
    }

    /// Current fingerprint history
    pub fn history(&self) -> Vec<FingerprintRecord> {
        self.load_history()
    }

    pub fn history_len(&self) -> usize {
        self.load_history().len()
    }

    fn load_history(&self) -> Vec<FingerprintRecord> {
        let raw = match self.vault.get(FINGERPRINT_HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Fingerprint history unreadable, treating as empty");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Fingerprint history malformed, treating as empty");
            Vec::new()
        })
    }

    fn save_history(&self, history: &[FingerprintRecord]) -> Result<(), StoreError> {
        self.vault
            .put(FINGERPRINT_HISTORY_KEY, &serde_json::to_string(history)?)
    }
}
