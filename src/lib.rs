//! Lyceum Storage - persistence and access-control core for the Lyceum
//! academic capsule platform
//!
//! Everything the platform keeps lives in one durable key-value vault.
//! Records are JSON lists under namespace-prefixed keys, written to the
//! owner's namespace and mirrored to a shared namespace by policy, so
//! "publishing" something is nothing more than which keys it lands under.
//!
//! ## Components
//!
//! - [`vault`]: sled-backed string store, the single durability layer
//! - [`session`]: principal registry, signup/login, session pointers
//! - [`rate_limit`]: rolling-window login throttle
//! - [`records`]: dual-namespace typed collections with mirror policies
//! - [`visibility`]: time locks, publish flags, ownership checks
//! - [`similarity`]: content fingerprints and submission text comparison
//! - [`verification`]: staged capsule integrity checks
//!
//! ## Key Layout
//!
//! ```text
//! vault.sled
//! ├── currentSessionNamespace          active namespace prefix
//! ├── currentSessionPrincipal          active principal, digest stripped
//! ├── registeredPrincipals             signup registry
//! ├── fileFingerprintHistory           duplicate-detection fingerprints
//! ├── user_<principalId>_academicDocuments
//! ├── user_<principalId>_assignments
//! ├── user_<principalId>_submissions
//! ├── shared_academicDocuments
//! ├── shared_assignments
//! └── shared_submissions
//! ```

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod records;
pub mod session;
pub mod similarity;
pub mod vault;
pub mod verification;
pub mod visibility;

// Re-exports
pub use config::Config;
pub use error::{AuthError, StoreError};
pub use rate_limit::{Gate, LoginRateLimiter};
pub use records::{
    Assignment, Capsule, MediaFile, MirrorPolicy, Record, RecordStore, Submission,
    SubmissionStatus, UpsertOutcome,
};
pub use session::{Principal, Role, Session, SessionManager};
pub use similarity::{
    DuplicateFinding, DuplicateReport, FingerprintRecord, SimilarityEngine, SimilarityMatch,
    UploadedFile,
};
pub use vault::{Vault, VaultStats};
pub use verification::{
    spawn_verification, StageSchedule, VerificationHandle, VerifyProgress, VerifyReport,
    VerifyStage,
};
pub use visibility::{AccessDecision, CapsuleView, VisibilityGate};
