//! Integration tests for the platform storage core
//!
//! These drive whole flows the way the UI does: several principals over
//! one shared vault, crossing the session manager, record store,
//! visibility gate, and similarity engine.

use chrono::{Duration as ChronoDuration, Utc};
use lyceum_storage::similarity::{compare_against_prior, FINGERPRINT_HISTORY_KEY};
use lyceum_storage::{
    spawn_verification, Assignment, AuthError, Capsule, Config, LoginRateLimiter, MediaFile,
    RecordStore, Role, Session, SessionManager, SimilarityEngine, StageSchedule, Submission,
    SubmissionStatus, UploadedFile, Vault, VerifyProgress, VisibilityGate,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PASSWORD: &str = "Secur3!pass";

struct Platform {
    vault: Arc<Vault>,
    limiter: Arc<LoginRateLimiter>,
    sessions: SessionManager,
    store: Arc<RecordStore>,
    engine: SimilarityEngine,
}

/// Helper to stand up the whole storage core over one temporary vault
fn create_platform() -> (Platform, TempDir) {
    create_platform_with_lockout(5, Duration::from_secs(900))
}

fn create_platform_with_lockout(threshold: u32, window: Duration) -> (Platform, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let vault = Arc::new(Vault::open(temp_dir.path().join("vault.sled")).unwrap());
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        simulate_latency: false,
        ..Config::default()
    };
    let limiter = Arc::new(LoginRateLimiter::new(threshold, window));
    let sessions = SessionManager::new(vault.clone(), limiter.clone(), &config);
    let store = Arc::new(RecordStore::new(vault.clone()));
    let engine = SimilarityEngine::new(vault.clone());
    (
        Platform {
            vault,
            limiter,
            sessions,
            store,
            engine,
        },
        temp_dir,
    )
}

async fn signup(platform: &Platform, email: &str, role: Role) -> Session {
    platform
        .sessions
        .signup(email, PASSWORD, email, role)
        .await
        .unwrap()
}

fn assignment(id: &str, visible: bool, due_date: chrono::DateTime<Utc>) -> Assignment {
    Assignment {
        id: id.to_string(),
        title: "Essay on archives".to_string(),
        description: String::new(),
        course_code: "HIST-301".to_string(),
        created_by: "prof@lyceum.edu".to_string(),
        due_date,
        visible_to_students: visible,
        files: Vec::new(),
        submission_type: "text".to_string(),
    }
}

fn capsule(id: &str, unlock_date: chrono::DateTime<Utc>) -> Capsule {
    Capsule {
        id: id.to_string(),
        title: "Sealed dissertation".to_string(),
        description: "public abstract".to_string(),
        created_at: Utc::now(),
        unlock_date,
        capsule_type: "thesis".to_string(),
        department: "History".to_string(),
        course_code: "HIST-301".to_string(),
        tags: vec!["archive".to_string()],
        notes: "the embargoed findings".to_string(),
        media_files: vec![MediaFile {
            file_name: "findings.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size_bytes: 42,
            content_hash: None,
        }],
        authorized_roles: Vec::new(),
        is_confidential: false,
    }
}

/// Publishing is the mirror: students see an assignment exactly while
/// its flag holds, and unpublishing retracts the shared copy.
#[tokio::test]
async fn test_publication_controls_student_visibility() {
    let (platform, _temp) = create_platform();
    let faculty = signup(&platform, "prof@lyceum.edu", Role::Faculty).await;
    let student = signup(&platform, "ada@lyceum.edu", Role::Student).await;

    let due = Utc::now() + ChronoDuration::days(7);
    platform
        .store
        .upsert(&faculty, assignment("a1", false, due))
        .unwrap();

    assert!(platform.store.list_all::<Assignment>(&student).is_empty());
    assert!(platform
        .store
        .get_by_id::<Assignment>(&student, "a1")
        .is_none());
    // The author still sees their own draft.
    assert_eq!(platform.store.list_all::<Assignment>(&faculty).len(), 1);

    platform
        .store
        .upsert(&faculty, assignment("a1", true, due))
        .unwrap();
    assert_eq!(platform.store.list_all::<Assignment>(&student).len(), 1);

    platform
        .store
        .upsert(&faculty, assignment("a1", false, due))
        .unwrap();
    assert!(platform.store.list_all::<Assignment>(&student).is_empty());
}

/// Submit, resubmit, grade: one attempt per (assignment, student), staff
/// review lands on the shared copy, the student's history stays theirs.
#[tokio::test]
async fn test_submission_lifecycle() {
    let (platform, _temp) = create_platform();
    let faculty = signup(&platform, "prof@lyceum.edu", Role::Faculty).await;
    let ada = signup(&platform, "ada@lyceum.edu", Role::Student).await;

    let due = Utc::now() + ChronoDuration::days(1);
    let a1 = assignment("a1", true, due);
    platform.store.upsert(&faculty, a1.clone()).unwrap();

    platform
        .store
        .upsert(
            &ada,
            Submission::new(&a1, "ada@lyceum.edu", "first draft".into(), Vec::new(), Utc::now()),
        )
        .unwrap();
    platform
        .store
        .upsert(
            &ada,
            Submission::new(&a1, "ada@lyceum.edu", "final draft".into(), Vec::new(), Utc::now()),
        )
        .unwrap();

    let reviewable = platform.store.submissions_for_assignment(&faculty, "a1");
    assert_eq!(reviewable.len(), 1);
    assert_eq!(reviewable[0].text_submission, "final draft");
    assert_eq!(reviewable[0].status, SubmissionStatus::Submitted);

    assert!(platform
        .store
        .update_shared_submission_status(&reviewable[0].id, SubmissionStatus::Graded)
        .unwrap());
    let graded = platform.store.submissions_for_assignment(&faculty, "a1");
    assert_eq!(graded[0].status, SubmissionStatus::Graded);

    // Late arrival is classified against the deadline at creation.
    let late = Submission::new(
        &a1,
        "ada@lyceum.edu",
        "past deadline".into(),
        Vec::new(),
        due + ChronoDuration::minutes(5),
    );
    assert_eq!(late.status, SubmissionStatus::Late);
}

/// Deleting an assignment cascades over shared submissions only; every
/// student keeps the copy in their own namespace.
#[tokio::test]
async fn test_assignment_cascade_spares_student_copies() {
    let (platform, _temp) = create_platform();
    let faculty = signup(&platform, "prof@lyceum.edu", Role::Faculty).await;
    let ada = signup(&platform, "ada@lyceum.edu", Role::Student).await;
    let ben = signup(&platform, "ben@lyceum.edu", Role::Student).await;

    let a1 = assignment("a1", true, Utc::now() + ChronoDuration::days(1));
    platform.store.upsert(&faculty, a1.clone()).unwrap();
    platform
        .store
        .upsert(
            &ada,
            Submission::new(&a1, "ada@lyceum.edu", "ada's essay".into(), Vec::new(), Utc::now()),
        )
        .unwrap();
    platform
        .store
        .upsert(
            &ben,
            Submission::new(&a1, "ben@lyceum.edu", "ben's essay".into(), Vec::new(), Utc::now()),
        )
        .unwrap();
    assert_eq!(
        platform.store.submissions_for_assignment(&faculty, "a1").len(),
        2
    );

    assert!(platform.store.delete_assignment(&faculty, "a1").unwrap());

    assert!(platform
        .store
        .get_by_id::<Assignment>(&ada, "a1")
        .is_none());
    assert!(platform
        .store
        .submissions_for_assignment(&faculty, "a1")
        .is_empty());
    assert_eq!(platform.store.submissions_for_assignment(&ada, "a1").len(), 1);
    assert_eq!(platform.store.submissions_for_assignment(&ben, "a1").len(), 1);
}

/// Five failures lock the account, the window rolls from the latest
/// failure, and only a successful login clears the count.
#[tokio::test]
async fn test_lockout_window_rolls_until_a_success() {
    let window = Duration::from_millis(100);
    let (platform, _temp) = create_platform_with_lockout(5, window);
    signup(&platform, "ada@lyceum.edu", Role::Student).await;
    platform.sessions.logout().unwrap();

    for _ in 0..4 {
        let err = platform
            .sessions
            .login("ada@lyceum.edu", "Wr0ng!pass")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // The failure that reaches the threshold already reports the lock.
    let err = platform
        .sessions
        .login("ada@lyceum.edu", "Wr0ng!pass")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Locked { .. }));

    // Correct credentials bounce off the gate while the window holds.
    let err = platform
        .sessions
        .login("ada@lyceum.edu", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Locked { .. }));

    // After the window expires the count is still six strong, so one
    // more failure relocks immediately.
    tokio::time::sleep(window + Duration::from_millis(50)).await;
    let err = platform
        .sessions
        .login("ada@lyceum.edu", "Wr0ng!pass")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Locked { .. }));
    assert_eq!(platform.limiter.failure_count("ada@lyceum.edu"), 6);

    // Once unlocked, a success resets everything.
    tokio::time::sleep(window + Duration::from_millis(50)).await;
    platform
        .sessions
        .login("ada@lyceum.edu", PASSWORD)
        .await
        .unwrap();
    assert_eq!(platform.limiter.failure_count("ada@lyceum.edu"), 0);
}

/// Capsule content stays sealed until the unlock date; force release is
/// session-local and never rewrites the stored date.
#[tokio::test]
async fn test_capsule_time_lock_and_force_release() {
    let (platform, _temp) = create_platform();
    let ada = signup(&platform, "ada@lyceum.edu", Role::Student).await;
    let ben = signup(&platform, "ben@lyceum.edu", Role::Student).await;

    let unlock = Utc::now() + ChronoDuration::days(30);
    platform.store.upsert(&ada, capsule("c1", unlock)).unwrap();

    // Ben reads the shared mirror through the gate: metadata only.
    let gate = VisibilityGate::new();
    let fetched = platform.store.get_by_id::<Capsule>(&ben, "c1").unwrap();
    let sealed = gate.capsule_view(&fetched);
    assert!(!sealed.released);
    assert_eq!(sealed.description, "public abstract");
    assert!(sealed.notes.is_none());
    assert!(sealed.media_files.is_none());

    gate.force_release("c1");
    let unsealed = gate.capsule_view(&fetched);
    assert!(unsealed.released);
    assert_eq!(unsealed.notes.as_deref(), Some("the embargoed findings"));

    // The stored record is untouched; the next session seals it again.
    let stored = platform.store.get_by_id::<Capsule>(&ben, "c1").unwrap();
    assert_eq!(stored.unlock_date, unlock);
    assert!(!VisibilityGate::new().capsule_view(&stored).released);
}

/// Identical bytes under a new name are flagged against the persisted
/// fingerprint history, across principals and engine restarts.
#[tokio::test]
async fn test_duplicate_upload_detected_across_principals() {
    let (platform, _temp) = create_platform();

    let original = UploadedFile {
        file_name: "ada_essay.txt".to_string(),
        mime_type: "text/plain".to_string(),
        bytes: b"an entirely original argument".to_vec(),
    };
    let report = platform.engine.check_files(&[original]);
    assert_eq!(report.duplicates_found, 0);

    // A different principal uploads the same bytes under a new name.
    let copied = UploadedFile {
        file_name: "ben_essay.txt".to_string(),
        mime_type: "text/plain".to_string(),
        bytes: b"an entirely original argument".to_vec(),
    };
    let report = SimilarityEngine::new(platform.vault.clone()).check_files(&[copied]);
    assert_eq!(report.duplicates_found, 1);
    assert_eq!(
        report.findings[0].matched_file.as_deref(),
        Some("ada_essay.txt")
    );

    // The history itself is a durable vault entry.
    assert!(platform
        .vault
        .get(FINGERPRINT_HISTORY_KEY)
        .unwrap()
        .is_some());
}

/// Submission text is compared against prior attempts on the same
/// assignment; half-overlapping token sets score fifty.
#[tokio::test]
async fn test_submission_text_compared_against_prior_attempts() {
    let (platform, _temp) = create_platform();
    let faculty = signup(&platform, "prof@lyceum.edu", Role::Faculty).await;
    let ada = signup(&platform, "ada@lyceum.edu", Role::Student).await;

    let a1 = assignment("a1", true, Utc::now() + ChronoDuration::days(1));
    platform.store.upsert(&faculty, a1.clone()).unwrap();
    platform
        .store
        .upsert(
            &ada,
            Submission::new(
                &a1,
                "ada@lyceum.edu",
                "the quick brown fox jumps".into(),
                Vec::new(),
                Utc::now(),
            ),
        )
        .unwrap();

    let prior = platform.store.submissions_for_assignment(&faculty, "a1");
    let matches = compare_against_prior("the quick brown fox leaps", &prior);

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].score, 50);
    assert_eq!(matches[0].student_email, "ada@lyceum.edu");
}

/// The staged verifier confirms an intact capsule and catches a
/// tampered mirror.
#[tokio::test]
async fn test_capsule_verification_end_to_end() {
    let (platform, _temp) = create_platform();
    let ada = signup(&platform, "ada@lyceum.edu", Role::Student).await;

    platform
        .store
        .upsert(&ada, capsule("c1", Utc::now() + ChronoDuration::days(30)))
        .unwrap();

    let handle = spawn_verification(
        platform.store.clone(),
        ada.clone(),
        "c1".to_string(),
        StageSchedule::instant(),
    );
    match handle.wait().await {
        VerifyProgress::Complete { report } => {
            assert!(report.registered);
            assert!(report.mirrored);
            assert!(report.content_hash.is_some());
        }
        other => panic!("expected completion, got {:?}", other),
    }

    // Doctor the shared mirror behind the store's back.
    let mut tampered = capsule("c1", Utc::now() + ChronoDuration::days(30));
    tampered.notes = "doctored".to_string();
    platform
        .vault
        .put(
            "shared_academicDocuments",
            &serde_json::to_string(&vec![tampered]).unwrap(),
        )
        .unwrap();

    let handle = spawn_verification(
        platform.store.clone(),
        ada,
        "c1".to_string(),
        StageSchedule::instant(),
    );
    match handle.wait().await {
        VerifyProgress::Complete { report } => {
            assert!(report.registered);
            assert!(!report.mirrored);
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

/// A relaunch over the same data directory restores the session and
/// reads back every record written before the shutdown.
#[tokio::test]
async fn test_relaunch_restores_session_and_records() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("vault.sled");
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        simulate_latency: false,
        ..Config::default()
    };

    let expected_email;
    {
        let vault = Arc::new(Vault::open(&db_path).unwrap());
        let limiter = Arc::new(LoginRateLimiter::new(5, Duration::from_secs(900)));
        let sessions = SessionManager::new(vault.clone(), limiter, &config);
        let store = RecordStore::new(vault.clone());

        let ada = sessions
            .signup("ada@lyceum.edu", PASSWORD, "Ada", Role::Student)
            .await
            .unwrap();
        expected_email = ada.principal.email.clone();
        store
            .upsert(&ada, capsule("c1", Utc::now() + ChronoDuration::days(30)))
            .unwrap();
        vault.flush().unwrap();
    }

    // Everything above is dropped; reopen the same files.
    let vault = Arc::new(Vault::open(&db_path).unwrap());
    let limiter = Arc::new(LoginRateLimiter::new(5, Duration::from_secs(900)));
    let sessions = SessionManager::new(vault.clone(), limiter, &config);
    let store = RecordStore::new(vault);

    let restored = sessions.restore_session().unwrap();
    assert_eq!(restored.principal.email, expected_email);

    let capsules = store.list_all::<Capsule>(&restored);
    assert_eq!(capsules.len(), 1);
    assert_eq!(capsules[0].id, "c1");
}
