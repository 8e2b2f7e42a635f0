//! Staged capsule verification
//!
//! The platform walks a four-stage integrity check over a capsule: hash
//! the document, look it up in the registry, cross-check the shared
//! mirror, then attest. Stages run strictly in order with fixed pacing
//! (the UI renders them as a ledger animation), and the whole run is
//! owned by a spawned task behind a handle, so a caller can watch
//! progress or cancel mid-flight instead of firing and forgetting.

use crate::records::{Capsule, RecordStore};
use crate::session::Session;
use crate::similarity::content_hash;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The four verification stages, in running order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStage {
    HashDocument,
    RegistryLookup,
    MirrorCrossCheck,
    Attestation,
}

impl VerifyStage {
    pub const ALL: [VerifyStage; 4] = [
        VerifyStage::HashDocument,
        VerifyStage::RegistryLookup,
        VerifyStage::MirrorCrossCheck,
        VerifyStage::Attestation,
    ];
}

/// Per-stage delays, replaying the platform's pacing by default
#[derive(Debug, Clone)]
pub struct StageSchedule {
    pub delays: [Duration; 4],
}

impl Default for StageSchedule {
    fn default() -> Self {
        Self {
            delays: [
                Duration::from_millis(800),
                Duration::from_millis(1200),
                Duration::from_millis(1000),
                Duration::from_millis(1500),
            ],
        }
    }
}

impl StageSchedule {
    /// No pacing; used when latency simulation is off
    pub fn instant() -> Self {
        Self {
            delays: [Duration::ZERO; 4],
        }
    }
}

/// Verification outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub capsule_id: String,
    /// Rolling hash over the canonical capsule payload
    pub content_hash: Option<String>,
    /// Whether the capsule exists anywhere in the caller's view
    pub registered: bool,
    /// Whether the owner copy and shared mirror are content-identical
    pub mirrored: bool,
    pub verified_at: DateTime<Utc>,
}

/// Observable state of a verification run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerifyProgress {
    Idle,
    Running { stage: VerifyStage },
    Complete { report: VerifyReport },
    Cancelled,
}

/// Handle to an in-flight verification run
pub struct VerificationHandle {
    cancel: broadcast::Sender<()>,
    progress: watch::Receiver<VerifyProgress>,
    task: JoinHandle<()>,
}

impl VerificationHandle {
    /// Watch progress transitions
    pub fn subscribe(&self) -> watch::Receiver<VerifyProgress> {
        self.progress.clone()
    }

    /// Request cancellation. The run stops inside the current stage's
    /// pacing delay, before that stage's work applies.
    pub fn cancel(&self) {
        let _ = self.cancel.send(());
    }

    /// Wait for the run to finish and return its final state
    pub async fn wait(self) -> VerifyProgress {
        let VerificationHandle { task, progress, .. } = self;
        let _ = task.await;
        let outcome = progress.borrow().clone();
        outcome
    }
}

/// Start a verification run on a spawned task
pub fn spawn_verification(
    store: Arc<RecordStore>,
    session: Session,
    capsule_id: String,
    schedule: StageSchedule,
) -> VerificationHandle {
    let (progress_tx, progress_rx) = watch::channel(VerifyProgress::Idle);
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);

    let task = tokio::spawn(async move {
        let mut hashed = None;
        let mut registered = false;
        let mut mirrored = false;

        for (stage, delay) in VerifyStage::ALL.into_iter().zip(schedule.delays) {
            let _ = progress_tx.send(VerifyProgress::Running { stage });
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx.recv() => {
                    info!(capsule_id = %capsule_id, ?stage, "Verification cancelled");
                    let _ = progress_tx.send(VerifyProgress::Cancelled);
                    return;
                }
            }

            match stage {
                VerifyStage::HashDocument => {
                    let (owner, shared) = store.copies::<Capsule>(&session, &capsule_id);
                    hashed = owner.as_ref().or(shared.as_ref()).and_then(|capsule| {
                        serde_json::to_string(capsule)
                            .ok()
                            .map(|json| content_hash(json.as_bytes()))
                    });
                }
                VerifyStage::RegistryLookup => {
                    let (owner, shared) = store.copies::<Capsule>(&session, &capsule_id);
                    registered = owner.is_some() || shared.is_some();
                }
                VerifyStage::MirrorCrossCheck => {
                    let (owner, shared) = store.copies::<Capsule>(&session, &capsule_id);
                    mirrored = match (owner, shared) {
                        (Some(owner), Some(shared)) => owner == shared,
                        // Not the author: only the mirror is visible, so
                        // there is nothing to cross-check against.
                        (None, Some(_)) => true,
                        _ => false,
                    };
                }
                VerifyStage::Attestation => {}
            }
        }

        let report = VerifyReport {
            capsule_id: capsule_id.clone(),
            content_hash: hashed,
            registered,
            mirrored,
            verified_at: Utc::now(),
        };
        debug!(
            capsule_id = %report.capsule_id,
            registered = report.registered,
            mirrored = report.mirrored,
            "Verification complete"
        );
        let _ = progress_tx.send(VerifyProgress::Complete { report });
    });

    VerificationHandle {
        cancel: cancel_tx,
        progress: progress_rx,
        task,
    }
}
