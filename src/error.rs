//! Error types for lyceum-storage

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the vault and the record store.
///
/// Read paths rarely surface these: a missing or unreadable collection
/// degrades to an empty list at the call site. Write paths propagate them
/// so callers can decide whether to log-and-continue or abort.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by signup and login.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account temporarily locked, retry in {retry_after:?}")]
    Locked { retry_after: Duration },

    #[error("An account already exists for {0}")]
    DuplicateEmail(String),

    #[error("Password too weak: needs {0}")]
    WeakPassword(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
