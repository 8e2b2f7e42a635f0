//! Session and identity management
//!
//! Owns the principal registry, signup/login flows, and the two session
//! pointer keys in the vault. Every other component receives the active
//! [`Session`] as an argument; nothing here is process-global, so tests
//! can run several managers against separate vaults side by side.
//!
//! Credential digests are salted SHA-256. That is enough for a demo
//! platform that never leaves one machine; it is not a password KDF.

use crate::config::Config;
use crate::error::{AuthError, StoreError};
use crate::rate_limit::{Gate, LoginRateLimiter};
use crate::vault::Vault;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Vault key holding the active namespace prefix
pub const SESSION_NAMESPACE_KEY: &str = "currentSessionNamespace";
/// Vault key holding the active principal, credential fields stripped
pub const SESSION_PRINCIPAL_KEY: &str = "currentSessionPrincipal";
/// Vault key holding the signup registry
pub const PRINCIPAL_REGISTRY_KEY: &str = "registeredPrincipals";
/// Prefix of the cross-principal mirror namespace
pub const SHARED_NAMESPACE: &str = "shared_";

/// Simulated network round-trip on signup and login
const AUTH_LATENCY: Duration = Duration::from_millis(800);

/// Owner namespace prefix for a principal
pub fn namespace_for(principal_id: &str) -> String {
    format!("user_{}_", principal_id)
}

/// Platform role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Librarian,
}

impl Role {
    /// Faculty and admin hold the staff surfaces: assignment management
    /// and shared submission review.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Faculty | Role::Admin)
    }
}

/// A registered identity, as exposed to the rest of the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Registry entry: principal plus credential digest. Never leaves this
/// module; [`SESSION_PRINCIPAL_KEY`] stores the bare [`Principal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPrincipal {
    #[serde(flatten)]
    principal: Principal,
    password_digest: String,
    salt: String,
}

/// An authenticated session: the active principal and its namespace prefix
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub namespace: String,
}

/// Signup, login, and session restoration over a shared vault
pub struct SessionManager {
    vault: Arc<Vault>,
    limiter: Arc<LoginRateLimiter>,
    auth_latency: Duration,
}

impl SessionManager {
    pub fn new(vault: Arc<Vault>, limiter: Arc<LoginRateLimiter>, config: &Config) -> Self {
        let auth_latency = if config.simulate_latency {
            AUTH_LATENCY
        } else {
            Duration::ZERO
        };
        Self {
            vault,
            limiter,
            auth_latency,
        }
    }

    /// Register a new principal and establish its session.
    ///
    /// The password policy is checked before any storage touch. Emails are
    /// unique case-insensitively. A fresh principal gets empty owner
    /// collections so later reads distinguish "new account" from "missing
    /// key" only by both being empty.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Session, AuthError> {
        self.simulate_latency().await;
        validate_password(password)?;

        let email = normalize_email(email);
        let mut registry = self.load_registry();
        if registry.iter().any(|stored| stored.principal.email == email) {
            return Err(AuthError::DuplicateEmail(email));
        }

        let salt = Uuid::new_v4().simple().to_string();
        let principal = Principal {
            id: Uuid::new_v4().to_string(),
            email,
            role,
            display_name: display_name.trim().to_string(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        registry.push(StoredPrincipal {
            principal: principal.clone(),
            password_digest: credential_digest(password, &salt),
            salt,
        });
        self.save_registry(&registry)?;
        self.provision_namespace(&principal.id)?;

        let session = self.establish(principal)?;
        info!(
            principal = %session.principal.email,
            role = ?session.principal.role,
            "Signed up new principal"
        );
        Ok(session)
    }

    /// Authenticate an existing principal.
    ///
    /// The limiter is consulted before the credential check, so a locked
    /// account fails fast without touching the registry. A failed check
    /// increments the counter; the failure that reaches the threshold
    /// already reports [`AuthError::Locked`] rather than a generic
    /// credential error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.simulate_latency().await;

        let email = normalize_email(email);
        if let Gate::Locked { retry_after } = self.limiter.check(&email) {
            warn!(email = %email, ?retry_after, "Login rejected while locked");
            return Err(AuthError::Locked { retry_after });
        }

        let mut registry = self.load_registry();
        let matched = registry.iter().position(|stored| {
            stored.principal.email == email
                && stored.password_digest == credential_digest(password, &stored.salt)
        });
        let index = match matched {
            Some(index) => index,
            None => {
                let failures = self.limiter.record_failure(&email);
                if failures >= self.limiter.threshold() {
                    warn!(email = %email, failures, "Account locked after repeated failures");
                    return Err(AuthError::Locked {
                        retry_after: self.limiter.window(),
                    });
                }
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.limiter.reset(&email);
        registry[index].principal.last_login_at = Some(Utc::now());
        let principal = registry[index].principal.clone();
        self.save_registry(&registry)?;

        let session = self.establish(principal)?;
        info!(
            principal = %session.principal.email,
            namespace = %session.namespace,
            "Login succeeded"
        );
        Ok(session)
    }

    /// Drop the persisted session pointers. Owner collections stay put.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.vault.delete(SESSION_PRINCIPAL_KEY)?;
        self.vault.delete(SESSION_NAMESPACE_KEY)?;
        info!("Session ended");
        Ok(())
    }

    /// Rehydrate the session persisted by the last login, if any.
    ///
    /// An unreadable pointer is treated as logged out and cleared, so one
    /// corrupt value cannot wedge every later launch.
    pub fn restore_session(&self) -> Option<Session> {
        let raw = match self.vault.get(SESSION_PRINCIPAL_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                return None;
            }
        };
        match serde_json::from_str::<Principal>(&raw) {
            Ok(principal) => {
                let namespace = namespace_for(&principal.id);
                if let Err(e) = self.vault.put(SESSION_NAMESPACE_KEY, &namespace) {
                    warn!(error = %e, "Could not refresh namespace pointer");
                }
                debug!(principal = %principal.email, "Restored session");
                Some(Session {
                    principal,
                    namespace,
                })
            }
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, clearing");
                let _ = self.vault.delete(SESSION_PRINCIPAL_KEY);
                let _ = self.vault.delete(SESSION_NAMESPACE_KEY);
                None
            }
        }
    }

    /// Number of registered principals
    pub fn registered_count(&self) -> usize {
        self.load_registry().len()
    }

    fn establish(&self, principal: Principal) -> Result<Session, StoreError> {
        let namespace = namespace_for(&principal.id);
        self.vault.put(SESSION_NAMESPACE_KEY, &namespace)?;
        self.vault
            .put(SESSION_PRINCIPAL_KEY, &serde_json::to_string(&principal)?)?;
        Ok(Session {
            principal,
            namespace,
        })
    }

    fn provision_namespace(&self, principal_id: &str) -> Result<(), StoreError> {
        let namespace = namespace_for(principal_id);
        for collection in crate::records::COLLECTION_NAMES {
            self.vault
                .put(&format!("{}{}", namespace, collection), "[]")?;
        }
        Ok(())
    }

    fn load_registry(&self) -> Vec<StoredPrincipal> {
        let raw = match self.vault.get(PRINCIPAL_REGISTRY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Principal registry unreadable, treating as empty");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Principal registry malformed, treating as empty");
            Vec::new()
        })
    }

    fn save_registry(&self, registry: &[StoredPrincipal]) -> Result<(), StoreError> {
        self.vault
            .put(PRINCIPAL_REGISTRY_KEY, &serde_json::to_string(registry)?)
    }

    async fn simulate_latency(&self) {
        if !self.auth_latency.is_zero() {
            tokio::time::sleep(self.auth_latency).await;
        }
    }
}

/// Password policy: at least 8 characters with an uppercase letter, a
/// lowercase letter, a digit, and a symbol.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let mut missing = Vec::new();
    if password.chars().count() < 8 {
        missing.push("at least 8 characters");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        missing.push("an uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        missing.push("a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit");
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        missing.push("a symbol");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(missing.join(", ")))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn credential_digest(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
