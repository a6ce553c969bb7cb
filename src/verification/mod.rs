//! Verification code store.
//!
//! Issues short numeric codes bound to a subject (a phone number), keeps them
//! for a fixed TTL and lets each one validate at most once. Expiry is checked
//! lazily on validation; an optional sweeper reclaims memory for codes that
//! are never validated.

mod code;

pub use code::generate_code;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{VerificationSettings, MAX_TTL_SECS};
use crate::sms::mask_phone_number;

/// A stored code and its validity window
#[derive(Debug, Clone)]
pub struct VerificationEntry {
    pub subject: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Code generation and lifetime parameters
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub code_length: usize,
    pub ttl: chrono::Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: chrono::Duration::minutes(3),
        }
    }
}

impl From<&VerificationSettings> for VerificationConfig {
    fn from(settings: &VerificationSettings) -> Self {
        Self {
            code_length: settings.code_length,
            // bounded by MAX_TTL_SECS, so the cast cannot wrap
            ttl: chrono::Duration::seconds(settings.ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }
}

/// Owner of the subject → code map.
///
/// Every operation takes the lock once and never awaits while holding it, so
/// each read-check-delete sequence is atomic for its subject.
#[derive(Debug, Default)]
pub struct VerificationService {
    config: VerificationConfig,
    entries: Mutex<HashMap<String, VerificationEntry>>,
}

impl VerificationService {
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh code for `subject`, replacing any earlier one.
    pub fn issue(&self, subject: &str) -> String {
        self.issue_at(subject, Utc::now())
    }

    /// Checks `candidate` against the stored code for `subject`.
    ///
    /// A match consumes the entry. An expired entry is removed and reported as
    /// a failure. A mismatch leaves the entry in place for another attempt.
    pub fn validate(&self, subject: &str, candidate: &str) -> bool {
        self.validate_at(subject, candidate, Utc::now())
    }

    /// Removes the entry for `subject` only if it still holds `code`.
    pub fn revoke(&self, subject: &str, code: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(subject) {
            Some(entry) if entry.code == code => {
                entries.remove(subject);
                debug!(subject = %mask_phone_number(subject), "Revoked verification code");
                true
            }
            _ => false,
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Number of entries currently held, expired or not.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Starts a background task that purges expired entries every `interval`.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = service.purge_expired();
                if removed > 0 {
                    info!(removed, "Purged expired verification codes");
                }
            }
        })
    }

    fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> String {
        let code = generate_code(self.config.code_length);
        let entry = VerificationEntry {
            subject: subject.to_string(),
            code: code.clone(),
            issued_at: now,
            expires_at: now
                .checked_add_signed(self.config.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let replaced = self.lock().insert(subject.to_string(), entry).is_some();
        debug!(
            subject = %mask_phone_number(subject),
            replaced,
            "Issued verification code"
        );
        code
    }

    fn validate_at(&self, subject: &str, candidate: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get(subject) else {
            debug!(subject = %mask_phone_number(subject), "No verification code on record");
            return false;
        };

        if entry.is_expired(now) {
            entries.remove(subject);
            debug!(subject = %mask_phone_number(subject), "Verification code expired");
            return false;
        }

        if entry.code == candidate {
            entries.remove(subject);
            return true;
        }

        debug!(subject = %mask_phone_number(subject), "Verification code mismatch");
        false
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VerificationEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
