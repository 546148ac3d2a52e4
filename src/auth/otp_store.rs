//! In-memory store of pending email login codes.
//!
//! One record per email. Issuing overwrites, a successful verification
//! consumes the record, and expiry is detected lazily when the record is
//! next looked up (or by [`OtpStore::purge_expired`] if a sweep is running).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default lifetime of an issued code.
pub const DEFAULT_CODE_TTL_SECONDS: i64 = 5 * 60;

const CODE_SPACE: u32 = 1_000_000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("no pending code")]
    NotFound,

    #[error("code expired")]
    Expired,

    #[error("code mismatch")]
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
enum Check {
    Expired,
    Mismatch,
    Matched,
}

impl OtpRecord {
    fn new(code: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            code,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    // Expiry wins over a wrong code so stale records are always reaped.
    fn check(&self, submitted: &str, now: DateTime<Utc>) -> Check {
        if self.is_expired_at(now) {
            Check::Expired
        } else if self.code != submitted {
            Check::Mismatch
        } else {
            Check::Matched
        }
    }
}

/// Uniform 6-digit numeric code, zero padded.
pub fn generate_code() -> String {
    let n = rand::thread_rng().gen_range(0..CODE_SPACE);
    format!("{:06}", n)
}

pub struct OtpStore {
    codes: RwLock<HashMap<String, OtpRecord>>,
    ttl: Duration,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_CODE_TTL_SECONDS))
    }
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue_code(&self, email: &str) -> String {
        self.issue_code_at(email, Utc::now()).await
    }

    /// Issues a fresh code for `email`, replacing any pending one.
    pub async fn issue_code_at(&self, email: &str, now: DateTime<Utc>) -> String {
        let code = generate_code();
        let record = OtpRecord::new(code.clone(), now, self.ttl);
        let expires_at = record.expires_at;

        let replaced = {
            let mut codes = self.codes.write().await;
            codes.insert(email.to_string(), record).is_some()
        };

        info!(email, %expires_at, replaced, "Issued login code");
        code
    }

    pub async fn verify_code(&self, email: &str, submitted: &str) -> Result<(), OtpError> {
        self.verify_code_at(email, submitted, Utc::now()).await
    }

    /// Checks `submitted` against the pending code for `email` as of `now`.
    ///
    /// A mismatch leaves the record in place so the user can retry until it
    /// expires. Expired and matched records are removed.
    pub async fn verify_code_at(
        &self,
        email: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let outcome = self.try_verify(email, submitted, now).await;
        match &outcome {
            Ok(()) => info!(email, "Login code verified"),
            Err(e) => info!(email, reason = %e, "Login code rejected"),
        }
        outcome
    }

    async fn try_verify(
        &self,
        email: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        // Outcomes that leave the map untouched only need the shared lock.
        {
            let codes = self.codes.read().await;
            match codes.get(email) {
                None => return Err(OtpError::NotFound),
                Some(record) if record.check(submitted, now) == Check::Mismatch => {
                    return Err(OtpError::Mismatch);
                }
                Some(_) => {}
            }
        }

        // The record may have been replaced or consumed since the read lock
        // was dropped, so evaluate it again under the exclusive lock.
        let mut codes = self.codes.write().await;
        let check = match codes.get(email) {
            None => return Err(OtpError::NotFound),
            Some(record) => record.check(submitted, now),
        };

        match check {
            Check::Mismatch => Err(OtpError::Mismatch),
            Check::Expired => {
                codes.remove(email);
                Err(OtpError::Expired)
            }
            Check::Matched => {
                codes.remove(email);
                Ok(())
            }
        }
    }

    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    /// Drops every record that has expired as of `now`.
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, record| !record.is_expired_at(now));
        let removed = before - codes.len();
        if removed > 0 {
            debug!(removed, "Purged expired login codes");
        }
        removed
    }

    pub async fn pending_count(&self) -> usize {
        self.codes.read().await.len()
    }

    pub async fn is_pending(&self, email: &str) -> bool {
        self.codes.read().await.contains_key(email)
    }
}
