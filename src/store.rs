//! Expiring transient storage with an injected clock.
//!
//! The insecure-mode flag, one-time action tokens, and cached dashboard data
//! all live here as named entries with a TTL-derived expiry. The clock is a
//! trait so tests can advance time without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Transient key holding the insecure-mode flag.
pub const INSECURE_MODE_KEY: &str = "tls_advisor_insecure";

/// How long insecure mode stays active once enabled.
pub const INSECURE_MODE_TTL_SECS: i64 = 60 * 3;

/// Transient key for the cached dashboard report, cleared as a best-effort
/// side effect when insecure mode is enabled so the next render re-probes.
pub const DASHBOARD_CACHE_KEY: &str = "tls_advisor_dashboard_cache";

/// How long an issued action token stays redeemable.
pub const NONCE_TTL_SECS: i64 = 60 * 15;

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Shared key-value store where every entry carries an expiry.
///
/// Expiry is lazy: an expired entry is dropped the next time it is read, and
/// is never returned past its TTL.
pub struct TransientStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl TransientStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store `value` under `key` for `ttl_secs` seconds.
    pub fn set(&self, key: &str, value: &str, ttl_secs: i64) {
        let expires_at = self.clock.now() + Duration::seconds(ttl_secs);
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    /// Read a live entry; expired entries are removed and read as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Expiry of a live entry, or `None` if absent or already expired.
    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at)
    }

    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for TransientStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

/// Turn on insecure mode for `ttl_secs` seconds.
pub fn enable_insecure_mode(store: &TransientStore, ttl_secs: i64) {
    log::warn!(
        "insecure mode enabled: certificate verification disabled for the next {}s",
        ttl_secs
    );
    store.set(INSECURE_MODE_KEY, "1", ttl_secs);
}

/// Whether insecure mode is currently active.
pub fn insecure_mode_active(store: &TransientStore) -> bool {
    store.get(INSECURE_MODE_KEY).is_some()
}

/// When the active insecure-mode window closes, if one is open.
pub fn insecure_mode_expires_at(store: &TransientStore) -> Option<DateTime<Utc>> {
    store.expires_at(INSECURE_MODE_KEY)
}

/// Issue a one-time token scoped to `action`. Re-issuing replaces any token
/// previously outstanding for the same action.
pub fn issue_nonce(store: &TransientStore, action: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes[..]);
    let token: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    store.set(&nonce_key(action), &token, NONCE_TTL_SECS);
    token
}

/// Redeem a token for `action`. Valid tokens are single-use: a successful
/// verification consumes them.
pub fn verify_nonce(store: &TransientStore, action: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let key = nonce_key(action);
    match store.get(&key) {
        Some(expected) if expected == token => {
            store.delete(&key);
            true
        }
        _ => false,
    }
}

fn nonce_key(action: &str) -> String {
    format!("tls_advisor_nonce_{}", action)
}

#[cfg(test)]
pub(crate) mod test_clock {
    use super::*;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn starting_at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn advance(&self, seconds: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
