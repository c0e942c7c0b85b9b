//! Per-(account, profile) serialization of profile commands
//!
//! Every command is a read-modify-write of one JSON file. Two commands for
//! the same pair must not interleave or one of them loses its update, so each
//! pair gets its own async mutex:
//! - Lock lookup and creation on first use
//! - Last-use tracking for every entry
//! - Eviction of entries nobody has used for a while and nobody holds
//!
//! Commands for different pairs never contend.

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Identifies one profile document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileKey {
    pub account_id: String,
    pub profile_id: String,
}

impl ProfileKey {
    pub fn new(account_id: &str, profile_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            profile_id: profile_id.to_string(),
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.profile_id)
    }
}

#[derive(Debug)]
struct LockEntry {
    lock: Arc<Mutex<()>>,
    /// Last time a command asked for this lock
    last_used: Instant,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            last_used: Instant::now(),
        }
    }

    fn is_idle(&self, max_idle: Duration) -> bool {
        self.last_used.elapsed() > max_idle
    }

    /// A clone of the Arc lives in every waiter and every held guard.
    fn is_in_use(&self) -> bool {
        Arc::strong_count(&self.lock) > 1
    }
}

/// Table of per-profile locks
///
/// Not synchronized itself: the service keeps it behind a
/// `tokio::sync::Mutex` and only holds that briefly to look up an entry,
/// then awaits the per-profile lock outside of it.
#[derive(Debug)]
pub struct ProfileLocks {
    entries: HashMap<ProfileKey, LockEntry>,
    max_idle: Duration,
}

impl ProfileLocks {
    pub fn new(max_idle: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_idle,
        }
    }

    /// Returns the lock for `key`, creating it on first use
    pub fn lock_for(&mut self, key: &ProfileKey) -> Arc<Mutex<()>> {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(LockEntry::new);
        entry.last_used = Instant::now();
        Arc::clone(&entry.lock)
    }

    /// Drops entries that are idle and not held or awaited by anyone.
    /// Returns the evicted keys.
    pub fn evict_idle(&mut self) -> Vec<ProfileKey> {
        let max_idle = self.max_idle;
        let evicted: Vec<ProfileKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_idle(max_idle) && !entry.is_in_use())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &evicted {
            self.entries.remove(key);
            debug!("Evicted idle profile lock {}", key);
        }

        evicted
    }

    pub fn contains(&self, key: &ProfileKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
