//! Duplicate suppression for reciprocal pats.
//!
//! `PatGuard` keeps the last accepted pat per contact. The check-and-record step
//! runs under the map entry's shard lock, so two concurrent runs for the same
//! contact cannot both pass the cooldown, while unrelated contacts never block
//! each other on a single global lock.

use std::time::{Duration, Instant};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::store::HistoryRecord;

/// Minimum gap between two accepted pats from the same contact.
pub const DEFAULT_PAT_COOLDOWN: Duration = Duration::from_secs(120);

/// Per-contact cooldown store.
#[derive(Debug)]
pub struct PatGuard {
    cooldown: Duration,
    last_pat: DashMap<String, Instant>,
}

impl PatGuard {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_PAT_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_pat: DashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns true when a pat from `subject` at `now` falls inside the cooldown.
    ///
    /// A suppressed pat leaves the record untouched; an allowed one records `now`.
    pub fn should_suppress(&self, subject: &str, now: Instant) -> bool {
        match self.last_pat.entry(subject.to_string()) {
            Entry::Occupied(mut occupied) => {
                let last = *occupied.get();
                if now.saturating_duration_since(last) < self.cooldown {
                    true
                } else {
                    occupied.insert(now);
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                false
            }
        }
    }

    /// Last accepted pat time for `subject`.
    pub fn last_pat(&self, subject: &str) -> Option<Instant> {
        self.last_pat.get(subject).map(|entry| *entry)
    }

    /// Number of contacts with a recorded pat.
    pub fn tracked(&self) -> usize {
        self.last_pat.len()
    }
}

impl Default for PatGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// A pat has a plausible target only if the contact spoke in the recent window.
pub fn has_recent_message_from(history: &[HistoryRecord], sender: &str) -> bool {
    history.iter().any(|record| record.sender == sender)
}
