// SPDX-License-Identifier: GPL-3.0-only

//! Keyed in-flight operation tracking
//!
//! A key (disk id or mount target path) is either in the set or not. Insertion
//! is a single atomic check-and-set, so two callers racing on the same key can
//! never both win.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct InFlightTracker {
    keys: Arc<DashSet<String>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key` if absent; `false` means another operation already holds it
    pub fn insert(&self, key: &str) -> bool {
        let inserted = self.keys.insert(key.to_string());
        if !inserted {
            debug!(key, "operation already in flight");
        }
        inserted
    }

    /// Remove `key`; removing an absent key is a no-op
    pub fn delete(&self, key: &str) {
        self.keys.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Insert `key` and hand back a guard that deletes it when dropped
    pub fn try_guard(&self, key: &str) -> Option<InFlightGuard> {
        self.insert(key).then(|| InFlightGuard {
            tracker: self.clone(),
            key: key.to_string(),
        })
    }
}

/// Membership of one key, released on drop
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: InFlightTracker,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.delete(&self.key);
    }
}
