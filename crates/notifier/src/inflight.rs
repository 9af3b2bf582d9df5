//! In-flight registry — at most one dispatch per (alert, recipient) at a time.
//!
//! Held for the whole lifetime of a dispatch, so the notification record it
//! opens has a single writer until every channel send settles. The lock is
//! released when the guard drops, including on early returns and errors.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

type PairKey = (Uuid, Uuid);

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashSet<PairKey>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pair, or `None` if another dispatch already holds it.
    pub fn try_acquire(&self, alert_id: Uuid, recipient_id: Uuid) -> Option<InFlightGuard> {
        let key = (alert_id, recipient_id);
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if !active.insert(key) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }
}

pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<PairKey>>>,
    key: PairKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_blocked_until_release() {
        let registry = InFlightRegistry::new();
        let (alert, recipient) = (Uuid::new_v4(), Uuid::new_v4());

        let guard = registry.try_acquire(alert, recipient).unwrap();
        assert!(registry.try_acquire(alert, recipient).is_none());

        drop(guard);
        assert!(registry.try_acquire(alert, recipient).is_some());
    }

    #[test]
    fn test_pairs_are_independent() {
        let registry = InFlightRegistry::new();
        let alert = Uuid::new_v4();
        let _a = registry.try_acquire(alert, Uuid::new_v4()).unwrap();
        let _b = registry.try_acquire(alert, Uuid::new_v4()).unwrap();
        let _c = registry.try_acquire(Uuid::new_v4(), Uuid::new_v4()).unwrap();
    }
}
