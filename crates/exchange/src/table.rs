//! Per-session bookkeeping kept by the local exchange.
//!
//! Entries are keyed by [`SessionId`] and hold the session's owning scope.
//! They are removed when that scope ends (by the watcher task the exchange
//! spawns, or lazily by [`SessionTable::prune_ended`]) and all at once when
//! the exchange closes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use bx_sessions::{Scope, SessionId};

/// Counters for one session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub blocks_fetched: u64,
    pub blocks_missed: u64,
}

struct Entry {
    stats: SessionStats,
    scope: Scope,
}

#[derive(Default)]
pub(crate) struct SessionTable {
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl SessionTable {
    /// Start tracking a session.  Returns false if it was already tracked.
    pub(crate) fn open(&self, id: SessionId, scope: &Scope) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(
            id,
            Entry {
                stats: SessionStats {
                    id,
                    created_at: Utc::now(),
                    blocks_fetched: 0,
                    blocks_missed: 0,
                },
                scope: scope.clone(),
            },
        );
        true
    }

    pub(crate) fn record_fetch(&self, id: SessionId) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.stats.blocks_fetched += 1;
        }
    }

    pub(crate) fn record_miss(&self, id: SessionId, count: u64) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.stats.blocks_missed += count;
        }
    }

    pub(crate) fn get(&self, id: SessionId) -> Option<SessionStats> {
        self.entries.lock().get(&id).map(|e| e.stats.clone())
    }

    pub(crate) fn remove(&self, id: SessionId) -> Option<SessionStats> {
        self.entries.lock().remove(&id).map(|e| e.stats)
    }

    pub(crate) fn drain(&self) -> Vec<SessionStats> {
        self.entries.lock().drain().map(|(_, e)| e.stats).collect()
    }

    /// Drop entries whose owning scope has ended.  Returns them with the
    /// reason each one ended.
    pub(crate) fn prune_ended(&self) -> Vec<(SessionStats, String)> {
        let mut entries = self.entries.lock();
        let ended: Vec<SessionId> = entries
            .iter()
            .filter(|(_, e)| e.scope.is_done())
            .map(|(id, _)| *id)
            .collect();
        ended
            .into_iter()
            .filter_map(|id| {
                let entry = entries.remove(&id)?;
                let reason = entry
                    .scope
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                Some((entry.stats, reason))
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bx_sessions::{SessionAllocator, SessionRegistry};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SessionAllocator::new())
    }

    #[test]
    fn open_is_idempotent() {
        let table = SessionTable::default();
        let (id, scope) = registry().get_or_create_session(&Scope::new());
        assert!(table.open(id, &scope));
        assert!(!table.open(id, &scope));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn counters_accumulate() {
        let table = SessionTable::default();
        let (id, scope) = registry().get_or_create_session(&Scope::new());
        table.open(id, &scope);
        table.record_fetch(id);
        table.record_fetch(id);
        table.record_miss(id, 3);
        let stats = table.get(id).unwrap();
        assert_eq!(stats.blocks_fetched, 2);
        assert_eq!(stats.blocks_missed, 3);
    }

    #[test]
    fn prune_removes_only_ended_sessions() {
        let table = SessionTable::default();
        let reg = registry();
        let (live_id, live) = reg.get_or_create_session(&Scope::new());
        let (dead_id, dead) = reg.get_or_create_session(&Scope::new());
        table.open(live_id, &live);
        table.open(dead_id, &dead);

        dead.cancel();
        let pruned = table.prune_ended();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].0.id, dead_id);
        assert_eq!(pruned[0].1, "canceled");
        assert!(table.get(live_id).is_some());
    }

    #[test]
    fn recording_unknown_session_is_ignored() {
        let table = SessionTable::default();
        table.record_fetch(SessionId::default());
        assert_eq!(table.len(), 0);
    }
}
