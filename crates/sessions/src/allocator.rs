//! Monotonic session id allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::id::SessionId;

/// Hands out session ids from an atomic counter.
///
/// Clones share the counter.  Each exchange runtime can own its own
/// allocator; [`SessionAllocator::global`] is the process-wide one used by
/// the free registry functions.
#[derive(Debug, Clone, Default)]
pub struct SessionAllocator {
    /// Last allocated value.  Zero is never handed out.
    last: Arc<AtomicU64>,
}

impl SessionAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide allocator.
    pub fn global() -> SessionAllocator {
        static GLOBAL: OnceLock<SessionAllocator> = OnceLock::new();
        GLOBAL.get_or_init(SessionAllocator::new).clone()
    }

    /// Reserve the next id.  Lock-free and infallible.
    pub fn allocate(&self) -> SessionId {
        loop {
            let raw = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            // Only reachable after 2^64 allocations.
            if raw != 0 {
                return SessionId::from_raw(raw);
            }
        }
    }

    /// The most recently allocated id, or the zero id before the first
    /// allocation.
    pub fn last_allocated(&self) -> SessionId {
        SessionId::from_raw(self.last.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn starts_at_one() {
        let alloc = SessionAllocator::new();
        assert!(alloc.last_allocated().is_zero());
        let id = alloc.allocate();
        assert_eq!(id.as_u64(), 1);
        assert!(!id.is_zero());
    }

    #[test]
    fn strictly_increasing() {
        let alloc = SessionAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert!(a < b && b < c);
        assert_eq!(alloc.last_allocated(), c);
    }

    #[test]
    fn clones_share_counter() {
        let alloc = SessionAllocator::new();
        let other = alloc.clone();
        alloc.allocate();
        assert_eq!(other.allocate().as_u64(), 2);
    }

    #[test]
    fn independent_allocators_do_not_interfere() {
        let a = SessionAllocator::new();
        let b = SessionAllocator::new();
        a.allocate();
        a.allocate();
        assert_eq!(b.allocate().as_u64(), 1);
    }

    #[test]
    fn seventh_allocation_renders_session_7() {
        let alloc = SessionAllocator::new();
        let id = (0..7).map(|_| alloc.allocate()).last().unwrap();
        assert_eq!(id.to_string(), "session-7");
    }

    #[test]
    fn concurrent_allocations_are_unique() {
        let alloc = SessionAllocator::new();
        let ids: Vec<SessionId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let alloc = alloc.clone();
                    s.spawn(move || (0..1000).map(|_| alloc.allocate()).collect::<Vec<_>>())
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 8000);
        assert!(ids.iter().all(|id| !id.is_zero()));
        assert_eq!(alloc.last_allocated().as_u64(), 8000);
    }

    #[test]
    fn global_is_shared() {
        let before = SessionAllocator::global().allocate();
        let after = SessionAllocator::global().allocate();
        assert!(after > before);
    }
}
