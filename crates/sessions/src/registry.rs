//! Attaching sessions to scopes.
//!
//! Creating a session derives a new scope that owns it.  Every scope derived
//! from that one resolves to the same binding, and the binding always
//! reports the owning scope, so a caller that looks the session up through a
//! short-lived child (say, one with a per-call deadline) still learns which
//! scope's cancellation ends the session.
//!
//! The derived session scope is recorded in a once-cell on the scope it was
//! derived from.  Concurrent first-time calls on the same scope therefore
//! allocate exactly one id and all receive the same session scope.  Scopes
//! that are merely siblings (derived from a common, session-less parent)
//! are separate ancestries and each get their own session.

use bx_domain::trace::TraceEvent;

use crate::allocator::SessionAllocator;
use crate::id::SessionId;
use crate::scope::Scope;

/// Creates and resolves session bindings, drawing ids from one allocator.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    allocator: SessionAllocator,
}

impl SessionRegistry {
    pub fn new(allocator: SessionAllocator) -> Self {
        Self { allocator }
    }

    /// A registry backed by the process-wide allocator.
    pub fn global() -> Self {
        Self::new(SessionAllocator::global())
    }

    pub fn allocator(&self) -> &SessionAllocator {
        &self.allocator
    }

    /// Make sure `scope` has a session.
    ///
    /// Returns `scope` itself when it (or an ancestor) already carries one.
    /// Otherwise returns the derived scope owning a new session; use that
    /// scope downstream.  Calling this again on the same `scope` returns the
    /// same session scope without allocating.
    /// That holds even after the session scope has been canceled; see
    /// [`get_or_create_session`](Self::get_or_create_session).
    pub fn ensure_session(&self, scope: &Scope) -> Scope {
        if scope.session().is_some() {
            return scope.clone();
        }
        self.create_session(scope).1
    }

    /// The session visible from `scope`, created if there is none.
    ///
    /// The returned scope is the one the session was created with, which is
    /// not `scope` when `scope` was derived from it.  The session should be
    /// stopped when that returned scope is canceled.
    ///
    /// The session derived from a scope is fixed for that scope's lifetime.
    /// If the returned session scope is canceled directly while `scope`
    /// stays live, later calls on `scope` still return the same, ended
    /// session.  Derive a fresh child of `scope` to start a new one.
    pub fn get_or_create_session(&self, scope: &Scope) -> (SessionId, Scope) {
        if let Some(binding) = scope.session() {
            return (binding.id, binding.scope);
        }
        self.create_session(scope)
    }

    fn create_session(&self, scope: &Scope) -> (SessionId, Scope) {
        let session_scope = scope.derived_session().get_or_init(|| {
            let id = self.allocator.allocate();
            TraceEvent::SessionCreated {
                session_id: id.to_string(),
            }
            .emit();
            scope.derive_session_scope(id)
        });
        // The derived scope is always an owner, so the default is never used.
        let id = session_scope.session_id().unwrap_or_default();
        (id, session_scope.clone())
    }
}

/// [`SessionRegistry::ensure_session`] against the process-wide allocator.
pub fn ensure_session(scope: &Scope) -> Scope {
    SessionRegistry::global().ensure_session(scope)
}

/// [`SessionRegistry::get_or_create_session`] against the process-wide
/// allocator.
pub fn get_or_create_session(scope: &Scope) -> (SessionId, Scope) {
    SessionRegistry::global().get_or_create_session(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SessionAllocator::new())
    }

    #[test]
    fn session_scope_walkthrough() {
        let reg = registry();
        let s0 = Scope::new();

        let (id, s1) = reg.get_or_create_session(&s0);
        assert_eq!(id.as_u64(), 1);
        assert!(!s1.ptr_eq(&s0));

        let (again, s1_again) = reg.get_or_create_session(&s1);
        assert_eq!(again, id);
        assert!(s1_again.ptr_eq(&s1));

        let s2 = s1.with_timeout(Duration::from_secs(30));
        let (through_child, owner) = reg.get_or_create_session(&s2);
        assert_eq!(through_child, id);
        assert!(owner.ptr_eq(&s1));
        assert!(!owner.ptr_eq(&s2));

        assert_eq!(reg.allocator().last_allocated().as_u64(), 1);
    }

    #[test]
    fn ensure_twice_yields_same_session() {
        let reg = registry();
        let root = Scope::new();

        let a = reg.ensure_session(&root);
        let b = reg.ensure_session(&root);
        assert_eq!(a.session_id(), b.session_id());
        assert!(a.ptr_eq(&b));
        assert_eq!(reg.allocator().last_allocated().as_u64(), 1);
    }

    #[test]
    fn ensure_on_bound_scope_returns_it_unchanged() {
        let reg = registry();
        let bound = reg.ensure_session(&Scope::new());
        let child = bound.child();
        assert!(reg.ensure_session(&child).ptr_eq(&child));
        assert!(reg.ensure_session(&bound).ptr_eq(&bound));
    }

    #[test]
    fn session_scope_keeps_parent_values_and_cancellation() {
        let reg = registry();
        let root = Scope::new().with_value(String::from("tenant-a"));
        let (_, session) = reg.get_or_create_session(&root);
        assert_eq!(session.value::<String>().as_deref().map(String::as_str), Some("tenant-a"));

        root.cancel();
        assert!(session.is_done());
    }

    #[test]
    fn canceling_session_scope_leaves_parent_alive() {
        let reg = registry();
        let root = Scope::new();
        let (_, session) = reg.get_or_create_session(&root);
        session.cancel();
        assert!(!root.is_done());
        // The binding is still resolvable; it has simply ended.
        assert!(reg.get_or_create_session(&root).1.is_done());
    }

    #[test]
    fn fresh_child_of_live_parent_gets_new_session() {
        let reg = registry();
        let root = Scope::new();
        let (first, session) = reg.get_or_create_session(&root);
        session.cancel();

        let (same, ended) = reg.get_or_create_session(&root);
        assert_eq!(same, first);
        assert!(ended.is_done());

        let (fresh, live) = reg.get_or_create_session(&root.child());
        assert_ne!(fresh, first);
        assert!(!live.is_done());
    }

    #[test]
    fn siblings_get_distinct_sessions() {
        let reg = registry();
        let root = Scope::new();
        let (a, _) = reg.get_or_create_session(&root.child());
        let (b, _) = reg.get_or_create_session(&root.child());
        assert_ne!(a, b);
    }

    #[test]
    fn concurrent_first_calls_allocate_once() {
        let reg = registry();
        let root = Scope::new();

        let ids: Vec<SessionId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| reg.get_or_create_session(&root).0))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(reg.allocator().last_allocated().as_u64(), 1);
    }

    #[test]
    fn concurrent_siblings_never_share() {
        let reg = registry();
        let root = Scope::new();
        let siblings: Vec<Scope> = (0..8).map(|_| root.child()).collect();

        // Two racers per sibling.
        let results: Vec<(usize, SessionId)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let sibling = &siblings[i % 8];
                    let reg = &reg;
                    s.spawn(move || (i % 8, reg.get_or_create_session(sibling).0))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for idx in 0..8 {
            let per_sibling: HashSet<_> = results
                .iter()
                .filter(|(i, _)| *i == idx)
                .map(|(_, id)| *id)
                .collect();
            assert_eq!(per_sibling.len(), 1);
        }
        let unique: HashSet<_> = results.iter().map(|(_, id)| *id).collect();
        assert_eq!(unique.len(), 8);
        assert_eq!(reg.allocator().last_allocated().as_u64(), 8);
    }

    #[test]
    fn free_functions_use_global_allocator() {
        let root = Scope::new();
        let (id, session) = get_or_create_session(&root);
        assert!(!id.is_zero());
        assert!(ensure_session(&root).ptr_eq(&session));
        assert!(SessionAllocator::global().last_allocated() >= id);
    }
}
