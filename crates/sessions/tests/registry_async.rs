//! Registry behaviour across tokio tasks: racing creators on a shared scope,
//! per-call deadlines derived from a session scope, and session lifetime
//! following the owning scope.

use std::sync::Arc;
use std::time::Duration;

use bx_sessions::{Scope, SessionAllocator, SessionRegistry};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_tasks_share_one_session() {
    let reg = Arc::new(SessionRegistry::new(SessionAllocator::new()));
    let root = Scope::new();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let reg = reg.clone();
        let root = root.clone();
        handles.push(tokio::spawn(async move {
            tokio::task::yield_now().await;
            reg.get_or_create_session(&root)
        }));
    }

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }

    let (first_id, first_scope) = &results[0];
    for (id, scope) in &results {
        assert_eq!(id, first_id);
        assert!(scope.ptr_eq(first_scope));
    }
    assert_eq!(reg.allocator().last_allocated(), *first_id);
}

#[tokio::test]
async fn per_call_deadline_does_not_shorten_session() {
    let reg = SessionRegistry::new(SessionAllocator::new());
    let session = reg.ensure_session(&Scope::new());

    let call = session.with_timeout(Duration::from_millis(10));
    let (id, owner) = reg.get_or_create_session(&call);

    call.cancelled().await;
    assert!(call.is_done());
    assert!(!owner.is_done());
    assert_eq!(Some(id), owner.session_id());
}

#[tokio::test]
async fn session_ends_with_owner_scope() {
    let reg = SessionRegistry::new(SessionAllocator::new());
    let root = Scope::new();
    let (_, owner) = reg.get_or_create_session(&root);
    let call = owner.child();

    let watcher = {
        let owner = owner.clone();
        tokio::spawn(async move { owner.done().await })
    };

    root.cancel();
    let reason = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .expect("owner scope should end promptly")
        .unwrap();
    assert!(reason.is_scope_termination());
    assert!(call.is_done());
}
