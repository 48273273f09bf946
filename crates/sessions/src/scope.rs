//! Execution scopes.
//!
//! A [`Scope`] is passed through every exchange call.  It carries:
//! - a cancellation signal (a [`CancellationToken`]; deriving a scope
//!   creates a child token, so canceling a scope cancels its descendants),
//! - an optional deadline (the earliest one along the ancestry),
//! - typed values, visible from every descendant,
//! - the session binding, if one has been attached.
//!
//! Scopes are immutable and cheap to clone.  Deriving never mutates the
//! parent, with one exception: the registry records the session scope it
//! derives from a scope in that scope's once-cell (see
//! [`SessionRegistry`](crate::SessionRegistry)).
//!
//! Derived scopes do not keep their parent alive.  The only strong link
//! from a descendant to an ancestor is the one to the session scope, and
//! session scopes never point back at their descendants, so no reference
//! cycles form.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use bx_domain::error::Error;

use crate::id::SessionId;

/// A derivable carrier of cancellation, deadline, values and session.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Option<Arc<ValueNode>>,
    session: Option<SessionLink>,
    /// Session scope derived from this scope, set at most once.
    derived_session: OnceLock<Scope>,
}

enum SessionLink {
    /// This scope is the one the session was created with.
    Owner(SessionId),
    /// Derived from a session scope; holds that scope.
    Inherited(Scope),
}

struct ValueNode {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<ValueNode>>,
}

/// A session id together with the scope it was created with.
///
/// `scope` is the long-lived owner of the session: its cancellation ends
/// the session, even when the binding was looked up through a shorter-lived
/// derived scope.
#[derive(Clone, Debug)]
pub struct SessionBinding {
    pub id: SessionId,
    pub scope: Scope,
}

impl Scope {
    /// A root scope with a fresh cancellation token.
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// A root scope canceled together with `token`.
    pub fn from_token(token: CancellationToken) -> Self {
        Self::build(token, None, None, None)
    }

    fn build(
        token: CancellationToken,
        deadline: Option<Instant>,
        values: Option<Arc<ValueNode>>,
        session: Option<SessionLink>,
    ) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token,
                deadline,
                values,
                session,
                derived_session: OnceLock::new(),
            }),
        }
    }

    fn derive(&self, deadline: Option<Instant>, values: Option<Arc<ValueNode>>) -> Self {
        let session = match &self.inner.session {
            None => None,
            Some(SessionLink::Owner(_)) => Some(SessionLink::Inherited(self.clone())),
            Some(SessionLink::Inherited(owner)) => Some(SessionLink::Inherited(owner.clone())),
        };
        Self::build(self.inner.token.child_token(), deadline, values, session)
    }

    /// A child scope: canceled with this one, or on its own.
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline, self.inner.values.clone())
    }

    /// A child scope that also ends at `deadline`.  An earlier inherited
    /// deadline still wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let effective = match self.inner.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        self.derive(Some(effective), self.inner.values.clone())
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child scope carrying `value`, keyed by its type.  Shadows any
    /// value of the same type bound by an ancestor.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let node = ValueNode {
            key: TypeId::of::<T>(),
            value: Arc::new(value),
            parent: self.inner.values.clone(),
        };
        self.derive(self.inner.deadline, Some(Arc::new(node)))
    }

    /// The nearest value of type `T` bound on this scope or an ancestor.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let key = TypeId::of::<T>();
        let mut node = self.inner.values.as_ref();
        while let Some(n) = node {
            if n.key == key {
                return n.value.clone().downcast::<T>().ok();
            }
            node = n.parent.as_ref();
        }
        None
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why the scope ended, or `None` while it is still live.
    pub fn err(&self) -> Option<Error> {
        if self.is_canceled() {
            return Some(Error::Canceled);
        }
        match self.inner.deadline {
            Some(d) if Instant::now() >= d => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// True once `cancel` was called on this scope or an ancestor.  A passed
    /// deadline does not count.
    pub fn is_canceled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the scope is canceled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }

    /// Waits for the scope to end and returns the reason.
    pub async fn done(&self) -> Error {
        self.cancelled().await;
        self.err().unwrap_or(Error::Canceled)
    }

    /// The session bound to this scope or inherited from an ancestor.
    pub fn session(&self) -> Option<SessionBinding> {
        match &self.inner.session {
            None => None,
            Some(SessionLink::Owner(id)) => Some(SessionBinding {
                id: *id,
                scope: self.clone(),
            }),
            Some(SessionLink::Inherited(owner)) => owner.session(),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session().map(|b| b.id)
    }

    /// True if both handles refer to the same scope (not merely equivalent
    /// ones).
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn derived_session(&self) -> &OnceLock<Scope> {
        &self.inner.derived_session
    }

    /// Derive the scope that owns session `id`.
    pub(crate) fn derive_session_scope(&self, id: SessionId) -> Scope {
        Self::build(
            self.inner.token.child_token(),
            self.inner.deadline,
            self.inner.values.clone(),
            Some(SessionLink::Owner(id)),
        )
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("canceled", &self.inner.token.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .field("session", &self.session_id())
            .finish()
    }
}
