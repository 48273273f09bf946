use tokio_util::sync::CancellationToken;

use bx_domain::error::{Error, Result};
use bx_sessions::Scope;

/// Everything that can end a fetch: the caller's scope, the session scope
/// (for session fetchers) and the exchange shutdown token.
#[derive(Clone)]
pub(crate) struct FetchGuard {
    call: Scope,
    session: Option<Scope>,
    shutdown: CancellationToken,
}

impl FetchGuard {
    pub(crate) fn new(call: &Scope, session: Option<&Scope>, shutdown: &CancellationToken) -> Self {
        Self {
            call: call.clone(),
            session: session.cloned(),
            shutdown: shutdown.clone(),
        }
    }

    /// Fails if any of the three has already ended.  Shutdown wins.
    pub(crate) fn check(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }
        if let Some(err) = self.call.err() {
            return Err(err);
        }
        if let Some(err) = self.session.as_ref().and_then(Scope::err) {
            return Err(err);
        }
        Ok(())
    }

    /// Resolves with the reason once any of the three ends.
    pub(crate) async fn terminated(&self) -> Error {
        match &self.session {
            Some(session) => {
                tokio::select! {
                    _ = self.shutdown.cancelled() => Error::Closed,
                    err = self.call.done() => err,
                    err = session.done() => err,
                }
            }
            None => {
                tokio::select! {
                    _ = self.shutdown.cancelled() => Error::Closed,
                    err = self.call.done() => err,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn live_guard_passes() {
        let guard = FetchGuard::new(&Scope::new(), None, &CancellationToken::new());
        assert!(guard.check().is_ok());
    }

    #[test]
    fn shutdown_takes_precedence() {
        let call = Scope::new();
        let shutdown = CancellationToken::new();
        let guard = FetchGuard::new(&call, None, &shutdown);
        call.cancel();
        shutdown.cancel();
        assert!(matches!(guard.check(), Err(Error::Closed)));
    }

    #[test]
    fn ended_session_fails_check() {
        let session = Scope::new();
        let guard = FetchGuard::new(&Scope::new(), Some(&session), &CancellationToken::new());
        session.cancel();
        assert!(matches!(guard.check(), Err(Error::Canceled)));
    }

    #[tokio::test]
    async fn terminated_reports_deadline() {
        let call = Scope::new().with_timeout(Duration::from_millis(10));
        let guard = FetchGuard::new(&call, None, &CancellationToken::new());
        assert!(matches!(guard.terminated().await, Error::DeadlineExceeded));
    }
}
