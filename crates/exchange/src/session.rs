use std::sync::Arc;

use bx_domain::error::Result;
use bx_domain::stream::BoxStream;
use bx_domain::{Block, Cid};
use bx_sessions::{Scope, SessionId};

use crate::guard::FetchGuard;
use crate::local::{dedupe, Inner};
use crate::traits::Fetcher;

/// A fetcher whose calls belong to one session.
///
/// Each call ends when the caller's scope ends, when the session's owning
/// scope ends, or when the exchange closes, whichever happens first.
#[derive(Clone)]
pub struct SessionFetcher {
    inner: Arc<Inner>,
    id: SessionId,
    scope: Scope,
}

impl SessionFetcher {
    pub(crate) fn new(inner: Arc<Inner>, id: SessionId, scope: Scope) -> Self {
        Self { inner, id, scope }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The scope that owns the session.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn guard(&self, call: &Scope) -> FetchGuard {
        FetchGuard::new(call, Some(&self.scope), &self.inner.shutdown)
    }
}

impl std::fmt::Debug for SessionFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFetcher")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish()
    }
}

#[async_trait::async_trait]
impl Fetcher for SessionFetcher {
    async fn get_block(&self, scope: &Scope, cid: &Cid) -> Result<Block> {
        let guard = self.guard(scope);
        self.inner.fetch_one(&guard, cid, Some(self.id)).await
    }

    async fn get_blocks(&self, scope: &Scope, cids: &[Cid]) -> Result<BoxStream<'static, Block>> {
        let guard = self.guard(scope);
        guard.check()?;
        Ok(self
            .inner
            .clone()
            .stream_blocks(guard, dedupe(cids), Some(self.id)))
    }
}
