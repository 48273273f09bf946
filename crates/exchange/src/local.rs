//! Local reference exchange.
//!
//! Serves blocks from a [`BlockStore`].  In [`FetchMode::Offline`] a missing
//! block is simply not found.  In [`FetchMode::Pending`] fetches wait for the
//! block to be announced through [`Exchange::has_block`], bounded by the
//! caller's scope, the session scope and the exchange's own shutdown.
//!
//! Announcements travel over a `tokio::sync::broadcast` channel.  Waiters
//! subscribe before looking at the store, so a block announced between the
//! lookup and the wait is never missed; a waiter that lags behind the channel
//! re-checks the store for everything it is still waiting on.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use bx_domain::config::{ExchangeConfig, FetchMode};
use bx_domain::error::{Error, Result};
use bx_domain::stream::BoxStream;
use bx_domain::trace::TraceEvent;
use bx_domain::{Block, Cid};
use bx_sessions::{Scope, SessionId, SessionRegistry};

use crate::guard::FetchGuard;
use crate::session::SessionFetcher;
use crate::store::{BlockStore, MemoryBlockStore};
use crate::table::{SessionStats, SessionTable};
use crate::traits::{Exchange, Fetcher, SessionExchange};

/// A block exchange backed by local storage.  Clones share state.
#[derive(Clone)]
pub struct LocalExchange {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    store: Arc<dyn BlockStore>,
    mode: FetchMode,
    registry: SessionRegistry,
    announcements: broadcast::Sender<Cid>,
    pub(crate) shutdown: CancellationToken,
    closed: AtomicBool,
    sessions: Arc<SessionTable>,
}

impl LocalExchange {
    /// An exchange drawing session ids from the process-wide allocator.
    pub fn new(store: Arc<dyn BlockStore>, config: &ExchangeConfig) -> Self {
        Self::with_registry(store, config, SessionRegistry::global())
    }

    /// An exchange drawing session ids from `registry`.
    pub fn with_registry(
        store: Arc<dyn BlockStore>,
        config: &ExchangeConfig,
        registry: SessionRegistry,
    ) -> Self {
        let (announcements, _) = broadcast::channel(config.announce_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                store,
                mode: config.mode,
                registry,
                announcements,
                shutdown: CancellationToken::new(),
                closed: AtomicBool::new(false),
                sessions: Arc::new(SessionTable::default()),
            }),
        }
    }

    /// An exchange over a fresh [`MemoryBlockStore`].
    pub fn in_memory(config: &ExchangeConfig) -> Self {
        Self::new(Arc::new(MemoryBlockStore::new()), config)
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.inner.store
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// A session fetcher for the session bound to `scope`.
    ///
    /// Same as [`SessionExchange::new_session`] but returns the concrete
    /// type, which exposes the session id.  A session whose scope has already
    /// ended is not tracked again; its fetcher fails every call with that
    /// scope's error.
    pub fn session(&self, scope: &Scope) -> SessionFetcher {
        let (id, session_scope) = self.inner.registry.get_or_create_session(scope);

        for (stats, reason) in self.inner.sessions.prune_ended() {
            emit_session_ended(&stats, &reason);
        }

        if !self.is_closed()
            && !session_scope.is_done()
            && self.inner.sessions.open(id, &session_scope)
        {
            tracing::debug!(session = %id, "session opened");
            self.inner.watch_session(id, session_scope.clone());
        }

        SessionFetcher::new(self.inner.clone(), id, session_scope)
    }

    pub fn session_stats(&self, id: SessionId) -> Option<SessionStats> {
        self.inner.sessions.get(id)
    }

    /// Number of sessions currently tracked.
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }
}

impl Inner {
    /// Remove the session entry once its owning scope ends or the exchange
    /// shuts down.  Without a tokio runtime the entry is pruned on the next
    /// `session()` call instead.
    fn watch_session(&self, id: SessionId, scope: Scope) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(session = %id, "no runtime, session will be pruned lazily");
            return;
        };
        let sessions = self.sessions.clone();
        let shutdown = self.shutdown.clone();
        handle.spawn(async move {
            let reason = tokio::select! {
                _ = shutdown.cancelled() => Error::Closed.to_string(),
                err = scope.done() => err.to_string(),
            };
            if let Some(stats) = sessions.remove(id) {
                emit_session_ended(&stats, &reason);
            }
        });
    }

    fn record_hit(&self, cid: &Cid, session: Option<SessionId>, started: Instant) {
        if let Some(id) = session {
            self.sessions.record_fetch(id);
        }
        TraceEvent::BlockFetched {
            cid: cid.to_string(),
            session_id: session.map(|id| id.to_string()),
            waited_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
    }

    fn record_miss(&self, cid: &Cid, session: Option<SessionId>) {
        if let Some(id) = session {
            self.sessions.record_miss(id, 1);
        }
        TraceEvent::BlockMissing {
            cid: cid.to_string(),
            session_id: session.map(|id| id.to_string()),
        }
        .emit();
    }

    pub(crate) async fn fetch_one(
        &self,
        guard: &FetchGuard,
        cid: &Cid,
        session: Option<SessionId>,
    ) -> Result<Block> {
        guard.check()?;
        let started = Instant::now();

        let mut rx = self.announcements.subscribe();
        if let Some(block) = self.store.get(cid)? {
            self.record_hit(cid, session, started);
            return Ok(block);
        }
        if self.mode == FetchMode::Offline {
            self.record_miss(cid, session);
            return Err(Error::NotFound(*cid));
        }

        loop {
            let recheck = tokio::select! {
                err = guard.terminated() => {
                    self.record_miss(cid, session);
                    return Err(err);
                }
                msg = rx.recv() => match msg {
                    Ok(announced) => announced == *cid,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(%cid, skipped, "announcement waiter lagged");
                        true
                    }
                    Err(RecvError::Closed) => return Err(Error::Closed),
                },
            };
            if recheck {
                if let Some(block) = self.store.get(cid)? {
                    self.record_hit(cid, session, started);
                    return Ok(block);
                }
            }
        }
    }

    pub(crate) fn stream_blocks(
        self: Arc<Self>,
        guard: FetchGuard,
        cids: Vec<Cid>,
        session: Option<SessionId>,
    ) -> BoxStream<'static, Block> {
        Box::pin(async_stream::stream! {
            let started = Instant::now();
            let mut rx = self.announcements.subscribe();
            let mut pending: HashSet<Cid> = HashSet::new();

            let mut unvisited = cids.into_iter();
            for cid in unvisited.by_ref() {
                if guard.check().is_err() {
                    pending.insert(cid);
                    break;
                }
                match self.store.get(&cid) {
                    Ok(Some(block)) => {
                        self.record_hit(&cid, session, started);
                        yield block;
                    }
                    Ok(None) => {
                        pending.insert(cid);
                    }
                    Err(e) => {
                        tracing::warn!(%cid, error = %e, "block store read failed");
                        pending.insert(cid);
                    }
                }
            }

            // Ids not looked at before the guard ended still count as missed.
            pending.extend(unvisited);

            if self.mode == FetchMode::Pending && guard.check().is_ok() {
                while !pending.is_empty() {
                    let ready: Vec<Cid> = tokio::select! {
                        _ = guard.terminated() => break,
                        msg = rx.recv() => match msg {
                            Ok(announced) if pending.contains(&announced) => vec![announced],
                            Ok(_) => Vec::new(),
                            Err(RecvError::Lagged(_)) => pending.iter().copied().collect(),
                            Err(RecvError::Closed) => break,
                        },
                    };
                    for cid in ready {
                        if let Ok(Some(block)) = self.store.get(&cid) {
                            pending.remove(&cid);
                            self.record_hit(&cid, session, started);
                            yield block;
                        }
                    }
                }
            }

            for cid in &pending {
                self.record_miss(cid, session);
            }
        })
    }
}

fn emit_session_ended(stats: &SessionStats, reason: &str) {
    TraceEvent::SessionEnded {
        session_id: stats.id.to_string(),
        blocks_fetched: stats.blocks_fetched,
        blocks_missed: stats.blocks_missed,
        reason: reason.to_owned(),
    }
    .emit();
}

/// Drop duplicate ids, keeping first-seen order.
pub(crate) fn dedupe(cids: &[Cid]) -> Vec<Cid> {
    let mut seen = HashSet::with_capacity(cids.len());
    cids.iter().copied().filter(|c| seen.insert(*c)).collect()
}

#[async_trait::async_trait]
impl Fetcher for LocalExchange {
    async fn get_block(&self, scope: &Scope, cid: &Cid) -> Result<Block> {
        let guard = FetchGuard::new(scope, None, &self.inner.shutdown);
        self.inner.fetch_one(&guard, cid, None).await
    }

    async fn get_blocks(&self, scope: &Scope, cids: &[Cid]) -> Result<BoxStream<'static, Block>> {
        let guard = FetchGuard::new(scope, None, &self.inner.shutdown);
        guard.check()?;
        Ok(self.inner.clone().stream_blocks(guard, dedupe(cids), None))
    }
}

#[async_trait::async_trait]
impl Exchange for LocalExchange {
    async fn has_block(&self, block: Block) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let cid = *block.cid();
        let size = block.len();
        self.inner
            .store
            .put(block)
            .map_err(|e| Error::AnnouncementFailed(format!("{cid}: {e}")))?;

        // A send error only means nobody is waiting right now.
        let _ = self.inner.announcements.send(cid);

        TraceEvent::BlockAnnounced {
            cid: cid.to_string(),
            size,
        }
        .emit();
        Ok(())
    }

    fn is_online(&self) -> bool {
        self.inner.mode == FetchMode::Pending && !self.is_closed()
    }

    fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.shutdown.cancel();

        let released = self.inner.sessions.drain();
        for stats in &released {
            emit_session_ended(stats, "exchange closed");
        }
        TraceEvent::ExchangeClosed {
            sessions_released: released.len(),
        }
        .emit();

        self.inner.store.flush().map_err(|e| {
            tracing::warn!(error = %e, "block store flush failed during close");
            e
        })
    }
}

impl SessionExchange for LocalExchange {
    fn new_session(&self, scope: &Scope) -> Arc<dyn Fetcher> {
        Arc::new(self.session(scope))
    }
}
