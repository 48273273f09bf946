use std::sync::Arc;

use bx_domain::error::Result;
use bx_domain::stream::BoxStream;
use bx_domain::{Block, Cid};
use bx_sessions::Scope;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Retrieves blocks by content identifier.
///
/// Every call is bounded by `scope`: when it is canceled or its deadline
/// passes, pending calls fail with `Canceled` / `DeadlineExceeded` and open
/// streams end.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch exactly one block.
    ///
    /// Fails with `NotFound` when the block cannot be obtained, or with the
    /// scope's error when it ends first.
    async fn get_block(&self, scope: &Scope, cid: &Cid) -> Result<Block>;

    /// Stream the requested blocks as they become available.
    ///
    /// The stream is finite, not restartable, and unordered.  It yields a
    /// subset of `cids`: a block that never turns up simply never appears,
    /// so callers bound the wait through `scope`.  The `Err` case covers
    /// failures before any streaming starts (closed exchange, ended scope).
    async fn get_blocks(&self, scope: &Scope, cids: &[Cid]) -> Result<BoxStream<'static, Block>>;
}

/// The full exchange capability.
#[async_trait::async_trait]
pub trait Exchange: Fetcher {
    /// Publish a locally available block.
    ///
    /// An error (`AnnouncementFailed`) means the announcement could not be
    /// completed, not that the block is invalid.
    async fn has_block(&self, block: Block) -> Result<()>;

    /// Best-effort liveness signal.
    fn is_online(&self) -> bool;

    /// Release every resource held by the exchange.
    ///
    /// Idempotent.  Afterwards all pending and future calls fail with
    /// `Closed`.  The exchange is terminal even when this returns an error
    /// describing a resource it could not release cleanly.
    fn close(&self) -> Result<()>;
}

/// An exchange that supports sessions.
pub trait SessionExchange: Exchange {
    /// A fetcher whose calls are grouped under the session bound to `scope`
    /// (created if `scope` has none).
    ///
    /// Session-scoped resources are released once the session's owning
    /// scope is canceled.
    ///
    /// A scope keeps the session it was first given.  Once that session's
    /// scope is canceled, further calls with the same `scope` return a
    /// fetcher that fails every request with `Canceled`; pass a fresh child
    /// of `scope` to get a new session.
    fn new_session(&self, scope: &Scope) -> Arc<dyn Fetcher>;
}
