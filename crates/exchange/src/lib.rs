//! Block exchange contracts and a local reference exchange.
//!
//! The contracts are layered by capability:
//! - [`Fetcher`]: fetch one block or a stream of blocks.
//! - [`Exchange`]: a fetcher that can also announce blocks, report liveness
//!   and be closed.
//! - [`SessionExchange`]: an exchange that can hand out session-scoped
//!   fetchers.
//!
//! [`LocalExchange`] implements all three on top of a [`BlockStore`].

mod guard;
pub mod local;
pub mod session;
pub mod store;
pub mod table;
pub mod traits;

pub use local::LocalExchange;
pub use session::SessionFetcher;
pub use store::{BlockStore, FsBlockStore, MemoryBlockStore};
pub use table::SessionStats;
pub use traits::{Exchange, Fetcher, SessionExchange};

pub use bx_domain::{Block, Cid, Error, Result};
pub use bx_sessions::{Scope, SessionId};
