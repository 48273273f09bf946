//! Session identity for the block exchange.
//!
//! A session groups the fetches made under one [`Scope`] so an exchange can
//! share state and priority between them.  The pieces:
//!
//! - [`SessionId`]: opaque, non-zero identity handed out by a
//!   [`SessionAllocator`].
//! - [`Scope`]: derivable carrier of cancellation, deadline, typed values
//!   and the session binding.
//! - [`SessionRegistry`]: attaches a session to a scope exactly once and
//!   resolves it again from any scope derived afterwards.

pub mod allocator;
pub mod id;
pub mod registry;
pub mod scope;

pub use allocator::SessionAllocator;
pub use id::SessionId;
pub use registry::{ensure_session, get_or_create_session, SessionRegistry};
pub use scope::{Scope, SessionBinding};
