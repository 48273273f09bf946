//! Shared types for the block exchange workspace: content identifiers,
//! blocks, the common error enum, configuration and trace events.

pub mod block;
pub mod cid;
pub mod config;
pub mod error;
pub mod stream;
pub mod trace;

pub use block::Block;
pub use cid::{Cid, Codec};
pub use error::{Error, Result};
