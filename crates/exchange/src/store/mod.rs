//! Local block storage backing [`LocalExchange`](crate::LocalExchange).

mod fs;
mod memory;

pub use fs::FsBlockStore;
pub use memory::MemoryBlockStore;

use bx_domain::error::Result;
use bx_domain::{Block, Cid};

/// Synchronous key-value storage of blocks by CID.
pub trait BlockStore: Send + Sync {
    fn get(&self, cid: &Cid) -> Result<Option<Block>>;

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.get(cid)?.is_some())
    }

    /// Store `block`.  Storing a block that is already present is a no-op.
    fn put(&self, block: Block) -> Result<()>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Make previous writes durable.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
