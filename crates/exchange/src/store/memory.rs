use std::collections::HashMap;

use parking_lot::RwLock;

use bx_domain::error::Result;
use bx_domain::{Block, Cid};

use super::BlockStore;

/// In-process block store.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Cid, Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryBlockStore {
    fn get(&self, cid: &Cid) -> Result<Option<Block>> {
        Ok(self.blocks.read().get(cid).cloned())
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.read().contains_key(cid))
    }

    fn put(&self, block: Block) -> Result<()> {
        self.blocks.write().entry(*block.cid()).or_insert(block);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.blocks.read().len())
    }
}
