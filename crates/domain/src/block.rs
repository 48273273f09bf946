use std::fmt;
use std::sync::Arc;

use crate::cid::{Cid, Codec};

/// An immutable byte payload addressed by its [`Cid`].
///
/// Clones share the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Arc<[u8]>,
}

impl Block {
    /// Build a raw block, hashing `data` to derive its identifier.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self::with_codec(Codec::Raw, data)
    }

    pub fn with_codec(codec: Codec, data: impl Into<Vec<u8>>) -> Self {
        let data: Arc<[u8]> = data.into().into();
        Self {
            cid: Cid::of(codec, &data),
            data,
        }
    }

    /// Pair a payload with an identifier the caller vouches for.  No hashing
    /// is performed.
    pub fn from_parts(cid: Cid, data: impl Into<Vec<u8>>) -> Self {
        Self {
            cid,
            data: data.into().into(),
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("cid", &self.cid)
            .field("len", &self.data.len())
            .finish()
    }
}
