//! Content identifiers.
//!
//! A [`Cid`] is a CIDv1 with a SHA-256 multihash.  The canonical text form is
//! multibase base16 (lowercase, prefix `f`):
//!
//! ```text
//! f 01 <codec> 12 20 <64 hex digits>
//!   │   │      │  └─ digest length (32)
//!   │   │      └──── multihash code (sha2-256)
//!   │   └─────────── multicodec of the payload
//!   └─────────────── CID version
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::Error;

const CID_VERSION: u8 = 0x01;
const SHA2_256: u8 = 0x12;
const DIGEST_LEN: usize = 32;
const ENCODED_LEN: usize = 4 + DIGEST_LEN;

/// Payload codec carried by a [`Cid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Codec {
    Raw,
    DagPb,
    DagCbor,
}

impl Codec {
    pub fn code(self) -> u8 {
        match self {
            Codec::Raw => 0x55,
            Codec::DagPb => 0x70,
            Codec::DagCbor => 0x71,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x55 => Some(Codec::Raw),
            0x70 => Some(Codec::DagPb),
            0x71 => Some(Codec::DagCbor),
            _ => None,
        }
    }
}

/// A content-derived key addressing one immutable block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    codec: Codec,
    digest: [u8; DIGEST_LEN],
}

impl Cid {
    /// Hash `data` and build the identifier for the given codec.
    pub fn of(codec: Codec, data: &[u8]) -> Self {
        let digest: [u8; DIGEST_LEN] = Sha256::digest(data).into();
        Self { codec, digest }
    }

    /// Shorthand for `Cid::of(Codec::Raw, data)`.
    pub fn raw(data: &[u8]) -> Self {
        Self::of(Codec::Raw, data)
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Binary form: version, codec, multihash header, digest.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_LEN);
        out.push(CID_VERSION);
        out.push(self.codec.code());
        out.push(SHA2_256);
        out.push(DIGEST_LEN as u8);
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != ENCODED_LEN {
            return Err(Error::InvalidCid(format!(
                "expected {ENCODED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != CID_VERSION {
            return Err(Error::InvalidCid(format!("unsupported version {}", bytes[0])));
        }
        let codec = Codec::from_code(bytes[1])
            .ok_or_else(|| Error::InvalidCid(format!("unknown codec 0x{:02x}", bytes[1])))?;
        if bytes[2] != SHA2_256 || bytes[3] as usize != DIGEST_LEN {
            return Err(Error::InvalidCid("unsupported multihash".into()));
        }
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[4..]);
        Ok(Self { codec, digest })
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix('f')
            .ok_or_else(|| Error::InvalidCid(format!("unsupported multibase in {s:?}")))?;
        let bytes = hex::decode(body).map_err(|e| Error::InvalidCid(format!("{s:?}: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
