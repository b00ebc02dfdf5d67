//! Column helper types shared by the row models.
use alloy::primitives::B256;
use derive_more::Deref;
use serde::{Deserialize, Serialize};

/// Wrapper around `[u8; 32]` stored as `FixedString(32)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, Deref)]
pub struct HashBytes(pub [u8; 32]);

impl From<[u8; 32]> for HashBytes {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<B256> for HashBytes {
    fn from(value: B256) -> Self {
        Self(value.0)
    }
}

impl From<HashBytes> for B256 {
    fn from(value: HashBytes) -> Self {
        Self::from(value.0)
    }
}

impl AsRef<[u8]> for HashBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}
