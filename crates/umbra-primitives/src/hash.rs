//! 32-byte hashes and the chain hash function.

use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<blake2::digest::consts::U32>;

/// A 32-byte hash value (txids, block hashes, serials, pubcoins).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The all-zero hash.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Hash arbitrary bytes with the chain hash function.
    pub fn digest(bytes: &[u8]) -> Self {
        blake2b_256(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Hex encoding, used for logging and display.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex())
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", self.hex())
    }
}

/// BLAKE2b-256 of `bytes`.
pub fn blake2b_256(bytes: &[u8]) -> Hash256 {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    Hash256(arr)
}
