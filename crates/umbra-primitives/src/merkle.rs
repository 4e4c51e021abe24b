//! Merkle roots over transaction ids.

use crate::hash::{blake2b_256, Hash256};
use crate::transaction::Transaction;

/// Root of a pairwise Merkle tree; odd levels duplicate their last node.
/// An empty leaf set yields the zero hash.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = *pair.last().unwrap();
            let mut bytes = [0u8; 64];
            bytes[..32].copy_from_slice(left.as_bytes());
            bytes[32..].copy_from_slice(right.as_bytes());
            next.push(blake2b_256(&bytes));
        }
        level = next;
    }
    level[0]
}

/// Merkle root over txids.
pub fn block_merkle_root(txs: &[Transaction]) -> Hash256 {
    let leaves: Vec<Hash256> = txs.iter().map(Transaction::txid).collect();
    merkle_root(&leaves)
}

/// Merkle root over wtxids. The coinbase contributes a zero leaf since its
/// witness commitment would otherwise be self-referential.
pub fn block_witness_merkle_root(txs: &[Transaction]) -> Hash256 {
    let leaves: Vec<Hash256> = txs
        .iter()
        .enumerate()
        .map(|(i, tx)| if i == 0 { Hash256::ZERO } else { tx.wtxid() })
        .collect();
    merkle_root(&leaves)
}
