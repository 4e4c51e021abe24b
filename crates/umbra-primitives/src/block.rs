//! Block headers and blocks.

use std::collections::BTreeMap;

use crate::hash::{blake2b_256, Hash256};
use crate::merkle::{block_merkle_root, block_witness_merkle_root};
use crate::transaction::Transaction;

/// Block header.
///
/// `hash_aux_data` binds both Merkle roots and the accumulator checkpoint
/// map; the proof-of-work hash covers the header through it, so the nonce
/// search never re-serializes the transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub version: i32,
    pub hash_prev_block: Hash256,
    pub hash_merkle_root: Hash256,
    pub hash_witness_merkle_root: Hash256,
    pub time: i64,
    pub bits: u32,
    pub nonce: u32,
    /// Accumulator checkpoint per shielded denomination.
    pub accumulator_checkpoints: BTreeMap<u32, Hash256>,
    /// Digest binding the Merkle roots and checkpoint map.
    pub hash_aux_data: Hash256,
    /// Present only on proof-of-full-node blocks.
    pub hash_full_node_proof: Option<Hash256>,
}

impl BlockHeader {
    /// Recompute the auxiliary data digest from the current roots and
    /// checkpoint map.
    pub fn compute_aux_data_hash(&self) -> Hash256 {
        let mut bytes = Vec::with_capacity(64 + self.accumulator_checkpoints.len() * 36);
        bytes.extend_from_slice(self.hash_merkle_root.as_bytes());
        bytes.extend_from_slice(self.hash_witness_merkle_root.as_bytes());
        for (denom, checkpoint) in &self.accumulator_checkpoints {
            bytes.extend_from_slice(&denom.to_le_bytes());
            bytes.extend_from_slice(checkpoint.as_bytes());
        }
        blake2b_256(&bytes)
    }

    /// Hash searched by the PoW inner loop.
    pub fn pow_hash(&self) -> Hash256 {
        let mut bytes = Vec::with_capacity(84);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(self.hash_prev_block.as_bytes());
        bytes.extend_from_slice(self.hash_aux_data.as_bytes());
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.bits.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        blake2b_256(&bytes)
    }

    /// Stable block id over the full header.
    pub fn block_hash(&self) -> Hash256 {
        let mut bytes = Vec::with_capacity(160);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(self.hash_prev_block.as_bytes());
        bytes.extend_from_slice(self.hash_merkle_root.as_bytes());
        bytes.extend_from_slice(self.hash_witness_merkle_root.as_bytes());
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.bits.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        for (denom, checkpoint) in &self.accumulator_checkpoints {
            bytes.extend_from_slice(&denom.to_le_bytes());
            bytes.extend_from_slice(checkpoint.as_bytes());
        }
        bytes.extend_from_slice(self.hash_aux_data.as_bytes());
        match &self.hash_full_node_proof {
            Some(h) => {
                bytes.push(1);
                bytes.extend_from_slice(h.as_bytes());
            }
            None => bytes.push(0),
        }
        blake2b_256(&bytes)
    }
}

/// A block: header, transactions, and (for proof-of-stake) the staker's
/// signature over the block hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
    pub signature: Vec<u8>,
}

impl Block {
    /// Proof-of-stake blocks carry the coinstake in the second slot.
    pub fn is_proof_of_stake(&self) -> bool {
        self.txs.len() > 1 && self.txs[1].is_coinstake()
    }

    /// Recompute both Merkle roots from the transaction body.
    pub fn update_merkle_roots(&mut self) {
        self.header.hash_merkle_root = block_merkle_root(&self.txs);
        self.header.hash_witness_merkle_root = block_witness_merkle_root(&self.txs);
    }
}
