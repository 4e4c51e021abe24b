//! # umbra-primitives
//!
//! Core chain types for the Umbra blockchain.
//!
//! This crate provides:
//! - Amounts and fee rates
//! - 32-byte BLAKE2b-256 hashes
//! - Scripts with a minimal integer-push builder
//! - Transactions, including shielded spend/mint surfaces
//! - Block headers, blocks, and Merkle roots
//! - Compact difficulty bits and the proof-of-work check

mod amount;
mod block;
mod hash;
mod merkle;
mod pow;
mod script;
mod transaction;

pub use amount::{Amount, FeeRate, COIN};
pub use block::{Block, BlockHeader};
pub use hash::{blake2b_256, Hash256};
pub use merkle::{block_merkle_root, block_witness_merkle_root, merkle_root};
pub use pow::{check_proof_of_work, compact_to_target, target_to_compact};
pub use script::{Script, ScriptBuilder};
pub use transaction::{InputKind, OutPoint, Transaction, TxInput, TxOutput};

/// Scale factor between transaction vsize and block weight.
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Hard consensus cap on block weight.
pub const MAX_BLOCK_WEIGHT: u64 = 4_000_000;

/// Hard consensus cap on cumulative block sigop cost.
pub const MAX_BLOCK_SIGOPS_COST: i64 = 80_000;

/// Weight reserved for the coinbase transaction during assembly.
pub const COINBASE_WEIGHT_RESERVATION: u64 = 4_000;

/// Sigop cost reserved for the coinbase transaction during assembly.
pub const COINBASE_SIGOPS_RESERVATION: i64 = 400;

/// How far behind the tip a new block's timestamp may fall (seconds).
pub const MAX_PAST_BLOCK_TIME: i64 = 60 * 60;

/// How far into the future a block timestamp may run (seconds).
pub const MAX_FUTURE_BLOCK_TIME: i64 = 2 * 60 * 60;

/// Sequence value marking an input as final regardless of locktime.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Locktime values below this are block heights; at or above, unix times.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;
