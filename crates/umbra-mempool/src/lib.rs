//! # umbra-mempool
//!
//! Candidate transaction pool for the Umbra blockchain.
//!
//! This crate provides:
//! - Entry storage with ancestor-aggregated size, fee, and sigop state
//! - Ancestor-feerate ordering with a stable tie-break
//! - Ancestor/descendant closure computation
//! - Recursive eviction
//! - A non-blocking build guard for template assembly
//!
//! Admission policy is out of scope: callers hand the pool fully-formed
//! entry descriptions and the pool wires up ancestry.

mod entry;
mod error;
mod ordering;
mod pool;

pub use entry::{CandidateTx, PoolEntry};
pub use error::{MempoolError, MempoolResult};
pub use ordering::{compare_ancestor_score, AncestorScoreKey};
pub use pool::{BuildGuard, Mempool};

use umbra_primitives::Hash256;

/// Stable handle for a pool entry.
pub type TxId = Hash256;
