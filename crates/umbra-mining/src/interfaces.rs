//! Collaborator interfaces.
//!
//! The miner consumes the rest of the node through these traits: chain
//! state, the UTXO view, the staking wallet, consensus rules, the shielded
//! accumulator, peer connectivity, and time. Everything is injected via
//! [`MinerContext`]; there are no globals.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use rand::Rng;
use umbra_mempool::Mempool;
use umbra_primitives::{Amount, Block, Hash256, Script, Transaction};

use crate::{ChainParams, MiningError, MiningResult};

/// Snapshot of the active chain tip.
#[derive(Debug, Clone)]
pub struct ChainTip {
    pub height: u32,
    pub hash: Hash256,
    pub time: i64,
    pub median_time_past: i64,
    /// Network-reward reserve carried by this block.
    pub network_reward_reserve: Amount,
    /// Accumulator checkpoints recorded in this block's header.
    pub accumulator_checkpoints: BTreeMap<u32, Hash256>,
}

/// Read access to chain state.
pub trait ChainView: Send + Sync {
    fn tip(&self) -> ChainTip;
    fn best_header_time(&self) -> i64;
    fn is_initial_block_download(&self) -> bool;
    /// Is this serial already spent in a block below `below_height`?
    fn is_serial_confirmed(&self, serial: &Hash256, below_height: u32) -> bool;
    /// Is this pubcoin already accumulated below `below_height`?
    fn is_pubcoin_confirmed(&self, pubcoin: &Hash256, below_height: u32) -> bool;
}

/// Read access to the UTXO set.
pub trait UtxoView: Send + Sync {
    /// Are all of this transaction's inputs available?
    fn have_inputs(&self, tx: &Transaction) -> bool;
}

/// The staking wallet.
pub trait StakerWallet: Send + Sync {
    /// Attempt to produce a coinstake on top of `tip` at difficulty `bits`.
    /// Returns the coinstake and the block time it was staked at.
    fn create_coin_stake(&self, tip: &ChainTip, bits: u32) -> MiningResult<(Transaction, i64)>;
    fn has_mintable_coins(&self) -> bool;
    fn is_staking_enabled(&self) -> bool;
    fn is_locked(&self) -> bool;
    fn is_unlocked_for_staking_only(&self) -> bool;
    /// Sign a block hash with the key belonging to a coinstake serial.
    fn sign_block(&self, serial: &Hash256, block_hash: &Hash256) -> MiningResult<Vec<u8>>;
}

/// Consensus rules the miner defers to.
pub trait ConsensusRules: Send + Sync {
    fn compute_block_version(&self, tip: &ChainTip) -> i32;
    fn next_work_required(&self, tip: &ChainTip, block_time: i64, proof_of_stake: bool) -> u32;
    fn check_proof_of_work(&self, hash: &Hash256, bits: u32) -> bool;
    /// Contextless validity check run before a template is handed out.
    /// The error string is the formatted validation state.
    fn test_block_validity(&self, block: &Block, tip: &ChainTip) -> Result<(), String>;
    /// Submit a completed block. Returns whether it was accepted.
    fn process_new_block(&self, block: Block) -> bool;
    /// Full-node-proof hash for a PoS block being built on `tip`.
    fn full_node_proof_hash(&self, block: &Block, tip: &ChainTip) -> Hash256;
}

/// The shielded accumulator.
pub trait AccumulatorTracker: Send + Sync {
    /// Recompute the checkpoint map for `height`.
    fn calculate_checkpoint(&self, height: u32) -> MiningResult<BTreeMap<u32, Hash256>>;
}

/// Peer connectivity.
pub trait NetworkStatus: Send + Sync {
    fn peer_count(&self) -> usize;
}

/// Time and scheduling. Injected so driver tests run on a virtual clock.
pub trait Clock: Send + Sync {
    /// Network-adjusted unix time.
    fn adjusted_time(&self) -> i64;
    /// Local unix time.
    fn unix_time(&self) -> i64;
    fn sleep(&self, duration: Duration);
    /// Uniform value in `[0, bound)`.
    fn rand_below(&self, bound: u32) -> u32;
}

/// Production clock: local time, thread sleeps, thread-local RNG.
pub struct SystemClock;

impl Clock for SystemClock {
    fn adjusted_time(&self) -> i64 {
        // Peer time adjustment is the network layer's concern; standalone
        // nodes run on local time.
        self.unix_time()
    }

    fn unix_time(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn rand_below(&self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..bound)
        }
    }
}

/// A payout script reservation. `keep_script` marks it consumed once a
/// block paying to it is accepted.
pub trait ReserveScript: Send + Sync {
    fn script(&self) -> Script;
    fn keep_script(&self);
}

/// Cooperative cancellation flag shared between a driver and its owner.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Poll point: error out of the driver body when cancelled.
    pub fn checkpoint(&self) -> MiningResult<()> {
        if self.is_cancelled() {
            Err(MiningError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything a driver or assembler needs, bundled for injection.
#[derive(Clone)]
pub struct MinerContext {
    pub chain: Arc<dyn ChainView>,
    pub utxo: Arc<dyn UtxoView>,
    /// Absent when the node runs without a wallet.
    pub wallet: Option<Arc<dyn StakerWallet>>,
    pub consensus: Arc<dyn ConsensusRules>,
    pub accumulator: Arc<dyn AccumulatorTracker>,
    pub network: Arc<dyn NetworkStatus>,
    pub clock: Arc<dyn Clock>,
    pub pool: Arc<Mempool>,
    /// Process-wide reentrant guard over chain-state reads.
    pub chain_guard: Arc<ReentrantMutex<()>>,
    pub params: Arc<ChainParams>,
}
