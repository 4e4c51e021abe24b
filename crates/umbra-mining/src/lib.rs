//! # umbra-mining
//!
//! Block production for the Umbra blockchain.
//!
//! This crate provides:
//! - Block template assembly with ancestor-feerate package selection
//! - Coinbase construction with the multi-party payout split
//! - Shielded-transaction conflict screening and the accumulator
//!   checkpoint refresh
//! - The proof-of-work driver, thread group, and shared extra-nonce state
//! - The proof-of-stake staking driver and pace tracking
//!
//! The rest of the node (chain state, UTXO view, wallet, consensus rules,
//! accumulator, networking, time) is consumed through collaborator traits
//! injected via [`MinerContext`].

mod accounting;
mod assembler;
mod coinbase;
mod config;
mod error;
mod interfaces;
mod miner;
mod nonce;
mod params;
mod selector;
mod staker;
mod template;

pub use assembler::{AssemblerStats, BlockAssembler};
pub use coinbase::{BudgetSchedule, RewardShares};
pub use config::{
    AssemblerOptions, MinerConfig, StakerConfig, DEFAULT_BLOCK_MAX_WEIGHT,
    DEFAULT_BLOCK_MIN_TX_FEE,
};
pub use error::{MiningError, MiningResult};
pub use interfaces::{
    AccumulatorTracker, CancellationToken, ChainTip, ChainView, Clock, ConsensusRules,
    MinerContext, NetworkStatus, ReserveScript, StakerWallet, SystemClock, UtxoView,
};
pub use miner::{PowMiner, PowThreadGroup};
pub use nonce::ExtraNonceState;
pub use params::ChainParams;
pub use staker::{StakeMiner, StakePaceTracker};
pub use template::BlockTemplate;
