//! Chain parameters consumed by the miner.

use umbra_primitives::{Amount, Script, COIN};

use crate::coinbase::BudgetSchedule;

/// Static chain parameters.
///
/// Only the subset the block producer needs; full consensus parameters
/// live with the consensus implementation.
#[derive(Debug, Clone)]
pub struct ChainParams {
    /// Height at which proof-of-stake production begins.
    pub pos_start_height: u32,
    /// Script of the well-known network-reward address.
    pub network_reward_script: Script,
    /// Cap on the network-reward reserve paid out per block.
    pub max_network_reward: Amount,
    /// Budget payout script.
    pub budget_script: Script,
    /// Lab payout script.
    pub lab_script: Script,
    /// Founder payout script.
    pub founder_script: Script,
    /// Raw bytes appended to the coinbase scriptsig by PoW miners.
    pub coinbase_flags: Vec<u8>,
    /// Shielded denominations tracked by the accumulator.
    pub accumulator_denominations: Vec<u32>,
    /// Accumulator checkpoints are recomputed every this many blocks.
    pub checkpoint_period: u32,
    /// Emission and payout schedule.
    pub budget_schedule: BudgetSchedule,
    /// Whether locktime finality is measured against median time past.
    pub locktime_median_time_past: bool,
    /// Testnet/regtest: block time updates re-query the work requirement.
    pub pow_allow_min_difficulty: bool,
    /// Regtest: blocks are mined on demand and the version is overridable.
    pub mine_blocks_on_demand: bool,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            pos_start_height: 1500,
            network_reward_script: Script::new(vec![0x76, 0xa9, 0x14, 0x4e]),
            max_network_reward: 10 * COIN,
            budget_script: Script::new(vec![0x76, 0xa9, 0x14, 0x42]),
            lab_script: Script::new(vec![0x76, 0xa9, 0x14, 0x4c]),
            founder_script: Script::new(vec![0x76, 0xa9, 0x14, 0x46]),
            coinbase_flags: b"/umbra/".to_vec(),
            accumulator_denominations: vec![10, 100, 1_000, 10_000],
            checkpoint_period: 10,
            budget_schedule: BudgetSchedule::default(),
            locktime_median_time_past: true,
            pow_allow_min_difficulty: false,
            mine_blocks_on_demand: false,
        }
    }

    pub fn regtest() -> Self {
        Self {
            pos_start_height: 500,
            pow_allow_min_difficulty: true,
            mine_blocks_on_demand: true,
            ..Self::mainnet()
        }
    }
}
