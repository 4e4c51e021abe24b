//! Miner configuration.

use serde::Deserialize;
use umbra_primitives::Amount;

/// Default cap on assembled block weight.
pub const DEFAULT_BLOCK_MAX_WEIGHT: u64 = 3_996_000;

/// Default minimum package fee rate (base units per kvB) when the fee
/// gate is enabled.
pub const DEFAULT_BLOCK_MIN_TX_FEE: Amount = 1_000;

/// Block assembler options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblerOptions {
    /// Hard cap on assembled block weight. Clamped to
    /// `[4000, MAX_BLOCK_WEIGHT / 4]` at assembler construction.
    pub max_block_weight: u64,
    /// Optional floor on package fee rate (base units per kvB).
    /// `None` disables the gate, matching the reference behavior.
    pub min_package_feerate: Option<Amount>,
    /// Regtest-only override of the block version field.
    pub block_version_override: Option<i32>,
    /// Log a line per selected transaction with its fee rate.
    pub print_priority: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            max_block_weight: DEFAULT_BLOCK_MAX_WEIGHT,
            min_package_feerate: None,
            block_version_override: None,
            print_priority: false,
        }
    }
}

/// Proof-of-work driver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Number of mining threads (0 = auto-detect from CPU count).
    pub threads: usize,
    /// Bypass initial-block-download gating.
    pub gen_override: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            gen_override: false,
        }
    }
}

impl MinerConfig {
    /// Get the effective number of mining threads.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        }
    }
}

/// Proof-of-stake driver configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StakerConfig {
    /// Bypass initial-block-download and tip-age gating.
    pub gen_override: bool,
    /// Produce proof-of-full-node blocks.
    pub proof_of_full_node: bool,
}
