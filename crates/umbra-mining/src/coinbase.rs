//! Coinbase construction and the payout schedule.

use tracing::debug;
use umbra_primitives::{Amount, Script, Transaction, TxInput, TxOutput, COIN};

use crate::ChainParams;

/// Per-height reward split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardShares {
    /// Paid to the miner (PoW) or staker (PoS, via the coinstake).
    pub block_reward: Amount,
    pub founder_payment: Amount,
    pub lab_payment: Amount,
    pub budget_payment: Amount,
}

/// Emission and payout schedule.
#[derive(Debug, Clone)]
pub struct BudgetSchedule {
    /// Blocks per emission era (~one year of 1-minute blocks).
    pub era_length: u32,
    /// Miner reward in the first era.
    pub initial_reward: Amount,
    /// Miner reward reduction per era.
    pub era_reduction: Amount,
    /// Miner reward floor.
    pub min_reward: Amount,
    /// Per-block budget payment while the budget era is active.
    pub budget_payment: Amount,
    /// Per-block lab payment while the budget era is active.
    pub lab_payment: Amount,
    /// Per-block founder payment while the founder era is active.
    pub founder_payment: Amount,
    /// Last era (inclusive) that carries budget and lab payments.
    pub budget_eras: u32,
    /// Last era (inclusive) that carries the founder payment.
    pub founder_eras: u32,
}

impl Default for BudgetSchedule {
    fn default() -> Self {
        Self {
            era_length: 525_600,
            initial_reward: 50 * COIN,
            era_reduction: 5 * COIN,
            min_reward: 10 * COIN,
            budget_payment: 30 * COIN,
            lab_payment: 10 * COIN,
            founder_payment: 10 * COIN,
            budget_eras: 10,
            founder_eras: 2,
        }
    }
}

impl BudgetSchedule {
    /// Reward split for a block at `height`. The genesis block carries
    /// no payouts.
    pub fn reward_shares(&self, height: u32) -> RewardShares {
        if height == 0 {
            return RewardShares {
                block_reward: 0,
                founder_payment: 0,
                lab_payment: 0,
                budget_payment: 0,
            };
        }
        let era = (height - 1) / self.era_length;
        let block_reward = self
            .initial_reward
            .saturating_sub(self.era_reduction.saturating_mul(era as Amount))
            .max(self.min_reward);

        let budget_active = era < self.budget_eras;
        let founder_active = era < self.founder_eras;

        RewardShares {
            block_reward,
            founder_payment: if founder_active { self.founder_payment } else { 0 },
            lab_payment: if budget_active { self.lab_payment } else { 0 },
            budget_payment: if budget_active { self.budget_payment } else { 0 },
        }
    }
}

/// Build the coinbase transaction for a block at `height`.
///
/// Output layout depends only on `(proof_of_stake, budget > 0,
/// founder > 0)`:
///
/// - PoW: `[miner]`, `[miner, budget, lab]`, or
///   `[miner, budget, lab, founder]`, with the miner slot worth
///   `block_reward + network_reward`.
/// - PoS: the reward is paid through the coinstake, so the miner slot is
///   the zeroed marker when no budget is due, and omitted otherwise:
///   `[empty]`, `[budget, lab]`, or `[budget, lab, founder]`.
pub(crate) fn build_coinbase(
    params: &ChainParams,
    shares: &RewardShares,
    network_reward: Amount,
    payout_script: &Script,
    height: u32,
    proof_of_stake: bool,
) -> Transaction {
    let mut outputs = Vec::with_capacity(4);

    if !proof_of_stake {
        // The miner takes the block reward plus any matured network reward.
        outputs.push(TxOutput::standard(
            shares.block_reward + network_reward,
            payout_script.clone(),
        ));
    } else if shares.budget_payment == 0 {
        outputs.push(TxOutput::empty());
    }

    if shares.budget_payment > 0 {
        outputs.push(TxOutput::standard(
            shares.budget_payment,
            params.budget_script.clone(),
        ));
        outputs.push(TxOutput::standard(
            shares.lab_payment,
            params.lab_script.clone(),
        ));
        if shares.founder_payment > 0 {
            outputs.push(TxOutput::standard(
                shares.founder_payment,
                params.founder_script.clone(),
            ));
        }
    }

    debug!(
        height,
        block_reward = shares.block_reward,
        network_reward,
        budget = shares.budget_payment,
        lab = shares.lab_payment,
        founder = shares.founder_payment,
        "built coinbase"
    );

    // The scriptsig leads with the height.
    let script_sig = Script::builder().push_int(height as i64).push_int(0).build();
    Transaction {
        version: 1,
        inputs: vec![TxInput::coinbase(script_sig)],
        outputs,
        lock_time: 0,
    }
}
