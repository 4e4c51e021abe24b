//! Block resource accounting.

use std::collections::HashSet;

use tracing::debug;
use umbra_mempool::{PoolEntry, TxId};
use umbra_primitives::{
    Amount, FeeRate, COINBASE_SIGOPS_RESERVATION, COINBASE_WEIGHT_RESERVATION,
    MAX_BLOCK_SIGOPS_COST, WITNESS_SCALE_FACTOR,
};

use crate::BlockTemplate;

/// Tracks consumed block resources and the included-entry set during one
/// template build.
pub(crate) struct ResourceTracker {
    max_weight: u64,
    max_sigops: i64,
    weight: u64,
    sigops: i64,
    tx_count: u64,
    fees: Amount,
    in_block: HashSet<TxId>,
}

impl ResourceTracker {
    /// Start a build with the coinbase reservations spent.
    pub fn new(max_weight: u64) -> Self {
        Self {
            max_weight,
            max_sigops: MAX_BLOCK_SIGOPS_COST,
            weight: COINBASE_WEIGHT_RESERVATION,
            sigops: COINBASE_SIGOPS_RESERVATION,
            tx_count: 0,
            fees: 0,
            in_block: HashSet::new(),
        }
    }

    /// Would a package of `size` vbytes / `sigops` cost still fit?
    /// Strict `<` keeps headroom for the coinbase.
    pub fn test_package(&self, package_size: u64, package_sigops: i64) -> bool {
        self.weight + WITNESS_SCALE_FACTOR * package_size < self.max_weight
            && self.sigops + package_sigops < self.max_sigops
    }

    /// Every package member must be final, and witness-free when witness
    /// inclusion is disabled.
    pub fn test_finality(
        &self,
        package: &[PoolEntry],
        height: u32,
        locktime_cutoff: i64,
        include_witness: bool,
    ) -> bool {
        package.iter().all(|entry| {
            entry.tx().is_final(height, locktime_cutoff)
                && (include_witness || !entry.tx().has_witness())
        })
    }

    /// Commit an entry to the template and update all counters.
    pub fn add(&mut self, template: &mut BlockTemplate, entry: &PoolEntry, print_priority: bool) {
        template.push_tx(entry.tx().as_ref().clone(), entry.fee(), entry.sigop_cost());
        self.weight += entry.weight();
        self.sigops += entry.sigop_cost();
        self.tx_count += 1;
        self.fees += entry.fee();
        self.in_block.insert(entry.txid());

        if print_priority {
            debug!(
                fee_rate = %FeeRate::from_fee(entry.modified_fee(), entry.vsize()),
                tx = %entry.txid(),
                "selected"
            );
        }
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.in_block.contains(txid)
    }

    pub fn in_block(&self) -> &HashSet<TxId> {
        &self.in_block
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn max_weight(&self) -> u64 {
        self.max_weight
    }

    pub fn sigops(&self) -> i64 {
        self.sigops
    }

    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    pub fn fees(&self) -> Amount {
        self.fees
    }
}
