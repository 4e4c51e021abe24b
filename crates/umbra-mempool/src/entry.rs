//! Pool entries.

use std::sync::Arc;

use umbra_primitives::{Amount, Transaction, WITNESS_SCALE_FACTOR};

use crate::TxId;

/// A transaction handed to the pool for insertion. Fee, size, and sigop
/// accounting are the caller's responsibility (admission policy lives
/// upstream); `fee_delta` carries operator fee prioritisation.
#[derive(Debug, Clone)]
pub struct CandidateTx {
    pub tx: Transaction,
    pub fee: Amount,
    pub fee_delta: Amount,
    pub vsize: u64,
    pub sigop_cost: i64,
}

impl CandidateTx {
    pub fn new(tx: Transaction, fee: Amount, vsize: u64, sigop_cost: i64) -> Self {
        Self {
            tx,
            fee,
            fee_delta: 0,
            vsize,
            sigop_cost,
        }
    }
}

/// A stored pool entry with precomputed ancestor aggregates.
///
/// Aggregates include the entry itself and are fixed at insertion; the
/// selector corrects them through its modified overlay as ancestors land
/// in a block, never by mutating the pool.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    tx: Arc<Transaction>,
    txid: TxId,
    fee: Amount,
    mod_fee: Amount,
    vsize: u64,
    sigop_cost: i64,
    arrival: u64,
    count_with_ancestors: u64,
    size_with_ancestors: u64,
    mod_fees_with_ancestors: Amount,
    sigops_with_ancestors: i64,
}

impl PoolEntry {
    pub(crate) fn new(
        candidate: CandidateTx,
        txid: TxId,
        arrival: u64,
        count_with_ancestors: u64,
        size_with_ancestors: u64,
        mod_fees_with_ancestors: Amount,
        sigops_with_ancestors: i64,
    ) -> Self {
        let mod_fee = candidate.fee + candidate.fee_delta;
        Self {
            tx: Arc::new(candidate.tx),
            txid,
            fee: candidate.fee,
            mod_fee,
            vsize: candidate.vsize,
            sigop_cost: candidate.sigop_cost,
            arrival,
            count_with_ancestors,
            size_with_ancestors,
            mod_fees_with_ancestors,
            sigops_with_ancestors,
        }
    }

    pub fn tx(&self) -> &Arc<Transaction> {
        &self.tx
    }

    pub fn txid(&self) -> TxId {
        self.txid
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// Fee after operator prioritisation.
    pub fn modified_fee(&self) -> Amount {
        self.mod_fee
    }

    pub fn vsize(&self) -> u64 {
        self.vsize
    }

    pub fn weight(&self) -> u64 {
        self.vsize * WITNESS_SCALE_FACTOR
    }

    pub fn sigop_cost(&self) -> i64 {
        self.sigop_cost
    }

    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    /// Number of in-pool ancestors plus this entry. Doubles as the
    /// dependency-safe linearization key for block inclusion.
    pub fn count_with_ancestors(&self) -> u64 {
        self.count_with_ancestors
    }

    pub fn size_with_ancestors(&self) -> u64 {
        self.size_with_ancestors
    }

    pub fn mod_fees_with_ancestors(&self) -> Amount {
        self.mod_fees_with_ancestors
    }

    pub fn sigops_with_ancestors(&self) -> i64 {
        self.sigops_with_ancestors
    }
}
