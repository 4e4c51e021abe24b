//! Block templates.

use umbra_primitives::{Amount, Block, Transaction};

/// A candidate block under construction.
///
/// `fees` and `sigop_costs` run parallel to `block.txs`. Slot 0 is the
/// coinbase; slot 1 is the coinstake in proof-of-stake templates. The
/// coinbase fee slot carries the negated fee total once assembly finishes.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub fees: Vec<Amount>,
    pub sigop_costs: Vec<i64>,
    pub height: u32,
}

impl BlockTemplate {
    /// Fresh template with the coinbase slot reserved.
    pub(crate) fn new(height: u32) -> Self {
        let placeholder = Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        };
        Self {
            block: Block {
                txs: vec![placeholder],
                ..Default::default()
            },
            fees: vec![0],
            sigop_costs: vec![0],
            height,
        }
    }

    /// Append a selected transaction with its accounting entries.
    pub(crate) fn push_tx(&mut self, tx: Transaction, fee: Amount, sigop_cost: i64) {
        self.block.txs.push(tx);
        self.fees.push(fee);
        self.sigop_costs.push(sigop_cost);
    }

    /// Insert the coinstake into its reserved slot, shifting selected
    /// transactions down.
    pub(crate) fn install_coinstake(&mut self, coinstake: Transaction) {
        self.block.txs.insert(1, coinstake);
        self.fees.insert(1, 0);
        self.sigop_costs.insert(1, 0);
    }
}
