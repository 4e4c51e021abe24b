//! Block template assembly.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use tracing::{debug, error};
use umbra_primitives::{
    Block, FeeRate, Hash256, InputKind, Script, Transaction, COINBASE_WEIGHT_RESERVATION,
    MAX_BLOCK_WEIGHT, MAX_PAST_BLOCK_TIME,
};

use crate::accounting::ResourceTracker;
use crate::coinbase::build_coinbase;
use crate::selector::PackageSelector;
use crate::{
    AssemblerOptions, BlockTemplate, ChainTip, MinerContext, MiningError, MiningResult,
};

/// Size of the last assembled block, for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblerStats {
    pub last_block_tx: u64,
    pub last_block_weight: u64,
}

/// Assembles block templates against a [`MinerContext`].
pub struct BlockAssembler {
    ctx: MinerContext,
    options: AssemblerOptions,
    max_block_weight: u64,
    stats: AssemblerStats,
}

impl BlockAssembler {
    pub fn new(ctx: MinerContext, options: AssemblerOptions) -> Self {
        // Limit weight to between 4K and MAX_BLOCK_WEIGHT/4 for sanity.
        let max_block_weight = options
            .max_block_weight
            .clamp(COINBASE_WEIGHT_RESERVATION, MAX_BLOCK_WEIGHT / 4);
        Self {
            ctx,
            options,
            max_block_weight,
            stats: AssemblerStats::default(),
        }
    }

    /// Size of the most recently assembled block.
    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Assemble a new block template on top of the current tip.
    ///
    /// Proof-of-stake templates are signed and carry the coinstake in
    /// slot 1; `proof_of_full_node` only applies to them. Soft failures
    /// (busy mempool, no stake found) surface as errors for the driver
    /// to retry.
    pub fn create_template(
        &mut self,
        payout_script: &Script,
        include_witness: bool,
        proof_of_stake: bool,
        proof_of_full_node: bool,
    ) -> MiningResult<BlockTemplate> {
        let build_start = Instant::now();
        let params = self.ctx.params.clone();

        let _chain_guard = self.ctx.chain_guard.lock();
        let tip = self.ctx.chain.tip();
        let height = tip.height + 1;

        let mut template = BlockTemplate::new(height);

        // Coinstake first: no point selecting transactions when the
        // wallet finds no stake.
        let mut coinstake: Option<Transaction> = None;
        let mut header_time = self.ctx.clock.adjusted_time();
        if proof_of_stake {
            let wallet = self
                .ctx
                .wallet
                .as_ref()
                .ok_or(MiningError::WalletUnavailable)?;
            if height < params.pos_start_height {
                return Err(MiningError::CoinstakeFailed(format!(
                    "height {height} is below the proof-of-stake start"
                )));
            }
            let bits = self
                .ctx
                .consensus
                .next_work_required(&tip, header_time, true);
            let (stake_tx, stake_time) = wallet.create_coin_stake(&tip, bits)?;
            header_time = stake_time;
            coinstake = Some(stake_tx);
        }

        let _pool_guard = self
            .ctx
            .pool
            .try_build_guard()
            .ok_or(MiningError::MempoolBusy)?;

        let mut version = self.ctx.consensus.compute_block_version(&tip);
        if params.mine_blocks_on_demand {
            if let Some(override_version) = self.options.block_version_override {
                version = override_version;
            }
        }

        if !proof_of_stake {
            // Keep the timestamp from drifting too far behind the tip.
            if header_time < tip.time - MAX_PAST_BLOCK_TIME {
                header_time = tip.time - MAX_PAST_BLOCK_TIME + 1;
            }
        }

        let locktime_cutoff = if params.locktime_median_time_past {
            tip.median_time_past
        } else {
            header_time
        };

        let mut tracker = ResourceTracker::new(self.max_block_weight);
        let selection = PackageSelector {
            pool: &self.ctx.pool,
            tracker: &mut tracker,
            template: &mut template,
            height,
            locktime_cutoff,
            include_witness,
            min_package_feerate: self.options.min_package_feerate.map(FeeRate::per_kvb),
            print_priority: self.options.print_priority,
        }
        .select();
        let selection_done = Instant::now();

        self.stats = AssemblerStats {
            last_block_tx: tracker.tx_count(),
            last_block_weight: tracker.weight(),
        };

        // One pass over the selected transactions: accumulate coins sent
        // to the network-reward address and catch shielded transactions
        // that conflict with each other or with confirmed chain state.
        let mut reserve = tip.network_reward_reserve;
        let mut seen_serials: HashSet<Hash256> = HashSet::new();
        let mut seen_pubcoins: HashSet<Hash256> = HashSet::new();
        let mut duplicates: HashSet<Hash256> = HashSet::new();
        for tx in &template.block.txs {
            if tx.inputs.is_empty() {
                continue; // coinbase slot placeholder
            }
            let mut remove = false;
            for serial in tx.serial_hashes() {
                if seen_serials.contains(&serial) {
                    debug!(tx = %tx.txid(), "removing duplicate serial tx");
                    remove = true;
                    break;
                }
                if self.ctx.chain.is_serial_confirmed(&serial, height) {
                    debug!(tx = %tx.txid(), "removing serial that is already in chain");
                    remove = true;
                    break;
                }
                seen_serials.insert(serial);
            }
            if remove {
                duplicates.insert(tx.txid());
                continue;
            }
            for pubcoin in tx.pubcoin_hashes() {
                if seen_pubcoins.contains(&pubcoin) {
                    debug!(tx = %tx.txid(), "removing duplicate pubcoin tx");
                    remove = true;
                    break;
                }
                if self.ctx.chain.is_pubcoin_confirmed(&pubcoin, height) {
                    debug!(tx = %tx.txid(), "removing already accumulated pubcoin tx");
                    remove = true;
                    break;
                }
                seen_pubcoins.insert(pubcoin);
            }
            if remove {
                duplicates.insert(tx.txid());
                continue;
            }
            for output in &tx.outputs {
                let (Some(value), Some(script)) = (output.value(), output.script_pubkey()) else {
                    continue; // shielded outputs never feed the reserve
                };
                if *script == params.network_reward_script {
                    reserve += value;
                }
            }
        }

        // Rebuild the transaction list without duplicates or entries whose
        // inputs vanished from the UTXO view, preserving order. Shielded
        // spends and anon inputs are vouched for by their proofs.
        let txs = std::mem::take(&mut template.block.txs);
        let fees = std::mem::take(&mut template.fees);
        let sigop_costs = std::mem::take(&mut template.sigop_costs);
        for (index, tx) in txs.into_iter().enumerate() {
            if index == 0 {
                template.block.txs.push(tx);
                template.fees.push(fees[index]);
                template.sigop_costs.push(sigop_costs[index]);
                continue;
            }
            let txid = tx.txid();
            if duplicates.contains(&txid) {
                self.ctx.pool.remove_recursive(&txid);
                continue;
            }
            let anon_first_input = tx
                .inputs
                .first()
                .map_or(false, |input| matches!(input.kind, InputKind::Anon));
            if !tx.is_shielded_spend() && !anon_first_input && !self.ctx.utxo.have_inputs(&tx) {
                debug!(tx = %txid, "dropping tx with missing inputs");
                continue;
            }
            template.block.txs.push(tx);
            template.fees.push(fees[index]);
            template.sigop_costs.push(sigop_costs[index]);
        }

        let network_reward = reserve.min(params.max_network_reward);

        let shares = params.budget_schedule.reward_shares(height);
        template.block.txs[0] = build_coinbase(
            &params,
            &shares,
            network_reward,
            payout_script,
            height,
            proof_of_stake,
        );
        template.fees[0] = -tracker.fees();
        // Opaque scripts carry no statically countable sigops.
        template.sigop_costs[0] = 0;

        if let Some(stake_tx) = coinstake {
            template.install_coinstake(stake_tx);
        }

        debug!(
            weight = tracker.weight(),
            txs = tracker.tx_count(),
            fees = tracker.fees(),
            sigops = tracker.sigops(),
            proof_of_stake,
            "assembled block"
        );

        // Fill in the header.
        template.block.header.version = version;
        template.block.header.hash_prev_block = tip.hash;
        template.block.header.time = header_time;
        if !proof_of_stake {
            update_time(&self.ctx, &tip, &mut template.block, false);
        }
        template.block.header.bits =
            self.ctx
                .consensus
                .next_work_required(&tip, template.block.header.time, proof_of_stake);
        template.block.header.nonce = 0;
        template.block.update_merkle_roots();

        // The accumulator checkpoint only moves every `checkpoint_period`
        // blocks; in between it carries over from the previous block.
        template.block.header.accumulator_checkpoints = if height % params.checkpoint_period == 0 {
            match self.ctx.accumulator.calculate_checkpoint(height) {
                Ok(checkpoints) => checkpoints,
                Err(e) => {
                    debug!("failed to get accumulator checkpoints: {e}");
                    params
                        .accumulator_denominations
                        .iter()
                        .map(|denom| (*denom, Hash256::ZERO))
                        .collect::<BTreeMap<_, _>>()
                }
            }
        } else {
            tip.accumulator_checkpoints.clone()
        };

        if proof_of_full_node && !proof_of_stake {
            debug!("a block cannot be proof of full node and proof of work");
        } else if proof_of_full_node && proof_of_stake {
            let _chain_guard = self.ctx.chain_guard.lock();
            template.block.header.hash_full_node_proof = Some(
                self.ctx
                    .consensus
                    .full_node_proof_hash(&template.block, &tip),
            );
        }

        // Both Merkle roots and the checkpoint map are final; bind them.
        template.block.header.hash_aux_data = template.block.header.compute_aux_data_hash();

        if proof_of_stake {
            self.sign_block(&mut template)?;
        }

        if let Err(state) = self
            .ctx
            .consensus
            .test_block_validity(&template.block, &tip)
        {
            error!("test_block_validity failed: {state}");
            return Err(MiningError::TemplateInvalid(state));
        }

        debug!(
            packages = selection.packages_selected,
            descendants_updated = selection.descendants_updated,
            selection_ms = (selection_done - build_start).as_millis() as u64,
            total_ms = build_start.elapsed().as_millis() as u64,
            "created new block template"
        );

        Ok(template)
    }

    /// Sign a proof-of-stake block with the key behind the coinstake's
    /// serial.
    fn sign_block(&self, template: &mut BlockTemplate) -> MiningResult<()> {
        let stake = &template.block.txs[1];
        if !stake.is_shielded_spend() {
            return Err(MiningError::TemplateInvalid(
                "stake is not a shielded spend".to_string(),
            ));
        }
        let serial = stake
            .serial_hashes()
            .into_iter()
            .next()
            .ok_or_else(|| MiningError::SignFailed("coinstake exposes no serial".to_string()))?;
        let wallet = self
            .ctx
            .wallet
            .as_ref()
            .ok_or(MiningError::WalletUnavailable)?;
        let block_hash = template.block.header.block_hash();
        template.block.signature = wallet.sign_block(&serial, &block_hash)?;
        debug!(block = %block_hash, "found stake");
        Ok(())
    }
}

/// Lift the block time to `max(median_time_past + 1, adjusted_time)`.
/// On chains that allow min-difficulty blocks, a time change can also
/// change the work requirement. Returns the time delta.
pub(crate) fn update_time(
    ctx: &MinerContext,
    tip: &ChainTip,
    block: &mut Block,
    proof_of_stake: bool,
) -> i64 {
    let old_time = block.header.time;
    let new_time = (tip.median_time_past + 1).max(ctx.clock.adjusted_time());
    if old_time < new_time {
        block.header.time = new_time;
    }
    if ctx.params.pow_allow_min_difficulty {
        block.header.bits = ctx
            .consensus
            .next_work_required(tip, block.header.time, proof_of_stake);
    }
    new_time - old_time
}
