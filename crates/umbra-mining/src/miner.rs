//! Proof-of-work driver.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};
use umbra_primitives::{Block, Script};

use crate::nonce::ExtraNonceState;
use crate::{
    AssemblerOptions, BlockAssembler, CancellationToken, MinerConfig, MinerContext, MiningError,
    MiningResult, ReserveScript,
};

/// Nonce attempts per template before rebuilding against a fresh tip.
const INNER_LOOP_COUNT: u32 = 0x1_0000;

/// Rewrite the coinbase scriptsig for a reserved extra nonce and refresh
/// every digest the change invalidates.
pub(crate) fn apply_extra_nonce(block: &mut Block, height: u32, extra_nonce: u32, flags: &[u8]) {
    let script_sig = Script::builder()
        .push_int(height as i64)
        .push_int(extra_nonce as i64)
        .append(flags)
        .build();
    assert!(script_sig.len() <= 100);
    block.txs[0].inputs[0].script_sig = script_sig;
    block.update_merkle_roots();
    block.header.hash_aux_data = block.header.compute_aux_data_hash();
}

/// One proof-of-work mining thread.
pub struct PowMiner {
    ctx: MinerContext,
    options: AssemblerOptions,
    config: MinerConfig,
    nonce_state: Arc<ExtraNonceState>,
    payout: Arc<dyn ReserveScript>,
}

impl PowMiner {
    pub fn new(
        ctx: MinerContext,
        options: AssemblerOptions,
        config: MinerConfig,
        nonce_state: Arc<ExtraNonceState>,
        payout: Arc<dyn ReserveScript>,
    ) -> Self {
        Self {
            ctx,
            options,
            config,
            nonce_state,
            payout,
        }
    }

    /// Thread body: mine until cancelled.
    pub fn run(&self, token: &CancellationToken) {
        info!("miner thread started");
        match self.mine_loop(token) {
            Err(MiningError::Cancelled) => info!("miner thread interrupted"),
            Err(e) => error!("miner thread error: {e}"),
            Ok(()) => {}
        }
        info!("miner thread exiting");
    }

    fn mine_loop(&self, token: &CancellationToken) -> MiningResult<()> {
        let mut assembler = BlockAssembler::new(self.ctx.clone(), self.options.clone());
        loop {
            token.checkpoint()?;

            if self.ctx.chain.is_initial_block_download() && !self.config.gen_override {
                self.ctx.clock.sleep(Duration::from_secs(60));
                continue;
            }

            let payout_script = self.payout.script();
            let mut template = match assembler.create_template(&payout_script, true, false, false) {
                Ok(template) => template,
                Err(MiningError::Cancelled) => return Err(MiningError::Cancelled),
                Err(e) => {
                    debug!("template build failed: {e}");
                    continue;
                }
            };

            // Distinct extra nonce per thread per template; the counter
            // resets when the tip moves.
            let tip_hash = template.block.header.hash_prev_block;
            let extra_nonce = self
                .nonce_state
                .reserve(tip_hash, self.ctx.clock.unix_time());
            apply_extra_nonce(
                &mut template.block,
                template.height,
                extra_nonce,
                &self.ctx.params.coinbase_flags,
            );

            let bits = template.block.header.bits;
            let mut tries: u32 = 0;
            let mut found = false;
            while tries < INNER_LOOP_COUNT {
                if self
                    .ctx
                    .consensus
                    .check_proof_of_work(&template.block.header.pow_hash(), bits)
                {
                    found = true;
                    break;
                }
                token.checkpoint()?;
                tries += 1;
                template.block.header.nonce += 1;
            }

            if let Some(khs) = self
                .nonce_state
                .record_hashes(tries as u64, self.ctx.clock.unix_time())
            {
                debug!("PoW hashspeed {khs:.1} kh/s");
            }

            if !found {
                // Search space exhausted; rebuild with a fresh extra nonce.
                continue;
            }

            info!(
                height = template.height,
                hash = %template.block.header.block_hash(),
                "proof-of-work block found"
            );
            if !self.ctx.consensus.process_new_block(template.block) {
                debug!("failed to process new block");
                continue;
            }
            self.payout.keep_script();
        }
    }
}

/// Owns the proof-of-work worker threads.
///
/// Starting generation interrupts and joins any running workers before
/// spawning the new set; `generate == false` or zero threads stops
/// mining entirely.
pub struct PowThreadGroup {
    ctx: MinerContext,
    options: AssemblerOptions,
    config: MinerConfig,
    nonce_state: Arc<ExtraNonceState>,
    workers: Vec<JoinHandle<()>>,
    token: CancellationToken,
}

impl PowThreadGroup {
    pub fn new(ctx: MinerContext, options: AssemblerOptions, config: MinerConfig) -> Self {
        Self {
            ctx,
            options,
            config,
            nonce_state: Arc::new(ExtraNonceState::new()),
            workers: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    /// (Re)start or stop generation. Negative `threads` maps to one
    /// worker, the regtest convention.
    pub fn start_generation(
        &mut self,
        generate: bool,
        threads: i32,
        payout: Arc<dyn ReserveScript>,
    ) {
        self.stop();

        if !generate || threads == 0 {
            return;
        }
        let threads = if threads < 0 { 1 } else { threads as usize };

        self.token = CancellationToken::new();
        for id in 0..threads {
            let miner = PowMiner::new(
                self.ctx.clone(),
                self.options.clone(),
                self.config.clone(),
                Arc::clone(&self.nonce_state),
                Arc::clone(&payout),
            );
            let token = self.token.clone();
            let handle = thread::Builder::new()
                .name(format!("umbra-miner-{id}"))
                .spawn(move || miner.run(&token))
                .expect("failed to spawn miner thread");
            self.workers.push(handle);
        }
        info!(threads, "proof-of-work generation started");
    }

    /// Interrupt and join all workers.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.token.cancel();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!("proof-of-work generation stopped");
    }

    pub fn is_generating(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Shared extra-nonce state, exposed for diagnostics and tests.
    pub fn nonce_state(&self) -> &Arc<ExtraNonceState> {
        &self.nonce_state
    }
}

impl Drop for PowThreadGroup {
    fn drop(&mut self) {
        self.stop();
    }
}
