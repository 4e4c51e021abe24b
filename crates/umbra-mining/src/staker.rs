//! Proof-of-stake driver.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, info};
use umbra_primitives::{Hash256, Script, MAX_FUTURE_BLOCK_TIME, MAX_PAST_BLOCK_TIME};

use crate::{
    AssemblerOptions, BlockAssembler, CancellationToken, MinerContext, MiningError, MiningResult,
    StakerConfig,
};

/// Shared staking pace state.
///
/// The proof-of-stake kernel hashes every eligible timestamp in the drift
/// window; it records how far it hashed through per tip and how many
/// kernels it tried per height. The driver reads both to decide whether
/// another attempt on the same tip is worth anything yet.
#[derive(Default)]
pub struct StakePaceTracker {
    last_hashed: DashMap<Hash256, i64>,
    attempts: DashMap<u32, u64>,
}

impl StakePaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the kernel hashed `tip` through `hashed_through`
    /// (a unix timestamp at the end of the searched drift window).
    pub fn record_hashed(&self, tip: Hash256, hashed_through: i64) {
        self.last_hashed.insert(tip, hashed_through);
    }

    pub fn last_hashed(&self, tip: &Hash256) -> Option<i64> {
        self.last_hashed.get(tip).map(|t| *t)
    }

    /// Bump the kernel-attempt counter for a height.
    pub fn add_attempts(&self, height: u32, attempts: u64) {
        *self.attempts.entry(height).or_insert(0) += attempts;
    }

    pub fn attempts(&self, height: u32) -> u64 {
        self.attempts.get(&height).map(|a| *a).unwrap_or(0)
    }
}

/// The staking loop.
pub struct StakeMiner {
    ctx: MinerContext,
    options: AssemblerOptions,
    config: StakerConfig,
    pace: Arc<StakePaceTracker>,
}

impl StakeMiner {
    pub fn new(
        ctx: MinerContext,
        options: AssemblerOptions,
        config: StakerConfig,
        pace: Arc<StakePaceTracker>,
    ) -> Self {
        Self {
            ctx,
            options,
            config,
            pace,
        }
    }

    /// Thread body: stake until cancelled.
    pub fn run(&self, token: &CancellationToken) {
        info!("stake miner started");
        while !token.is_cancelled() {
            match self.stake_loop(token) {
                Err(MiningError::Cancelled) => break,
                Err(e) => error!("stake miner error: {e}"),
                Ok(()) => {}
            }
        }
        info!("stake miner exiting");
    }

    fn stake_loop(&self, token: &CancellationToken) -> MiningResult<()> {
        let mut assembler = BlockAssembler::new(self.ctx.clone(), self.options.clone());
        let mut mintable = false;
        let mut mintable_last_check: i64 = 0;
        let mut stake_hashes_last: u64 = 0;

        loop {
            token.checkpoint()?;

            let (height, tip_time, tip_hash, best_header_time) = {
                let _guard = self.ctx.chain_guard.lock();
                let tip = self.ctx.chain.tip();
                (
                    tip.height,
                    tip.time,
                    tip.hash,
                    self.ctx.chain.best_header_time(),
                )
            };

            // Don't stake while syncing or when headers run far ahead of
            // the validated tip.
            if !self.config.gen_override
                && (best_header_time - tip_time > 60 * 60
                    || self.ctx.chain.is_initial_block_download())
            {
                self.ctx.clock.sleep(Duration::from_secs(5));
                continue;
            }

            let Some(wallet) = self.ctx.wallet.clone() else {
                self.ctx.clock.sleep(Duration::from_secs(5));
                continue;
            };
            if self.ctx.network.peer_count() == 0
                || !wallet.is_staking_enabled()
                || height < self.ctx.params.pos_start_height
            {
                self.ctx.clock.sleep(Duration::from_secs(5));
                continue;
            }

            // Mintable-coin checks are expensive; cache for five minutes.
            let now = self.ctx.clock.unix_time();
            if now - mintable_last_check > 5 * 60 {
                mintable_last_check = now;
                mintable = wallet.has_mintable_coins();
            }

            // Wait out anything that makes staking impossible right now:
            // a locked wallet, no mintable coins, or a clock that has
            // fallen behind the tip.
            while (wallet.is_locked() && !wallet.is_unlocked_for_staking_only())
                || !mintable
                || self.ctx.clock.adjusted_time() < tip_time - MAX_PAST_BLOCK_TIME
            {
                token.checkpoint()?;
                if !mintable {
                    // Re-check once a minute while coins are missing.
                    let now = self.ctx.clock.unix_time();
                    if now - mintable_last_check > 60 {
                        mintable_last_check = now;
                        mintable = wallet.has_mintable_coins();
                    }
                }
                self.ctx.clock.sleep(Duration::from_millis(2_500));
            }

            // If this tip was already hashed, only retry once the drift
            // window has grown enough to expose fresh kernel timestamps.
            if let Some(hashed_through) = self.pace.last_hashed(&tip_hash) {
                let tried = self.pace.attempts(height);
                if tried != 0 && tried != stake_hashes_last {
                    stake_hashes_last = tried;
                    debug!(block = height + 1, tried, "stake hash attempts");
                }
                let jitter = self.ctx.clock.rand_below(20) as i64;
                if self.ctx.clock.adjusted_time() + MAX_FUTURE_BLOCK_TIME - hashed_through
                    < 60 + jitter
                {
                    let pause = self.ctx.clock.rand_below(10) as u64;
                    self.ctx.clock.sleep(Duration::from_secs(pause));
                    continue;
                }
            }

            // The payout script is unused for PoS: the reward flows
            // through the coinstake.
            match assembler.create_template(
                &Script::empty(),
                true,
                true,
                self.config.proof_of_full_node,
            ) {
                Ok(template) => {
                    if !self.ctx.consensus.process_new_block(template.block) {
                        debug!("failed to process new block");
                    }
                }
                Err(MiningError::Cancelled) => return Err(MiningError::Cancelled),
                Err(e) => {
                    debug!("stake template failed: {e}");
                    self.ctx.clock.sleep(Duration::from_secs(5));
                }
            }
        }
    }
}
