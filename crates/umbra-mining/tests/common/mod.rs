//! In-memory fake collaborators for end-to-end template tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use umbra_mempool::{CandidateTx, Mempool, TxId};
use umbra_mining::{
    AccumulatorTracker, ChainParams, ChainTip, ChainView, Clock, ConsensusRules, MinerContext,
    MiningError, MiningResult, NetworkStatus, ReserveScript, StakerWallet, UtxoView,
};
use umbra_primitives::{
    check_proof_of_work, Amount, Block, Hash256, OutPoint, Script, Transaction, TxInput, TxOutput,
};

pub struct TestChain {
    tip: Mutex<ChainTip>,
    best_header_time: AtomicI64,
    ibd: AtomicBool,
    confirmed_serials: Mutex<HashMap<Hash256, u32>>,
    confirmed_pubcoins: Mutex<HashMap<Hash256, u32>>,
}

impl TestChain {
    pub fn with_height(height: u32) -> Self {
        let time = 1_700_000_000i64;
        let mut checkpoints = BTreeMap::new();
        checkpoints.insert(10, Hash256::digest(b"carried-checkpoint"));
        Self {
            tip: Mutex::new(ChainTip {
                height,
                hash: Hash256::digest(format!("tip-{height}").as_bytes()),
                time,
                median_time_past: time - 600,
                network_reward_reserve: 0,
                accumulator_checkpoints: checkpoints,
            }),
            best_header_time: AtomicI64::new(time),
            ibd: AtomicBool::new(false),
            confirmed_serials: Mutex::new(HashMap::new()),
            confirmed_pubcoins: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_reserve(&self, reserve: Amount) {
        self.tip.lock().network_reward_reserve = reserve;
    }

    pub fn set_ibd(&self, ibd: bool) {
        self.ibd.store(ibd, Ordering::SeqCst);
    }

    pub fn set_best_header_time(&self, time: i64) {
        self.best_header_time.store(time, Ordering::SeqCst);
    }

    pub fn confirm_serial(&self, serial: Hash256, height: u32) {
        self.confirmed_serials.lock().insert(serial, height);
    }

    pub fn confirm_pubcoin(&self, pubcoin: Hash256, height: u32) {
        self.confirmed_pubcoins.lock().insert(pubcoin, height);
    }

    pub fn advance_tip(&self) {
        let mut tip = self.tip.lock();
        tip.height += 1;
        tip.hash = Hash256::digest(format!("tip-{}", tip.height).as_bytes());
    }
}

impl ChainView for TestChain {
    fn tip(&self) -> ChainTip {
        self.tip.lock().clone()
    }

    fn best_header_time(&self) -> i64 {
        self.best_header_time.load(Ordering::SeqCst)
    }

    fn is_initial_block_download(&self) -> bool {
        self.ibd.load(Ordering::SeqCst)
    }

    fn is_serial_confirmed(&self, serial: &Hash256, below_height: u32) -> bool {
        self.confirmed_serials
            .lock()
            .get(serial)
            .map_or(false, |h| *h < below_height)
    }

    fn is_pubcoin_confirmed(&self, pubcoin: &Hash256, below_height: u32) -> bool {
        self.confirmed_pubcoins
            .lock()
            .get(pubcoin)
            .map_or(false, |h| *h < below_height)
    }
}

#[derive(Default)]
pub struct TestUtxo {
    missing: Mutex<HashSet<TxId>>,
}

impl TestUtxo {
    pub fn mark_missing(&self, txid: TxId) {
        self.missing.lock().insert(txid);
    }
}

impl UtxoView for TestUtxo {
    fn have_inputs(&self, tx: &Transaction) -> bool {
        !self.missing.lock().contains(&tx.txid())
    }
}

pub struct TestWallet {
    pub coinstake: Mutex<Option<(Transaction, i64)>>,
    pub mintable: AtomicBool,
    pub staking_enabled: AtomicBool,
    pub locked: AtomicBool,
    pub unlocked_for_staking: AtomicBool,
    pub keys: Mutex<HashSet<Hash256>>,
}

impl TestWallet {
    /// Wallet ready to stake with the given serial.
    pub fn staking_ready(serial: Hash256) -> Self {
        let wallet = Self {
            coinstake: Mutex::new(Some((coinstake_tx(serial), 1_700_000_200))),
            mintable: AtomicBool::new(true),
            staking_enabled: AtomicBool::new(true),
            locked: AtomicBool::new(false),
            unlocked_for_staking: AtomicBool::new(false),
            keys: Mutex::new(HashSet::new()),
        };
        wallet.keys.lock().insert(serial);
        wallet
    }
}

impl StakerWallet for TestWallet {
    fn create_coin_stake(&self, _tip: &ChainTip, _bits: u32) -> MiningResult<(Transaction, i64)> {
        self.coinstake
            .lock()
            .clone()
            .ok_or_else(|| MiningError::CoinstakeFailed("no eligible kernel".to_string()))
    }

    fn has_mintable_coins(&self) -> bool {
        self.mintable.load(Ordering::SeqCst)
    }

    fn is_staking_enabled(&self) -> bool {
        self.staking_enabled.load(Ordering::SeqCst)
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn is_unlocked_for_staking_only(&self) -> bool {
        self.unlocked_for_staking.load(Ordering::SeqCst)
    }

    fn sign_block(&self, serial: &Hash256, block_hash: &Hash256) -> MiningResult<Vec<u8>> {
        if self.keys.lock().contains(serial) {
            Ok(block_hash.as_bytes().to_vec())
        } else {
            Err(MiningError::SignFailed("no key for serial".to_string()))
        }
    }
}

pub struct TestConsensus {
    pub bits: std::sync::atomic::AtomicU32,
    pub validity_error: Mutex<Option<String>>,
    pub accepted: Mutex<Vec<Block>>,
}

impl TestConsensus {
    pub fn easy() -> Self {
        Self {
            bits: std::sync::atomic::AtomicU32::new(0x207f_ffff),
            validity_error: Mutex::new(None),
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Switch to a target no hash will ever meet.
    pub fn make_unsolvable(&self) {
        self.bits.store(0x0300_1000, Ordering::SeqCst);
    }

    pub fn accepted_blocks(&self) -> Vec<Block> {
        self.accepted.lock().clone()
    }
}

impl ConsensusRules for TestConsensus {
    fn compute_block_version(&self, _tip: &ChainTip) -> i32 {
        4
    }

    fn next_work_required(&self, _tip: &ChainTip, _block_time: i64, _pos: bool) -> u32 {
        self.bits.load(Ordering::SeqCst)
    }

    fn check_proof_of_work(&self, hash: &Hash256, bits: u32) -> bool {
        check_proof_of_work(hash, bits)
    }

    fn test_block_validity(&self, _block: &Block, _tip: &ChainTip) -> Result<(), String> {
        match self.validity_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn process_new_block(&self, block: Block) -> bool {
        self.accepted.lock().push(block);
        true
    }

    fn full_node_proof_hash(&self, _block: &Block, tip: &ChainTip) -> Hash256 {
        let mut bytes = tip.hash.as_bytes().to_vec();
        bytes.extend_from_slice(b"pofn");
        Hash256::digest(&bytes)
    }
}

pub struct TestAccumulator;

impl AccumulatorTracker for TestAccumulator {
    fn calculate_checkpoint(&self, height: u32) -> MiningResult<BTreeMap<u32, Hash256>> {
        let mut map = BTreeMap::new();
        for denom in [10u32, 100, 1_000, 10_000] {
            let mut bytes = denom.to_le_bytes().to_vec();
            bytes.extend_from_slice(&height.to_le_bytes());
            map.insert(denom, Hash256::digest(&bytes));
        }
        Ok(map)
    }
}

pub struct TestNetwork {
    pub peers: AtomicUsize,
}

impl NetworkStatus for TestNetwork {
    fn peer_count(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }
}

/// Virtual clock: sleeps advance time instead of blocking.
pub struct TestClock {
    now: AtomicI64,
}

impl TestClock {
    pub fn at(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }
}

impl Clock for TestClock {
    fn adjusted_time(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn unix_time(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.now
            .fetch_add(duration.as_secs().max(1) as i64, Ordering::SeqCst);
        // Yield so driver loops on virtual time stay preemptible.
        std::thread::yield_now();
    }

    fn rand_below(&self, _bound: u32) -> u32 {
        0
    }
}

pub struct TestReserveScript {
    script: Script,
    pub kept: AtomicBool,
}

impl TestReserveScript {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            kept: AtomicBool::new(false),
        }
    }
}

impl ReserveScript for TestReserveScript {
    fn script(&self) -> Script {
        self.script.clone()
    }

    fn keep_script(&self) {
        self.kept.store(true, Ordering::SeqCst);
    }
}

/// A fully wired context plus handles to every fake.
pub struct TestNode {
    pub ctx: MinerContext,
    pub chain: Arc<TestChain>,
    pub utxo: Arc<TestUtxo>,
    pub wallet: Arc<TestWallet>,
    pub consensus: Arc<TestConsensus>,
    pub clock: Arc<TestClock>,
    pub network: Arc<TestNetwork>,
    pub pool: Arc<Mempool>,
}

impl TestNode {
    pub fn at_height(height: u32) -> Self {
        let chain = Arc::new(TestChain::with_height(height));
        let utxo = Arc::new(TestUtxo::default());
        let wallet = Arc::new(TestWallet::staking_ready(Hash256::digest(b"stake-serial")));
        let consensus = Arc::new(TestConsensus::easy());
        let clock = Arc::new(TestClock::at(1_700_000_100));
        let network = Arc::new(TestNetwork {
            peers: AtomicUsize::new(1),
        });
        let pool = Arc::new(Mempool::new());

        let ctx = MinerContext {
            chain: chain.clone(),
            utxo: utxo.clone(),
            wallet: Some(wallet.clone()),
            consensus: consensus.clone(),
            accumulator: Arc::new(TestAccumulator),
            network: network.clone(),
            clock: clock.clone(),
            pool: pool.clone(),
            chain_guard: Arc::new(ReentrantMutex::new(())),
            params: Arc::new(ChainParams::mainnet()),
        };
        Self {
            ctx,
            chain,
            utxo,
            wallet,
            consensus,
            clock,
            network,
            pool,
        }
    }

    pub fn without_wallet(mut self) -> Self {
        self.ctx.wallet = None;
        self
    }
}

/// A coinstake spending `serial`: empty marker slot plus the stake payout.
pub fn coinstake_tx(serial: Hash256) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::shielded_spend(serial)],
        outputs: vec![
            TxOutput::empty(),
            TxOutput::standard(50 * 100_000_000, Script::new(vec![0x51])),
        ],
        lock_time: 0,
    }
}

/// Plain standard transaction with a unique unconfirmed-looking prevout.
pub fn standard_tx(tag: &[u8], value: Amount) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::standard(OutPoint::new(Hash256::digest(tag), 0))],
        outputs: vec![TxOutput::standard(value, Script::new(tag.to_vec()))],
        lock_time: 0,
    }
}

/// Standard transaction spending an in-pool parent.
pub fn child_tx(parent: TxId, vout: u32, tag: &[u8], value: Amount) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::standard(OutPoint::new(parent, vout))],
        outputs: vec![TxOutput::standard(value, Script::new(tag.to_vec()))],
        lock_time: 0,
    }
}

/// Shielded spend revealing `serial`, paying `value` to `tag`.
pub fn shielded_spend_tx(serial: Hash256, tag: &[u8], value: Amount) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::shielded_spend(serial)],
        outputs: vec![TxOutput::standard(value, Script::new(tag.to_vec()))],
        lock_time: 0,
    }
}

/// Shielded mint committing to `pubcoin`.
pub fn shielded_mint_tx(pubcoin: Hash256, tag: &[u8]) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::standard(OutPoint::new(Hash256::digest(tag), 0))],
        outputs: vec![TxOutput::Shielded {
            pubcoin_hash: pubcoin,
            commitment: vec![0u8; 33],
        }],
        lock_time: 0,
    }
}

pub fn add_tx(pool: &Mempool, tx: Transaction, fee: Amount, vsize: u64) -> TxId {
    pool.insert(CandidateTx::new(tx, fee, vsize, 4)).unwrap()
}
