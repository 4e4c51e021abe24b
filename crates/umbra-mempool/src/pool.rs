//! Candidate pool implementation.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::debug;
use umbra_primitives::InputKind;

use crate::{AncestorScoreKey, CandidateTx, MempoolError, MempoolResult, PoolEntry, TxId};

/// Exclusive guard held by a template build while it iterates the pool.
pub struct BuildGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// Candidate transaction pool.
///
/// Entries are keyed by txid; ancestry is tracked as parent/child
/// adjacency over in-pool transactions. Prevouts that don't resolve to a
/// pool entry are treated as confirmed.
pub struct Mempool {
    entries: DashMap<TxId, PoolEntry>,
    parents: DashMap<TxId, HashSet<TxId>>,
    children: DashMap<TxId, HashSet<TxId>>,
    score_index: RwLock<BTreeSet<AncestorScoreKey>>,
    build_lock: Mutex<()>,
    arrival_counter: AtomicU64,
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            parents: DashMap::new(),
            children: DashMap::new(),
            score_index: RwLock::new(BTreeSet::new()),
            build_lock: Mutex::new(()),
            arrival_counter: AtomicU64::new(0),
        }
    }

    /// Insert a candidate, computing its ancestor aggregates.
    pub fn insert(&self, candidate: CandidateTx) -> MempoolResult<TxId> {
        let txid = candidate.tx.txid();
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.hex()));
        }

        let direct_parents: HashSet<TxId> = candidate
            .tx
            .inputs
            .iter()
            .filter(|input| matches!(input.kind, InputKind::Standard))
            .filter(|input| !input.prevout.is_null())
            .map(|input| input.prevout.txid)
            .filter(|parent| self.entries.contains_key(parent))
            .collect();

        let ancestors = self.closure(&direct_parents, &self.parents);

        let mod_fee = candidate.fee + candidate.fee_delta;
        let mut count = 1u64;
        let mut size = candidate.vsize;
        let mut fees = mod_fee;
        let mut sigops = candidate.sigop_cost;
        for ancestor in &ancestors {
            if let Some(entry) = self.entries.get(ancestor) {
                count += 1;
                size += entry.vsize();
                fees += entry.modified_fee();
                sigops += entry.sigop_cost();
            }
        }

        let arrival = self.arrival_counter.fetch_add(1, Ordering::Relaxed);
        let entry = PoolEntry::new(candidate, txid, arrival, count, size, fees, sigops);

        self.score_index
            .write()
            .insert(AncestorScoreKey::new(fees, size, txid));
        for parent in &direct_parents {
            self.children.entry(*parent).or_default().insert(txid);
        }
        self.parents.insert(txid, direct_parents);
        self.entries.insert(txid, entry);

        debug!(tx = %txid, count = self.entries.len(), "transaction entered pool");
        Ok(txid)
    }

    pub fn get(&self, txid: &TxId) -> Option<PoolEntry> {
        self.entries.get(txid).map(|e| e.clone())
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// In-pool ancestor closure of `txid`, excluding `txid` itself.
    /// No count/size limits: the selector wants the full package.
    pub fn ancestors_of(&self, txid: &TxId) -> HashSet<TxId> {
        let seed: HashSet<TxId> = self
            .parents
            .get(txid)
            .map(|p| p.clone())
            .unwrap_or_default();
        self.closure(&seed, &self.parents)
    }

    /// In-pool descendant closure of `txid`, excluding `txid` itself.
    pub fn descendants_of(&self, txid: &TxId) -> HashSet<TxId> {
        let seed: HashSet<TxId> = self
            .children
            .get(txid)
            .map(|c| c.clone())
            .unwrap_or_default();
        self.closure(&seed, &self.children)
    }

    /// Evict a transaction and everything that depends on it.
    pub fn remove_recursive(&self, txid: &TxId) -> usize {
        let mut doomed = self.descendants_of(txid);
        doomed.insert(*txid);

        let mut removed = 0usize;
        for victim in &doomed {
            let Some((_, entry)) = self.entries.remove(victim) else {
                continue;
            };
            removed += 1;
            self.score_index.write().remove(&AncestorScoreKey::new(
                entry.mod_fees_with_ancestors(),
                entry.size_with_ancestors(),
                *victim,
            ));
            if let Some((_, parents)) = self.parents.remove(victim) {
                for parent in parents {
                    if let Some(mut siblings) = self.children.get_mut(&parent) {
                        siblings.remove(victim);
                    }
                }
            }
            self.children.remove(victim);
        }
        if removed > 0 {
            debug!(tx = %txid, removed, "recursively evicted");
        }
        removed
    }

    /// Snapshot of all handles in ancestor-score order (best first).
    /// Immutable for the duration of one template build.
    pub fn by_ancestor_score(&self) -> Vec<TxId> {
        self.score_index.read().iter().map(|k| k.txid).collect()
    }

    /// Non-blocking exclusive guard for template assembly. `None` means
    /// another build holds the pool; the caller retries later.
    pub fn try_build_guard(&self) -> Option<BuildGuard<'_>> {
        self.build_lock.try_lock().map(BuildGuard)
    }

    fn closure(&self, seed: &HashSet<TxId>, edges: &DashMap<TxId, HashSet<TxId>>) -> HashSet<TxId> {
        let mut out: HashSet<TxId> = HashSet::new();
        let mut queue: VecDeque<TxId> = seed.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if !out.insert(next) {
                continue;
            }
            if let Some(adjacent) = edges.get(&next) {
                queue.extend(adjacent.iter().copied());
            }
        }
        out
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}
