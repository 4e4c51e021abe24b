//! Package selection.
//!
//! Selection orders the pool by the fee rate of a transaction combined
//! with all of its unconfirmed ancestors. Entries are not removed from the
//! pool as they are selected, so the ancestor state of their descendants
//! goes stale mid-build; those descendants are re-scored in a modified
//! overlay, and every iteration compares the best overlay entry with the
//! next raw pool entry to decide which package to work on.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;
use umbra_mempool::{AncestorScoreKey, Mempool, PoolEntry, TxId};
use umbra_primitives::{Amount, FeeRate, COINBASE_WEIGHT_RESERVATION};

use crate::accounting::ResourceTracker;
use crate::BlockTemplate;

/// Give up when this many packages in a row fail the fit test and the
/// block is close to full.
const MAX_CONSECUTIVE_FAILURES: u64 = 1_000;

/// Counters reported by one selection run.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SelectionSummary {
    pub packages_selected: usize,
    pub descendants_updated: usize,
}

/// Overlay entry for a candidate whose pool aggregates are stale because
/// an ancestor was included in the block.
#[derive(Debug, Clone, Copy)]
struct ModifiedEntry {
    size_with_ancestors: u64,
    mod_fees_with_ancestors: Amount,
    sigops_with_ancestors: i64,
}

/// The modified overlay: by-handle lookup plus an ordered view sharing the
/// pool's ancestor-score comparator. Re-scoring is remove-and-reinsert so
/// the ordered view never holds a stale key.
#[derive(Default)]
struct ModifiedTxSet {
    by_txid: HashMap<TxId, ModifiedEntry>,
    ordered: BTreeSet<AncestorScoreKey>,
}

impl ModifiedTxSet {
    fn is_empty(&self) -> bool {
        self.by_txid.is_empty()
    }

    fn contains(&self, txid: &TxId) -> bool {
        self.by_txid.contains_key(txid)
    }

    fn get(&self, txid: &TxId) -> Option<&ModifiedEntry> {
        self.by_txid.get(txid)
    }

    /// Best-scoring overlay entry, if any.
    fn best(&self) -> Option<(TxId, ModifiedEntry)> {
        let key = self.ordered.iter().next()?;
        Some((key.txid, self.by_txid[&key.txid]))
    }

    fn remove(&mut self, txid: &TxId) -> Option<ModifiedEntry> {
        let entry = self.by_txid.remove(txid)?;
        self.ordered.remove(&AncestorScoreKey::new(
            entry.mod_fees_with_ancestors,
            entry.size_with_ancestors,
            *txid,
        ));
        Some(entry)
    }

    /// Subtract a newly-included ancestor's contribution from a
    /// descendant's aggregates, seeding the overlay from the pool entry
    /// on first touch.
    fn subtract_ancestor(&mut self, descendant: &PoolEntry, included: &PoolEntry) {
        let txid = descendant.txid();
        let mut entry = self.remove(&txid).unwrap_or(ModifiedEntry {
            size_with_ancestors: descendant.size_with_ancestors(),
            mod_fees_with_ancestors: descendant.mod_fees_with_ancestors(),
            sigops_with_ancestors: descendant.sigops_with_ancestors(),
        });
        entry.size_with_ancestors -= included.vsize();
        entry.mod_fees_with_ancestors -= included.modified_fee();
        entry.sigops_with_ancestors -= included.sigop_cost();

        self.ordered.insert(AncestorScoreKey::new(
            entry.mod_fees_with_ancestors,
            entry.size_with_ancestors,
            txid,
        ));
        self.by_txid.insert(txid, entry);
    }
}

/// One selection run over a pool snapshot.
pub(crate) struct PackageSelector<'a> {
    pub pool: &'a Mempool,
    pub tracker: &'a mut ResourceTracker,
    pub template: &'a mut BlockTemplate,
    pub height: u32,
    pub locktime_cutoff: i64,
    pub include_witness: bool,
    pub min_package_feerate: Option<FeeRate>,
    pub print_priority: bool,
}

impl PackageSelector<'_> {
    /// Fill the template until the block is full or the pool is exhausted.
    pub fn select(mut self) -> SelectionSummary {
        let mut summary = SelectionSummary::default();
        let mut modified = ModifiedTxSet::default();
        let mut failed: HashSet<TxId> = HashSet::new();

        // Seed the overlay with descendants of anything the caller
        // pre-placed in the block.
        let preplaced: HashSet<TxId> = self.tracker.in_block().clone();
        summary.descendants_updated += self.update_packages_for_added(&preplaced, &mut modified);

        let snapshot = self.pool.by_ancestor_score();
        let mut cursor = 0usize;
        let mut consecutive_failures = 0u64;

        loop {
            // Skip raw entries that are stale: already in the block,
            // re-scored in the overlay, or known failures.
            while cursor < snapshot.len() {
                let txid = &snapshot[cursor];
                if self.tracker.contains(txid) || modified.contains(txid) || failed.contains(txid) {
                    cursor += 1;
                } else {
                    break;
                }
            }
            if cursor >= snapshot.len() && modified.is_empty() {
                break;
            }

            // Pick the better of the raw head and the overlay head.
            let (candidate, using_modified) = if cursor >= snapshot.len() {
                let (txid, _) = modified.best().expect("overlay non-empty");
                (txid, true)
            } else {
                let raw = snapshot[cursor];
                let Some(raw_entry) = self.pool.get(&raw) else {
                    // Evicted since the snapshot was taken.
                    cursor += 1;
                    continue;
                };
                match modified.best() {
                    Some((mod_txid, m)) => {
                        let mod_key = AncestorScoreKey::new(
                            m.mod_fees_with_ancestors,
                            m.size_with_ancestors,
                            mod_txid,
                        );
                        let raw_key = AncestorScoreKey::new(
                            raw_entry.mod_fees_with_ancestors(),
                            raw_entry.size_with_ancestors(),
                            raw,
                        );
                        if mod_key < raw_key {
                            (mod_txid, true)
                        } else {
                            cursor += 1;
                            (raw, false)
                        }
                    }
                    None => {
                        cursor += 1;
                        (raw, false)
                    }
                }
            };

            debug_assert!(!self.tracker.contains(&candidate));

            let Some(candidate_entry) = self.pool.get(&candidate) else {
                if using_modified {
                    modified.remove(&candidate);
                }
                continue;
            };

            let (package_size, package_fees, package_sigops) = if using_modified {
                let m = modified.get(&candidate).expect("overlay entry present");
                (
                    m.size_with_ancestors,
                    m.mod_fees_with_ancestors,
                    m.sigops_with_ancestors,
                )
            } else {
                (
                    candidate_entry.size_with_ancestors(),
                    candidate_entry.mod_fees_with_ancestors(),
                    candidate_entry.sigops_with_ancestors(),
                )
            };

            // Optional fee floor. Later candidates only score lower, so
            // the first miss ends the run.
            if let Some(floor) = self.min_package_feerate {
                if package_fees < floor.fee(package_size) {
                    break;
                }
            }

            if !self.tracker.test_package(package_size, package_sigops) {
                if using_modified {
                    // The overlay always surfaces its best entry; drop a
                    // failed one so the next-best gets considered.
                    modified.remove(&candidate);
                    failed.insert(candidate);
                }

                consecutive_failures += 1;
                if consecutive_failures > MAX_CONSECUTIVE_FAILURES
                    && self.tracker.weight()
                        > self.tracker.max_weight() - COINBASE_WEIGHT_RESERVATION
                {
                    // Close to full and nothing fits; stop trying.
                    break;
                }
                continue;
            }

            // The package is the candidate plus its not-yet-included
            // in-pool ancestors.
            let mut package: HashSet<TxId> = self
                .pool
                .ancestors_of(&candidate)
                .into_iter()
                .filter(|ancestor| !self.tracker.contains(ancestor))
                .collect();
            package.insert(candidate);

            let mut entries: Vec<PoolEntry> =
                package.iter().filter_map(|txid| self.pool.get(txid)).collect();

            if !self
                .tracker
                .test_finality(&entries, self.height, self.locktime_cutoff, self.include_witness)
            {
                if using_modified {
                    modified.remove(&candidate);
                    failed.insert(candidate);
                }
                continue;
            }

            // This package makes it in; reset the failure streak.
            consecutive_failures = 0;

            // Ancestor count gives a dependency-safe inclusion order: a
            // child always counts more ancestors than its parents.
            entries.sort_by_key(|entry| (entry.count_with_ancestors(), entry.txid()));
            for entry in &entries {
                self.tracker.add(self.template, entry, self.print_priority);
                modified.remove(&entry.txid());
            }

            summary.packages_selected += 1;
            summary.descendants_updated += self.update_packages_for_added(&package, &mut modified);
        }

        debug!(
            packages = summary.packages_selected,
            descendants_updated = summary.descendants_updated,
            weight = self.tracker.weight(),
            "package selection finished"
        );
        summary
    }

    /// Re-score in-pool descendants of newly-included transactions.
    /// Returns the number of descendant updates applied.
    fn update_packages_for_added(
        &self,
        added: &HashSet<TxId>,
        modified: &mut ModifiedTxSet,
    ) -> usize {
        let mut updated = 0;
        for included in added {
            let Some(included_entry) = self.pool.get(included) else {
                continue;
            };
            for descendant in self.pool.descendants_of(included) {
                if added.contains(&descendant) {
                    continue;
                }
                let Some(descendant_entry) = self.pool.get(&descendant) else {
                    continue;
                };
                updated += 1;
                modified.subtract_ancestor(&descendant_entry, &included_entry);
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_mempool::CandidateTx;
    use umbra_primitives::{Hash256, OutPoint, Script, Transaction, TxInput, TxOutput};

    fn tx_spending(prevouts: &[(TxId, u32)], tag: u8) -> Transaction {
        let inputs = if prevouts.is_empty() {
            vec![TxInput::standard(OutPoint::new(Hash256::digest(&[tag]), 0))]
        } else {
            prevouts
                .iter()
                .map(|(txid, vout)| TxInput::standard(OutPoint::new(*txid, *vout)))
                .collect()
        };
        Transaction {
            version: 1,
            inputs,
            outputs: vec![TxOutput::standard(tag as i64 * 1000, Script::new(vec![tag]))],
            lock_time: 0,
        }
    }

    fn run_selector(
        pool: &Mempool,
        tracker: &mut ResourceTracker,
        template: &mut BlockTemplate,
    ) -> SelectionSummary {
        PackageSelector {
            pool,
            tracker,
            template,
            height: 100,
            locktime_cutoff: 0,
            include_witness: true,
            min_package_feerate: None,
            print_priority: false,
        }
        .select()
    }

    fn included_ids(template: &BlockTemplate) -> Vec<TxId> {
        template.block.txs[1..].iter().map(|tx| tx.txid()).collect()
    }

    #[test]
    fn parent_precedes_child_and_package_beats_loner() {
        let pool = Mempool::new();
        let a = pool
            .insert(CandidateTx::new(tx_spending(&[], 1), 100, 100, 1))
            .unwrap();
        let b = pool
            .insert(CandidateTx::new(tx_spending(&[(a, 0)], 2), 200, 100, 1))
            .unwrap();
        let c = pool
            .insert(CandidateTx::new(tx_spending(&[], 3), 50, 100, 1))
            .unwrap();

        let mut tracker = ResourceTracker::new(3_996_000);
        let mut template = BlockTemplate::new(100);
        let summary = run_selector(&pool, &mut tracker, &mut template);

        // {A,B} at 1.5 beats C at 0.5; A precedes B.
        assert_eq!(included_ids(&template), vec![a, b, c]);
        assert_eq!(summary.packages_selected, 2);
        assert_eq!(tracker.fees(), 350);
    }

    #[test]
    fn overlay_rescores_descendant_after_parent_inclusion() {
        let pool = Mempool::new();
        // Parent rich, child poor: the child rides in on the parent's
        // score only through the package; once the parent is included the
        // child is re-scored alone.
        let rich = pool
            .insert(CandidateTx::new(tx_spending(&[], 1), 1_000, 100, 1))
            .unwrap();
        let poor_child = pool
            .insert(CandidateTx::new(tx_spending(&[(rich, 0)], 2), 10, 100, 1))
            .unwrap();
        let middling = pool
            .insert(CandidateTx::new(tx_spending(&[], 3), 500, 100, 1))
            .unwrap();

        let mut tracker = ResourceTracker::new(3_996_000);
        let mut template = BlockTemplate::new(100);
        let summary = run_selector(&pool, &mut tracker, &mut template);

        // rich (10.0) first; child re-scored at 0.1 drops behind middling.
        assert_eq!(included_ids(&template), vec![rich, middling, poor_child]);
        assert!(summary.descendants_updated >= 1);
    }

    #[test]
    fn weight_cap_respected() {
        let pool = Mempool::new();
        for tag in 0..20u8 {
            pool.insert(CandidateTx::new(tx_spending(&[], tag), 1_000, 400, 1))
                .unwrap();
        }
        // Room for 4000 + 4 * 400 * n < 8000 => n <= 2 (strict).
        let mut tracker = ResourceTracker::new(8_000);
        let mut template = BlockTemplate::new(100);
        run_selector(&pool, &mut tracker, &mut template);

        assert_eq!(tracker.tx_count(), 2);
        assert!(tracker.weight() <= 8_000);
    }

    #[test]
    fn exact_boundary_tx_included() {
        let pool = Mempool::new();
        // 4 * 999 = 3996; 4000 + 3996 = 7996 < 8000.
        pool.insert(CandidateTx::new(tx_spending(&[], 1), 1_000, 999, 1))
            .unwrap();
        pool.insert(CandidateTx::new(tx_spending(&[], 2), 10, 10, 1))
            .unwrap();

        let mut tracker = ResourceTracker::new(8_000);
        let mut template = BlockTemplate::new(100);
        run_selector(&pool, &mut tracker, &mut template);

        assert_eq!(tracker.tx_count(), 1);
        assert_eq!(tracker.weight(), 7_996);
    }

    #[test]
    fn fee_floor_stops_selection() {
        let pool = Mempool::new();
        pool.insert(CandidateTx::new(tx_spending(&[], 1), 1_000, 100, 1))
            .unwrap();
        pool.insert(CandidateTx::new(tx_spending(&[], 2), 1, 100, 1))
            .unwrap();

        let mut tracker = ResourceTracker::new(3_996_000);
        let mut template = BlockTemplate::new(100);
        PackageSelector {
            pool: &pool,
            tracker: &mut tracker,
            template: &mut template,
            height: 100,
            locktime_cutoff: 0,
            include_witness: true,
            min_package_feerate: Some(FeeRate::per_kvb(100)),
            print_priority: false,
        }
        .select();

        // 1000/100vB clears a 100/kvB floor; 1/100vB does not.
        assert_eq!(tracker.tx_count(), 1);
    }

    #[test]
    fn near_full_failure_streak_terminates() {
        let pool = Mempool::new();
        // 1002 oversized candidates at high fee rates, then one tiny tx
        // that would fit. Termination after the 1001st failure must leave
        // the tiny tx unexamined.
        for i in 0..1002u32 {
            let tag = [0xee, (i >> 8) as u8, i as u8];
            let tx = Transaction {
                version: 1,
                inputs: vec![TxInput::standard(OutPoint::new(Hash256::digest(&tag), 0))],
                outputs: vec![TxOutput::standard(1, Script::new(tag.to_vec()))],
                lock_time: 0,
            };
            pool.insert(CandidateTx::new(tx, 1_000_000, 2_000, 1)).unwrap();
        }
        pool.insert(CandidateTx::new(tx_spending(&[], 7), 1, 10, 1))
            .unwrap();

        // weight starts at 4000 > 7999 - 4000, so the near-full clause is
        // armed from the first failure.
        let mut tracker = ResourceTracker::new(7_999);
        let mut template = BlockTemplate::new(100);
        run_selector(&pool, &mut tracker, &mut template);

        assert_eq!(tracker.tx_count(), 0);
    }

    #[test]
    fn non_final_package_skipped() {
        let pool = Mempool::new();
        let mut locked = tx_spending(&[], 1);
        locked.lock_time = 200;
        locked.inputs[0].sequence = 0;
        pool.insert(CandidateTx::new(locked, 1_000, 100, 1)).unwrap();
        let free = pool
            .insert(CandidateTx::new(tx_spending(&[], 2), 10, 100, 1))
            .unwrap();

        let mut tracker = ResourceTracker::new(3_996_000);
        let mut template = BlockTemplate::new(100);
        run_selector(&pool, &mut tracker, &mut template);

        assert_eq!(included_ids(&template), vec![free]);
    }

    #[test]
    fn selection_is_deterministic() {
        let build = || {
            let pool = Mempool::new();
            let a = pool
                .insert(CandidateTx::new(tx_spending(&[], 1), 100, 100, 1))
                .unwrap();
            pool.insert(CandidateTx::new(tx_spending(&[(a, 0)], 2), 200, 100, 1))
                .unwrap();
            pool.insert(CandidateTx::new(tx_spending(&[], 3), 100, 100, 1))
                .unwrap();
            pool.insert(CandidateTx::new(tx_spending(&[], 4), 100, 100, 1))
                .unwrap();
            let mut tracker = ResourceTracker::new(3_996_000);
            let mut template = BlockTemplate::new(100);
            run_selector(&pool, &mut tracker, &mut template);
            included_ids(&template)
        };
        assert_eq!(build(), build());
    }
}
