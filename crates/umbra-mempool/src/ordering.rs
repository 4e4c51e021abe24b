//! Ancestor-feerate ordering.

use std::cmp::Ordering;

use umbra_primitives::Amount;

use crate::TxId;

/// Compare two packages by ancestor feerate, higher first.
///
/// Exact integer cross-multiplication: `fees_a / size_a > fees_b / size_b`
/// iff `fees_a * size_b > fees_b * size_a`. Equal feerates fall through to
/// the caller's tie-break.
pub fn compare_ancestor_score(
    fees_a: Amount,
    size_a: u64,
    fees_b: Amount,
    size_b: u64,
) -> Ordering {
    let lhs = fees_a as i128 * size_b as i128;
    let rhs = fees_b as i128 * size_a as i128;
    rhs.cmp(&lhs)
}

/// Ordered-index key: ancestor feerate descending, txid ascending.
///
/// The txid tie-break keeps iteration deterministic for a given pool
/// snapshot, so two builds over the same snapshot pick identical packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorScoreKey {
    pub mod_fees_with_ancestors: Amount,
    pub size_with_ancestors: u64,
    pub txid: TxId,
}

impl AncestorScoreKey {
    pub fn new(mod_fees_with_ancestors: Amount, size_with_ancestors: u64, txid: TxId) -> Self {
        Self {
            mod_fees_with_ancestors,
            size_with_ancestors,
            txid,
        }
    }
}

impl PartialOrd for AncestorScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AncestorScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_ancestor_score(
            self.mod_fees_with_ancestors,
            self.size_with_ancestors,
            other.mod_fees_with_ancestors,
            other.size_with_ancestors,
        )
        .then_with(|| self.txid.cmp(&other.txid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use umbra_primitives::Hash256;

    fn id(seed: u8) -> TxId {
        Hash256::digest(&[seed])
    }

    #[test]
    fn higher_feerate_sorts_first() {
        let mut set = BTreeSet::new();
        set.insert(AncestorScoreKey::new(100, 100, id(1))); // 1.0
        set.insert(AncestorScoreKey::new(300, 100, id(2))); // 3.0
        set.insert(AncestorScoreKey::new(50, 100, id(3))); // 0.5
        let order: Vec<_> = set.iter().map(|k| k.txid).collect();
        assert_eq!(order, vec![id(2), id(1), id(3)]);
    }

    #[test]
    fn cross_multiplication_is_exact() {
        // 1000/3 vs 333/1: floats would call these equal-ish.
        assert_eq!(
            compare_ancestor_score(1000, 3, 333, 1),
            Ordering::Less // 1000 * 1 > 333 * 3 => a sorts first
        );
    }

    #[test]
    fn equal_feerate_breaks_on_txid() {
        let a = AncestorScoreKey::new(200, 100, id(9));
        let b = AncestorScoreKey::new(400, 200, id(4));
        // Same 2.0 feerate; lower txid wins.
        let expected = if id(4) < id(9) { b.txid } else { a.txid };
        let mut set = BTreeSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.iter().next().unwrap().txid, expected);
    }
}
