//! Shared extra-nonce state for proof-of-work threads.

use parking_lot::Mutex;
use umbra_primitives::Hash256;

#[derive(Default)]
struct NonceInner {
    base: u32,
    tip: Hash256,
    start_time: i64,
    hashes: u64,
}

/// Cross-thread extra-nonce counter and hash-rate accumulator.
///
/// Each PoW thread reserves a distinct extra nonce per template so
/// concurrent miners never search the same coinbase. The counter resets
/// whenever the tip changes.
#[derive(Default)]
pub struct ExtraNonceState {
    inner: Mutex<NonceInner>,
}

impl ExtraNonceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next extra nonce for a template building on `tip_hash`.
    /// Values are strictly increasing until the tip changes.
    pub fn reserve(&self, tip_hash: Hash256, now: i64) -> u32 {
        let mut inner = self.inner.lock();
        if inner.tip != tip_hash {
            inner.base = 0;
            inner.tip = tip_hash;
        }
        if inner.start_time == 0 {
            inner.start_time = now;
        }
        inner.base += 1;
        inner.base
    }

    /// Accumulate hashes tried; returns the running rate in kh/s once a
    /// full second has elapsed.
    pub fn record_hashes(&self, hashes: u64, now: i64) -> Option<f64> {
        let mut inner = self.inner.lock();
        inner.hashes += hashes;
        let elapsed = now - inner.start_time;
        if inner.start_time > 0 && elapsed > 0 {
            Some(inner.hashes as f64 / 1000.0 / elapsed as f64)
        } else {
            None
        }
    }
}
