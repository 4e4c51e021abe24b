//! Monetary amounts and fee rates.

/// Amount in base units. Signed so fee deltas and the coinbase fee slot
/// (recorded as the negated fee total) stay representable.
pub type Amount = i64;

/// Base units per UMB.
pub const COIN: Amount = 100_000_000;

/// Fee rate in base units per 1000 virtual bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeRate(Amount);

impl FeeRate {
    /// Create a fee rate of `per_kvb` base units per 1000 vbytes.
    pub const fn per_kvb(per_kvb: Amount) -> Self {
        Self(per_kvb)
    }

    /// Derive the rate paid by `fee` over `size` vbytes.
    pub fn from_fee(fee: Amount, size: u64) -> Self {
        if size == 0 {
            Self(0)
        } else {
            Self(fee.saturating_mul(1000) / size as Amount)
        }
    }

    /// Fee owed at this rate for a transaction of `size` vbytes.
    pub fn fee(&self, size: u64) -> Amount {
        self.0.saturating_mul(size as Amount) / 1000
    }

    /// The raw rate in base units per 1000 vbytes.
    pub fn per_kvb_value(&self) -> Amount {
        self.0
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:08}/kvB", self.0 / COIN, (self.0 % COIN).abs())
    }
}
