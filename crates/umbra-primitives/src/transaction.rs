//! Transactions.

use crate::amount::Amount;
use crate::hash::{blake2b_256, Hash256};
use crate::script::Script;
use crate::{LOCKTIME_THRESHOLD, SEQUENCE_FINAL};

/// Reference to an output of a prior transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The null prevout carried by coinbase inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

/// How an input is satisfied.
///
/// Shielded spends and anon inputs carry their own validity proofs, so the
/// UTXO view is never consulted for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Plain input spending a standard output.
    Standard,
    /// Zero-knowledge spend revealing a serial hash.
    ShieldedSpend { serial_hash: Hash256 },
    /// Ring-signature input.
    Anon,
}

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
    pub kind: InputKind,
}

impl TxInput {
    pub fn standard(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Script::empty(),
            sequence: SEQUENCE_FINAL,
            witness: Vec::new(),
            kind: InputKind::Standard,
        }
    }

    /// Coinbase input: null prevout, scriptsig set by the assembler.
    pub fn coinbase(script_sig: Script) -> Self {
        Self {
            prevout: OutPoint::null(),
            script_sig,
            sequence: SEQUENCE_FINAL,
            witness: Vec::new(),
            kind: InputKind::Standard,
        }
    }

    pub fn shielded_spend(serial_hash: Hash256) -> Self {
        Self {
            prevout: OutPoint::null(),
            script_sig: Script::empty(),
            sequence: SEQUENCE_FINAL,
            witness: Vec::new(),
            kind: InputKind::ShieldedSpend { serial_hash },
        }
    }
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutput {
    /// Transparent value to a script.
    Standard { value: Amount, script_pubkey: Script },
    /// Shielded mint committing to a pubcoin.
    Shielded {
        pubcoin_hash: Hash256,
        commitment: Vec<u8>,
    },
}

impl TxOutput {
    pub fn standard(value: Amount, script_pubkey: Script) -> Self {
        Self::Standard {
            value,
            script_pubkey,
        }
    }

    /// The zero-value, empty-script slot used by PoS coinbases and the
    /// coinstake marker.
    pub fn empty() -> Self {
        Self::Standard {
            value: 0,
            script_pubkey: Script::empty(),
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self, Self::Standard { .. })
    }

    pub fn is_empty_marker(&self) -> bool {
        matches!(self, Self::Standard { value: 0, script_pubkey } if script_pubkey.is_empty())
    }

    pub fn value(&self) -> Option<Amount> {
        match self {
            Self::Standard { value, .. } => Some(*value),
            Self::Shielded { .. } => None,
        }
    }

    pub fn script_pubkey(&self) -> Option<&Script> {
        match self {
            Self::Standard { script_pubkey, .. } => Some(script_pubkey),
            Self::Shielded { .. } => None,
        }
    }
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Transaction id: hash of the encoding without witness data.
    pub fn txid(&self) -> Hash256 {
        blake2b_256(&self.encode(false))
    }

    /// Witness transaction id: hash of the full encoding.
    pub fn wtxid(&self) -> Hash256 {
        blake2b_256(&self.encode(true))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prevout.is_null()
            && matches!(self.inputs[0].kind, InputKind::Standard)
    }

    /// Coinstakes are wallet-built shielded spends whose first output is
    /// the empty marker slot.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && matches!(self.inputs[0].kind, InputKind::ShieldedSpend { .. })
            && self.outputs.first().map_or(false, TxOutput::is_empty_marker)
    }

    pub fn is_shielded_spend(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| matches!(i.kind, InputKind::ShieldedSpend { .. }))
    }

    pub fn is_shielded_mint(&self) -> bool {
        self.outputs.iter().any(|o| matches!(o, TxOutput::Shielded { .. }))
    }

    /// Serial hashes revealed by this transaction's shielded spends.
    pub fn serial_hashes(&self) -> Vec<Hash256> {
        self.inputs
            .iter()
            .filter_map(|i| match i.kind {
                InputKind::ShieldedSpend { serial_hash } => Some(serial_hash),
                _ => None,
            })
            .collect()
    }

    /// Pubcoin hashes committed by this transaction's shielded mints.
    pub fn pubcoin_hashes(&self) -> Vec<Hash256> {
        self.outputs
            .iter()
            .filter_map(|o| match o {
                TxOutput::Shielded { pubcoin_hash, .. } => Some(*pubcoin_hash),
                _ => None,
            })
            .collect()
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|i| !i.witness.is_empty())
    }

    /// Locktime finality at the given height and cutoff time.
    pub fn is_final(&self, height: u32, locktime_cutoff: i64) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let cutoff = if self.lock_time < LOCKTIME_THRESHOLD {
            height as i64
        } else {
            locktime_cutoff
        };
        if (self.lock_time as i64) < cutoff {
            return true;
        }
        self.inputs.iter().all(|i| i.sequence == SEQUENCE_FINAL)
    }

    /// Canonical encoding; the id hashes omit witness data.
    pub fn encode(&self, include_witness: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            out.extend_from_slice(input.prevout.txid.as_bytes());
            out.extend_from_slice(&input.prevout.vout.to_le_bytes());
            match &input.kind {
                InputKind::Standard => out.push(0),
                InputKind::ShieldedSpend { serial_hash } => {
                    out.push(1);
                    out.extend_from_slice(serial_hash.as_bytes());
                }
                InputKind::Anon => out.push(2),
            }
            out.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            out.extend_from_slice(input.script_sig.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
            if include_witness {
                out.extend_from_slice(&(input.witness.len() as u32).to_le_bytes());
                for item in &input.witness {
                    out.extend_from_slice(&(item.len() as u32).to_le_bytes());
                    out.extend_from_slice(item);
                }
            }
        }
        out.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            match output {
                TxOutput::Standard {
                    value,
                    script_pubkey,
                } => {
                    out.push(0);
                    out.extend_from_slice(&value.to_le_bytes());
                    out.extend_from_slice(&(script_pubkey.len() as u32).to_le_bytes());
                    out.extend_from_slice(script_pubkey.as_bytes());
                }
                TxOutput::Shielded {
                    pubcoin_hash,
                    commitment,
                } => {
                    out.push(1);
                    out.extend_from_slice(pubcoin_hash.as_bytes());
                    out.extend_from_slice(&(commitment.len() as u32).to_le_bytes());
                    out.extend_from_slice(commitment);
                }
            }
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }
}
