//! Mining error types.

use thiserror::Error;
use umbra_mempool::MempoolError;

/// Mining errors.
///
/// Everything except `Cancelled` is soft from the drivers' point of view:
/// the template is discarded, a line is logged, and the loop retries on
/// its schedule. `Cancelled` propagates to thread exit.
#[derive(Error, Debug)]
pub enum MiningError {
    /// Proof-of-stake template requested with no main wallet.
    #[error("No main wallet available for proof-of-stake")]
    WalletUnavailable,

    /// The wallet could not produce a coinstake.
    #[error("Coinstake creation failed: {0}")]
    CoinstakeFailed(String),

    /// The mempool build guard could not be acquired.
    #[error("Mempool is busy")]
    MempoolBusy,

    /// The assembled template failed the pre-submit validity check.
    #[error("Template failed validity check: {0}")]
    TemplateInvalid(String),

    /// Block signing failed (missing key or signature error).
    #[error("Block signing failed: {0}")]
    SignFailed(String),

    /// Cooperative interruption.
    #[error("Mining interrupted")]
    Cancelled,

    /// Mempool error.
    #[error("Mempool error: {0}")]
    Mempool(#[from] MempoolError),

    /// Other error.
    #[error("{0}")]
    Internal(String),
}

/// Result type for mining operations.
pub type MiningResult<T> = Result<T, MiningError>;
