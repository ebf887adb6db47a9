use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors raised while resolving ledger state or assembling instructions
#[derive(Debug, Error)]
pub enum ClientError {
    /// No bump seed in the allowed range yields an off-curve pool address
    #[error("no viable bump seed for the pool authority of mint {mint}")]
    NoViableBump { mint: Pubkey },

    /// The pool record has not been created yet
    #[error("pool {pool} for mint {mint} is not initialized")]
    PoolNotInitialized { pool: Pubkey, mint: Pubkey },

    /// An account exists but belongs to a different program
    #[error("account {address} is owned by {actual}, expected {expected}")]
    UnexpectedOwner {
        address: Pubkey,
        expected: Pubkey,
        actual: Pubkey,
    },

    /// The pool record could not be decoded
    #[error("invalid pool authority data at {address}: {reason}")]
    InvalidPoolData { address: Pubkey, reason: String },

    /// `amount + fees` does not fit in a u64
    #[error("repayment for a loan of {amount} overflows u64")]
    RepaymentOverflow { amount: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Rpc(#[from] solana_client::client_error::ClientError),

    /// Failure reported by a non-RPC ledger reader
    #[error("ledger query failed: {0}")]
    Ledger(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, ClientError>;
