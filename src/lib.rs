//! Flash Loan Mastery SDK - client-side construction layer
//!
//! Builds the exact instruction sequences for the pooled flash-loan program:
//! pool initialization, deposits, withdrawals and the borrow/repay pair.
//!
//! Every builder works in two phases. The resolve phase performs the ledger
//! reads (pool record, existing token accounts) through a [`LedgerReader`];
//! the assemble phase in [`instruction::assembler`] is pure and synchronous.
//!
//! # Example Usage
//!
//! ```no_run
//! use flash_loan_mastery_sdk::prelude::*;
//! use solana_client::nonblocking::rpc_client::RpcClient;
//! use solana_sdk::pubkey::Pubkey;
//! use std::sync::Arc;
//!
//! # async fn run(borrower: Pubkey, mint: Pubkey) -> flash_loan_mastery_sdk::Result<()> {
//! let rpc = Arc::new(RpcClient::new("https://api.mainnet-beta.solana.com".to_string()));
//! // reads run at the configured commitment, not the one `rpc` was built with
//! let client = FlashLoanClient::over_rpc(ClientConfig::default(), rpc);
//!
//! let plan = client.flash_loan(&borrower, &mint, 1_000_000)?;
//! println!("must repay {}", plan.repayment_amount());
//!
//! // borrow, your own instructions, then repay - all in one transaction
//! let instructions = plan.wrap(vec![]);
//! # let _ = instructions;
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod client;
pub mod config;
pub mod error;
pub mod fees;
pub mod instruction;
pub mod ledger;
pub mod pairing;

// Re-export commonly used types
pub use accounts::address::{derive_associated_address, derive_bank_token, derive_pool_authority};
pub use accounts::resolver::{fetch_pool, resolve_token_account, PoolSnapshot};
pub use accounts::state::PoolAuthority;
pub use client::FlashLoanClient;
pub use config::{ClientConfig, DEFAULT_PROGRAM_ID};
pub use error::{ClientError, Result};
pub use fees::{FeeRecipient, FeeSchedule, RepaymentQuote};
pub use instruction::assembler::{
    BorrowPlan, DepositPlan, FlashLoanPlan, InitPoolPlan, PlannedInstruction, RepayPlan,
    WithdrawPlan,
};
pub use instruction::program::{FlashLoanInstruction, ProgramErrorCode};
pub use ledger::{CommittedRpc, LedgerReader, MemoryLedger};
pub use pairing::{check_pairing, PairingViolation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::FlashLoanClient;
    pub use crate::config::ClientConfig;
    pub use crate::fees::{FeeRecipient, FeeSchedule, RepaymentQuote};
    pub use crate::instruction::assembler::{FlashLoanPlan, PlannedInstruction};
    pub use crate::ledger::{LedgerReader, MemoryLedger};
}
