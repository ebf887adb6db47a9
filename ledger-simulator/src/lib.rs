#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! Flash Loan Mastery ledger simulator
//!
//! A native processor that accepts the same instructions as the on-chain
//! flash loan program and enforces the same checks: derived addresses, pool
//! binding, borrow/repay pairing through instruction introspection, and the
//! repayment amount. It runs inside `solana-program-test` so the client's
//! instruction plans can be executed end to end.
//!
//! [`Processor::process`] charges the referral scheme;
//! [`Processor::process_fixed_admin`] charges the doubled admin rate and pays
//! it to the token account of [`fees::FIXED_ADMIN`].

/// Fee constants and arithmetic applied by the program
pub mod fees;
/// Instructions sysvar scanning for the borrow/repay pairing rule
pub mod introspection;
/// Instruction processing logic
pub mod processor;

pub use processor::Processor;
