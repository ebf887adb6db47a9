/// Flash loan fee math
///
/// The program computes fees with two truncating divisions in a fixed order:
/// `((amount * (loan_fee + extra_fee)) / fee_denominator) / percent_divisor`.
/// The product is formed before anything is truncated; dividing the amount
/// first can come out one unit short of the program and fail the repay check.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub const LOAN_FEE: u64 = 900;
pub const REFERRAL_FEE: u64 = 50;
pub const ADMIN_FEE: u64 = 50;
pub const LOAN_FEE_DENOMINATOR: u64 = 10_000;
pub const ONE_HUNDRED: u64 = 100;

/// Where the non-pool share of a flash loan fee goes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum FeeRecipient {
    /// No recipient account is passed; the referral rate is still charged
    #[default]
    None,
    /// A referral token account that receives the referral share
    Referral(#[serde(with = "crate::config::pubkey_string")] Pubkey),
    /// A protocol admin wallet; its canonical token account receives the admin share
    FixedRecipient(#[serde(with = "crate::config::pubkey_string")] Pubkey),
}

impl FeeRecipient {
    pub fn is_none(&self) -> bool {
        matches!(self, FeeRecipient::None)
    }
}

/// Fee rates, expressed over `fee_denominator` and then `percent_divisor`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub loan_fee_rate: u64,
    pub referral_fee_rate: u64,
    pub admin_fee_rate: u64,
    pub fee_denominator: u64,
    pub percent_divisor: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            loan_fee_rate: LOAN_FEE,
            referral_fee_rate: REFERRAL_FEE,
            admin_fee_rate: ADMIN_FEE,
            fee_denominator: LOAN_FEE_DENOMINATOR,
            percent_divisor: ONE_HUNDRED,
        }
    }
}

/// Amount owed back to the pool for a single loan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepaymentQuote {
    /// Borrowed amount
    pub amount: u64,
    /// Loan fee plus the recipient's share
    pub total_fees: u64,
    /// `amount + total_fees`, the minimum the repay instruction must move
    pub repayment_amount: u64,
}

impl FeeSchedule {
    /// Rate charged on top of the loan fee for the given recipient
    ///
    /// The fixed-recipient scheme charges the admin rate twice since no
    /// referral is ever paid alongside it.
    pub fn extra_fee_rate(&self, recipient: &FeeRecipient) -> Result<u64> {
        match recipient {
            FeeRecipient::None | FeeRecipient::Referral(_) => Ok(self.referral_fee_rate),
            FeeRecipient::FixedRecipient(_) => self
                .admin_fee_rate
                .checked_mul(2)
                .ok_or_else(|| rate_overflow("admin_fee_rate")),
        }
    }

    /// Total fees on `amount` for the given recipient
    pub fn total_fees(&self, amount: u64, recipient: &FeeRecipient) -> Result<u64> {
        let rate = self
            .loan_fee_rate
            .checked_add(self.extra_fee_rate(recipient)?)
            .ok_or_else(|| rate_overflow("loan_fee_rate"))?;
        self.apply_rate(amount, rate)
    }

    /// The part of the fee routed to the recipient account
    pub fn recipient_share(&self, amount: u64, recipient: &FeeRecipient) -> Result<u64> {
        match recipient {
            FeeRecipient::None => Ok(0),
            _ => self.apply_rate(amount, self.extra_fee_rate(recipient)?),
        }
    }

    /// Quote the repayment owed for borrowing `amount`
    pub fn quote(&self, amount: u64, recipient: &FeeRecipient) -> Result<RepaymentQuote> {
        let total_fees = self.total_fees(amount, recipient)?;
        let repayment_amount = amount
            .checked_add(total_fees)
            .ok_or(ClientError::RepaymentOverflow { amount })?;

        Ok(RepaymentQuote {
            amount,
            total_fees,
            repayment_amount,
        })
    }

    /// Shorthand for `quote(..).repayment_amount`
    pub fn repayment_amount(&self, amount: u64, recipient: &FeeRecipient) -> Result<u64> {
        Ok(self.quote(amount, recipient)?.repayment_amount)
    }

    /// Reject zero divisors and rates whose sum does not fit in a u64
    pub fn validate(&self) -> Result<()> {
        if self.fee_denominator == 0 || self.percent_divisor == 0 {
            return Err(ClientError::Config(
                "fee denominator and percent divisor must be non-zero".to_string(),
            ));
        }
        for recipient in [FeeRecipient::None, FeeRecipient::FixedRecipient(Pubkey::default())] {
            self.loan_fee_rate
                .checked_add(self.extra_fee_rate(&recipient)?)
                .ok_or_else(|| rate_overflow("loan_fee_rate"))?;
        }
        Ok(())
    }

    fn apply_rate(&self, amount: u64, rate: u64) -> Result<u64> {
        if self.fee_denominator == 0 || self.percent_divisor == 0 {
            return Err(ClientError::Config(
                "fee denominator and percent divisor must be non-zero".to_string(),
            ));
        }
        let scaled = (amount as u128) * (rate as u128);
        let fees = scaled / self.fee_denominator as u128 / self.percent_divisor as u128;
        u64::try_from(fees).map_err(|_| ClientError::RepaymentOverflow { amount })
    }
}

fn rate_overflow(field: &str) -> ClientError {
    ClientError::Config(format!("{} pushes the combined fee rate past u64", field))
}
