use solana_program::{program_error::ProgramError, pubkey::Pubkey};

/// Loan fee rate
pub const LOAN_FEE: u64 = 900;
/// Referral fee rate, charged whether or not a referral account is passed
pub const REFERRAL_FEE: u64 = 50;
/// Admin fee rate, charged twice under [`FeeScheme::FixedAdmin`]
pub const ADMIN_FEE: u64 = 50;
/// First divisor
pub const LOAN_FEE_DENOMINATOR: u64 = 10_000;
/// Second divisor
pub const ONE_HUNDRED: u64 = 100;

/// Admin wallet of a [`FeeScheme::FixedAdmin`] build; its canonical token
/// account is the only accepted fee recipient
pub const FIXED_ADMIN: Pubkey = Pubkey::new_from_array([0xad; 32]);

/// How a program build charges and routes the extra fee
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeScheme {
    /// Referral rate on top of the loan rate, paid to an optional seventh account
    Referral,
    /// Doubled admin rate on top of the loan rate, paid to the admin's token account
    FixedAdmin,
}

impl FeeScheme {
    /// Rate charged on top of [`LOAN_FEE`]
    pub fn extra_fee_rate(self) -> u64 {
        match self {
            FeeScheme::Referral => REFERRAL_FEE,
            FeeScheme::FixedAdmin => ADMIN_FEE * 2,
        }
    }

    /// Minimum amount a repay must return for a borrow of `amount`
    pub fn required_repayment(self, amount: u64) -> Result<u64, ProgramError> {
        let fees = fee_at_rate(amount, LOAN_FEE + self.extra_fee_rate())?;
        amount
            .checked_add(fees)
            .ok_or(ProgramError::ArithmeticOverflow)
    }

    /// Portion of the fee on `amount` paid out to the fee recipient
    pub fn recipient_share(self, amount: u64) -> Result<u64, ProgramError> {
        fee_at_rate(amount, self.extra_fee_rate())
    }
}

fn fee_at_rate(amount: u64, rate: u64) -> Result<u64, ProgramError> {
    let fee = (amount as u128)
        .checked_mul(rate as u128)
        .and_then(|v| v.checked_div(LOAN_FEE_DENOMINATOR as u128))
        .and_then(|v| v.checked_div(ONE_HUNDRED as u128))
        .ok_or(ProgramError::ArithmeticOverflow)?;
    u64::try_from(fee).map_err(|_| ProgramError::ArithmeticOverflow)
}
