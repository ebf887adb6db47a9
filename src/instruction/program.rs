use borsh::BorshDeserialize;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    instruction::{AccountMeta, Instruction, InstructionError},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program, sysvar,
};
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// Instructions supported by the flash loan program
///
/// Wire format: an 8-byte discriminator (`sha256("global:<name>")[..8]`)
/// followed by the borsh-encoded arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashLoanInstruction {
    /// Initialize a lending pool
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[writable, signer]` Funder of the pool authority account
    /// 1. `[]` Mint of the token lent by the pool
    /// 2. `[writable]` Pool share mint
    /// 3. `[signer]` Current mint authority of the pool share mint
    /// 4. `[writable]` Pool authority
    /// 5. `[]` Token program
    /// 6. `[]` System program
    InitPool,

    /// Deposit funds into a lending pool
    ///
    /// 0. `[signer]` Depositor
    /// 1. `[writable]` Source token account
    /// 2. `[writable]` Bank token account
    /// 3. `[writable]` Pool share token account receiving the shares
    /// 4. `[writable]` Pool share mint
    /// 5. `[]` Pool authority
    /// 6. `[]` Token program
    Deposit { amount: u64 },

    /// Withdraw funds from a lending pool
    ///
    /// 0. `[signer]` Withdrawer
    /// 1. `[writable]` Bank token account
    /// 2. `[writable]` Destination token account
    /// 3. `[writable]` Pool share token account being redeemed
    /// 4. `[writable]` Pool share mint
    /// 5. `[]` Pool authority
    /// 6. `[]` Token program
    Withdraw { amount: u64 },

    /// Borrow from the pool; a matching repay must follow in the same transaction
    ///
    /// 0. `[signer]` Borrower
    /// 1. `[writable]` Bank token account
    /// 2. `[writable]` Borrower token account
    /// 3. `[]` Pool authority
    /// 4. `[]` Instructions sysvar
    /// 5. `[]` Token program
    Borrow { amount: u64 },

    /// Repay a flash loan
    ///
    /// 0. `[signer]` Repayer
    /// 1. `[writable]` Repayer token account
    /// 2. `[writable]` Bank token account
    /// 3. `[]` Pool authority
    /// 4. `[]` Instructions sysvar
    /// 5. `[]` Token program
    /// 6. `[writable]` Fee recipient token account (optional)
    Repay { amount: u64 },
}

#[derive(BorshDeserialize)]
struct AmountArgs {
    amount: u64,
}

pub const INIT_POOL_DISCRIMINATOR: [u8; 8] = [116, 233, 199, 204, 115, 159, 171, 36];
pub const DEPOSIT_DISCRIMINATOR: [u8; 8] = [242, 35, 198, 137, 82, 225, 242, 182];
pub const WITHDRAW_DISCRIMINATOR: [u8; 8] = [183, 18, 70, 156, 148, 109, 161, 34];
pub const BORROW_DISCRIMINATOR: [u8; 8] = [228, 253, 131, 202, 207, 116, 89, 18];
pub const REPAY_DISCRIMINATOR: [u8; 8] = [234, 103, 67, 82, 208, 234, 219, 166];

impl FlashLoanInstruction {
    pub fn discriminator(&self) -> [u8; 8] {
        match self {
            Self::InitPool => INIT_POOL_DISCRIMINATOR,
            Self::Deposit { .. } => DEPOSIT_DISCRIMINATOR,
            Self::Withdraw { .. } => WITHDRAW_DISCRIMINATOR,
            Self::Borrow { .. } => BORROW_DISCRIMINATOR,
            Self::Repay { .. } => REPAY_DISCRIMINATOR,
        }
    }

    /// Unpacks a byte buffer into a FlashLoanInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        if input.len() < 8 {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (tag, rest) = input.split_at(8);
        let amount = || {
            AmountArgs::try_from_slice(rest)
                .map(|args| args.amount)
                .map_err(|_| ProgramError::InvalidInstructionData)
        };

        Ok(match <[u8; 8]>::try_from(tag).map_err(|_| ProgramError::InvalidInstructionData)? {
            INIT_POOL_DISCRIMINATOR => Self::InitPool,
            DEPOSIT_DISCRIMINATOR => Self::Deposit { amount: amount()? },
            WITHDRAW_DISCRIMINATOR => Self::Withdraw { amount: amount()? },
            BORROW_DISCRIMINATOR => Self::Borrow { amount: amount()? },
            REPAY_DISCRIMINATOR => Self::Repay { amount: amount()? },
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a FlashLoanInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&self.discriminator());
        if let Some(amount) = self.amount() {
            buf.extend_from_slice(&amount.to_le_bytes());
        }
        buf
    }

    /// Amount argument, `None` for InitPool
    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::InitPool => None,
            Self::Deposit { amount }
            | Self::Withdraw { amount }
            | Self::Borrow { amount }
            | Self::Repay { amount } => Some(*amount),
        }
    }
}

/// Creates an InitPool instruction
pub fn init_pool(
    program_id: Pubkey,
    funder: Pubkey,
    mint: Pubkey,
    pool_share_mint: Pubkey,
    pool_share_mint_authority: Pubkey,
    pool_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(funder, true),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new(pool_share_mint, false),
            AccountMeta::new_readonly(pool_share_mint_authority, true),
            AccountMeta::new(pool_authority, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: FlashLoanInstruction::InitPool.pack(),
    }
}

/// Creates a Deposit instruction
#[allow(clippy::too_many_arguments)]
pub fn deposit(
    program_id: Pubkey,
    amount: u64,
    depositor: Pubkey,
    token_from: Pubkey,
    bank_token: Pubkey,
    pool_share_token_to: Pubkey,
    pool_share_mint: Pubkey,
    pool_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new_readonly(depositor, true),
            AccountMeta::new(token_from, false),
            AccountMeta::new(bank_token, false),
            AccountMeta::new(pool_share_token_to, false),
            AccountMeta::new(pool_share_mint, false),
            AccountMeta::new_readonly(pool_authority, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: FlashLoanInstruction::Deposit { amount }.pack(),
    }
}

/// Creates a Withdraw instruction
#[allow(clippy::too_many_arguments)]
pub fn withdraw(
    program_id: Pubkey,
    amount: u64,
    withdrawer: Pubkey,
    bank_token: Pubkey,
    token_to: Pubkey,
    pool_share_token_from: Pubkey,
    pool_share_mint: Pubkey,
    pool_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new_readonly(withdrawer, true),
            AccountMeta::new(bank_token, false),
            AccountMeta::new(token_to, false),
            AccountMeta::new(pool_share_token_from, false),
            AccountMeta::new(pool_share_mint, false),
            AccountMeta::new_readonly(pool_authority, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: FlashLoanInstruction::Withdraw { amount }.pack(),
    }
}

/// Creates a Borrow instruction
pub fn borrow(
    program_id: Pubkey,
    amount: u64,
    borrower: Pubkey,
    bank_token: Pubkey,
    borrower_token: Pubkey,
    pool_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new_readonly(borrower, true),
            AccountMeta::new(bank_token, false),
            AccountMeta::new(borrower_token, false),
            AccountMeta::new_readonly(pool_authority, false),
            AccountMeta::new_readonly(sysvar::instructions::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: FlashLoanInstruction::Borrow { amount }.pack(),
    }
}

/// Creates a Repay instruction
pub fn repay(
    program_id: Pubkey,
    amount: u64,
    repayer: Pubkey,
    repayer_token: Pubkey,
    bank_token: Pubkey,
    pool_authority: Pubkey,
    fee_recipient_token: Option<Pubkey>,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new_readonly(repayer, true),
        AccountMeta::new(repayer_token, false),
        AccountMeta::new(bank_token, false),
        AccountMeta::new_readonly(pool_authority, false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    if let Some(fee_recipient_token) = fee_recipient_token {
        accounts.push(AccountMeta::new(fee_recipient_token, false));
    }

    Instruction {
        program_id,
        accounts,
        data: FlashLoanInstruction::Repay { amount }.pack(),
    }
}

/// Index of the bank token account in borrow instructions
pub const BORROW_BANK_INDEX: usize = 1;
/// Index of the bank token account in repay instructions
pub const REPAY_BANK_INDEX: usize = 2;

/// First custom error code of the program
pub const ERROR_CODE_OFFSET: u32 = 6000;

/// Errors that may be returned by the flash loan program
#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
#[repr(u32)]
pub enum ProgramErrorCode {
    #[error("Address Mismatch")]
    AddressMismatch = 6000,

    #[error("Owner Mismatch")]
    OwnerMismatch = 6001,

    #[error("Pool Mismatch")]
    PoolMismatch = 6002,

    #[error("Program Mismatch")]
    ProgramMismatch = 6003,

    #[error("Invalid Mint Supply")]
    InvalidMintSupply = 6004,

    #[error("Invalid Mint Decimals")]
    InvalidMintDecimals = 6005,

    #[error("Cannot Borrow Before Repay")]
    CannotBorrowBeforeRepay = 6006,

    #[error("There is no repayment instruction")]
    NoRepaymentInstructionFound = 6007,

    #[error("The repayment amount is incorrect")]
    IncorrectRepaymentAmount = 6008,
}

impl ProgramErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::from_u32(code)
    }

    /// Extract the program error from a rejected transaction, if it is one of ours
    pub fn from_transaction_error(error: &TransactionError) -> Option<Self> {
        match error {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
                Self::from_code(*code)
            }
            _ => None,
        }
    }
}

impl From<ProgramErrorCode> for ProgramError {
    fn from(e: ProgramErrorCode) -> Self {
        ProgramError::Custom(e.code())
    }
}
