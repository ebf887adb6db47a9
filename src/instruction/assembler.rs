/// Pure assembly of instruction lists from already-resolved inputs
///
/// Nothing here touches the network. The resolve phase in [`crate::client`]
/// gathers pool records and existing token accounts, then hands them to
/// these functions. Identical inputs always produce identical instructions.

use crate::accounts::address::{derive_associated_address, derive_bank_token, derive_pool_authority};
use crate::accounts::resolver::PoolSnapshot;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::fees::{FeeRecipient, RepaymentQuote};
use crate::instruction::program;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

/// An instruction together with the keys that must sign for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedInstruction {
    pub instruction: Instruction,
    pub signers: Vec<Pubkey>,
}

impl From<Instruction> for PlannedInstruction {
    fn from(instruction: Instruction) -> Self {
        let signers = instruction
            .accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect();
        Self {
            instruction,
            signers,
        }
    }
}

fn instructions_of(planned: &[PlannedInstruction]) -> Vec<Instruction> {
    planned.iter().map(|p| p.instruction.clone()).collect()
}

fn signers_of(planned: &[PlannedInstruction]) -> Vec<Pubkey> {
    let mut signers: Vec<Pubkey> = Vec::new();
    for key in planned.iter().flat_map(|p| p.signers.iter()) {
        if !signers.contains(key) {
            signers.push(*key);
        }
    }
    signers
}

fn check_pool_mint(pool: &PoolSnapshot, mint: &Pubkey) -> Result<()> {
    if pool.record.mint != *mint {
        return Err(ClientError::InvalidPoolData {
            address: pool.pool_authority,
            reason: format!("pool lends {}, request is for {}", pool.record.mint, mint),
        });
    }
    Ok(())
}

fn create_token_account(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> PlannedInstruction {
    create_associated_token_account_idempotent(payer, owner, mint, &spl_token::id()).into()
}

/// Inputs of a pool initialization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitPoolRequest {
    pub funder: Pubkey,
    pub mint: Pubkey,
    pub pool_share_mint: Pubkey,
    pub pool_share_mint_authority: Pubkey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitPoolPlan {
    pub instructions: Vec<PlannedInstruction>,
    pub pool_authority: Pubkey,
    pub bank_token: Pubkey,
}

/// Inputs of a deposit: `amount` of the underlying token moves from `token_from`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositRequest {
    pub depositor: Pubkey,
    pub mint: Pubkey,
    pub token_from: Pubkey,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositPlan {
    pub instructions: Vec<PlannedInstruction>,
    pub pool_authority: Pubkey,
    pub bank_token: Pubkey,
    pub pool_share_token_to: Pubkey,
}

/// Inputs of a withdrawal: `amount` pool shares are burned from `pool_share_token_from`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub withdrawer: Pubkey,
    pub mint: Pubkey,
    pub pool_share_token_from: Pubkey,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawPlan {
    pub instructions: Vec<PlannedInstruction>,
    pub pool_authority: Pubkey,
    pub token_to: Pubkey,
}

/// Moves `amount` from the bank to the borrower
///
/// Must be submitted with its [`RepayPlan`], borrow first, in one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BorrowPlan {
    pub instruction: PlannedInstruction,
    pub pool_authority: Pubkey,
    pub bank_token: Pubkey,
    pub borrower_token: Pubkey,
    pub amount: u64,
}

/// Moves the quoted repayment back to the bank
///
/// Only valid in the same transaction as, and after, the matching borrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepayPlan {
    pub instruction: PlannedInstruction,
    pub repayment: RepaymentQuote,
    pub fee_recipient_token: Option<Pubkey>,
}

/// A borrow and its matching repay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashLoanPlan {
    pub borrow: BorrowPlan,
    pub repay: RepayPlan,
}

impl InitPoolPlan {
    pub fn instructions(&self) -> Vec<Instruction> {
        instructions_of(&self.instructions)
    }

    pub fn signers(&self) -> Vec<Pubkey> {
        signers_of(&self.instructions)
    }
}

impl DepositPlan {
    pub fn instructions(&self) -> Vec<Instruction> {
        instructions_of(&self.instructions)
    }

    pub fn signers(&self) -> Vec<Pubkey> {
        signers_of(&self.instructions)
    }
}

impl WithdrawPlan {
    pub fn instructions(&self) -> Vec<Instruction> {
        instructions_of(&self.instructions)
    }

    pub fn signers(&self) -> Vec<Pubkey> {
        signers_of(&self.instructions)
    }
}

impl RepayPlan {
    pub fn repayment_amount(&self) -> u64 {
        self.repayment.repayment_amount
    }
}

impl FlashLoanPlan {
    pub fn repayment_amount(&self) -> u64 {
        self.repay.repayment_amount()
    }

    /// `[borrow, inner..., repay]`, the only ordering the program accepts
    pub fn wrap<I>(&self, inner: I) -> Vec<Instruction>
    where
        I: IntoIterator<Item = Instruction>,
    {
        let mut instructions = vec![self.borrow.instruction.instruction.clone()];
        instructions.extend(inner);
        instructions.push(self.repay.instruction.instruction.clone());
        instructions
    }

    pub fn signers(&self) -> Vec<Pubkey> {
        signers_of(&[self.borrow.instruction.clone(), self.repay.instruction.clone()])
    }
}

/// Assemble a pool initialization
///
/// Order: initialize, create the bank token account, then optionally the
/// funder's token account (when `funder_token` is unresolved) and the fixed
/// fee recipient's token account.
pub fn assemble_init_pool(
    config: &ClientConfig,
    request: &InitPoolRequest,
    funder_token: Option<Pubkey>,
) -> Result<InitPoolPlan> {
    let (pool_authority, _) = derive_pool_authority(&config.program_id, &request.mint)?;
    let bank_token = derive_bank_token(&pool_authority, &request.mint);

    let mut instructions: Vec<PlannedInstruction> = vec![
        program::init_pool(
            config.program_id,
            request.funder,
            request.mint,
            request.pool_share_mint,
            request.pool_share_mint_authority,
            pool_authority,
        )
        .into(),
        create_token_account(&request.funder, &pool_authority, &request.mint),
    ];

    if funder_token.is_none() {
        instructions.push(create_token_account(&request.funder, &request.funder, &request.mint));
    }

    if let FeeRecipient::FixedRecipient(admin) = config.fee_recipient {
        instructions.push(create_token_account(&request.funder, &admin, &request.mint));
    }

    Ok(InitPoolPlan {
        instructions,
        pool_authority,
        bank_token,
    })
}

/// Assemble a deposit
///
/// Shares go to `existing_share_token` when the depositor already holds one,
/// otherwise to the canonical share account, created first. Fails when
/// `pool` is the snapshot of another mint's pool.
pub fn assemble_deposit(
    config: &ClientConfig,
    request: &DepositRequest,
    pool: &PoolSnapshot,
    existing_share_token: Option<Pubkey>,
) -> Result<DepositPlan> {
    check_pool_mint(pool, &request.mint)?;
    let pool_share_mint = pool.record.pool_share_mint;
    let mut instructions: Vec<PlannedInstruction> = Vec::with_capacity(2);

    let pool_share_token_to = match existing_share_token {
        Some(address) => address,
        None => {
            instructions.push(create_token_account(
                &request.depositor,
                &request.depositor,
                &pool_share_mint,
            ));
            derive_associated_address(&request.depositor, &pool_share_mint)
        }
    };

    instructions.push(
        program::deposit(
            config.program_id,
            request.amount,
            request.depositor,
            request.token_from,
            pool.bank_token,
            pool_share_token_to,
            pool_share_mint,
            pool.pool_authority,
        )
        .into(),
    );

    Ok(DepositPlan {
        instructions,
        pool_authority: pool.pool_authority,
        bank_token: pool.bank_token,
        pool_share_token_to,
    })
}

/// Assemble a withdrawal
///
/// Underlying tokens go to `existing_token_to` when the withdrawer already
/// holds one, otherwise to the canonical account, created first. Fails when
/// `pool` is the snapshot of another mint's pool.
pub fn assemble_withdraw(
    config: &ClientConfig,
    request: &WithdrawRequest,
    pool: &PoolSnapshot,
    existing_token_to: Option<Pubkey>,
) -> Result<WithdrawPlan> {
    check_pool_mint(pool, &request.mint)?;
    let mut instructions: Vec<PlannedInstruction> = Vec::with_capacity(2);

    let token_to = match existing_token_to {
        Some(address) => address,
        None => {
            instructions.push(create_token_account(
                &request.withdrawer,
                &request.withdrawer,
                &request.mint,
            ));
            derive_associated_address(&request.withdrawer, &request.mint)
        }
    };

    instructions.push(
        program::withdraw(
            config.program_id,
            request.amount,
            request.withdrawer,
            pool.bank_token,
            token_to,
            request.pool_share_token_from,
            pool.record.pool_share_mint,
            pool.pool_authority,
        )
        .into(),
    );

    Ok(WithdrawPlan {
        instructions,
        pool_authority: pool.pool_authority,
        token_to,
    })
}

/// Assemble the borrow half of a flash loan; no fee is charged here
pub fn assemble_borrow(config: &ClientConfig, borrower: &Pubkey, mint: &Pubkey, amount: u64) -> Result<BorrowPlan> {
    let (pool_authority, _) = derive_pool_authority(&config.program_id, mint)?;
    let bank_token = derive_bank_token(&pool_authority, mint);
    let borrower_token = derive_associated_address(borrower, mint);

    Ok(BorrowPlan {
        instruction: program::borrow(
            config.program_id,
            amount,
            *borrower,
            bank_token,
            borrower_token,
            pool_authority,
        )
        .into(),
        pool_authority,
        bank_token,
        borrower_token,
        amount,
    })
}

/// Canonical token account receiving the recipient's fee share, if any
pub fn fee_recipient_token(recipient: &FeeRecipient, mint: &Pubkey) -> Option<Pubkey> {
    match recipient {
        FeeRecipient::None => None,
        FeeRecipient::Referral(token_account) => Some(*token_account),
        FeeRecipient::FixedRecipient(admin) => Some(derive_associated_address(admin, mint)),
    }
}

/// Assemble the repay half of a flash loan for a borrow of `amount`
pub fn assemble_repay(config: &ClientConfig, repayer: &Pubkey, mint: &Pubkey, amount: u64) -> Result<RepayPlan> {
    let (pool_authority, _) = derive_pool_authority(&config.program_id, mint)?;
    let bank_token = derive_bank_token(&pool_authority, mint);
    let repayer_token = derive_associated_address(repayer, mint);

    let repayment = config.fee_schedule.quote(amount, &config.fee_recipient)?;
    let recipient_token = fee_recipient_token(&config.fee_recipient, mint);

    Ok(RepayPlan {
        instruction: program::repay(
            config.program_id,
            repayment.repayment_amount,
            *repayer,
            repayer_token,
            bank_token,
            pool_authority,
            recipient_token,
        )
        .into(),
        repayment,
        fee_recipient_token: recipient_token,
    })
}

/// Assemble a matching borrow/repay pair
pub fn assemble_flash_loan(config: &ClientConfig, borrower: &Pubkey, mint: &Pubkey, amount: u64) -> Result<FlashLoanPlan> {
    Ok(FlashLoanPlan {
        borrow: assemble_borrow(config, borrower, mint, amount)?,
        repay: assemble_repay(config, borrower, mint, amount)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::state::PoolAuthority;
    use crate::instruction::program::FlashLoanInstruction;

    fn snapshot(config: &ClientConfig, mint: Pubkey) -> PoolSnapshot {
        let (pool_authority, bump) = derive_pool_authority(&config.program_id, &mint).unwrap();
        PoolSnapshot {
            pool_authority,
            bank_token: derive_bank_token(&pool_authority, &mint),
            record: PoolAuthority {
                mint,
                pool_share_mint: Pubkey::new_unique(),
                bump,
            },
        }
    }

    fn init_request() -> InitPoolRequest {
        InitPoolRequest {
            funder: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            pool_share_mint: Pubkey::new_unique(),
            pool_share_mint_authority: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_init_pool_creates_missing_funder_account() {
        let config = ClientConfig::default();
        let request = init_request();
        let plan = assemble_init_pool(&config, &request, None).unwrap();

        assert_eq!(plan.instructions.len(), 3);
        assert_eq!(plan.instructions[0].instruction.program_id, config.program_id);
        assert_eq!(
            plan.instructions[0].signers,
            vec![request.funder, request.pool_share_mint_authority]
        );
        assert_eq!(plan.instructions[1].instruction.accounts[1].pubkey, plan.bank_token);
        assert_eq!(
            plan.instructions[2].instruction.accounts[1].pubkey,
            derive_associated_address(&request.funder, &request.mint)
        );
        assert_eq!(plan.signers(), vec![request.funder, request.pool_share_mint_authority]);
    }

    #[test]
    fn test_init_pool_skips_existing_funder_account() {
        let config = ClientConfig::default();
        let request = init_request();
        let plan = assemble_init_pool(&config, &request, Some(Pubkey::new_unique())).unwrap();
        assert_eq!(plan.instructions.len(), 2);
    }

    #[test]
    fn test_init_pool_creates_fixed_recipient_account() {
        let admin = Pubkey::new_unique();
        let config = ClientConfig::default().with_fee_recipient(FeeRecipient::FixedRecipient(admin));
        let request = init_request();
        let plan = assemble_init_pool(&config, &request, Some(Pubkey::new_unique())).unwrap();

        assert_eq!(plan.instructions.len(), 3);
        assert_eq!(
            plan.instructions[2].instruction.accounts[1].pubkey,
            derive_associated_address(&admin, &request.mint)
        );
    }

    #[test]
    fn test_deposit_prepends_share_account_creation() {
        let config = ClientConfig::default();
        let mint = Pubkey::new_unique();
        let pool = snapshot(&config, mint);
        let request = DepositRequest {
            depositor: Pubkey::new_unique(),
            mint,
            token_from: Pubkey::new_unique(),
            amount: 500,
        };

        let plan = assemble_deposit(&config, &request, &pool, None).unwrap();
        assert_eq!(plan.instructions.len(), 2);
        assert_eq!(
            plan.pool_share_token_to,
            derive_associated_address(&request.depositor, &pool.record.pool_share_mint)
        );

        let deposit = &plan.instructions[1].instruction;
        assert_eq!(
            FlashLoanInstruction::unpack(&deposit.data),
            Ok(FlashLoanInstruction::Deposit { amount: 500 })
        );
        assert_eq!(deposit.accounts[2].pubkey, pool.bank_token);
        assert_eq!(deposit.accounts[3].pubkey, plan.pool_share_token_to);
        assert_eq!(deposit.accounts[4].pubkey, pool.record.pool_share_mint);
    }

    #[test]
    fn test_deposit_uses_existing_share_account() {
        let config = ClientConfig::default();
        let mint = Pubkey::new_unique();
        let pool = snapshot(&config, mint);
        let existing = Pubkey::new_unique();
        let request = DepositRequest {
            depositor: Pubkey::new_unique(),
            mint,
            token_from: Pubkey::new_unique(),
            amount: 1,
        };

        let plan = assemble_deposit(&config, &request, &pool, Some(existing)).unwrap();
        assert_eq!(plan.instructions.len(), 1);
        assert_eq!(plan.pool_share_token_to, existing);
    }

    #[test]
    fn test_deposit_is_deterministic() {
        let config = ClientConfig::default();
        let mint = Pubkey::new_unique();
        let pool = snapshot(&config, mint);
        let request = DepositRequest {
            depositor: Pubkey::new_unique(),
            mint,
            token_from: Pubkey::new_unique(),
            amount: 77,
        };

        assert_eq!(
            assemble_deposit(&config, &request, &pool, None).unwrap().instructions(),
            assemble_deposit(&config, &request, &pool, None).unwrap().instructions()
        );
    }

    #[test]
    fn test_withdraw_targets_resolved_destination() {
        let config = ClientConfig::default();
        let mint = Pubkey::new_unique();
        let pool = snapshot(&config, mint);
        let request = WithdrawRequest {
            withdrawer: Pubkey::new_unique(),
            mint,
            pool_share_token_from: Pubkey::new_unique(),
            amount: 10,
        };
        let existing = Pubkey::new_unique();

        let plan = assemble_withdraw(&config, &request, &pool, Some(existing)).unwrap();
        assert_eq!(plan.instructions.len(), 1);
        let withdraw = &plan.instructions[0].instruction;
        assert_eq!(withdraw.accounts[1].pubkey, pool.bank_token);
        assert_eq!(withdraw.accounts[2].pubkey, existing);
        assert_eq!(withdraw.accounts[3].pubkey, request.pool_share_token_from);

        let plan = assemble_withdraw(&config, &request, &pool, None).unwrap();
        assert_eq!(plan.instructions.len(), 2);
        assert_eq!(plan.token_to, derive_associated_address(&request.withdrawer, &mint));
    }

    #[test]
    fn test_snapshot_of_another_pool_is_rejected() {
        let config = ClientConfig::default();
        let pool = snapshot(&config, Pubkey::new_unique());
        let mint = Pubkey::new_unique();

        let deposit = DepositRequest {
            depositor: Pubkey::new_unique(),
            mint,
            token_from: Pubkey::new_unique(),
            amount: 1,
        };
        let err = assemble_deposit(&config, &deposit, &pool, None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidPoolData { address, .. } if address == pool.pool_authority));

        let withdraw = WithdrawRequest {
            withdrawer: Pubkey::new_unique(),
            mint,
            pool_share_token_from: Pubkey::new_unique(),
            amount: 1,
        };
        let err = assemble_withdraw(&config, &withdraw, &pool, None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidPoolData { .. }));
    }

    #[test]
    fn test_flash_loan_repayment_and_order() {
        let config = ClientConfig::default();
        let borrower = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let plan = assemble_flash_loan(&config, &borrower, &mint, 1_000_000).unwrap();

        assert_eq!(plan.repayment_amount(), 1_000_950);
        assert_eq!(plan.borrow.bank_token, plan.repay.instruction.instruction.accounts[2].pubkey);
        assert_eq!(plan.repay.fee_recipient_token, None);

        let inner = Instruction::new_with_bytes(Pubkey::new_unique(), &[1, 2, 3], vec![]);
        let wrapped = plan.wrap(vec![inner.clone()]);
        assert_eq!(wrapped.len(), 3);
        assert_eq!(
            FlashLoanInstruction::unpack(&wrapped[0].data),
            Ok(FlashLoanInstruction::Borrow { amount: 1_000_000 })
        );
        assert_eq!(wrapped[1], inner);
        assert_eq!(
            FlashLoanInstruction::unpack(&wrapped[2].data),
            Ok(FlashLoanInstruction::Repay { amount: 1_000_950 })
        );
        assert_eq!(plan.signers(), vec![borrower]);
    }

    #[test]
    fn test_repay_routes_referral() {
        let referral = Pubkey::new_unique();
        let config = ClientConfig::default().with_fee_recipient(FeeRecipient::Referral(referral));
        let plan = assemble_repay(&config, &Pubkey::new_unique(), &Pubkey::new_unique(), 1_000_000).unwrap();

        assert_eq!(plan.fee_recipient_token, Some(referral));
        assert_eq!(plan.instruction.instruction.accounts.len(), 7);
        assert_eq!(plan.instruction.instruction.accounts[6].pubkey, referral);
        assert!(plan.instruction.instruction.accounts[6].is_writable);
    }

    #[test]
    fn test_repay_routes_fixed_recipient_to_its_token_account() {
        let admin = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let config = ClientConfig::default().with_fee_recipient(FeeRecipient::FixedRecipient(admin));
        let plan = assemble_repay(&config, &Pubkey::new_unique(), &mint, 1_000_000).unwrap();

        assert_eq!(plan.repayment_amount(), 1_001_000);
        assert_eq!(plan.fee_recipient_token, Some(derive_associated_address(&admin, &mint)));
    }

    #[test]
    fn test_zero_amount_borrow_repays_principal() {
        let config = ClientConfig::default();
        let plan = assemble_flash_loan(&config, &Pubkey::new_unique(), &Pubkey::new_unique(), 0).unwrap();
        assert_eq!(plan.repay.repayment.total_fees, 0);
        assert_eq!(plan.repayment_amount(), 0);
    }

    #[test]
    fn test_alternate_program_id() {
        let program_id = Pubkey::new_unique();
        let config = ClientConfig::default().with_program_id(program_id);
        let mint = Pubkey::new_unique();
        let plan = assemble_borrow(&config, &Pubkey::new_unique(), &mint, 1).unwrap();

        assert_eq!(plan.instruction.instruction.program_id, program_id);
        assert_eq!(plan.pool_authority, derive_pool_authority(&program_id, &mint).unwrap().0);
    }
}
