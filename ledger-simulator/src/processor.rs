use crate::{
    fees::{FeeScheme, FIXED_ADMIN},
    introspection::{self, FlashLoanStep},
};
use flash_loan_mastery_sdk::{
    accounts::{address::POOL_AUTHORITY_SEED, state::PoolAuthority},
    derive_associated_address, derive_bank_token,
    instruction::program::{FlashLoanInstruction, ProgramErrorCode},
};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token::{
    instruction::{self as token_instruction, AuthorityType},
    state::{Account as TokenAccount, Mint},
};

/// Instruction processor
pub struct Processor;

impl Processor {
    /// Process an instruction under the referral fee scheme
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        Self::process_with_scheme(FeeScheme::Referral, program_id, accounts, instruction_data)
    }

    /// Process an instruction under the fixed admin fee scheme
    pub fn process_fixed_admin(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        Self::process_with_scheme(FeeScheme::FixedAdmin, program_id, accounts, instruction_data)
    }

    /// Process an instruction, charging fees according to `scheme`
    pub fn process_with_scheme(
        scheme: FeeScheme,
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = FlashLoanInstruction::unpack(instruction_data)?;

        match instruction {
            FlashLoanInstruction::InitPool => {
                msg!("Instruction: InitPool");
                Self::process_init_pool(program_id, accounts)
            }
            FlashLoanInstruction::Deposit { amount } => {
                msg!("Instruction: Deposit");
                Self::process_deposit(program_id, amount, accounts)
            }
            FlashLoanInstruction::Withdraw { amount } => {
                msg!("Instruction: Withdraw");
                Self::process_withdraw(program_id, amount, accounts)
            }
            FlashLoanInstruction::Borrow { amount } => {
                msg!("Instruction: Borrow");
                Self::process_borrow(scheme, program_id, amount, accounts)
            }
            FlashLoanInstruction::Repay { amount } => {
                msg!("Instruction: Repay");
                Self::process_repay(scheme, program_id, amount, accounts)
            }
        }
    }

    fn process_init_pool(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let funder_info = next_account_info(account_info_iter)?;
        let mint_info = next_account_info(account_info_iter)?;
        let pool_share_mint_info = next_account_info(account_info_iter)?;
        let pool_share_mint_authority_info = next_account_info(account_info_iter)?;
        let pool_authority_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !funder_info.is_signer || !pool_share_mint_authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_token_program(token_program_info)?;
        if mint_info.owner != &spl_token::id() || pool_share_mint_info.owner != &spl_token::id() {
            return Err(ProgramErrorCode::OwnerMismatch.into());
        }

        let (expected_authority, bump) =
            Pubkey::find_program_address(&[POOL_AUTHORITY_SEED, mint_info.key.as_ref()], program_id);
        if expected_authority != *pool_authority_info.key {
            return Err(ProgramErrorCode::AddressMismatch.into());
        }

        let mint = Mint::unpack(&mint_info.data.borrow())?;
        let pool_share_mint = Mint::unpack(&pool_share_mint_info.data.borrow())?;
        if pool_share_mint.supply != 0 {
            return Err(ProgramErrorCode::InvalidMintSupply.into());
        }
        if pool_share_mint.decimals != mint.decimals {
            return Err(ProgramErrorCode::InvalidMintDecimals.into());
        }

        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                funder_info.key,
                pool_authority_info.key,
                rent.minimum_balance(PoolAuthority::LEN),
                PoolAuthority::LEN as u64,
                program_id,
            ),
            &[
                funder_info.clone(),
                pool_authority_info.clone(),
                system_program_info.clone(),
            ],
            &[&[POOL_AUTHORITY_SEED, mint_info.key.as_ref(), &[bump]]],
        )?;

        let record = PoolAuthority {
            mint: *mint_info.key,
            pool_share_mint: *pool_share_mint_info.key,
            bump,
        };
        record.pack_into_slice(&mut pool_authority_info.data.borrow_mut());

        invoke(
            &token_instruction::set_authority(
                token_program_info.key,
                pool_share_mint_info.key,
                Some(pool_authority_info.key),
                AuthorityType::MintTokens,
                pool_share_mint_authority_info.key,
                &[],
            )?,
            &[
                pool_share_mint_info.clone(),
                pool_share_mint_authority_info.clone(),
                token_program_info.clone(),
            ],
        )?;

        msg!("Pool initialized: mint={}, share_mint={}", record.mint, record.pool_share_mint);
        Ok(())
    }

    fn process_deposit(program_id: &Pubkey, amount: u64, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let depositor_info = next_account_info(account_info_iter)?;
        let token_from_info = next_account_info(account_info_iter)?;
        let bank_info = next_account_info(account_info_iter)?;
        let pool_share_token_to_info = next_account_info(account_info_iter)?;
        let pool_share_mint_info = next_account_info(account_info_iter)?;
        let pool_authority_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        if !depositor_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_token_program(token_program_info)?;
        let record = load_pool(program_id, pool_authority_info)?;
        check_bank(pool_authority_info.key, &record, bank_info)?;
        check_share_mint(&record, pool_share_mint_info)?;

        let bank_balance = TokenAccount::unpack(&bank_info.data.borrow())?.amount;
        let supply = Mint::unpack(&pool_share_mint_info.data.borrow())?.supply;
        let shares = if supply == 0 || bank_balance == 0 {
            amount
        } else {
            mul_div(amount, supply, bank_balance)?
        };
        msg!("Deposit: amount={}, shares={}", amount, shares);

        invoke(
            &token_instruction::transfer(
                token_program_info.key,
                token_from_info.key,
                bank_info.key,
                depositor_info.key,
                &[],
                amount,
            )?,
            &[
                token_from_info.clone(),
                bank_info.clone(),
                depositor_info.clone(),
                token_program_info.clone(),
            ],
        )?;

        let bump = [record.bump];
        let seeds: &[&[u8]] = &[POOL_AUTHORITY_SEED, record.mint.as_ref(), &bump];
        invoke_signed(
            &token_instruction::mint_to(
                token_program_info.key,
                pool_share_mint_info.key,
                pool_share_token_to_info.key,
                pool_authority_info.key,
                &[],
                shares,
            )?,
            &[
                pool_share_mint_info.clone(),
                pool_share_token_to_info.clone(),
                pool_authority_info.clone(),
                token_program_info.clone(),
            ],
            &[seeds],
        )
    }

    fn process_withdraw(program_id: &Pubkey, amount: u64, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let withdrawer_info = next_account_info(account_info_iter)?;
        let bank_info = next_account_info(account_info_iter)?;
        let token_to_info = next_account_info(account_info_iter)?;
        let pool_share_token_from_info = next_account_info(account_info_iter)?;
        let pool_share_mint_info = next_account_info(account_info_iter)?;
        let pool_authority_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        if !withdrawer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_token_program(token_program_info)?;
        let record = load_pool(program_id, pool_authority_info)?;
        check_bank(pool_authority_info.key, &record, bank_info)?;
        check_share_mint(&record, pool_share_mint_info)?;

        let bank_balance = TokenAccount::unpack(&bank_info.data.borrow())?.amount;
        let supply = Mint::unpack(&pool_share_mint_info.data.borrow())?.supply;
        if supply == 0 {
            return Err(ProgramError::InsufficientFunds);
        }
        let tokens = mul_div(amount, bank_balance, supply)?;
        msg!("Withdraw: shares={}, tokens={}", amount, tokens);

        invoke(
            &token_instruction::burn(
                token_program_info.key,
                pool_share_token_from_info.key,
                pool_share_mint_info.key,
                withdrawer_info.key,
                &[],
                amount,
            )?,
            &[
                pool_share_token_from_info.clone(),
                pool_share_mint_info.clone(),
                withdrawer_info.clone(),
                token_program_info.clone(),
            ],
        )?;

        let bump = [record.bump];
        let seeds: &[&[u8]] = &[POOL_AUTHORITY_SEED, record.mint.as_ref(), &bump];
        invoke_signed(
            &token_instruction::transfer(
                token_program_info.key,
                bank_info.key,
                token_to_info.key,
                pool_authority_info.key,
                &[],
                tokens,
            )?,
            &[
                bank_info.clone(),
                token_to_info.clone(),
                pool_authority_info.clone(),
                token_program_info.clone(),
            ],
            &[seeds],
        )
    }

    fn process_borrow(
        scheme: FeeScheme,
        program_id: &Pubkey,
        amount: u64,
        accounts: &[AccountInfo],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let borrower_info = next_account_info(account_info_iter)?;
        let bank_info = next_account_info(account_info_iter)?;
        let borrower_token_info = next_account_info(account_info_iter)?;
        let pool_authority_info = next_account_info(account_info_iter)?;
        let instructions_sysvar_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        if !borrower_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_token_program(token_program_info)?;
        let record = load_pool(program_id, pool_authority_info)?;
        check_bank(pool_authority_info.key, &record, bank_info)?;

        let current = introspection::current_index(program_id, instructions_sysvar_info)?;
        let required = scheme.required_repayment(amount)?;

        match introspection::next_step(program_id, bank_info.key, current, instructions_sysvar_info) {
            Some(FlashLoanStep {
                instruction: FlashLoanInstruction::Repay { amount: repaid },
                index,
            }) => {
                if repaid < required {
                    msg!("Repay at {} returns {}, {} is owed", index, repaid, required);
                    return Err(ProgramErrorCode::IncorrectRepaymentAmount.into());
                }
            }
            Some(FlashLoanStep { index, .. }) => {
                msg!("Borrow at {} precedes the repay", index);
                return Err(ProgramErrorCode::CannotBorrowBeforeRepay.into());
            }
            None => return Err(ProgramErrorCode::NoRepaymentInstructionFound.into()),
        }

        msg!("Borrow: amount={}, repay={}", amount, required);
        let bump = [record.bump];
        let seeds: &[&[u8]] = &[POOL_AUTHORITY_SEED, record.mint.as_ref(), &bump];
        invoke_signed(
            &token_instruction::transfer(
                token_program_info.key,
                bank_info.key,
                borrower_token_info.key,
                pool_authority_info.key,
                &[],
                amount,
            )?,
            &[
                bank_info.clone(),
                borrower_token_info.clone(),
                pool_authority_info.clone(),
                token_program_info.clone(),
            ],
            &[seeds],
        )
    }

    fn process_repay(
        scheme: FeeScheme,
        program_id: &Pubkey,
        amount: u64,
        accounts: &[AccountInfo],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let repayer_info = next_account_info(account_info_iter)?;
        let repayer_token_info = next_account_info(account_info_iter)?;
        let bank_info = next_account_info(account_info_iter)?;
        let pool_authority_info = next_account_info(account_info_iter)?;
        let instructions_sysvar_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let fee_recipient_info = next_account_info(account_info_iter).ok();

        if !repayer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_token_program(token_program_info)?;
        let record = load_pool(program_id, pool_authority_info)?;
        check_bank(pool_authority_info.key, &record, bank_info)?;
        if scheme == FeeScheme::FixedAdmin {
            let recipient = fee_recipient_info.ok_or(ProgramError::NotEnoughAccountKeys)?;
            if *recipient.key != derive_associated_address(&FIXED_ADMIN, &record.mint) {
                return Err(ProgramErrorCode::AddressMismatch.into());
            }
        }

        let current = introspection::current_index(program_id, instructions_sysvar_info)?;
        let borrowed = match introspection::previous_step(
            program_id,
            bank_info.key,
            current,
            instructions_sysvar_info,
        )? {
            Some(FlashLoanStep {
                instruction: FlashLoanInstruction::Borrow { amount },
                ..
            }) => Some(amount),
            _ => None,
        };

        let recipient_share = match (borrowed, fee_recipient_info) {
            (Some(borrowed), Some(recipient)) => {
                if scheme.required_repayment(borrowed)? > amount {
                    return Err(ProgramErrorCode::IncorrectRepaymentAmount.into());
                }
                let recipient_account = TokenAccount::unpack(&recipient.data.borrow())?;
                if recipient_account.mint != record.mint {
                    return Err(ProgramErrorCode::PoolMismatch.into());
                }
                scheme.recipient_share(borrowed)?
            }
            (Some(borrowed), None) => {
                if scheme.required_repayment(borrowed)? > amount {
                    return Err(ProgramErrorCode::IncorrectRepaymentAmount.into());
                }
                0
            }
            // no open borrow: a plain top-up of the bank
            (None, _) => 0,
        };

        let to_bank = amount
            .checked_sub(recipient_share)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        msg!("Repay: bank={}, recipient={}", to_bank, recipient_share);

        invoke(
            &token_instruction::transfer(
                token_program_info.key,
                repayer_token_info.key,
                bank_info.key,
                repayer_info.key,
                &[],
                to_bank,
            )?,
            &[
                repayer_token_info.clone(),
                bank_info.clone(),
                repayer_info.clone(),
                token_program_info.clone(),
            ],
        )?;

        if let Some(recipient) = fee_recipient_info.filter(|_| recipient_share > 0) {
            invoke(
                &token_instruction::transfer(
                    token_program_info.key,
                    repayer_token_info.key,
                    recipient.key,
                    repayer_info.key,
                    &[],
                    recipient_share,
                )?,
                &[
                    repayer_token_info.clone(),
                    recipient.clone(),
                    repayer_info.clone(),
                    token_program_info.clone(),
                ],
            )?;
        }

        Ok(())
    }
}

fn check_token_program(token_program_info: &AccountInfo) -> ProgramResult {
    if *token_program_info.key != spl_token::id() {
        return Err(ProgramErrorCode::ProgramMismatch.into());
    }
    Ok(())
}

fn load_pool(program_id: &Pubkey, pool_authority_info: &AccountInfo) -> Result<PoolAuthority, ProgramError> {
    if pool_authority_info.owner != program_id {
        return Err(ProgramErrorCode::OwnerMismatch.into());
    }
    let record = PoolAuthority::try_from_account_data(&pool_authority_info.data.borrow())?;
    let expected = Pubkey::create_program_address(
        &[POOL_AUTHORITY_SEED, record.mint.as_ref(), &[record.bump]],
        program_id,
    )?;
    if expected != *pool_authority_info.key {
        return Err(ProgramErrorCode::AddressMismatch.into());
    }
    Ok(record)
}

fn check_bank(pool_authority: &Pubkey, record: &PoolAuthority, bank_info: &AccountInfo) -> ProgramResult {
    if derive_bank_token(pool_authority, &record.mint) != *bank_info.key {
        return Err(ProgramErrorCode::AddressMismatch.into());
    }
    Ok(())
}

fn check_share_mint(record: &PoolAuthority, pool_share_mint_info: &AccountInfo) -> ProgramResult {
    if record.pool_share_mint != *pool_share_mint_info.key {
        return Err(ProgramErrorCode::PoolMismatch.into());
    }
    Ok(())
}

fn mul_div(value: u64, numerator: u64, denominator: u64) -> Result<u64, ProgramError> {
    let result = (value as u128)
        .checked_mul(numerator as u128)
        .and_then(|v| v.checked_div(denominator as u128))
        .ok_or(ProgramError::ArithmeticOverflow)?;
    u64::try_from(result).map_err(|_| ProgramError::ArithmeticOverflow)
}
