use flash_loan_mastery_sdk::instruction::program::{
    FlashLoanInstruction, ProgramErrorCode, BORROW_BANK_INDEX, REPAY_BANK_INDEX,
};
use solana_program::{
    account_info::AccountInfo,
    instruction::Instruction,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::{
        self,
        instructions::{load_current_index_checked, load_instruction_at_checked},
    },
};

/// A flash loan instruction found in the transaction, with its bank account
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashLoanStep {
    /// Position in the transaction
    pub index: usize,
    /// Decoded instruction
    pub instruction: FlashLoanInstruction,
}

/// Index of the instruction currently executing, which must be a top-level
/// call into `program_id`
pub fn current_index(program_id: &Pubkey, instructions_sysvar: &AccountInfo) -> Result<usize, ProgramError> {
    if *instructions_sysvar.key != sysvar::instructions::id() {
        return Err(ProgramErrorCode::AddressMismatch.into());
    }
    let index = load_current_index_checked(instructions_sysvar)? as usize;
    let current = load_instruction_at_checked(index, instructions_sysvar)?;
    if current.program_id != *program_id {
        return Err(ProgramErrorCode::ProgramMismatch.into());
    }
    Ok(index)
}

fn decode_for_bank(program_id: &Pubkey, bank: &Pubkey, ix: &Instruction) -> Option<FlashLoanInstruction> {
    if ix.program_id != *program_id {
        return None;
    }
    let decoded = FlashLoanInstruction::unpack(&ix.data).ok()?;
    let position = match decoded {
        FlashLoanInstruction::Borrow { .. } => BORROW_BANK_INDEX,
        FlashLoanInstruction::Repay { .. } => REPAY_BANK_INDEX,
        _ => return None,
    };
    match ix.accounts.get(position) {
        Some(meta) if meta.pubkey == *bank => Some(decoded),
        _ => None,
    }
}

/// First borrow or repay against `bank` after `index`
pub fn next_step(
    program_id: &Pubkey,
    bank: &Pubkey,
    index: usize,
    instructions_sysvar: &AccountInfo,
) -> Option<FlashLoanStep> {
    let mut cursor = index + 1;
    // running past the last instruction is the end of the scan
    while let Ok(ix) = load_instruction_at_checked(cursor, instructions_sysvar) {
        if let Some(instruction) = decode_for_bank(program_id, bank, &ix) {
            return Some(FlashLoanStep {
                index: cursor,
                instruction,
            });
        }
        cursor += 1;
    }
    None
}

/// Last borrow or repay against `bank` before `index`
pub fn previous_step(
    program_id: &Pubkey,
    bank: &Pubkey,
    index: usize,
    instructions_sysvar: &AccountInfo,
) -> Result<Option<FlashLoanStep>, ProgramError> {
    for cursor in (0..index).rev() {
        let ix = load_instruction_at_checked(cursor, instructions_sysvar)?;
        if let Some(instruction) = decode_for_bank(program_id, bank, &ix) {
            return Ok(Some(FlashLoanStep {
                index: cursor,
                instruction,
            }));
        }
    }
    Ok(None)
}
