/// Local replay of the program's borrow/repay pairing rule
///
/// The program enforces, per transaction and per pool, `NONE -> BORROWED` on a
/// borrow and `BORROWED -> REPAID` on a later repay of at least the quoted
/// amount; a transaction left `BORROWED` fails as a whole. This module walks an
/// instruction list the same way so a caller can catch a broken bundle before
/// paying to submit it. The ledger remains the authority.

use crate::fees::{FeeRecipient, FeeSchedule};
use crate::instruction::program::{FlashLoanInstruction, BORROW_BANK_INDEX, REPAY_BANK_INDEX};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PairingViolation {
    #[error("borrow at {index} is never repaid")]
    UnmatchedBorrow { index: usize },

    #[error("borrow at {index} while an earlier borrow from the same pool is still open")]
    BorrowBeforeRepay { index: usize },

    #[error("repay at {index} has no open borrow")]
    RepayWithoutBorrow { index: usize },

    #[error("repay at {index} moves {provided}, at least {required} is owed")]
    InsufficientRepayment {
        index: usize,
        required: u64,
        provided: u64,
    },

    #[error("instruction at {index} is missing the bank token account")]
    MissingBankAccount { index: usize },

    #[error("repayment for the borrow at {index} cannot be computed")]
    UnquotableBorrow { index: usize },
}

struct OpenBorrow {
    index: usize,
    required: u64,
}

/// Check that every borrow from `program_id` is followed by a sufficient repay
pub fn check_pairing(
    program_id: &Pubkey,
    schedule: &FeeSchedule,
    recipient: &FeeRecipient,
    instructions: &[Instruction],
) -> Result<(), PairingViolation> {
    let mut open: HashMap<Pubkey, OpenBorrow> = HashMap::new();

    for (index, ix) in instructions.iter().enumerate() {
        if ix.program_id != *program_id {
            continue;
        }
        // instructions that do not decode are the program's problem, not a pairing one
        let Ok(decoded) = FlashLoanInstruction::unpack(&ix.data) else {
            continue;
        };

        match decoded {
            FlashLoanInstruction::Borrow { amount } => {
                let bank = bank_account(ix, BORROW_BANK_INDEX, index)?;
                if open.contains_key(&bank) {
                    return Err(PairingViolation::BorrowBeforeRepay { index });
                }
                let required = schedule
                    .repayment_amount(amount, recipient)
                    .map_err(|_| PairingViolation::UnquotableBorrow { index })?;
                open.insert(bank, OpenBorrow { index, required });
            }
            FlashLoanInstruction::Repay { amount } => {
                let bank = bank_account(ix, REPAY_BANK_INDEX, index)?;
                let borrow = open
                    .remove(&bank)
                    .ok_or(PairingViolation::RepayWithoutBorrow { index })?;
                if amount < borrow.required {
                    return Err(PairingViolation::InsufficientRepayment {
                        index,
                        required: borrow.required,
                        provided: amount,
                    });
                }
            }
            _ => {}
        }
    }

    match open.values().map(|borrow| borrow.index).min() {
        Some(index) => Err(PairingViolation::UnmatchedBorrow { index }),
        None => Ok(()),
    }
}

fn bank_account(ix: &Instruction, position: usize, index: usize) -> Result<Pubkey, PairingViolation> {
    ix.accounts
        .get(position)
        .map(|meta| meta.pubkey)
        .ok_or(PairingViolation::MissingBankAccount { index })
}
