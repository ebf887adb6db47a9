/// Instruction construction for the flash loan program
///
/// - `program`: wire format, account layouts and error codes of the program
/// - `assembler`: pure builders producing ordered instruction lists

pub mod assembler;
pub mod program;

pub use assembler::{
    assemble_borrow, assemble_deposit, assemble_flash_loan, assemble_init_pool, assemble_repay,
    assemble_withdraw, BorrowPlan, DepositPlan, DepositRequest, FlashLoanPlan, InitPoolPlan,
    InitPoolRequest, PlannedInstruction, RepayPlan, WithdrawPlan, WithdrawRequest,
};
pub use program::{FlashLoanInstruction, ProgramErrorCode};
