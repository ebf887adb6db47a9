/// Deterministic address derivation
/// Must match the program's own derivation bit-for-bit, the ledger re-derives every address

use crate::error::{ClientError, Result};
use solana_sdk::pubkey::Pubkey;

/// Fixed seed prefix of every pool authority address
pub const POOL_AUTHORITY_SEED: &[u8] = b"flash_loan";

/// Derive the pool authority for `mint` under `program_id`
///
/// Seeds are `["flash_loan", mint]`. Returns the address together with its bump.
pub fn derive_pool_authority(program_id: &Pubkey, mint: &Pubkey) -> Result<(Pubkey, u8)> {
    Pubkey::try_find_program_address(&[POOL_AUTHORITY_SEED, mint.as_ref()], program_id)
        .ok_or(ClientError::NoViableBump { mint: *mint })
}

/// Canonical (associated) token account of `owner` for `mint` under the classic token program
pub fn derive_associated_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    derive_associated_address_with_program(owner, mint, &spl_token::id())
}

/// Canonical token account with an explicit token program id
///
/// Seeds are `[owner, token_program, mint]` under the associated token account program.
pub fn derive_associated_address_with_program(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &spl_associated_token_account::id(),
    )
    .0
}

/// The pool's bank token account: the canonical account of the pool authority for `mint`
pub fn derive_bank_token(pool_authority: &Pubkey, mint: &Pubkey) -> Pubkey {
    derive_associated_address(pool_authority, mint)
}
