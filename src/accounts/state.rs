use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

/// Pool authority record as stored by the program
///
/// Layout: 8-byte account discriminator, underlying mint, pool share mint, bump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolAuthority {
    /// Mint of the token lent out by the pool
    pub mint: Pubkey,
    /// Mint of the token representing shares in the pool
    pub pool_share_mint: Pubkey,
    /// Bump seed of the pool authority address
    pub bump: u8,
}

impl PoolAuthority {
    /// `sha256("account:PoolAuthority")[..8]`
    pub const DISCRIMINATOR: [u8; 8] = [3, 210, 229, 243, 75, 92, 62, 254];

    /// Decode from raw account data, tolerating trailing bytes
    pub fn try_from_account_data(data: &[u8]) -> Result<Self, ProgramError> {
        let record = data
            .get(..POOL_AUTHORITY_LEN)
            .ok_or(ProgramError::AccountDataTooSmall)?;
        Self::unpack_from_slice(record)
    }
}

impl Sealed for PoolAuthority {}

impl IsInitialized for PoolAuthority {
    fn is_initialized(&self) -> bool {
        self.mint != Pubkey::default()
    }
}

const POOL_AUTHORITY_LEN: usize = 73; // 8 + 32 + 32 + 1

impl Pack for PoolAuthority {
    const LEN: usize = POOL_AUTHORITY_LEN;

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let output = array_mut_ref![dst, 0, POOL_AUTHORITY_LEN];
        let (discriminator, mint, pool_share_mint, bump) = mut_array_refs![output, 8, 32, 32, 1];

        *discriminator = Self::DISCRIMINATOR;
        mint.copy_from_slice(self.mint.as_ref());
        pool_share_mint.copy_from_slice(self.pool_share_mint.as_ref());
        bump[0] = self.bump;
    }

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        if src.len() < POOL_AUTHORITY_LEN {
            return Err(ProgramError::AccountDataTooSmall);
        }
        let input = array_ref![src, 0, POOL_AUTHORITY_LEN];
        let (discriminator, mint, pool_share_mint, bump) = array_refs![input, 8, 32, 32, 1];

        if *discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        Ok(Self {
            mint: Pubkey::new_from_array(*mint),
            pool_share_mint: Pubkey::new_from_array(*pool_share_mint),
            bump: bump[0],
        })
    }
}
