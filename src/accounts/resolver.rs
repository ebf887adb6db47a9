/// Resolution of existing token accounts and the pool record
/// "No account found" is an ordinary outcome here, it drives account creation downstream

use crate::accounts::address::{derive_associated_address, derive_bank_token, derive_pool_authority};
use crate::accounts::state::PoolAuthority;
use crate::error::{ClientError, Result};
use crate::ledger::LedgerReader;
use solana_sdk::pubkey::Pubkey;

/// Pool record together with the addresses derived from it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool_authority: Pubkey,
    pub bank_token: Pubkey,
    pub record: PoolAuthority,
}

/// Find a token account of `owner` for `mint`
///
/// Prefers the canonical associated account. Falls back to the lowest-sorting
/// other match so that repeated calls over the same state agree.
pub async fn resolve_token_account<L>(ledger: &L, owner: &Pubkey, mint: &Pubkey) -> Result<Option<Pubkey>>
where
    L: LedgerReader + ?Sized,
{
    let candidates = ledger.token_accounts_by_owner(owner, mint).await?;
    let canonical = derive_associated_address(owner, mint);

    if candidates.contains(&canonical) {
        return Ok(Some(canonical));
    }

    let fallback = candidates.into_iter().min();
    if let Some(address) = fallback {
        log::debug!("owner {} holds {} only in non-canonical account {}", owner, mint, address);
    }
    Ok(fallback)
}

/// Read the pool record for `mint`
///
/// Fails with [`ClientError::PoolNotInitialized`] when the pool does not exist yet.
pub async fn fetch_pool<L>(ledger: &L, program_id: &Pubkey, mint: &Pubkey) -> Result<PoolSnapshot>
where
    L: LedgerReader + ?Sized,
{
    let (pool_authority, _) = derive_pool_authority(program_id, mint)?;
    log::debug!("fetching pool authority {} for mint {}", pool_authority, mint);

    let account = ledger
        .get_account(&pool_authority)
        .await?
        .ok_or(ClientError::PoolNotInitialized {
            pool: pool_authority,
            mint: *mint,
        })?;

    if account.owner != *program_id {
        return Err(ClientError::UnexpectedOwner {
            address: pool_authority,
            expected: *program_id,
            actual: account.owner,
        });
    }

    let record = PoolAuthority::try_from_account_data(&account.data).map_err(|e| {
        ClientError::InvalidPoolData {
            address: pool_authority,
            reason: e.to_string(),
        }
    })?;

    if record.mint != *mint {
        return Err(ClientError::InvalidPoolData {
            address: pool_authority,
            reason: format!("record mint {} does not match {}", record.mint, mint),
        });
    }

    Ok(PoolSnapshot {
        pool_authority,
        bank_token: derive_bank_token(&pool_authority, mint),
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use solana_sdk::account::Account;

    #[tokio::test]
    async fn test_prefers_canonical_account() {
        let ledger = MemoryLedger::new();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let canonical = derive_associated_address(&owner, &mint);

        // a lower-sorting alternative must not win over the canonical account
        ledger.insert_token_account(Pubkey::new_from_array([0u8; 32]), owner, mint, 5);
        ledger.insert_token_account(canonical, owner, mint, 0);

        let resolved = resolve_token_account(&ledger, &owner, &mint).await.unwrap();
        assert_eq!(resolved, Some(canonical));
    }

    #[tokio::test]
    async fn test_falls_back_to_other_account() {
        let ledger = MemoryLedger::new();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let low = Pubkey::new_from_array([1u8; 32]);
        let high = Pubkey::new_from_array([9u8; 32]);

        ledger.insert_token_account(high, owner, mint, 5);
        ledger.insert_token_account(low, owner, mint, 5);

        let resolved = resolve_token_account(&ledger, &owner, &mint).await.unwrap();
        assert_eq!(resolved, Some(low));
    }

    #[tokio::test]
    async fn test_none_when_nothing_matches() {
        let ledger = MemoryLedger::new();
        let resolved = resolve_token_account(&ledger, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn test_fetch_pool_reads_record() {
        let ledger = MemoryLedger::new();
        let program_id = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let share_mint = Pubkey::new_unique();
        let pool_authority = ledger.insert_pool(&program_id, mint, share_mint).unwrap();

        let snapshot = fetch_pool(&ledger, &program_id, &mint).await.unwrap();
        assert_eq!(snapshot.pool_authority, pool_authority);
        assert_eq!(snapshot.record.pool_share_mint, share_mint);
        assert_eq!(snapshot.bank_token, derive_associated_address(&pool_authority, &mint));
    }

    #[tokio::test]
    async fn test_fetch_pool_before_init_fails() {
        let ledger = MemoryLedger::new();
        let err = fetch_pool(&ledger, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PoolNotInitialized { .. }));
    }

    #[tokio::test]
    async fn test_fetch_pool_rejects_foreign_owner() {
        let ledger = MemoryLedger::new();
        let program_id = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let pool_authority = ledger.insert_pool(&program_id, mint, Pubkey::new_unique()).unwrap();

        let mut account: Account = ledger.remove_account(&pool_authority).unwrap();
        account.owner = Pubkey::new_unique();
        ledger.insert_account(pool_authority, account);

        let err = fetch_pool(&ledger, &program_id, &mint).await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedOwner { .. }));
    }
}
