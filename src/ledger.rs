/// Read-only ledger access used by the resolve phase
/// Every call reflects the ledger at call time; nothing here caches or retries

use crate::accounts::address::derive_pool_authority;
use crate::accounts::state::PoolAuthority;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_program::program_pack::Pack;
use solana_sdk::{account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey};
use spl_token::state::{Account as TokenAccount, AccountState};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Queries the resolve phase needs from the ledger
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Addresses of every token account held by `owner` for `mint`
    async fn token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<Pubkey>>;

    /// Raw account at `address`, `None` when it does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;
}

async fn rpc_token_accounts(
    rpc: &RpcClient,
    owner: &Pubkey,
    mint: &Pubkey,
    commitment: CommitmentConfig,
) -> Result<Vec<Pubkey>> {
    let keyed_accounts = rpc
        .get_token_accounts_by_owner_with_commitment(owner, TokenAccountsFilter::Mint(*mint), commitment)
        .await?
        .value;

    keyed_accounts
        .iter()
        .map(|keyed| {
            Pubkey::from_str(&keyed.pubkey)
                .map_err(|_| ClientError::InvalidAddress(keyed.pubkey.clone()))
        })
        .collect()
}

async fn rpc_account(rpc: &RpcClient, address: &Pubkey, commitment: CommitmentConfig) -> Result<Option<Account>> {
    Ok(rpc.get_account_with_commitment(address, commitment).await?.value)
}

/// Reads at the `RpcClient`'s own commitment
#[async_trait]
impl LedgerReader for RpcClient {
    async fn token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<Pubkey>> {
        rpc_token_accounts(self, owner, mint, self.commitment()).await
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        rpc_account(self, address, self.commitment()).await
    }
}

/// RPC reader pinned to an explicit commitment
///
/// Used by [`crate::FlashLoanClient::connect`] and
/// [`crate::FlashLoanClient::over_rpc`] so the configured commitment applies
/// whatever the shared `RpcClient` was built with.
#[derive(Clone)]
pub struct CommittedRpc {
    rpc: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl CommittedRpc {
    pub fn new(rpc: Arc<RpcClient>, commitment: CommitmentConfig) -> Self {
        Self { rpc, commitment }
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }
}

#[async_trait]
impl LedgerReader for CommittedRpc {
    async fn token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<Pubkey>> {
        rpc_token_accounts(&self.rpc, owner, mint, self.commitment).await
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        rpc_account(&self.rpc, address, self.commitment).await
    }
}

#[async_trait]
impl<T: LedgerReader + ?Sized> LedgerReader for Arc<T> {
    async fn token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<Pubkey>> {
        (**self).token_accounts_by_owner(owner, mint).await
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        (**self).get_account(address).await
    }
}

/// In-memory ledger snapshot
///
/// Answers owner/mint queries by unpacking the SPL token accounts it holds,
/// so assemblers can be exercised without a network.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    accounts: RwLock<HashMap<Pubkey, Account>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, address: Pubkey, account: Account) {
        self.accounts.write().insert(address, account);
    }

    pub fn remove_account(&self, address: &Pubkey) -> Option<Account> {
        self.accounts.write().remove(address)
    }

    /// Store an initialized SPL token account at `address`
    pub fn insert_token_account(&self, address: Pubkey, owner: Pubkey, mint: Pubkey, amount: u64) {
        let token = TokenAccount {
            mint,
            owner,
            amount,
            state: AccountState::Initialized,
            ..TokenAccount::default()
        };
        let mut data = vec![0u8; TokenAccount::LEN];
        token.pack_into_slice(&mut data);

        self.insert_account(
            address,
            Account {
                lamports: 2_039_280,
                data,
                owner: spl_token::id(),
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    /// Store a pool authority record for `mint` at its derived address
    pub fn insert_pool(&self, program_id: &Pubkey, mint: Pubkey, pool_share_mint: Pubkey) -> Result<Pubkey> {
        let (pool_authority, bump) = derive_pool_authority(program_id, &mint)?;
        let record = PoolAuthority {
            mint,
            pool_share_mint,
            bump,
        };
        let mut data = vec![0u8; PoolAuthority::LEN];
        record.pack_into_slice(&mut data);

        self.insert_account(
            pool_authority,
            Account {
                lamports: 1_398_960,
                data,
                owner: *program_id,
                executable: false,
                rent_epoch: 0,
            },
        );
        Ok(pool_authority)
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<Pubkey>> {
        let accounts = self.accounts.read();
        let matches = accounts
            .iter()
            .filter(|(_, account)| account.owner == spl_token::id())
            .filter_map(|(address, account)| {
                let token = TokenAccount::unpack(&account.data).ok()?;
                (token.owner == *owner && token.mint == *mint).then_some(*address)
            })
            .collect();
        Ok(matches)
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        Ok(self.accounts.read().get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_ledger_filters_by_owner_and_mint() {
        let ledger = MemoryLedger::new();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let held = Pubkey::new_unique();

        ledger.insert_token_account(held, owner, mint, 10);
        ledger.insert_token_account(Pubkey::new_unique(), Pubkey::new_unique(), mint, 10);
        ledger.insert_token_account(Pubkey::new_unique(), owner, Pubkey::new_unique(), 10);

        let found = ledger.token_accounts_by_owner(&owner, &mint).await.unwrap();
        assert_eq!(found, vec![held]);
    }

    #[tokio::test]
    async fn test_memory_ledger_ignores_non_token_accounts() {
        let ledger = MemoryLedger::new();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        ledger.insert_pool(&Pubkey::new_unique(), mint, Pubkey::new_unique()).unwrap();

        assert!(ledger.token_accounts_by_owner(&owner, &mint).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_arc_reader_delegates() {
        let ledger = Arc::new(MemoryLedger::new());
        let address = Pubkey::new_unique();
        ledger.insert_token_account(address, Pubkey::new_unique(), Pubkey::new_unique(), 1);

        let reader: Arc<MemoryLedger> = Arc::clone(&ledger);
        assert!(LedgerReader::get_account(&reader, &address).await.unwrap().is_some());
        ledger.remove_account(&address);
        assert!(LedgerReader::get_account(&reader, &address).await.unwrap().is_none());
    }
}
