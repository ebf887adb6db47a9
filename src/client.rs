/// Flash loan client: resolves ledger state, then assembles instruction plans
///
/// Holds no mutable state; concurrent calls are independent and each one
/// observes the ledger at call time.

use crate::accounts::address::derive_pool_authority;
use crate::accounts::resolver::{fetch_pool, resolve_token_account, PoolSnapshot};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::instruction::assembler::{
    assemble_borrow, assemble_deposit, assemble_flash_loan, assemble_init_pool, assemble_repay,
    assemble_withdraw, BorrowPlan, DepositPlan, DepositRequest, FlashLoanPlan, InitPoolPlan,
    InitPoolRequest, RepayPlan, WithdrawPlan, WithdrawRequest,
};
use crate::ledger::{CommittedRpc, LedgerReader};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

pub struct FlashLoanClient<L> {
    config: ClientConfig,
    ledger: L,
}

impl FlashLoanClient<CommittedRpc> {
    /// Client over a fresh RPC connection using the configured commitment
    pub fn connect(config: ClientConfig, rpc_url: String) -> Self {
        let rpc = RpcClient::new_with_commitment(rpc_url, config.commitment_config());
        Self::over_rpc(config, Arc::new(rpc))
    }

    /// Client over a shared RPC connection
    ///
    /// Reads use `config.commitment`, not the commitment `rpc` was built with.
    /// Passing the `RpcClient` to [`FlashLoanClient::new`] instead keeps the
    /// client's own commitment.
    pub fn over_rpc(config: ClientConfig, rpc: Arc<RpcClient>) -> Self {
        let ledger = CommittedRpc::new(rpc, config.commitment_config());
        Self::new(config, ledger)
    }
}

impl<L: LedgerReader> FlashLoanClient<L> {
    pub fn new(config: ClientConfig, ledger: L) -> Self {
        Self { config, ledger }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Pool authority address and bump for `mint`
    pub fn pool_authority(&self, mint: &Pubkey) -> Result<(Pubkey, u8)> {
        derive_pool_authority(&self.config.program_id, mint)
    }

    /// Read the pool record for `mint`
    pub async fn fetch_pool(&self, mint: &Pubkey) -> Result<PoolSnapshot> {
        fetch_pool(&self.ledger, &self.config.program_id, mint).await
    }

    /// Build the instructions that create a pool for `request.mint`
    pub async fn init_pool(&self, request: &InitPoolRequest) -> Result<InitPoolPlan> {
        let funder_token = resolve_token_account(&self.ledger, &request.funder, &request.mint).await?;
        if funder_token.is_none() {
            log::debug!("funder {} has no token account for {}, creating one", request.funder, request.mint);
        }

        let plan = assemble_init_pool(&self.config, request, funder_token)?;
        log::info!(
            "init pool plan: mint={}, pool_authority={}, instructions={}",
            request.mint,
            plan.pool_authority,
            plan.instructions.len()
        );
        Ok(plan)
    }

    /// Build a deposit; the pool must already exist
    pub async fn deposit(&self, request: &DepositRequest) -> Result<DepositPlan> {
        // the share mint is only known once the pool record is read
        let pool = self.fetch_pool(&request.mint).await?;
        let share_token =
            resolve_token_account(&self.ledger, &request.depositor, &pool.record.pool_share_mint).await?;
        if share_token.is_none() {
            log::debug!("depositor {} has no pool share account, creating one", request.depositor);
        }

        let plan = assemble_deposit(&self.config, request, &pool, share_token)?;
        log::info!(
            "deposit plan: mint={}, amount={}, instructions={}",
            request.mint,
            request.amount,
            plan.instructions.len()
        );
        Ok(plan)
    }

    /// Build a withdrawal; the pool must already exist
    pub async fn withdraw(&self, request: &WithdrawRequest) -> Result<WithdrawPlan> {
        let (pool, token_to) = futures::try_join!(
            self.fetch_pool(&request.mint),
            resolve_token_account(&self.ledger, &request.withdrawer, &request.mint),
        )?;
        if token_to.is_none() {
            log::debug!("withdrawer {} has no token account for {}, creating one", request.withdrawer, request.mint);
        }

        let plan = assemble_withdraw(&self.config, request, &pool, token_to)?;
        log::info!(
            "withdraw plan: mint={}, shares={}, instructions={}",
            request.mint,
            request.amount,
            plan.instructions.len()
        );
        Ok(plan)
    }

    /// Borrow half of a flash loan; see [`FlashLoanClient::flash_loan`]
    pub fn borrow(&self, borrower: &Pubkey, mint: &Pubkey, amount: u64) -> Result<BorrowPlan> {
        assemble_borrow(&self.config, borrower, mint, amount)
    }

    /// Repay half of a flash loan for a borrow of `amount`
    pub fn repay(&self, repayer: &Pubkey, mint: &Pubkey, amount: u64) -> Result<RepayPlan> {
        assemble_repay(&self.config, repayer, mint, amount)
    }

    /// Matching borrow and repay for `amount`
    ///
    /// The caller must submit both in one transaction with the borrow first,
    /// e.g. via [`FlashLoanPlan::wrap`]. The program rejects anything else.
    pub fn flash_loan(&self, borrower: &Pubkey, mint: &Pubkey, amount: u64) -> Result<FlashLoanPlan> {
        let plan = assemble_flash_loan(&self.config, borrower, mint, amount)?;
        log::info!(
            "flash loan plan: mint={}, amount={}, repayment={}",
            mint,
            amount,
            plan.repayment_amount()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::address::derive_associated_address;
    use crate::error::ClientError;
    use crate::ledger::MemoryLedger;
    use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    struct Fixture {
        client: FlashLoanClient<Arc<MemoryLedger>>,
        ledger: Arc<MemoryLedger>,
        mint: Pubkey,
        share_mint: Pubkey,
    }

    fn fixture() -> Fixture {
        init_logger();
        let config = ClientConfig::default().with_program_id(Pubkey::new_unique());
        let ledger = Arc::new(MemoryLedger::new());
        let mint = Pubkey::new_unique();
        let share_mint = Pubkey::new_unique();
        ledger.insert_pool(&config.program_id, mint, share_mint).unwrap();

        Fixture {
            client: FlashLoanClient::new(config, Arc::clone(&ledger)),
            ledger,
            mint,
            share_mint,
        }
    }

    #[tokio::test]
    async fn test_deposit_creates_share_account_once() {
        let f = fixture();
        let depositor = Pubkey::new_unique();
        let request = DepositRequest {
            depositor,
            mint: f.mint,
            token_from: derive_associated_address(&depositor, &f.mint),
            amount: 1_000,
        };

        let plan = f.client.deposit(&request).await.unwrap();
        assert_eq!(plan.instructions.len(), 2);

        f.ledger
            .insert_token_account(plan.pool_share_token_to, depositor, f.share_mint, 0);
        let plan = f.client.deposit(&request).await.unwrap();
        assert_eq!(plan.instructions.len(), 1);
    }

    #[tokio::test]
    async fn test_deposit_is_idempotent_over_same_state() {
        let f = fixture();
        let depositor = Pubkey::new_unique();
        let request = DepositRequest {
            depositor,
            mint: f.mint,
            token_from: Pubkey::new_unique(),
            amount: 42,
        };

        let first = f.client.deposit(&request).await.unwrap();
        let second = f.client.deposit(&request).await.unwrap();
        assert_eq!(first.instructions(), second.instructions());
    }

    #[tokio::test]
    async fn test_deposit_requires_pool() {
        let f = fixture();
        let request = DepositRequest {
            depositor: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            token_from: Pubkey::new_unique(),
            amount: 1,
        };

        let err = f.client.deposit(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::PoolNotInitialized { .. }));
    }

    #[tokio::test]
    async fn test_withdraw_prefers_existing_destination() {
        let f = fixture();
        let withdrawer = Pubkey::new_unique();
        let other = Pubkey::new_from_array([3u8; 32]);
        f.ledger.insert_token_account(other, withdrawer, f.mint, 0);

        let request = WithdrawRequest {
            withdrawer,
            mint: f.mint,
            pool_share_token_from: Pubkey::new_unique(),
            amount: 5,
        };
        let plan = f.client.withdraw(&request).await.unwrap();
        assert_eq!(plan.token_to, other);
        assert_eq!(plan.instructions.len(), 1);
        assert_eq!(plan.signers(), vec![withdrawer]);
    }

    #[tokio::test]
    async fn test_init_pool_resolves_funder() {
        let f = fixture();
        let funder = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let request = InitPoolRequest {
            funder,
            mint,
            pool_share_mint: Pubkey::new_unique(),
            pool_share_mint_authority: Pubkey::new_unique(),
        };

        assert_eq!(f.client.init_pool(&request).await.unwrap().instructions.len(), 3);

        f.ledger
            .insert_token_account(derive_associated_address(&funder, &mint), funder, mint, 0);
        let plan = f.client.init_pool(&request).await.unwrap();
        assert_eq!(plan.instructions.len(), 2);
        assert_eq!(plan.pool_authority, f.client.pool_authority(&mint).unwrap().0);
    }

    #[tokio::test]
    async fn test_shared_rpc_reads_at_configured_commitment() {
        let rpc = Arc::new(RpcClient::new_with_commitment(
            "http://127.0.0.1:8899".to_string(),
            CommitmentConfig::finalized(),
        ));
        let config = ClientConfig::default().with_commitment(CommitmentLevel::Processed);

        let client = FlashLoanClient::over_rpc(config, Arc::clone(&rpc));
        assert_eq!(client.ledger().commitment(), CommitmentConfig::processed());
        assert_eq!(rpc.commitment(), CommitmentConfig::finalized());

        let connected = FlashLoanClient::connect(config, "http://127.0.0.1:8899".to_string());
        assert_eq!(connected.ledger().commitment(), CommitmentConfig::processed());
        assert_eq!(connected.ledger().rpc().commitment(), CommitmentConfig::processed());
    }

    #[tokio::test]
    async fn test_flash_loan_needs_no_reads() {
        let f = fixture();
        let plan = f.client.flash_loan(&Pubkey::new_unique(), &f.mint, 1_000_000).unwrap();
        assert_eq!(plan.repayment_amount(), 1_000_950);
        assert_eq!(f.client.repay(&Pubkey::new_unique(), &f.mint, 1_000_000).unwrap().repayment_amount(), 1_000_950);
        assert_eq!(f.client.borrow(&Pubkey::new_unique(), &f.mint, 9).unwrap().amount, 9);
    }
}
