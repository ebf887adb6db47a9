/// Account-level building blocks
///
/// - Deterministic address derivation (pool authority, canonical token accounts)
/// - The persisted pool authority record
/// - Resolution of existing token accounts and the pool record

pub mod address;
pub mod resolver;
pub mod state;

pub use address::{derive_associated_address, derive_bank_token, derive_pool_authority};
pub use resolver::{fetch_pool, resolve_token_account, PoolSnapshot};
pub use state::PoolAuthority;
