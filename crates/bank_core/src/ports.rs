//! crates/bank_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the relational store, the cache and the hashing scheme.

use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{Account, AccountDraft, GeneratedData, TransferDetailed, TransferDraft};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all store port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A guarded write matched no row because the row changed underneath it.
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

impl From<tokio::task::JoinError> for PortError {
    fn from(e: tokio::task::JoinError) -> Self {
        PortError::Unexpected(format!("sub-operation did not complete: {e}"))
    }
}

//=========================================================================================
// Transactions
//=========================================================================================

/// An opaque unit-of-work token.
///
/// Only the adapter that minted a handle can look inside it; everyone else
/// passes it back to the [`TransactionManager`] or into `with_transaction`.
///
/// Every clone shares one cancellation token. It fires when a write running
/// on the transaction fails, and repositories bound to the handle stop
/// waiting for the connection once it has.
#[derive(Clone)]
pub struct TxHandle {
    id: Uuid,
    inner: Arc<dyn Any + Send + Sync>,
    cancel: CancellationToken,
}

impl TxHandle {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(inner),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Borrows the adapter-specific state, if the handle was minted with `T`.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle").field("id", &self.id).finish()
    }
}

/// Opens, commits and rolls back units of work against the relational store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Begins a new unit of work.
    async fn create(&self) -> PortResult<TxHandle>;

    /// Finalizes every write made through repositories bound to `tx`.
    async fn commit(&self, tx: &TxHandle) -> PortResult<()>;

    /// Discards every write made through repositories bound to `tx`.
    async fn rollback(&self, tx: &TxHandle) -> PortResult<()>;
}

//=========================================================================================
// Repositories
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: &AccountDraft) -> PortResult<GeneratedData>;

    async fn has_document(&self, document: &str) -> PortResult<bool>;

    async fn list(&self) -> PortResult<Vec<Account>>;

    /// Looks an account up by ID or normalized document in one query.
    ///
    /// `Ok(None)` means no row matched; `Err` means the query itself failed.
    async fn get_by_id_or_document(&self, value: &str) -> PortResult<Option<Account>>;

    /// Writes an absolute balance, guarded by the balance the caller read.
    ///
    /// Fails with [`PortError::Conflict`] when the stored balance is no longer
    /// `expected_balance`, so two transfers racing on one account cannot both
    /// land a value computed from the same read.
    async fn update_balance(
        &self,
        account_id: Uuid,
        balance: i64,
        expected_balance: i64,
    ) -> PortResult<()>;

    /// Returns a new repository that executes on `tx` instead of the pool.
    /// `self` is left untouched.
    fn with_transaction(&self, tx: &TxHandle) -> PortResult<Arc<dyn AccountRepository>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn create(&self, transfer: &TransferDraft) -> PortResult<GeneratedData>;

    /// Transfers where `account_id` is either the sender or the receiver.
    async fn list(&self, account_id: Uuid) -> PortResult<Vec<TransferDetailed>>;

    /// Returns a new repository that executes on `tx` instead of the pool.
    fn with_transaction(&self, tx: &TxHandle) -> PortResult<Arc<dyn TransferRepository>>;
}

//=========================================================================================
// Session Cache
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache key is missing")]
    Missing,
    #[error("Cache failure: {0}")]
    Unexpected(String),
}

impl CacheError {
    /// True when the error only means the key does not exist (or expired).
    pub fn is_missing(&self) -> bool {
        matches!(self, CacheError::Missing)
    }
}

/// A key/value store with per-key expiration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<String, CacheError>;

    /// Reads a key and resets its expiration to `ttl` from now.
    async fn get_updating(&self, key: &str, ttl: Duration) -> Result<String, CacheError>;
}

//=========================================================================================
// Secret Hashing
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
pub trait SecretHasher: Send + Sync {
    fn gen_salt(&self) -> String;

    fn encode(&self, plain: &str, salt: &str) -> PortResult<String>;

    fn verify(&self, plain: &str, encoded: &str, salt: &str) -> bool;
}
