//! crates/bank_core/src/error.rs
//!
//! Error kinds surfaced by the application services.
//!
//! Expected outcomes (validation, not-found, insufficient funds, bad
//! credentials) are returned as-is. Every store, cache or transaction failure
//! is logged where it happens and collapsed into one of the generic kinds, so
//! no internal error text crosses the service boundary.

use crate::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // === Accounts ===
    #[error("account.cant-create-account")]
    CannotCreateAccount,
    #[error("account.document-already-exists")]
    DocumentAlreadyExists,
    #[error("account.cant-list-accounts")]
    CannotListAccounts,
    #[error("account.account-not-found")]
    AccountNotFound,
    #[error("account.cant-get-balance")]
    CannotGetBalance,

    // === Transfers ===
    #[error("transfer.cant-create-transfer")]
    CannotCreateTransfer,
    #[error("transfer.cant-list-transfer")]
    CannotListTransfers,
    #[error("transfer.origin-not-found")]
    OriginAccountNotFound,
    #[error("transfer.target-not-found")]
    TargetAccountNotFound,
    #[error("transfer.insufficient-funds")]
    InsufficientFunds,
    #[error("transfer.same-account")]
    SameAccount,

    // === Authentication ===
    #[error("auth.cant-auth")]
    CannotAuth,
    #[error("auth.invalid-credentials")]
    InvalidCredentials,
    #[error("auth.cant-get-session")]
    CannotGetSession,
    #[error("auth.session-not-found")]
    SessionNotFound,
}

impl ServiceError {
    /// True for the catch-all kinds that stand in for an internal failure.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ServiceError::CannotCreateAccount
                | ServiceError::CannotListAccounts
                | ServiceError::CannotGetBalance
                | ServiceError::CannotCreateTransfer
                | ServiceError::CannotListTransfers
                | ServiceError::CannotAuth
                | ServiceError::CannotGetSession
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
