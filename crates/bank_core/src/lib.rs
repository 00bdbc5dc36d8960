pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod validation;

pub use domain::{
    account_lookup_key, normalize_document, Account, AccountBalance, AccountDraft, Credentials,
    GeneratedData, NewAccount, NewTransfer, Session, Transfer, TransferDetailed, TransferDraft,
};
pub use error::{ServiceError, ServiceResult};
pub use ports::{
    AccountRepository, CacheError, CacheStore, PortError, PortResult, SecretHasher,
    TransactionManager, TransferRepository, TxHandle,
};
pub use services::{AccountService, AuthService, TransferService};
pub use validation::{ValidationError, Violation};
