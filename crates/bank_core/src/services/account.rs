//! crates/bank_core/src/services/account.rs
//!
//! Opening accounts and reading them back.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::{
    account_lookup_key, normalize_document, Account, AccountBalance, AccountDraft, NewAccount,
};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{AccountRepository, SecretHasher};
use crate::validation::validate;

#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    hasher: Arc<dyn SecretHasher>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>, hasher: Arc<dyn SecretHasher>) -> Self {
        Self { accounts, hasher }
    }

    /// Opens an account. The returned account carries no credential fields.
    pub async fn create(&self, new_account: NewAccount) -> ServiceResult<Account> {
        validate(&new_account)?;

        let secret_salt = self.hasher.gen_salt();
        let secret = self
            .hasher
            .encode(&new_account.secret, &secret_salt)
            .map_err(|e| {
                error!("Failed to encode secret: {:?}", e);
                ServiceError::CannotCreateAccount
            })?;
        let draft = AccountDraft {
            name: new_account.name,
            document: normalize_document(&new_account.document),
            balance: new_account.balance,
            secret,
            secret_salt,
        };

        match self.accounts.has_document(&draft.document).await {
            Ok(false) => {}
            Ok(true) => return Err(ServiceError::DocumentAlreadyExists),
            Err(e) => {
                error!("Failed to check document: {:?}", e);
                return Err(ServiceError::CannotCreateAccount);
            }
        }

        let generated = self.accounts.create(&draft).await.map_err(|e| {
            error!("Failed to insert account: {:?}", e);
            ServiceError::CannotCreateAccount
        })?;

        info!(account_id = %generated.id, "Account created");
        Ok(Account {
            id: generated.id,
            name: draft.name,
            document: draft.document,
            balance: draft.balance,
            secret: String::new(),
            secret_salt: String::new(),
            created_at: generated.created_at,
        })
    }

    pub async fn list(&self) -> ServiceResult<Vec<Account>> {
        self.accounts.list().await.map_err(|e| {
            error!("Failed to list accounts: {:?}", e);
            ServiceError::CannotListAccounts
        })
    }

    /// `account_id` may also be a document, formatted or not.
    pub async fn get_balance(&self, account_id: &str) -> ServiceResult<AccountBalance> {
        let key = account_lookup_key(account_id);
        match self.accounts.get_by_id_or_document(&key).await {
            Ok(Some(account)) => Ok(AccountBalance {
                balance: account.balance,
            }),
            Ok(None) => Err(ServiceError::AccountNotFound),
            Err(e) => {
                error!("Failed to load account balance: {:?}", e);
                Err(ServiceError::CannotGetBalance)
            }
        }
    }
}
