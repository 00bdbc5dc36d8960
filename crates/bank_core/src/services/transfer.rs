//! crates/bank_core/src/services/transfer.rs
//!
//! Money transfers between accounts.
//!
//! A transfer runs `validate -> load origin -> check funds -> load target ->
//! begin -> rebind -> mutate -> commit`. The three mutations (insert the
//! transfer row, debit the origin, credit the target) run concurrently inside
//! one transaction; any failure after `begin` rolls the whole unit back.

use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    account_lookup_key, Account, GeneratedData, NewTransfer, Transfer, TransferDetailed,
    TransferDraft,
};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{
    AccountRepository, PortError, PortResult, TransactionManager, TransferRepository, TxHandle,
};
use crate::services::group::TaskGroup;
use crate::validation::validate;

#[derive(Clone)]
pub struct TransferService {
    tx_manager: Arc<dyn TransactionManager>,
    accounts: Arc<dyn AccountRepository>,
    transfers: Arc<dyn TransferRepository>,
}

/// Which side of a transfer an account lookup is for.
#[derive(Debug, Clone, Copy)]
enum Side {
    Origin,
    Target,
}

impl TransferService {
    pub fn new(
        tx_manager: Arc<dyn TransactionManager>,
        accounts: Arc<dyn AccountRepository>,
        transfers: Arc<dyn TransferRepository>,
    ) -> Self {
        Self {
            tx_manager,
            accounts,
            transfers,
        }
    }

    /// Lists the transfers an account sent or received.
    pub async fn list(&self, account_id: Uuid) -> ServiceResult<Vec<TransferDetailed>> {
        self.transfers.list(account_id).await.map_err(|e| {
            error!(%account_id, "Failed to list transfers: {:?}", e);
            ServiceError::CannotListTransfers
        })
    }

    /// Moves `amount` from the origin account to the target account.
    pub async fn create(&self, new_transfer: NewTransfer) -> ServiceResult<Transfer> {
        validate(&new_transfer)?;

        let origin = self
            .load_account(&new_transfer.origin_account_id, Side::Origin)
            .await?;
        if origin.balance < new_transfer.amount {
            return Err(ServiceError::InsufficientFunds);
        }

        let target = self
            .load_account(&new_transfer.target_account_id, Side::Target)
            .await?;
        if origin.id == target.id {
            return Err(ServiceError::SameAccount);
        }

        let draft = TransferDraft {
            origin_account_id: origin.id,
            target_account_id: target.id,
            amount: new_transfer.amount,
        };
        let Some(target_balance) = target.balance.checked_add(draft.amount) else {
            error!(target_account_id = %target.id, "Target balance would overflow");
            return Err(ServiceError::CannotCreateTransfer);
        };
        let origin_balance = origin.balance - draft.amount;

        let tx = self.tx_manager.create().await.map_err(|e| {
            error!("Failed to begin transfer transaction: {:?}", e);
            ServiceError::CannotCreateTransfer
        })?;

        let mutations = Mutations {
            draft,
            origin: &origin,
            origin_balance,
            target: &target,
            target_balance,
        };
        let generated = match self.mutate(&tx, mutations).await {
            Ok(generated) => generated,
            Err(e) => {
                error!(tx = %tx.id(), "Failed to apply transfer: {:?}", e);
                self.rollback(&tx).await;
                return Err(ServiceError::CannotCreateTransfer);
            }
        };
        let transfer = Transfer::from_draft(draft, generated);

        if let Err(e) = self.tx_manager.commit(&tx).await {
            error!(tx = %tx.id(), "Failed to commit transfer: {:?}", e);
            self.rollback(&tx).await;
            return Err(ServiceError::CannotCreateTransfer);
        }

        info!(
            transfer_id = %transfer.id,
            origin = %transfer.origin_account_id,
            target = %transfer.target_account_id,
            amount = transfer.amount,
            "Transfer created"
        );
        Ok(transfer)
    }

    async fn load_account(&self, value: &str, side: Side) -> ServiceResult<Account> {
        let key = account_lookup_key(value);
        match self.accounts.get_by_id_or_document(&key).await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(match side {
                Side::Origin => ServiceError::OriginAccountNotFound,
                Side::Target => ServiceError::TargetAccountNotFound,
            }),
            Err(e) => {
                error!(?side, "Failed to load account: {:?}", e);
                Err(ServiceError::CannotCreateTransfer)
            }
        }
    }

    /// Rebinds both repositories to `tx` and runs the three writes as one group.
    async fn mutate(&self, tx: &TxHandle, m: Mutations<'_>) -> PortResult<GeneratedData> {
        let accounts = self.accounts.with_transaction(tx)?;
        let transfers = self.transfers.with_transaction(tx)?;

        let generated = Arc::new(OnceLock::new());
        // Sharing the handle's token lets siblings queued on the connection
        // give up as soon as one write fails.
        let mut group: TaskGroup<PortError> = TaskGroup::with_token(tx.cancellation());

        let slot = generated.clone();
        let draft = m.draft;
        group.spawn(async move {
            let data = transfers.create(&draft).await?;
            let _ = slot.set(data);
            Ok(())
        });

        let debit = accounts.clone();
        let (origin_id, origin_before) = (m.origin.id, m.origin.balance);
        let origin_after = m.origin_balance;
        group.spawn(async move {
            debit
                .update_balance(origin_id, origin_after, origin_before)
                .await
        });

        let credit = accounts;
        let (target_id, target_before) = (m.target.id, m.target.balance);
        let target_after = m.target_balance;
        group.spawn(async move {
            credit
                .update_balance(target_id, target_after, target_before)
                .await
        });

        group.wait().await?;

        generated
            .get()
            .copied()
            .ok_or_else(|| PortError::Unexpected("transfer insert returned no data".to_string()))
    }

    /// Best-effort rollback; its own failure never replaces the original error.
    async fn rollback(&self, tx: &TxHandle) {
        if let Err(e) = self.tx_manager.rollback(tx).await {
            warn!(tx = %tx.id(), "Failed to roll back transfer transaction: {:?}", e);
        }
    }
}

struct Mutations<'a> {
    draft: TransferDraft,
    origin: &'a Account,
    origin_balance: i64,
    target: &'a Account,
    target_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockAccountRepository, MockTransactionManager, MockTransferRepository};
    use chrono::Utc;

    fn account(balance: i64) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "holder".to_string(),
            document: "12345678900".to_string(),
            balance,
            secret: String::new(),
            secret_salt: String::new(),
            created_at: Utc::now(),
        }
    }

    fn request(origin: &Account, target: &str, amount: i64) -> NewTransfer {
        NewTransfer {
            origin_account_id: origin.id.to_string(),
            target_account_id: target.to_string(),
            amount,
        }
    }

    fn service(
        tx: MockTransactionManager,
        accounts: MockAccountRepository,
        transfers: MockTransferRepository,
    ) -> TransferService {
        TransferService::new(Arc::new(tx), Arc::new(accounts), Arc::new(transfers))
    }

    #[tokio::test]
    async fn insufficient_funds_never_reads_the_target() {
        let origin = account(0);
        let mut accounts = MockAccountRepository::new();
        let found = origin.clone();
        accounts
            .expect_get_by_id_or_document()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));

        let mut tx = MockTransactionManager::new();
        tx.expect_create().never();

        let svc = service(tx, accounts, MockTransferRepository::new());
        let err = svc.create(request(&origin, "target", 500)).await.unwrap_err();
        assert_eq!(err, ServiceError::InsufficientFunds);
    }

    #[tokio::test]
    async fn missing_origin_is_not_found_and_opens_no_transaction() {
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_by_id_or_document()
            .times(1)
            .returning(|_| Ok(None));
        let mut tx = MockTransactionManager::new();
        tx.expect_create().never();

        let svc = service(tx, accounts, MockTransferRepository::new());
        let err = svc
            .create(NewTransfer {
                origin_account_id: "nobody".to_string(),
                target_account_id: "somebody".to_string(),
                amount: 10,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::OriginAccountNotFound);
    }

    #[tokio::test]
    async fn lookup_failure_is_generic_not_not_found() {
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_by_id_or_document()
            .returning(|_| Err(PortError::Unexpected("connection reset".to_string())));

        let svc = service(MockTransactionManager::new(), accounts, MockTransferRepository::new());
        let err = svc
            .create(NewTransfer {
                origin_account_id: "a".to_string(),
                target_account_id: "b".to_string(),
                amount: 10,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::CannotCreateTransfer);
    }

    #[tokio::test]
    async fn missing_target_is_its_own_kind() {
        let origin = account(1_000);
        let origin_key = origin.id.to_string();
        let found = origin.clone();
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_by_id_or_document()
            .times(2)
            .returning(move |value| {
                if value == origin_key {
                    Ok(Some(found.clone()))
                } else {
                    Ok(None)
                }
            });
        let mut tx = MockTransactionManager::new();
        tx.expect_create().never();

        let svc = service(tx, accounts, MockTransferRepository::new());
        let err = svc.create(request(&origin, "ghost", 10)).await.unwrap_err();
        assert_eq!(err, ServiceError::TargetAccountNotFound);
    }

    #[tokio::test]
    async fn validation_failure_is_returned_verbatim() {
        let svc = service(
            MockTransactionManager::new(),
            MockAccountRepository::new(),
            MockTransferRepository::new(),
        );
        let err = svc.create(NewTransfer::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(v) if v.violations.len() == 3));
    }

    #[tokio::test]
    async fn list_store_failure_is_collapsed() {
        let mut transfers = MockTransferRepository::new();
        transfers
            .expect_list()
            .returning(|_| Err(PortError::Unexpected("boom".to_string())));
        let svc = service(MockTransactionManager::new(), MockAccountRepository::new(), transfers);
        let err = svc.list(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, ServiceError::CannotListTransfers);
    }

    #[tokio::test]
    async fn rollback_failure_does_not_mask_the_original_error() {
        let origin = account(1_000);
        let target = account(0);
        let (o, t) = (origin.clone(), target.clone());
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_by_id_or_document()
            .returning(move |value| {
                if value == o.id.to_string() {
                    Ok(Some(o.clone()))
                } else {
                    Ok(Some(t.clone()))
                }
            });
        accounts
            .expect_with_transaction()
            .returning(|_| Err(PortError::Unexpected("foreign handle".to_string())));

        let mut tx = MockTransactionManager::new();
        tx.expect_create().times(1).returning(|| Ok(TxHandle::new(())));
        tx.expect_commit().never();
        tx.expect_rollback()
            .times(1)
            .returning(|_| Err(PortError::Unexpected("rollback failed".to_string())));

        let svc = service(tx, accounts, MockTransferRepository::new());
        let err = svc
            .create(request(&origin, &target.id.to_string(), 100))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::CannotCreateTransfer);
    }

    #[tokio::test]
    async fn same_account_by_id_and_document_is_rejected() {
        let origin = account(1_000);
        let found = origin.clone();
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_by_id_or_document()
            .times(2)
            .returning(move |_| Ok(Some(found.clone())));
        let mut tx = MockTransactionManager::new();
        tx.expect_create().never();

        let svc = service(tx, accounts, MockTransferRepository::new());
        let err = svc
            .create(request(&origin, &origin.document, 10))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::SameAccount);
    }
}
