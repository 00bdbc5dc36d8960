//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapters, the concrete implementations of
//! the `TransactionManager`, `AccountRepository` and `TransferRepository` ports
//! from the `bank_core` crate. It handles all interactions with the PostgreSQL
//! database using `sqlx`.

use async_trait::async_trait;
use bank_core::domain::{
    Account, AccountDraft, GeneratedData, Transfer, TransferDetailed, TransferDraft,
};
use bank_core::ports::{
    AccountRepository, PortError, PortResult, TransactionManager, TransferRepository, TxHandle,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Migrations
//=========================================================================================

/// Owns the pool for startup-only chores.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Transactions
//=========================================================================================

/// A live PostgreSQL transaction shared by every repository bound to it.
///
/// The connection is taken out on commit or rollback; any query issued after
/// that fails instead of silently running outside the transaction.
pub struct PgTx {
    inner: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgTx {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            inner: Mutex::new(Some(tx)),
        }
    }

    async fn take(&self) -> Option<Transaction<'static, Postgres>> {
        self.inner.lock().await.take()
    }
}

fn pg_tx(handle: &TxHandle) -> PortResult<Arc<PgTx>> {
    handle
        .downcast_ref::<Arc<PgTx>>()
        .cloned()
        .ok_or_else(|| {
            PortError::Unexpected(format!("transaction {} was not opened by postgres", handle.id()))
        })
}

#[derive(Clone)]
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    async fn create(&self) -> PortResult<TxHandle> {
        let tx = self.pool.begin().await.map_err(unexpected)?;
        let handle = TxHandle::new(Arc::new(PgTx::new(tx)));
        debug!(tx = %handle.id(), "Transaction opened");
        Ok(handle)
    }

    async fn commit(&self, handle: &TxHandle) -> PortResult<()> {
        let tx = pg_tx(handle)?
            .take()
            .await
            .ok_or_else(|| PortError::Unexpected("transaction already finished".to_string()))?;
        tx.commit().await.map_err(unexpected)
    }

    async fn rollback(&self, handle: &TxHandle) -> PortResult<()> {
        match pg_tx(handle)?.take().await {
            Some(tx) => tx.rollback().await.map_err(unexpected),
            // A failed commit already consumed the connection, and sqlx rolls
            // back on drop.
            None => {
                debug!(tx = %handle.id(), "Rollback on a finished transaction");
                Ok(())
            }
        }
    }
}

//=========================================================================================
// Query executor (pool or transaction)
//=========================================================================================

/// Where a repository sends its statements.
///
/// Statements bound to a transaction queue on its single connection. They
/// stop waiting as soon as the handle is cancelled; nothing has been sent
/// for them at that point.
#[derive(Clone)]
enum Executor {
    Pool(PgPool),
    Tx(Arc<PgTx>, CancellationToken),
}

impl Executor {
    fn bound_to(handle: &TxHandle) -> PortResult<Self> {
        Ok(Executor::Tx(pg_tx(handle)?, handle.cancellation()))
    }

    async fn fetch_optional<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> PortResult<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match self {
            Executor::Pool(pool) => query.fetch_optional(pool).await.map_err(unexpected),
            Executor::Tx(tx, cancel) => {
                let mut guard = lock_unless_cancelled(&tx.inner, cancel).await?;
                let conn = guard.as_mut().ok_or_else(finished)?;
                query.fetch_optional(&mut **conn).await.map_err(unexpected)
            }
        }
    }

    async fn fetch_one<'q, T>(&self, query: QueryAs<'q, Postgres, T, PgArguments>) -> PortResult<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match self {
            Executor::Pool(pool) => query.fetch_one(pool).await.map_err(unexpected),
            Executor::Tx(tx, cancel) => {
                let mut guard = lock_unless_cancelled(&tx.inner, cancel).await?;
                let conn = guard.as_mut().ok_or_else(finished)?;
                query.fetch_one(&mut **conn).await.map_err(unexpected)
            }
        }
    }

    async fn fetch_all<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> PortResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match self {
            Executor::Pool(pool) => query.fetch_all(pool).await.map_err(unexpected),
            Executor::Tx(tx, cancel) => {
                let mut guard = lock_unless_cancelled(&tx.inner, cancel).await?;
                let conn = guard.as_mut().ok_or_else(finished)?;
                query.fetch_all(&mut **conn).await.map_err(unexpected)
            }
        }
    }

    /// Runs a statement and returns the number of affected rows.
    async fn execute<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> PortResult<u64> {
        let result = match self {
            Executor::Pool(pool) => query.execute(pool).await,
            Executor::Tx(tx, cancel) => {
                let mut guard = lock_unless_cancelled(&tx.inner, cancel).await?;
                let conn = guard.as_mut().ok_or_else(finished)?;
                query.execute(&mut **conn).await
            }
        };
        result.map(|done| done.rows_affected()).map_err(unexpected)
    }
}

fn finished() -> PortError {
    PortError::Unexpected("transaction already finished".to_string())
}

async fn lock_unless_cancelled<'a, T>(
    mutex: &'a Mutex<T>,
    cancel: &CancellationToken,
) -> PortResult<MutexGuard<'a, T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PortError::Unexpected(
            "transaction cancelled by a failed sibling statement".to_string(),
        )),
        guard = mutex.lock() => Ok(guard),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    name: String,
    document: String,
    balance: i64,
    secret: String,
    secret_salt: String,
    created_at: DateTime<Utc>,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            name: self.name,
            document: self.document,
            balance: self.balance,
            secret: self.secret,
            secret_salt: self.secret_salt,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct GeneratedRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
}
impl GeneratedRecord {
    fn to_domain(self) -> GeneratedData {
        GeneratedData {
            id: self.id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TransferDetailedRecord {
    id: Uuid,
    origin_account_id: Uuid,
    target_account_id: Uuid,
    amount: i64,
    created_at: DateTime<Utc>,
    sent: bool,
    origin_account_name: String,
    target_account_name: String,
}
impl TransferDetailedRecord {
    fn to_domain(self) -> TransferDetailed {
        TransferDetailed {
            transfer: Transfer {
                id: self.id,
                origin_account_id: self.origin_account_id,
                target_account_id: self.target_account_id,
                amount: self.amount,
                created_at: self.created_at,
            },
            sent: self.sent,
            origin_account_name: self.origin_account_name,
            target_account_name: self.target_account_name,
        }
    }
}

//=========================================================================================
// `AccountRepository` Implementation
//=========================================================================================

const ACCOUNT_BY_ID_OR_DOCUMENT: &str =
    "SELECT id, name, document, balance, secret, secret_salt, created_at
     FROM accounts WHERE id = $1 OR document = $2
     LIMIT 1";

const ACCOUNT_BY_DOCUMENT: &str =
    "SELECT id, name, document, balance, secret, secret_salt, created_at
     FROM accounts WHERE document = $1";

/// Picks the lookup statement for a value that may be an ID or a document.
///
/// `id` is only ever compared as a UUID so the primary key index applies. A
/// value that parses as a UUID still checks the document column, since a
/// 32-digit document is also valid UUID text.
fn account_lookup(value: &str) -> (&'static str, Option<Uuid>) {
    match Uuid::parse_str(value) {
        Ok(id) => (ACCOUNT_BY_ID_OR_DOCUMENT, Some(id)),
        Err(_) => (ACCOUNT_BY_DOCUMENT, None),
    }
}

#[derive(Clone)]
pub struct PgAccountRepository {
    executor: Executor,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            executor: Executor::Pool(pool),
        }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create(&self, account: &AccountDraft) -> PortResult<GeneratedData> {
        let query = sqlx::query_as::<_, GeneratedRecord>(
            "INSERT INTO accounts (name, document, balance, secret, secret_salt)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, created_at",
        )
        .bind(&account.name)
        .bind(&account.document)
        .bind(account.balance)
        .bind(&account.secret)
        .bind(&account.secret_salt);

        Ok(self.executor.fetch_one(query).await?.to_domain())
    }

    async fn has_document(&self, document: &str) -> PortResult<bool> {
        let query = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE document = $1)",
        )
        .bind(document);

        let (exists,) = self.executor.fetch_one(query).await?;
        Ok(exists)
    }

    async fn list(&self) -> PortResult<Vec<Account>> {
        let query = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, name, document, balance, secret, secret_salt, created_at
             FROM accounts ORDER BY created_at",
        );

        let records = self.executor.fetch_all(query).await?;
        Ok(records
            .into_iter()
            .map(|record| record.to_domain().without_secret())
            .collect())
    }

    async fn get_by_id_or_document(&self, value: &str) -> PortResult<Option<Account>> {
        let query = match account_lookup(value) {
            (sql, Some(id)) => sqlx::query_as::<_, AccountRecord>(sql).bind(id).bind(value),
            (sql, None) => sqlx::query_as::<_, AccountRecord>(sql).bind(value),
        };

        Ok(self
            .executor
            .fetch_optional(query)
            .await?
            .map(AccountRecord::to_domain))
    }

    async fn update_balance(
        &self,
        account_id: Uuid,
        balance: i64,
        expected_balance: i64,
    ) -> PortResult<()> {
        let query = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2 AND balance = $3")
            .bind(balance)
            .bind(account_id)
            .bind(expected_balance);

        match self.executor.execute(query).await? {
            0 => Err(PortError::Conflict(format!(
                "account {account_id} no longer holds balance {expected_balance}"
            ))),
            _ => Ok(()),
        }
    }

    fn with_transaction(&self, tx: &TxHandle) -> PortResult<Arc<dyn AccountRepository>> {
        Ok(Arc::new(Self {
            executor: Executor::bound_to(tx)?,
        }))
    }
}

//=========================================================================================
// `TransferRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgTransferRepository {
    executor: Executor,
}

impl PgTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            executor: Executor::Pool(pool),
        }
    }
}

#[async_trait]
impl TransferRepository for PgTransferRepository {
    async fn create(&self, transfer: &TransferDraft) -> PortResult<GeneratedData> {
        let query = sqlx::query_as::<_, GeneratedRecord>(
            "INSERT INTO transfers (origin_account_id, target_account_id, amount)
             VALUES ($1, $2, $3)
             RETURNING id, created_at",
        )
        .bind(transfer.origin_account_id)
        .bind(transfer.target_account_id)
        .bind(transfer.amount);

        Ok(self.executor.fetch_one(query).await?.to_domain())
    }

    async fn list(&self, account_id: Uuid) -> PortResult<Vec<TransferDetailed>> {
        let query = sqlx::query_as::<_, TransferDetailedRecord>(
            "SELECT t.id, t.origin_account_id, t.target_account_id, t.amount, t.created_at,
                    t.origin_account_id = $1 AS sent,
                    origin.name AS origin_account_name,
                    target.name AS target_account_name
             FROM transfers t
             JOIN accounts origin ON origin.id = t.origin_account_id
             JOIN accounts target ON target.id = t.target_account_id
             WHERE t.origin_account_id = $1 OR t.target_account_id = $1
             ORDER BY t.created_at DESC",
        )
        .bind(account_id);

        let records = self.executor.fetch_all(query).await?;
        Ok(records
            .into_iter()
            .map(TransferDetailedRecord::to_domain)
            .collect())
    }

    fn with_transaction(&self, tx: &TxHandle) -> PortResult<Arc<dyn TransferRepository>> {
        Ok(Arc::new(Self {
            executor: Executor::bound_to(tx)?,
        }))
    }
}
