//! services/api/src/web/accounts.rs
//!
//! Public account endpoints: open an account, list accounts, read a balance.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use bank_core::domain::{Account, AccountBalance, NewAccount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{Envelope, HttpError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateAccountRequest {
    pub name: String,
    pub document: String,
    pub secret: String,
    /// Opening balance in cents. Must be at least 1.
    pub balance: i64,
}

impl From<CreateAccountRequest> for NewAccount {
    fn from(req: CreateAccountRequest) -> Self {
        NewAccount {
            name: req.name,
            document: req.document,
            secret: req.secret,
            balance: req.balance,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub document: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            document: account.document,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BalanceResponse {
    pub balance: i64,
}

impl From<AccountBalance> for BalanceResponse {
    fn from(balance: AccountBalance) -> Self {
        Self {
            balance: balance.balance,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /accounts - Open a new account
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    tag = "account",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = Envelope<AccountResponse>),
        (status = 400, description = "Invalid payload or document already registered", body = HttpError),
        (status = 500, description = "Internal server error", body = HttpError)
    )
)]
pub async fn create_account_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(req) = body?;
    let account = state.accounts.create(req.into()).await?;
    Ok(Envelope::ok(AccountResponse::from(account)))
}

/// GET /accounts - List every account
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    tag = "account",
    responses(
        (status = 200, description = "All accounts", body = Envelope<Vec<AccountResponse>>),
        (status = 500, description = "Internal server error", body = HttpError)
    )
)]
pub async fn list_accounts_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let accounts = state.accounts.list().await?;
    Ok(Envelope::ok(
        accounts
            .into_iter()
            .map(AccountResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// GET /accounts/{id}/balance - Read an account's balance
///
/// `id` may be the account ID or its document.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/balance",
    tag = "account",
    params(
        ("id" = String, Path, description = "Account ID or document")
    ),
    responses(
        (status = 200, description = "Current balance", body = Envelope<BalanceResponse>),
        (status = 400, description = "Account not found", body = HttpError),
        (status = 500, description = "Internal server error", body = HttpError)
    )
)]
pub async fn get_balance_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let balance = state.accounts.get_balance(&id).await?;
    Ok(Envelope::ok(BalanceResponse::from(balance)))
}
