//! services/api/src/web/transfers.rs
//!
//! Private transfer endpoints. The origin of every transfer is the account
//! behind the caller's session.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Extension, Json,
};
use bank_core::domain::{NewTransfer, Session, Transfer, TransferDetailed};
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
pub struct CreateTransferRequest {
    /// Target account ID or document.
    pub target_account_id: String,
    /// Amount in cents. Must be at least 1.
    pub amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    pub id: Uuid,
    pub origin_account_id: Uuid,
    pub target_account_id: Uuid,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            id: transfer.id,
            origin_account_id: transfer.origin_account_id,
            target_account_id: transfer.target_account_id,
            amount: transfer.amount,
            created_at: transfer.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TransferDetailedResponse {
    #[serde(flatten)]
    pub transfer: TransferResponse,
    /// True when the caller's account sent the transfer.
    pub sent: bool,
    pub origin_account_name: String,
    pub target_account_name: String,
}

impl From<TransferDetailed> for TransferDetailedResponse {
    fn from(detailed: TransferDetailed) -> Self {
        Self {
            transfer: detailed.transfer.into(),
            sent: detailed.sent,
            origin_account_name: detailed.origin_account_name,
            target_account_name: detailed.target_account_name,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /transfers - Move money from the session's account to another account
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    tag = "transfer",
    request_body = CreateTransferRequest,
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Transfer completed", body = Envelope<TransferResponse>),
        (status = 400, description = "Invalid payload, unknown account or insufficient funds", body = HttpError),
        (status = 401, description = "Missing or expired session", body = HttpError),
        (status = 500, description = "Internal server error", body = HttpError)
    )
)]
pub async fn create_transfer_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    body: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(req) = body?;
    let transfer = state
        .transfers
        .create(NewTransfer {
            origin_account_id: session.account.id.to_string(),
            target_account_id: req.target_account_id,
            amount: req.amount,
        })
        .await?;
    Ok(Envelope::ok(TransferResponse::from(transfer)))
}

/// GET /transfers - List transfers sent or received by the session's account
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    tag = "transfer",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Transfers, newest first", body = Envelope<Vec<TransferDetailedResponse>>),
        (status = 401, description = "Missing or expired session", body = HttpError),
        (status = 500, description = "Internal server error", body = HttpError)
    )
)]
pub async fn list_transfers_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, HttpError> {
    let transfers = state.transfers.list(session.account.id).await?;
    Ok(Envelope::ok(
        transfers
            .into_iter()
            .map(TransferDetailedResponse::from)
            .collect::<Vec<_>>(),
    ))
}
