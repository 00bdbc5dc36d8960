//! services/api/src/web/auth.rs
//!
//! The login endpoint. Sessions are bearer tokens; there is no logout, a
//! token simply stops working once it has been idle for the session TTL.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use bank_core::domain::{Credentials, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::accounts::AccountResponse;
use crate::web::response::{Envelope, HttpError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub document: String,
    pub secret: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    /// Send as `Authorization: Bearer <token>` on private routes.
    pub token: String,
    pub account: AccountResponse,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            account: session.account.into(),
            created_at: session.created_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /login - Exchange a document and secret for a session token
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Envelope<SessionResponse>),
        (status = 400, description = "Invalid payload", body = HttpError),
        (status = 401, description = "Invalid credentials", body = HttpError),
        (status = 500, description = "Internal server error", body = HttpError)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(req) = body?;
    let session = state
        .auth
        .auth(Credentials {
            document: req.document,
            secret: req.secret,
        })
        .await?;

    info!(account_id = %session.account.id, "Login successful");
    Ok(Envelope::ok(SessionResponse::from(session)))
}
