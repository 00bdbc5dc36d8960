//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::{accounts, auth, response, transfers};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        accounts::create_account_handler,
        accounts::list_accounts_handler,
        accounts::get_balance_handler,
        auth::login_handler,
        transfers::create_transfer_handler,
        transfers::list_transfers_handler,
    ),
    components(
        schemas(
            accounts::CreateAccountRequest,
            accounts::AccountResponse,
            accounts::BalanceResponse,
            auth::LoginRequest,
            auth::SessionResponse,
            transfers::CreateTransferRequest,
            transfers::TransferResponse,
            transfers::TransferDetailedResponse,
            response::HttpError,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "account", description = "Open accounts and read balances."),
        (name = "auth", description = "Session tokens."),
        (name = "transfer", description = "Move money between accounts.")
    )
)]
pub struct ApiDoc;

/// Registers the `Authorization: Bearer <token>` scheme used by private routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
