//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use bank_core::services::{AccountService, AuthService, TransferService};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub auth: AuthService,
    pub transfers: TransferService,
}
