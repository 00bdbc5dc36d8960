pub mod account;
pub mod auth;
pub mod group;
pub mod transfer;

pub use account::AccountService;
pub use auth::{AuthService, SESSION_TTL};
pub use group::TaskGroup;
pub use transfer::TransferService;
