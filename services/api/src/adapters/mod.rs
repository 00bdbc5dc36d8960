pub mod cache;
pub mod db;
pub mod secret;

pub use cache::{MemoryCache, RedisCache};
pub use db::{DbAdapter, PgAccountRepository, PgTransactionManager, PgTransferRepository};
pub use secret::Argon2Hasher;
