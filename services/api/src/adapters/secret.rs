//! services/api/src/adapters/secret.rs
//!
//! Argon2 implementation of the `SecretHasher` port.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use bank_core::ports::{PortError, PortResult, SecretHasher};
use tracing::warn;

/// Hashes account secrets with the default Argon2id parameters.
///
/// The salt is stored beside the hash, so `verify` also checks that the PHC
/// string was produced with that salt.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretHasher for Argon2Hasher {
    fn gen_salt(&self) -> String {
        SaltString::generate(&mut OsRng).as_str().to_string()
    }

    fn encode(&self, plain: &str, salt: &str) -> PortResult<String> {
        let salt = SaltString::from_b64(salt)
            .map_err(|e| PortError::Unexpected(format!("invalid salt: {e}")))?;
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PortError::Unexpected(format!("failed to hash secret: {e}")))
    }

    fn verify(&self, plain: &str, encoded: &str, salt: &str) -> bool {
        let parsed = match PasswordHash::new(encoded) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored secret is not a valid hash: {:?}", e);
                return false;
            }
        };
        if parsed.salt.map(|s| s.as_str()) != Some(salt) {
            return false;
        }
        self.argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}
