//! crates/bank_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database driver or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Strips every non-digit character from a document number.
///
/// Documents are always normalized before they are compared or stored.
pub fn normalize_document(document: &str) -> String {
    document.chars().filter(char::is_ascii_digit).collect()
}

/// The value handed to `AccountRepository::get_by_id_or_document` for a
/// client-supplied reference: a UUID as given, anything else normalized.
pub fn account_lookup_key(value: &str) -> String {
    match Uuid::parse_str(value) {
        Ok(_) => value.to_string(),
        Err(_) => normalize_document(value),
    }
}

/// Rejects a document with no digits at all. Emptiness is left to `length`.
fn has_document_digits(document: &str) -> Result<(), ValidationError> {
    if document.is_empty() || !normalize_document(document).is_empty() {
        return Ok(());
    }
    Err(ValidationError::new("digits"))
}

//=========================================================================================
// Accounts
//=========================================================================================

/// A bank account as held by the relational store.
///
/// The hashed secret and its salt never leave the process: they are skipped
/// when an account is serialized, including inside a cached [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub document: String,
    pub balance: i64,
    #[serde(skip)]
    pub secret: String,
    #[serde(skip)]
    pub secret_salt: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Returns a copy of the account with the credential fields cleared.
    pub fn without_secret(&self) -> Self {
        Self {
            secret: String::new(),
            secret_salt: String::new(),
            ..self.clone()
        }
    }
}

/// Input for opening a new account.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1), custom(function = "has_document_digits"))]
    pub document: String,
    #[validate(length(min = 1))]
    pub secret: String,
    #[validate(range(min = 1))]
    pub balance: i64,
}

/// The row written by `AccountRepository::create`: a validated [`NewAccount`]
/// with its document normalized and its secret already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDraft {
    pub name: String,
    pub document: String,
    pub balance: i64,
    pub secret: String,
    pub secret_salt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub balance: i64,
}

//=========================================================================================
// Transfers
//=========================================================================================

/// A transfer request before it is resolved against the store.
///
/// Either side may name an account by ID or by document.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewTransfer {
    #[validate(length(min = 1))]
    pub origin_account_id: String,
    #[validate(length(min = 1))]
    pub target_account_id: String,
    #[validate(range(min = 1))]
    pub amount: i64,
}

/// The row written by `TransferRepository::create`, with both sides resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDraft {
    pub origin_account_id: Uuid,
    pub target_account_id: Uuid,
    pub amount: i64,
}

/// A persisted transfer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub origin_account_id: Uuid,
    pub target_account_id: Uuid,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Splices the store-assigned fields onto a draft.
    pub fn from_draft(draft: TransferDraft, generated: GeneratedData) -> Self {
        Self {
            id: generated.id,
            origin_account_id: draft.origin_account_id,
            target_account_id: draft.target_account_id,
            amount: draft.amount,
            created_at: generated.created_at,
        }
    }
}

/// A transfer as seen from one account, with both parties' display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferDetailed {
    #[serde(flatten)]
    pub transfer: Transfer,
    /// True when the listed account is the origin.
    pub sent: bool,
    pub origin_account_name: String,
    pub target_account_name: String,
}

//=========================================================================================
// Authentication
//=========================================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1), custom(function = "has_document_digits"))]
    pub document: String,
    #[validate(length(min = 1))]
    pub secret: String,
}

/// An authenticated session, keyed in the cache by its token.
///
/// `account` is a point-in-time copy taken at login, not a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub account: Account,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Store-assigned values
//=========================================================================================

/// ID and creation timestamp returned by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedData {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("123.456.789-00", "12345678900")]
    #[case("12345678900", "12345678900")]
    #[case(" 12/34 ", "1234")]
    #[case("abc", "")]
    fn normalize_document_keeps_digits_only(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_document(input), expected);
    }

    #[rstest]
    #[case("123.456.789-00", "12345678900")]
    #[case("ghost", "")]
    #[case("5f0c2c2e-4a43-4f7e-9d0a-3b1f6a2d9c11", "5f0c2c2e-4a43-4f7e-9d0a-3b1f6a2d9c11")]
    fn lookup_keys_keep_ids_and_normalize_documents(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(account_lookup_key(input), expected);
    }

    #[test]
    fn documents_without_digits_are_invalid() {
        let credentials = Credentials {
            document: "abc".to_string(),
            secret: "s".to_string(),
        };
        let codes: Vec<String> = credentials.validate().unwrap_err().field_errors()["document"]
            .iter()
            .map(|e| e.code.to_string())
            .collect();
        assert_eq!(codes, vec!["digits"]);

        let empty = Credentials {
            document: String::new(),
            ..credentials
        };
        let codes: Vec<String> = empty.validate().unwrap_err().field_errors()["document"]
            .iter()
            .map(|e| e.code.to_string())
            .collect();
        assert_eq!(codes, vec!["length"]);
    }

    #[test]
    fn serialized_account_omits_credentials() {
        let account = Account {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            document: "123".to_string(),
            balance: 10,
            secret: "hash".to_string(),
            secret_salt: "salt".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("secret").is_none());
        assert!(json.get("secret_salt").is_none());
        assert_eq!(json["balance"], 10);
    }
}
