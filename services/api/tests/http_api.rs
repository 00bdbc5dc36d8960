//! End-to-end tests of the HTTP surface over in-memory stores.

use api_lib::adapters::MemoryCache;
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bank_core::domain::{
    Account, AccountDraft, GeneratedData, Transfer, TransferDetailed, TransferDraft,
};
use bank_core::ports::{
    AccountRepository, PortError, PortResult, SecretHasher, TransactionManager,
    TransferRepository, TxHandle,
};
use bank_core::services::{AccountService, AuthService, TransferService};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// In-memory fakes
//=========================================================================================

#[derive(Default)]
struct Store {
    accounts: Mutex<Vec<Account>>,
    transfers: Mutex<Vec<Transfer>>,
}

#[derive(Clone)]
struct Accounts(Arc<Store>);

#[async_trait]
impl AccountRepository for Accounts {
    async fn create(&self, draft: &AccountDraft) -> PortResult<GeneratedData> {
        let generated = GeneratedData {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        self.0.accounts.lock().unwrap().push(Account {
            id: generated.id,
            name: draft.name.clone(),
            document: draft.document.clone(),
            balance: draft.balance,
            secret: draft.secret.clone(),
            secret_salt: draft.secret_salt.clone(),
            created_at: generated.created_at,
        });
        Ok(generated)
    }

    async fn has_document(&self, document: &str) -> PortResult<bool> {
        Ok(self.0.accounts.lock().unwrap().iter().any(|a| a.document == document))
    }

    async fn list(&self) -> PortResult<Vec<Account>> {
        Ok(self.0.accounts.lock().unwrap().iter().map(Account::without_secret).collect())
    }

    async fn get_by_id_or_document(&self, value: &str) -> PortResult<Option<Account>> {
        Ok(self
            .0
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id.to_string() == value || a.document == value)
            .cloned())
    }

    async fn update_balance(&self, id: Uuid, balance: i64, expected: i64) -> PortResult<()> {
        let mut accounts = self.0.accounts.lock().unwrap();
        match accounts.iter_mut().find(|a| a.id == id) {
            Some(a) if a.balance == expected => {
                a.balance = balance;
                Ok(())
            }
            Some(_) => Err(PortError::Conflict(id.to_string())),
            None => Err(PortError::NotFound(id.to_string())),
        }
    }

    fn with_transaction(&self, _tx: &TxHandle) -> PortResult<Arc<dyn AccountRepository>> {
        Ok(Arc::new(self.clone()))
    }
}

#[derive(Clone)]
struct Transfers(Arc<Store>);

#[async_trait]
impl TransferRepository for Transfers {
    async fn create(&self, draft: &TransferDraft) -> PortResult<GeneratedData> {
        let generated = GeneratedData {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        self.0
            .transfers
            .lock()
            .unwrap()
            .push(Transfer::from_draft(*draft, generated));
        Ok(generated)
    }

    async fn list(&self, account_id: Uuid) -> PortResult<Vec<TransferDetailed>> {
        let accounts = self.0.accounts.lock().unwrap();
        let name = |id: Uuid| {
            accounts
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.name.clone())
                .unwrap_or_default()
        };
        Ok(self
            .0
            .transfers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.origin_account_id == account_id || t.target_account_id == account_id)
            .map(|t| TransferDetailed {
                transfer: t.clone(),
                sent: t.origin_account_id == account_id,
                origin_account_name: name(t.origin_account_id),
                target_account_name: name(t.target_account_id),
            })
            .collect())
    }

    fn with_transaction(&self, _tx: &TxHandle) -> PortResult<Arc<dyn TransferRepository>> {
        Ok(Arc::new(self.clone()))
    }
}

/// Writes go straight to the store; these tests never exercise rollback.
struct NoopTx;

#[async_trait]
impl TransactionManager for NoopTx {
    async fn create(&self) -> PortResult<TxHandle> {
        Ok(TxHandle::new(()))
    }

    async fn commit(&self, _tx: &TxHandle) -> PortResult<()> {
        Ok(())
    }

    async fn rollback(&self, _tx: &TxHandle) -> PortResult<()> {
        Ok(())
    }
}

struct PlainHasher;

impl SecretHasher for PlainHasher {
    fn gen_salt(&self) -> String {
        "salt".to_string()
    }

    fn encode(&self, plain: &str, salt: &str) -> PortResult<String> {
        Ok(format!("{salt}${plain}"))
    }

    fn verify(&self, plain: &str, encoded: &str, salt: &str) -> bool {
        encoded == format!("{salt}${plain}")
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn app() -> Router {
    let store = Arc::new(Store::default());
    let accounts: Arc<dyn AccountRepository> = Arc::new(Accounts(store.clone()));
    let hasher: Arc<dyn SecretHasher> = Arc::new(PlainHasher);
    let state = Arc::new(AppState {
        accounts: AccountService::new(accounts.clone(), hasher.clone()),
        auth: AuthService::new(accounts.clone(), Arc::new(MemoryCache::new()), hasher),
        transfers: TransferService::new(Arc::new(NoopTx), accounts, Arc::new(Transfers(store))),
    });
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        _ => None,
    })
    .unwrap();
    build_router(state, &config)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn open_account(app: &Router, name: &str, document: &str, balance: i64) -> Value {
    let body = json!({ "name": name, "document": document, "secret": "pw", "balance": balance });
    let (status, json) = call(
        app,
        Method::POST,
        "/api/v1/accounts",
        None,
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["data"].clone()
}

async fn login(app: &Router, document: &str) -> String {
    let body = json!({ "document": document, "secret": "pw" });
    let (status, json) = call(
        app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["data"]["token"].as_str().unwrap().to_string()
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn opening_an_account_normalizes_the_document_and_hides_the_secret() {
    let app = app();
    let account = open_account(&app, "Ana", "123.456.789-00", 1_000).await;

    assert_eq!(account["document"], "12345678900");
    assert_eq!(account["balance"], 1_000);
    assert!(account.get("secret").is_none());
    assert!(account.get("secret_salt").is_none());

    let (status, json) = call(&app, Method::GET, "/api/v1/accounts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_documents_are_rejected() {
    let app = app();
    open_account(&app, "Ana", "123", 10).await;

    let body = json!({ "name": "Bia", "document": "1-2-3", "secret": "pw", "balance": 5 });
    let (status, json) = call(
        &app,
        Method::POST,
        "/api/v1/accounts",
        None,
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "account.document-already-exists");
    assert_eq!(json["error"]["code"], 400);
}

#[tokio::test]
async fn malformed_json_is_an_invalid_payload() {
    let app = app();
    let (status, json) = call(
        &app,
        Method::POST,
        "/api/v1/accounts",
        None,
        Some("{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "api.invalid_payload");
}

#[tokio::test]
async fn empty_body_reports_every_violation() {
    let app = app();
    let (status, json) = call(&app, Method::POST, "/api/v1/accounts", None, Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "invalid_payload");

    let fields: Vec<&str> = json["error"]["detail"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["balance", "document", "name", "secret"]);
}

#[tokio::test]
async fn document_without_digits_is_not_stored() {
    let app = app();
    let body = json!({ "name": "Ana", "document": "abc", "secret": "pw", "balance": 10 });
    let (status, json) = call(
        &app,
        Method::POST,
        "/api/v1/accounts",
        None,
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["detail"][0]["field"], "document");
    assert_eq!(json["error"]["detail"][0]["error"], "digits");

    let (_, json) = call(&app, Method::GET, "/api/v1/accounts", None, None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn wrong_secret_is_unauthorized() {
    let app = app();
    open_account(&app, "Ana", "123", 10).await;

    let body = json!({ "document": "123", "secret": "nope" });
    let (status, json) = call(
        &app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "auth.invalid-credentials");
}

#[tokio::test]
async fn private_routes_need_a_live_session() {
    let app = app();

    let (status, json) = call(&app, Method::GET, "/api/v1/transfers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "api.access-denied");

    let (status, _) = call(&app, Method::GET, "/api/v1/transfers", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn transfer_moves_money_and_shows_up_for_both_parties() {
    let app = app();
    let ana = open_account(&app, "Ana", "111", 1_000).await;
    let bia = open_account(&app, "Bia", "222", 50).await;
    let token = login(&app, "111").await;

    let body = json!({ "target_account_id": "222", "amount": 300 });
    let (status, json) = call(
        &app,
        Method::POST,
        "/api/v1/transfers",
        Some(&token),
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["origin_account_id"], ana["id"]);
    assert_eq!(json["data"]["target_account_id"], bia["id"]);
    assert_eq!(json["data"]["amount"], 300);

    let (_, json) = call(&app, Method::GET, "/api/v1/accounts/111/balance", None, None).await;
    assert_eq!(json["data"]["balance"], 700);
    let bia_id = bia["id"].as_str().unwrap();
    let (_, json) = call(
        &app,
        Method::GET,
        &format!("/api/v1/accounts/{bia_id}/balance"),
        None,
        None,
    )
    .await;
    assert_eq!(json["data"]["balance"], 350);

    let (status, json) = call(&app, Method::GET, "/api/v1/transfers", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = &json["data"][0];
    assert_eq!(listed["sent"], true);
    assert_eq!(listed["origin_account_name"], "Ana");
    assert_eq!(listed["target_account_name"], "Bia");

    let bia_token = login(&app, "222").await;
    let (_, json) = call(&app, Method::GET, "/api/v1/transfers", Some(&bia_token), None).await;
    assert_eq!(json["data"][0]["sent"], false);
}

#[tokio::test]
async fn transfer_failures_are_client_errors() {
    let app = app();
    open_account(&app, "Ana", "111", 100).await;
    open_account(&app, "Bia", "222", 100).await;
    let token = login(&app, "111").await;

    for (body, message) in [
        (json!({ "target_account_id": "222", "amount": 500 }), "transfer.insufficient-funds"),
        (json!({ "target_account_id": "999", "amount": 5 }), "transfer.target-not-found"),
        (json!({ "target_account_id": "111", "amount": 5 }), "transfer.same-account"),
    ] {
        let (status, json) = call(
            &app,
            Method::POST,
            "/api/v1/transfers",
            Some(&token),
            Some(&body.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
        assert_eq!(json["error"]["message"], message);
    }

    let (_, json) = call(&app, Method::GET, "/api/v1/accounts/111/balance", None, None).await;
    assert_eq!(json["data"]["balance"], 100);
}

#[tokio::test]
async fn unknown_account_balance_is_not_found() {
    let app = app();
    let (status, json) = call(&app, Method::GET, "/api/v1/accounts/404/balance", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "account.account-not-found");
}
