// Bank of BIT - Web Server
// JSON API over the bank service with Axum

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bank_of_bit::{
    init_tracing, AccountKind, BankAccount, BankError, BankService, BankStore, Client, Config,
    SqliteStore, ValidationError,
};

#[derive(Parser)]
#[command(name = "bank-server")]
#[command(about = "Serve the Bank of BIT JSON API.", version)]
struct ServerArgs {
    /// SQLite database file (overrides BANK_DATABASE)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080 (overrides BANK_BIND_ADDRESS)
    #[arg(long)]
    bind: Option<String>,

    /// tracing filter (overrides BANK_LOG)
    #[arg(long)]
    log: Option<String>,
}

impl ServerArgs {
    /// Flags win over the environment.
    fn apply(self, mut config: Config) -> Config {
        if let Some(path) = self.database {
            config.database_path = path;
        }
        if let Some(addr) = self.bind {
            config.bind_address = addr;
        }
        if let Some(filter) = self.log {
            config.log_filter = filter;
        }
        config
    }
}

type SharedService = Arc<Mutex<BankService<Box<dyn BankStore + Send>>>>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: SharedService,
}

impl AppState {
    fn new(service: BankService<Box<dyn BankStore + Send>>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }

    fn service(&self) -> MutexGuard<'_, BankService<Box<dyn BankStore + Send>>> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ValidationError>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: Vec::new(),
        }
    }
}

/// Error wrapper so handlers can use `?`
struct ApiError(BankError);

impl From<BankError> for ApiError {
    fn from(err: BankError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BankError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BankError::NotFound { .. } => StatusCode::NOT_FOUND,
            BankError::Duplicate { .. } | BankError::Conflict(_) => StatusCode::CONFLICT,
            BankError::UnknownVariant { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
            errors: self.0.validation_errors().map(<[_]>::to_vec).unwrap_or_default(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct ClientRequest {
    #[serde(default)]
    client_number: Option<i64>,
    first_name: String,
    last_name: String,
    address: String,
    city: String,
    province: String,
    postal_code: String,
    #[serde(default)]
    date_created: Option<NaiveDate>,
    #[serde(default)]
    notes: Option<String>,
}

impl ClientRequest {
    fn into_client(self, client_id: Option<i64>) -> Client {
        Client {
            client_id,
            client_number: self.client_number.unwrap_or(0),
            first_name: self.first_name,
            last_name: self.last_name,
            address: self.address,
            city: self.city,
            province: self.province,
            postal_code: self.postal_code,
            date_created: self.date_created.unwrap_or_else(|| Local::now().date_naive()),
            notes: self.notes,
        }
    }
}

#[derive(Deserialize)]
struct AccountRequest {
    client_id: i64,
    /// Defaults to the first status (Active)
    #[serde(default)]
    account_status_id: Option<i64>,
    opening_balance: f64,
    #[serde(default)]
    notes: Option<String>,
    #[serde(flatten)]
    kind: AccountKind,
}

#[derive(Deserialize)]
struct StatusChange {
    account_status_id: i64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/clients
async fn list_clients(State(state): State<AppState>) -> ApiResult<Vec<Client>> {
    ok(state.service().clients()?)
}

/// POST /api/clients
async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<ClientRequest>,
) -> ApiResult<Client> {
    created(state.service().register_client(request.into_client(None))?)
}

/// GET /api/clients/:id
async fn get_client(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Client> {
    ok(state.service().client(id)?)
}

/// PUT /api/clients/:id
async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ClientRequest>,
) -> ApiResult<Client> {
    ok(state.service().update_client(request.into_client(Some(id)))?)
}

/// DELETE /api/clients/:id
async fn delete_client(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<i64> {
    state.service().remove_client(id)?;
    ok(id)
}

/// GET /api/clients/:id/accounts
async fn client_accounts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<BankAccount>> {
    ok(state.service().client_accounts(id)?)
}

/// POST /api/accounts
async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<BankAccount> {
    let service = state.service();

    let status_id = match request.account_status_id {
        Some(id) => id,
        None => service
            .statuses()?
            .first()
            .and_then(|s| s.account_status_id)
            .ok_or_else(|| BankError::not_found("account status", "default"))?,
    };

    let mut account = BankAccount::new(
        request.client_id,
        status_id,
        request.opening_balance,
        request.kind,
    );
    account.notes = request.notes;

    created(service.open_account(account)?)
}

/// GET /api/accounts/:id - Account with client, status and effective rate
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<bank_of_bit::AccountDetails> {
    ok(state.service().account_details(id)?)
}

/// PUT /api/accounts/:id/status
async fn change_account_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> ApiResult<BankAccount> {
    ok(state
        .service()
        .change_account_status(id, change.account_status_id)?)
}

/// GET /api/statuses
async fn list_statuses(
    State(state): State<AppState>,
) -> ApiResult<Vec<bank_of_bit::AccountStatus>> {
    ok(state.service().statuses()?)
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/clients/:id/accounts", get(client_accounts))
        .route("/accounts", post(create_account))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/status", put(change_account_status))
        .route("/statuses", get(list_statuses))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerArgs::parse().apply(Config::from_env());
    init_tracing(&format!("{},tower_http=info", config.log_filter));

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let service = BankService::new(Box::new(store) as Box<dyn BankStore + Send>)?.with_actor("api");
    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    tracing::info!(
        address = %config.bind_address,
        database = %config.database_path.display(),
        "server running"
    );

    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use bank_of_bit::MemoryStore;
    use tower::ServiceExt;

    fn app() -> Router {
        let service =
            BankService::new(Box::new(MemoryStore::new()) as Box<dyn BankStore + Send>).unwrap();
        router(AppState::new(service))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn ada() -> serde_json::Value {
        serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "address": "12 Analytical Way",
            "city": "Kitchener",
            "province": "ON",
            "postal_code": "N2G 4M4"
        })
    }

    #[test]
    fn test_flags_override_config() {
        let args =
            ServerArgs::parse_from(["bank-server", "--bind", "0.0.0.0:8080", "--log", "debug"]);
        let config = args.apply(Config::default());

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.database_path, Config::default().database_path);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_create_and_fetch_client() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/api/clients", Some(ada())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["client_number"], 10000000);

        let id = body["data"]["client_id"].as_i64().unwrap();
        let (status, body) = call(&app, Method::GET, &format!("/api/clients/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["first_name"], "Ada");
    }

    #[tokio::test]
    async fn test_invalid_client_is_422_with_errors() {
        let mut bad = ada();
        bad["postal_code"] = serde_json::json!("nope");

        let (status, body) = call(&app(), Method::POST, "/api/clients", Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["field"], "postal_code");
    }

    #[tokio::test]
    async fn test_missing_client_is_404() {
        let (status, _) = call(&app(), Method::GET, "/api/clients/41", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_open_account_and_change_status() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/api/clients", Some(ada())).await;
        let client_id = body["data"]["client_id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/accounts",
            Some(serde_json::json!({
                "client_id": client_id,
                "opening_balance": 250000.0,
                "account_type": "Mortgage",
                "mortgage_rate": 0.05,
                "amortization": 300
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["account_number"], 1);
        assert_eq!(body["data"]["account_status_id"], 1);
        let account_id = body["data"]["bank_account_id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/accounts/{}/status", account_id),
            Some(serde_json::json!({ "account_status_id": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["account_status_id"], 3);

        let (_, body) = call(&app, Method::GET, &format!("/api/accounts/{}", account_id), None).await;
        assert_eq!(body["data"]["status"]["description"], "Delinquent");
        assert_eq!(body["data"]["effective_rate"], 0.05);
        assert_eq!(body["data"]["client"]["last_name"], "Lovelace");

        let (status, _) = call(&app, Method::DELETE, &format!("/api/clients/{}", client_id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_statuses() {
        let (_, body) = call(&app(), Method::GET, "/api/statuses", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
    }
}
