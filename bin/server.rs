// Operation History - Web Server
// REST API with Axum: paginated, day-grouped history as JSON

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use operation_history::{
    group_account_operations_by_day, group_accounts_operations_by_day, load_accounts, Account,
    DailyOperations, GroupOpsByDayOpts, HistoryConfig, Operation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state (read-only after startup)
#[derive(Clone)]
struct AppState {
    accounts: Arc<Vec<Account>>,
    config: Arc<HistoryConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Query string of the history endpoints; missing values come from the config
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    count: Option<usize>,
    with_sub_accounts: Option<bool>,
}

impl HistoryQuery {
    fn to_opts(&self, config: &HistoryConfig) -> GroupOpsByDayOpts {
        GroupOpsByDayOpts::new(self.count.unwrap_or(config.page_size))
            .with_sub_accounts(self.with_sub_accounts.unwrap_or(config.with_sub_accounts))
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/history - Merged history of every account
async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<ApiResponse<DailyOperations<Operation>>> {
    let opts = query.to_opts(&state.config);
    let page = group_accounts_operations_by_day(state.accounts.as_slice(), opts);

    info!(count = opts.count, returned = page.len(), completed = page.completed, "history page");
    Json(ApiResponse::ok(page))
}

/// GET /api/accounts/:id/history - History of one account (sub-accounts included by default)
async fn get_account_history(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let account = state.accounts.iter().find_map(|account| account.find(&account_id));

    match account {
        Some(account) => {
            let page = group_account_operations_by_day(account, query.to_opts(&state.config));
            (StatusCode::OK, Json(ApiResponse::ok(page))).into_response()
        }
        None => {
            warn!(account_id = %account_id, "unknown account");
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<DailyOperations<Operation>>::err(format!(
                    "account '{}' not found",
                    account_id
                ))),
            )
                .into_response()
        }
    }
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/history", get(get_history))
        .route("/accounts/:id/history", get(get_account_history))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = HistoryConfig::from_env()?;
    let data_path = config
        .data_path
        .clone()
        .context("HISTORY_DATA must point to an accounts file (.json or .csv)")?;

    let accounts = load_accounts(&data_path)?;
    info!(path = %data_path.display(), accounts = accounts.len(), "accounts loaded");

    let addr = config.server_addr;
    let state = AppState {
        accounts: Arc::new(accounts),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("server running on http://{}", addr);
    info!("history: http://{}/api/history?count=20", addr);

    axum::serve(listener, build_router(state))
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
