//! Tradedesk mock backend REST API
//!
//! json-server compatible surface over [`MockDb`]. Each endpoint has a thin axum
//! handler that delegates to an inner function returning `(StatusCode, body)`,
//! so the request logic is testable without axum dispatch.
//!
//! Endpoints:
//! - GET  /health, GET /version
//! - GET  /users, POST /users, GET /users/:id, PATCH /users/:id
//! - GET  /supportDepartments
//! - GET  /chatTickets, POST /chatTickets, GET /chatTickets/:id, PATCH /chatTickets/:id
//! - GET  /chatMessages?ticketId=, POST /chatMessages
//! - GET|POST /accounts, /transactions, /kycDocuments, /ibRequests
//! - GET  /dashboardStats, GET /positions

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tradedesk_core::config::ServerConfig;
use tradedesk_core::models::{
    Account, IbRequest, KycDocument, Message, ProfilePatch, Ticket, TicketPatch, Transaction,
    TransactionQuery, User, IB_UNDER_REVIEW,
};

use crate::db::{DbError, MockDb, TicketQuery};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub db: Arc<MockDb>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route("/users/:id", get(get_user_handler).patch(patch_user_handler))
        .route("/supportDepartments", get(departments_handler))
        .route("/chatTickets", get(list_tickets_handler).post(create_ticket_handler))
        .route(
            "/chatTickets/:id",
            get(get_ticket_handler).patch(patch_ticket_handler),
        )
        .route(
            "/chatMessages",
            get(list_messages_handler).post(create_message_handler),
        )
        .route("/accounts", get(list_accounts_handler).post(create_account_handler))
        .route(
            "/transactions",
            get(list_transactions_handler).post(create_transaction_handler),
        )
        .route(
            "/kycDocuments",
            get(list_kyc_handler).post(create_kyc_handler),
        )
        .route(
            "/ibRequests",
            get(list_ib_requests_handler).post(create_ib_request_handler),
        )
        .route("/dashboardStats", get(dashboard_stats_handler))
        .route("/positions", get(positions_handler))
        .with_state(state)
}

/// Bind the configured address and serve until the shutdown signal fires.
pub async fn start_http_server(
    db: Arc<MockDb>,
    config: &ServerConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Tradedesk mock backend listening on http://{}", addr);
    serve(listener, db, shutdown).await
}

/// Serve on an already-bound listener (used by tests with port 0).
pub async fn serve(
    listener: TcpListener,
    db: Arc<MockDb>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = build_router(Arc::new(HttpState { db }));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;
    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    pub ticket_id: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn body(msg: impl Into<String>) -> serde_json::Value {
        serde_json::to_value(Self::new(msg)).unwrap_or_default()
    }
}

type Reply = (StatusCode, serde_json::Value);

fn ok<T: Serialize>(status: StatusCode, value: &T) -> Reply {
    match serde_json::to_value(value) {
        Ok(v) => (status, v),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::body(e.to_string())),
    }
}

fn db_error(e: DbError) -> Reply {
    let status = match &e {
        DbError::NotFound { .. } => StatusCode::NOT_FOUND,
        DbError::Invalid(_) => StatusCode::BAD_REQUEST,
        DbError::Io(_) | DbError::Seed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "Backend store error");
    } else {
        tracing::debug!(error = %e, "Request rejected");
    }
    (status, ErrorResponse::body(e.to_string()))
}

fn parse_body<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, Reply> {
    serde_json::from_value(payload).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            ErrorResponse::body(format!("invalid body: {e}")),
        )
    })
}

fn created<T: Serialize>(result: Result<T, DbError>) -> Reply {
    match result {
        Ok(v) => ok(StatusCode::CREATED, &v),
        Err(e) => db_error(e),
    }
}

// ============================================================================
// Inner (directly testable) request logic
// ============================================================================

pub async fn health_inner(db: &MockDb) -> Reply {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "collections": db.counts().await,
            "latestActivity": db.latest_activity().await,
        }),
    )
}

/// Pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "tradedesk/1",
    })
}

pub async fn list_users_inner(db: &MockDb) -> Reply {
    ok(StatusCode::OK, &db.users().await)
}

pub async fn get_user_inner(db: &MockDb, id: &str) -> Reply {
    match db.user(id).await {
        Ok(user) => ok(StatusCode::OK, &user.redacted()),
        Err(e) => db_error(e),
    }
}

pub async fn create_user_inner(db: &MockDb, payload: serde_json::Value) -> Reply {
    match parse_body::<User>(payload) {
        Ok(user) => match db.insert_user(user).await {
            Ok(u) => ok(StatusCode::CREATED, &u.redacted()),
            Err(e) => db_error(e),
        },
        Err(reply) => reply,
    }
}

pub async fn patch_user_inner(db: &MockDb, id: &str, payload: serde_json::Value) -> Reply {
    let patch = match parse_body::<ProfilePatch>(payload) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    if patch.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            ErrorResponse::body("patch must set at least one profile field"),
        );
    }
    match db.patch_user(id, &patch).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Profile updated");
            ok(StatusCode::OK, &user.redacted())
        }
        Err(e) => db_error(e),
    }
}

pub async fn departments_inner(db: &MockDb) -> Reply {
    ok(StatusCode::OK, &db.departments().await)
}

pub async fn list_tickets_inner(db: &MockDb, query: &TicketQuery) -> Reply {
    ok(StatusCode::OK, &db.tickets(query).await)
}

pub async fn get_ticket_inner(db: &MockDb, id: &str) -> Reply {
    match db.ticket(id).await {
        Ok(t) => ok(StatusCode::OK, &t),
        Err(e) => db_error(e),
    }
}

pub async fn create_ticket_inner(db: &MockDb, payload: serde_json::Value) -> Reply {
    match parse_body::<Ticket>(payload) {
        Ok(ticket) => {
            let result = db.insert_ticket(ticket).await;
            if let Ok(t) = &result {
                tracing::info!(ticket_id = %t.id, user_id = %t.user_id, "Ticket opened");
            }
            created(result)
        }
        Err(reply) => reply,
    }
}

pub async fn patch_ticket_inner(db: &MockDb, id: &str, payload: serde_json::Value) -> Reply {
    let patch = match parse_body::<TicketPatch>(payload) {
        Ok(p) => p,
        Err(reply) => return reply,
    };
    if patch.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            ErrorResponse::body("patch must set status, assignedAgent or lastActivity"),
        );
    }
    match db.patch_ticket(id, &patch).await {
        Ok(t) => ok(StatusCode::OK, &t),
        Err(e) => db_error(e),
    }
}

pub async fn list_messages_inner(db: &MockDb, query: &MessageQuery) -> Reply {
    ok(StatusCode::OK, &db.messages(query.ticket_id.as_deref()).await)
}

pub async fn create_message_inner(db: &MockDb, payload: serde_json::Value) -> Reply {
    match parse_body::<Message>(payload) {
        Ok(message) => created(db.insert_message(message).await),
        Err(reply) => reply,
    }
}

pub async fn list_accounts_inner(db: &MockDb) -> Reply {
    ok(StatusCode::OK, &db.accounts().await)
}

pub async fn create_account_inner(db: &MockDb, payload: serde_json::Value) -> Reply {
    match parse_body::<Account>(payload) {
        Ok(account) => created(db.insert_account(account).await),
        Err(reply) => reply,
    }
}

pub async fn list_transactions_inner(db: &MockDb, query: &TransactionQuery) -> Reply {
    ok(StatusCode::OK, &db.transactions(query).await)
}

pub async fn create_transaction_inner(db: &MockDb, payload: serde_json::Value) -> Reply {
    match parse_body::<Transaction>(payload) {
        Ok(tx) => created(db.insert_transaction(tx).await),
        Err(reply) => reply,
    }
}

pub async fn list_kyc_inner(db: &MockDb) -> Reply {
    ok(StatusCode::OK, &db.kyc_documents().await)
}

pub async fn create_kyc_inner(db: &MockDb, payload: serde_json::Value) -> Reply {
    match parse_body::<KycDocument>(payload) {
        Ok(doc) => created(db.insert_kyc_document(doc).await),
        Err(reply) => reply,
    }
}

pub async fn list_ib_requests_inner(db: &MockDb) -> Reply {
    ok(StatusCode::OK, &db.ib_requests().await)
}

/// Missing `id`, `status` and `submissionDate` are filled in before parsing.
pub async fn create_ib_request_inner(db: &MockDb, mut payload: serde_json::Value) -> Reply {
    if let Some(fields) = payload.as_object_mut() {
        fields.entry("id").or_insert_with(|| "".into());
        fields.entry("status").or_insert_with(|| IB_UNDER_REVIEW.into());
        fields
            .entry("submissionDate")
            .or_insert_with(|| Utc::now().to_rfc3339().into());
    }
    match parse_body::<IbRequest>(payload) {
        Ok(request) => {
            let result = db.insert_ib_request(request).await;
            if let Ok(r) = &result {
                tracing::info!(request_id = %r.id, user_id = %r.user_id, "IB application received");
            }
            created(result)
        }
        Err(reply) => reply,
    }
}

pub async fn dashboard_stats_inner(db: &MockDb) -> Reply {
    match db.dashboard_stats().await {
        Ok(stats) => ok(StatusCode::OK, &stats),
        Err(e) => db_error(e),
    }
}

pub async fn positions_inner(db: &MockDb) -> Reply {
    ok(StatusCode::OK, &db.positions().await)
}

// ============================================================================
// Axum handler wrappers (delegate to the inner functions)
// ============================================================================

type AppState = State<Arc<HttpState>>;

fn respond((status, body): Reply) -> impl IntoResponse {
    (status, Json(body))
}

pub async fn health_handler(State(state): AppState) -> impl IntoResponse {
    respond(health_inner(&state.db).await)
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn list_users_handler(State(state): AppState) -> impl IntoResponse {
    respond(list_users_inner(&state.db).await)
}

pub async fn get_user_handler(State(state): AppState, Path(id): Path<String>) -> impl IntoResponse {
    respond(get_user_inner(&state.db, &id).await)
}

pub async fn create_user_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_user_inner(&state.db, payload).await)
}

pub async fn patch_user_handler(
    State(state): AppState,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(patch_user_inner(&state.db, &id, payload).await)
}

pub async fn departments_handler(State(state): AppState) -> impl IntoResponse {
    respond(departments_inner(&state.db).await)
}

pub async fn list_tickets_handler(
    State(state): AppState,
    Query(query): Query<TicketQuery>,
) -> impl IntoResponse {
    respond(list_tickets_inner(&state.db, &query).await)
}

pub async fn get_ticket_handler(State(state): AppState, Path(id): Path<String>) -> impl IntoResponse {
    respond(get_ticket_inner(&state.db, &id).await)
}

pub async fn create_ticket_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_ticket_inner(&state.db, payload).await)
}

pub async fn patch_ticket_handler(
    State(state): AppState,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(patch_ticket_inner(&state.db, &id, payload).await)
}

pub async fn list_messages_handler(
    State(state): AppState,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    respond(list_messages_inner(&state.db, &query).await)
}

pub async fn create_message_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_message_inner(&state.db, payload).await)
}

pub async fn list_accounts_handler(State(state): AppState) -> impl IntoResponse {
    respond(list_accounts_inner(&state.db).await)
}

pub async fn create_account_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_account_inner(&state.db, payload).await)
}

pub async fn list_transactions_handler(
    State(state): AppState,
    Query(query): Query<TransactionQuery>,
) -> impl IntoResponse {
    respond(list_transactions_inner(&state.db, &query).await)
}

pub async fn create_transaction_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_transaction_inner(&state.db, payload).await)
}

pub async fn list_kyc_handler(State(state): AppState) -> impl IntoResponse {
    respond(list_kyc_inner(&state.db).await)
}

pub async fn create_kyc_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_kyc_inner(&state.db, payload).await)
}

pub async fn list_ib_requests_handler(State(state): AppState) -> impl IntoResponse {
    respond(list_ib_requests_inner(&state.db).await)
}

pub async fn create_ib_request_handler(
    State(state): AppState,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(create_ib_request_inner(&state.db, payload).await)
}

pub async fn dashboard_stats_handler(State(state): AppState) -> impl IntoResponse {
    respond(dashboard_stats_inner(&state.db).await)
}

pub async fn positions_handler(State(state): AppState) -> impl IntoResponse {
    respond(positions_inner(&state.db).await)
}

// ============================================================================
// Unit Tests: inner functions called directly
// ============================================================================
