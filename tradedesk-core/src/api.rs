//! Data access layer for the desk backend.
//!
//! [`DeskApi`] is the seam every service talks through; [`HttpDeskClient`] is the
//! reqwest implementation against the json-server style REST backend:
//! - `GET  /supportDepartments`
//! - `GET  /chatTickets?userId=<id>`, `POST /chatTickets`, `PATCH /chatTickets/:id`
//! - `GET  /chatMessages?ticketId=<id>`, `POST /chatMessages`
//! - users, accounts, transactions, KYC documents and dashboard collections

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::error::{DeskError, DeskResult};
use crate::models::{
    Account, DashboardStats, Department, IbRequest, KycDocument, Message, Position, ProfilePatch,
    Ticket, TicketPatch, Transaction, TransactionQuery, User,
};
use crate::session::SessionContext;

// ============================================================================
// DeskApi trait
// ============================================================================

#[async_trait]
pub trait DeskApi: Send + Sync {
    async fn list_users(&self) -> DeskResult<Vec<User>>;
    async fn get_user(&self, id: &str) -> DeskResult<User>;
    async fn create_user(&self, user: &User) -> DeskResult<User>;
    async fn patch_user(&self, id: &str, patch: &ProfilePatch) -> DeskResult<User>;

    async fn list_departments(&self) -> DeskResult<Vec<Department>>;

    /// All tickets, or only those owned by `user_id`.
    async fn list_tickets(&self, user_id: Option<&str>) -> DeskResult<Vec<Ticket>>;
    async fn get_ticket(&self, id: &str) -> DeskResult<Ticket>;
    async fn create_ticket(&self, ticket: &Ticket) -> DeskResult<Ticket>;
    async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> DeskResult<Ticket>;

    /// Messages for a ticket in backend order; callers sort.
    async fn list_messages(&self, ticket_id: &str) -> DeskResult<Vec<Message>>;
    async fn create_message(&self, message: &Message) -> DeskResult<Message>;

    async fn list_accounts(&self) -> DeskResult<Vec<Account>>;
    async fn create_account(&self, account: &Account) -> DeskResult<Account>;

    async fn list_transactions(&self, query: &TransactionQuery) -> DeskResult<Vec<Transaction>>;
    async fn create_transaction(&self, transaction: &Transaction) -> DeskResult<Transaction>;

    async fn list_kyc_documents(&self) -> DeskResult<Vec<KycDocument>>;
    async fn create_kyc_document(&self, document: &KycDocument) -> DeskResult<KycDocument>;

    async fn list_ib_requests(&self) -> DeskResult<Vec<IbRequest>>;
    async fn create_ib_request(&self, request: &IbRequest) -> DeskResult<IbRequest>;

    async fn dashboard_stats(&self) -> DeskResult<DashboardStats>;
    async fn list_positions(&self) -> DeskResult<Vec<Position>>;

    /// Raw health document from the backend.
    async fn health(&self) -> DeskResult<serde_json::Value>;
}

// ============================================================================
// HttpDeskClient
// ============================================================================

/// reqwest client for the desk backend. Attaches the session's bearer token
/// when one exists and drops the session on a 401.
#[derive(Debug, Clone)]
pub struct HttpDeskClient {
    client: Client,
    base_url: String,
    session: Arc<SessionContext>,
}

impl HttpDeskClient {
    pub fn new(config: &ApiConfig, session: Arc<SessionContext>) -> DeskResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Client against an explicit base URL (tests, ad-hoc tooling).
    pub fn with_base_url(base_url: impl Into<String>, session: Arc<SessionContext>) -> DeskResult<Self> {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        };
        Self::new(&config, session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: &'static str,
    ) -> DeskResult<T> {
        tracing::debug!(method = "GET", path, "Desk API request");
        let request = self.authorized(self.client.get(self.url(path)).query(query));
        let response = self.check(request.send().await?, resource, path).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        resource: &'static str,
    ) -> DeskResult<T> {
        tracing::debug!(method = "POST", path, "Desk API request");
        let request = self.authorized(self.client.post(self.url(path)).json(body));
        let response = self.check(request.send().await?, resource, path).await?;
        Ok(response.json().await?)
    }

    async fn patch_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        resource: &'static str,
    ) -> DeskResult<T> {
        tracing::debug!(method = "PATCH", path, "Desk API request");
        let request = self.authorized(self.client.patch(self.url(path)).json(body));
        let response = self.check(request.send().await?, resource, path).await?;
        Ok(response.json().await?)
    }

    async fn check(&self, response: Response, resource: &'static str, path: &str) -> DeskResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!(path, "Backend rejected credentials, clearing session");
                if let Err(e) = self.session.end() {
                    tracing::error!(error = %e, "Failed to clear session after 401");
                }
                Err(DeskError::Unauthenticated)
            }
            StatusCode::NOT_FOUND => Err(DeskError::NotFound {
                resource,
                id: path.rsplit('/').next().unwrap_or(path).to_string(),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                    .unwrap_or(body);
                tracing::error!(code = status.as_u16(), message = %message, path, "Desk API error");
                Err(DeskError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl DeskApi for HttpDeskClient {
    async fn list_users(&self) -> DeskResult<Vec<User>> {
        self.get_json("/users", &[], "user").await
    }

    async fn get_user(&self, id: &str) -> DeskResult<User> {
        self.get_json(&format!("/users/{id}"), &[], "user").await
    }

    async fn create_user(&self, user: &User) -> DeskResult<User> {
        self.post_json("/users", user, "user").await
    }

    async fn patch_user(&self, id: &str, patch: &ProfilePatch) -> DeskResult<User> {
        self.patch_json(&format!("/users/{id}"), patch, "user").await
    }

    async fn list_departments(&self) -> DeskResult<Vec<Department>> {
        self.get_json("/supportDepartments", &[], "department").await
    }

    async fn list_tickets(&self, user_id: Option<&str>) -> DeskResult<Vec<Ticket>> {
        let query: Vec<(&str, String)> = user_id
            .map(|id| vec![("userId", id.to_string())])
            .unwrap_or_default();
        self.get_json("/chatTickets", &query, "ticket").await
    }

    async fn get_ticket(&self, id: &str) -> DeskResult<Ticket> {
        self.get_json(&format!("/chatTickets/{id}"), &[], "ticket").await
    }

    async fn create_ticket(&self, ticket: &Ticket) -> DeskResult<Ticket> {
        self.post_json("/chatTickets", ticket, "ticket").await
    }

    async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> DeskResult<Ticket> {
        self.patch_json(&format!("/chatTickets/{id}"), patch, "ticket").await
    }

    async fn list_messages(&self, ticket_id: &str) -> DeskResult<Vec<Message>> {
        self.get_json("/chatMessages", &[("ticketId", ticket_id.to_string())], "message")
            .await
    }

    async fn create_message(&self, message: &Message) -> DeskResult<Message> {
        // A 404 here means the parent ticket does not exist.
        match self.post_json("/chatMessages", message, "ticket").await {
            Err(DeskError::NotFound { resource, .. }) => Err(DeskError::NotFound {
                resource,
                id: message.ticket_id.clone(),
            }),
            other => other,
        }
    }

    async fn list_accounts(&self) -> DeskResult<Vec<Account>> {
        self.get_json("/accounts", &[], "account").await
    }

    async fn create_account(&self, account: &Account) -> DeskResult<Account> {
        self.post_json("/accounts", account, "account").await
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> DeskResult<Vec<Transaction>> {
        let mut params = Vec::new();
        if let Some(user_id) = &query.user_id {
            params.push(("userId", user_id.clone()));
        }
        if let Some(sort) = &query.sort {
            params.push(("_sort", sort.clone()));
        }
        if let Some(order) = query.order {
            let order = match order {
                crate::models::SortOrder::Asc => "asc",
                crate::models::SortOrder::Desc => "desc",
            };
            params.push(("_order", order.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("_limit", limit.to_string()));
        }
        self.get_json("/transactions", &params, "transaction").await
    }

    async fn create_transaction(&self, transaction: &Transaction) -> DeskResult<Transaction> {
        self.post_json("/transactions", transaction, "transaction").await
    }

    async fn list_kyc_documents(&self) -> DeskResult<Vec<KycDocument>> {
        self.get_json("/kycDocuments", &[], "kyc document").await
    }

    async fn create_kyc_document(&self, document: &KycDocument) -> DeskResult<KycDocument> {
        self.post_json("/kycDocuments", document, "kyc document").await
    }

    async fn list_ib_requests(&self) -> DeskResult<Vec<IbRequest>> {
        self.get_json("/ibRequests", &[], "ib request").await
    }

    async fn create_ib_request(&self, request: &IbRequest) -> DeskResult<IbRequest> {
        self.post_json("/ibRequests", request, "ib request").await
    }

    async fn dashboard_stats(&self) -> DeskResult<DashboardStats> {
        self.get_json("/dashboardStats", &[], "dashboard stats").await
    }

    async fn list_positions(&self) -> DeskResult<Vec<Position>> {
        self.get_json("/positions", &[], "position").await
    }

    async fn health(&self) -> DeskResult<serde_json::Value> {
        self.get_json("/health", &[], "health").await
    }
}

// ============================================================================
// TESTS
// ============================================================================
