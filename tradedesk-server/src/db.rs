//! In-memory backing store for the mock desk backend.
//!
//! Collections are seeded from a json-server style document and live behind a
//! single async lock. Each write holds the write lock for its whole
//! read-modify-write, so posting a message and touching its ticket is one step.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tradedesk_core::models::{
    new_id, Account, DashboardStats, Department, IbRequest, KycDocument, Message, Position,
    ProfilePatch, SortOrder, Ticket, TicketPatch, TicketStatus, Transaction, TransactionQuery,
    User, IB_UNDER_REVIEW,
};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Seed parse error: {0}")]
    Seed(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

fn not_found(resource: &'static str, id: &str) -> DbError {
    DbError::NotFound {
        resource,
        id: id.to_string(),
    }
}

/// The whole backend document, keyed like json-server's `db.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collections {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub support_departments: Vec<Department>,
    #[serde(default)]
    pub chat_tickets: Vec<Ticket>,
    #[serde(default)]
    pub chat_messages: Vec<Message>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub kyc_documents: Vec<KycDocument>,
    #[serde(default)]
    pub ib_requests: Vec<IbRequest>,
    #[serde(default)]
    pub dashboard_stats: Option<DashboardStats>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// Equality filters accepted by `GET /chatTickets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    pub user_id: Option<String>,
    pub status: Option<TicketStatus>,
    pub department_id: Option<String>,
}

impl TicketQuery {
    fn matches(&self, ticket: &Ticket) -> bool {
        self.user_id.as_deref().map_or(true, |u| ticket.user_id == u)
            && self.status.map_or(true, |s| ticket.status == s)
            && self
                .department_id
                .as_deref()
                .map_or(true, |d| ticket.department_id.as_deref() == Some(d))
    }
}

pub struct MockDb {
    inner: RwLock<Collections>,
}

impl MockDb {
    pub fn new(seed: Collections) -> Self {
        Self {
            inner: RwLock::new(seed),
        }
    }

    pub fn empty() -> Self {
        Self::new(Collections::default())
    }

    /// Parse a seed document from disk.
    pub fn load(path: &Path) -> DbResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let seed: Collections = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            users = seed.users.len(),
            tickets = seed.chat_tickets.len(),
            messages = seed.chat_messages.len(),
            "Loaded seed data"
        );
        Ok(Self::new(seed))
    }

    pub async fn snapshot(&self) -> Collections {
        self.inner.read().await.clone()
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn users(&self) -> Vec<User> {
        self.inner.read().await.users.clone()
    }

    pub async fn user(&self, id: &str) -> DbResult<User> {
        let db = self.inner.read().await;
        db.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| not_found("user", id))
    }

    pub async fn insert_user(&self, mut user: User) -> DbResult<User> {
        let mut db = self.inner.write().await;
        if db.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DbError::Invalid(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        if user.id.is_empty() {
            user.id = new_id();
        }
        db.users.push(user.clone());
        Ok(user)
    }

    /// Merge profile fields into a user. The email stays unique.
    pub async fn patch_user(&self, id: &str, patch: &ProfilePatch) -> DbResult<User> {
        let mut db = self.inner.write().await;
        if let Some(email) = &patch.email {
            if db
                .users
                .iter()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(DbError::Invalid(format!("User with email {email} already exists")));
            }
        }
        let user = db
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| not_found("user", id))?;
        user.apply_profile(patch);
        Ok(user.clone())
    }

    // ========================================================================
    // Support
    // ========================================================================

    pub async fn departments(&self) -> Vec<Department> {
        self.inner.read().await.support_departments.clone()
    }

    pub async fn tickets(&self, query: &TicketQuery) -> Vec<Ticket> {
        let db = self.inner.read().await;
        db.chat_tickets
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect()
    }

    pub async fn ticket(&self, id: &str) -> DbResult<Ticket> {
        let db = self.inner.read().await;
        db.chat_tickets
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found("ticket", id))
    }

    pub async fn insert_ticket(&self, mut ticket: Ticket) -> DbResult<Ticket> {
        if ticket.subject.trim().is_empty() {
            return Err(DbError::Invalid("subject is required".into()));
        }
        let mut db = self.inner.write().await;
        if ticket.id.is_empty() || db.chat_tickets.iter().any(|t| t.id == ticket.id) {
            ticket.id = new_id();
        }
        db.chat_tickets.push(ticket.clone());
        Ok(ticket)
    }

    /// Apply a partial update. `lastActivity` only ever moves forward.
    pub async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> DbResult<Ticket> {
        let mut db = self.inner.write().await;
        let ticket = db
            .chat_tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("ticket", id))?;
        ticket.apply(patch);
        Ok(ticket.clone())
    }

    /// Messages for one ticket, or all messages, in insertion order.
    pub async fn messages(&self, ticket_id: Option<&str>) -> Vec<Message> {
        let db = self.inner.read().await;
        db.chat_messages
            .iter()
            .filter(|m| ticket_id.map_or(true, |id| m.ticket_id == id))
            .cloned()
            .collect()
    }

    /// Store a message and advance its ticket's last activity in one step.
    ///
    /// A message for an unknown ticket is rejected; nothing is written.
    pub async fn insert_message(&self, mut message: Message) -> DbResult<Message> {
        if message.body.trim().is_empty() {
            return Err(DbError::Invalid("message body is required".into()));
        }
        let mut db = self.inner.write().await;
        let Some(ticket) = db.chat_tickets.iter_mut().find(|t| t.id == message.ticket_id) else {
            return Err(not_found("ticket", &message.ticket_id));
        };
        ticket.touch(message.timestamp);

        if message.id.is_empty() || db.chat_messages.iter().any(|m| m.id == message.id) {
            message.id = new_id();
        }
        db.chat_messages.push(message.clone());
        Ok(message)
    }

    // ========================================================================
    // Portfolio
    // ========================================================================

    pub async fn accounts(&self) -> Vec<Account> {
        self.inner.read().await.accounts.clone()
    }

    pub async fn insert_account(&self, mut account: Account) -> DbResult<Account> {
        let mut db = self.inner.write().await;
        if account.id.is_empty() {
            account.id = new_id();
        }
        db.accounts.push(account.clone());
        Ok(account)
    }

    /// json-server listing: `userId` filter, then a stable sort, then the limit.
    pub async fn transactions(&self, query: &TransactionQuery) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self
            .inner
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| query.user_id.as_deref().map_or(true, |id| t.user_id == id))
            .cloned()
            .collect();
        if let Some(field) = query.sort.as_deref() {
            let desc = query.order == Some(SortOrder::Desc);
            match field {
                "date" if desc => txs.sort_by(|a, b| b.date.cmp(&a.date)),
                "date" => txs.sort_by(|a, b| a.date.cmp(&b.date)),
                "amount" if desc => txs.sort_by(|a, b| b.amount.total_cmp(&a.amount)),
                "amount" => txs.sort_by(|a, b| a.amount.total_cmp(&b.amount)),
                other => tracing::debug!(field = other, "Ignoring unsupported sort field"),
            }
        }
        if let Some(limit) = query.limit {
            txs.truncate(limit);
        }
        txs
    }

    pub async fn insert_transaction(&self, mut tx: Transaction) -> DbResult<Transaction> {
        if !tx.amount.is_finite() || tx.amount <= 0.0 {
            return Err(DbError::Invalid("amount must be positive".into()));
        }
        let mut db = self.inner.write().await;
        if tx.id.is_empty() {
            tx.id = new_id();
        }
        db.transactions.push(tx.clone());
        Ok(tx)
    }

    pub async fn kyc_documents(&self) -> Vec<KycDocument> {
        self.inner.read().await.kyc_documents.clone()
    }

    pub async fn insert_kyc_document(&self, mut doc: KycDocument) -> DbResult<KycDocument> {
        let mut db = self.inner.write().await;
        if doc.id.is_empty() {
            doc.id = new_id();
        }
        db.kyc_documents.push(doc.clone());
        Ok(doc)
    }

    // ========================================================================
    // Introducing-broker applications
    // ========================================================================

    pub async fn ib_requests(&self) -> Vec<IbRequest> {
        self.inner.read().await.ib_requests.clone()
    }

    pub async fn insert_ib_request(&self, mut request: IbRequest) -> DbResult<IbRequest> {
        if request.company_name.trim().is_empty() {
            return Err(DbError::Invalid("company name is required".into()));
        }
        let mut db = self.inner.write().await;
        if request.id.is_empty() {
            request.id = new_id();
        }
        if request.status.is_empty() {
            request.status = IB_UNDER_REVIEW.to_string();
        }
        db.ib_requests.push(request.clone());
        Ok(request)
    }

    pub async fn dashboard_stats(&self) -> DbResult<DashboardStats> {
        self.inner
            .read()
            .await
            .dashboard_stats
            .clone()
            .ok_or_else(|| not_found("dashboard stats", "dashboardStats"))
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.inner.read().await.positions.clone()
    }

    pub async fn counts(&self) -> serde_json::Value {
        let db = self.inner.read().await;
        serde_json::json!({
            "users": db.users.len(),
            "tickets": db.chat_tickets.len(),
            "messages": db.chat_messages.len(),
            "accounts": db.accounts.len(),
            "transactions": db.transactions.len(),
            "ibRequests": db.ib_requests.len(),
        })
    }

    pub async fn latest_activity(&self) -> Option<DateTime<Utc>> {
        let db = self.inner.read().await;
        db.chat_tickets.iter().map(|t| t.last_activity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tradedesk_core::models::{DeliveryStatus, SenderRole, TicketPriority, TransactionKind};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }

    fn ticket(id: &str, user: &str, status: TicketStatus) -> Ticket {
        Ticket {
            id: id.into(),
            user_id: user.into(),
            department_id: Some("1".into()),
            subject: "Withdrawal delay".into(),
            status,
            priority: TicketPriority::Medium,
            created_at: at(9),
            last_activity: at(10),
            assigned_agent: None,
            description: None,
            attachments: vec![],
        }
    }

    fn message(ticket_id: &str, when: DateTime<Utc>) -> Message {
        Message {
            id: String::new(),
            ticket_id: ticket_id.into(),
            user_id: "1".into(),
            department_id: None,
            sender: SenderRole::User,
            agent_name: None,
            body: "Any update?".into(),
            timestamp: when,
            status: DeliveryStatus::Sent,
        }
    }

    fn seeded() -> MockDb {
        MockDb::new(Collections {
            chat_tickets: vec![
                ticket("1", "1", TicketStatus::Open),
                ticket("2", "2", TicketStatus::Closed),
            ],
            ..Default::default()
        })
    }

    // ========================================================================
    // TEST 1: ticket filters combine as equality matches
    // ========================================================================
    #[tokio::test]
    async fn test_ticket_query_filters() {
        let db = seeded();
        let mine = db
            .tickets(&TicketQuery {
                user_id: Some("1".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(mine.len(), 1);

        let closed = db
            .tickets(&TicketQuery {
                status: Some(TicketStatus::Closed),
                ..Default::default()
            })
            .await;
        assert_eq!(closed[0].id, "2");
        assert_eq!(db.tickets(&TicketQuery::default()).await.len(), 2);
    }

    // ========================================================================
    // TEST 2: inserting a message touches its ticket
    // ========================================================================
    #[tokio::test]
    async fn test_insert_message_touches_ticket() {
        let db = seeded();
        let later = at(10) + Duration::minutes(5);
        let stored = db.insert_message(message("1", later)).await.unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(db.ticket("1").await.unwrap().last_activity, later);
        assert_eq!(db.messages(Some("1")).await.len(), 1);
    }

    // ========================================================================
    // TEST 3: a message for an unknown ticket writes nothing
    // ========================================================================
    #[tokio::test]
    async fn test_insert_message_unknown_ticket() {
        let db = seeded();
        let err = db.insert_message(message("404", at(11))).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { resource: "ticket", .. }));
        assert!(db.messages(None).await.is_empty());
    }

    // ========================================================================
    // TEST 4: an older message never rewinds last activity
    // ========================================================================
    #[tokio::test]
    async fn test_last_activity_is_monotonic() {
        let db = seeded();
        db.insert_message(message("1", at(8))).await.unwrap();
        assert_eq!(db.ticket("1").await.unwrap().last_activity, at(10));

        let patched = db.patch_ticket("1", &TicketPatch::touch(at(7))).await.unwrap();
        assert_eq!(patched.last_activity, at(10));
    }

    // ========================================================================
    // TEST 5: patch applies only the fields present
    // ========================================================================
    #[tokio::test]
    async fn test_patch_ticket_partial() {
        let db = seeded();
        let patched = db
            .patch_ticket("1", &TicketPatch::status(TicketStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(patched.status, TicketStatus::InProgress);
        assert_eq!(patched.subject, "Withdrawal delay");
        assert!(db.patch_ticket("nope", &TicketPatch::default()).await.is_err());
    }

    // ========================================================================
    // TEST 6: transactions honour sort, order and limit
    // ========================================================================
    #[tokio::test]
    async fn test_transactions_sort_order_limit() {
        let tx = |id: &str, hour: u32| Transaction {
            id: id.into(),
            user_id: "1".into(),
            kind: TransactionKind::Deposit,
            amount: 100.0,
            currency: "USD".into(),
            method: None,
            account_id: None,
            status: "Completed".into(),
            date: at(hour),
            from_account: None,
            to_account: None,
        };
        let db = MockDb::new(Collections {
            transactions: vec![tx("a", 9), tx("b", 12), tx("c", 10)],
            ..Default::default()
        });

        let recent = db.transactions(&TransactionQuery::recent(2)).await;
        let ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let unsorted = db.transactions(&TransactionQuery::default()).await;
        assert_eq!(unsorted[0].id, "a");
    }

    fn deposit(id: &str, user: &str, hour: u32) -> Transaction {
        Transaction {
            id: id.into(),
            user_id: user.into(),
            kind: TransactionKind::Deposit,
            amount: 100.0,
            currency: "USD".into(),
            method: None,
            account_id: None,
            status: "Completed".into(),
            date: at(hour),
            from_account: None,
            to_account: None,
        }
    }

    // ========================================================================
    // TEST 6b: descending order keeps ties in insertion order
    // ========================================================================
    #[tokio::test]
    async fn test_transactions_desc_ties_are_stable() {
        let db = MockDb::new(Collections {
            transactions: vec![
                deposit("a", "1", 9),
                deposit("b", "1", 11),
                deposit("c", "1", 11),
                deposit("d", "1", 10),
            ],
            ..Default::default()
        });
        let ids: Vec<String> = db
            .transactions(&TransactionQuery::recent(10))
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "d", "a"]);
    }

    // ========================================================================
    // TEST 6c: userId narrows the listing before the limit
    // ========================================================================
    #[tokio::test]
    async fn test_transactions_owner_filter_before_limit() {
        let db = MockDb::new(Collections {
            transactions: vec![
                deposit("old", "1", 8),
                deposit("n1", "2", 12),
                deposit("n2", "2", 13),
                deposit("n3", "2", 14),
            ],
            ..Default::default()
        });
        let mine = db.transactions(&TransactionQuery::recent(2).for_user("1")).await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "old");
    }

    // ========================================================================
    // TEST 7: duplicate signup email is rejected
    // ========================================================================
    #[tokio::test]
    async fn test_duplicate_user_email() {
        let db = MockDb::empty();
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "", "email": "jane@example.com", "name": "Jane"
        }))
        .unwrap();
        let stored = db.insert_user(user.clone()).await.unwrap();
        assert!(!stored.id.is_empty());
        assert!(matches!(db.insert_user(user).await, Err(DbError::Invalid(_))));
    }

    // ========================================================================
    // TEST 7b: profile patch merges fields and keeps emails unique
    // ========================================================================
    #[tokio::test]
    async fn test_patch_user_profile() {
        let db = MockDb::empty();
        for (id, email) in [("1", "jane@example.com"), ("2", "bob@example.com")] {
            let user: User = serde_json::from_value(serde_json::json!({
                "id": id, "email": email, "password": "pw", "firstName": "Jane", "lastName": "Smith"
            }))
            .unwrap();
            db.insert_user(user).await.unwrap();
        }

        let patch = ProfilePatch {
            last_name: Some("Doe".into()),
            city: Some("Leeds".into()),
            ..Default::default()
        };
        let updated = db.patch_user("1", &patch).await.unwrap();
        assert_eq!(updated.display_name(), "Jane Doe");
        assert_eq!(updated.city.as_deref(), Some("Leeds"));
        assert_eq!(updated.password.as_deref(), Some("pw"));

        let steal = ProfilePatch {
            email: Some("BOB@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(db.patch_user("1", &steal).await, Err(DbError::Invalid(_))));
        let keep = ProfilePatch {
            email: Some("jane@example.com".into()),
            ..Default::default()
        };
        assert!(db.patch_user("1", &keep).await.is_ok());
        assert!(matches!(
            db.patch_user("9", &patch).await,
            Err(DbError::NotFound { resource: "user", .. })
        ));
    }

    // ========================================================================
    // TEST 7c: IB applications get an id and default to under review
    // ========================================================================
    #[tokio::test]
    async fn test_insert_ib_request_defaults() {
        let db = MockDb::empty();
        let request: IbRequest = serde_json::from_value(serde_json::json!({
            "id": "", "userId": "1", "companyName": "Smith Capital", "contactPerson": "Jane Smith",
            "status": "", "submissionDate": "2024-03-01T12:00:00Z"
        }))
        .unwrap();
        let stored = db.insert_ib_request(request.clone()).await.unwrap();
        assert!(!stored.id.is_empty());
        assert!(stored.is_under_review());
        assert_eq!(db.counts().await["ibRequests"], 1);

        let blank = IbRequest {
            company_name: "  ".into(),
            ..request
        };
        assert!(matches!(db.insert_ib_request(blank).await, Err(DbError::Invalid(_))));
        assert_eq!(db.ib_requests().await.len(), 1);
    }

    // ========================================================================
    // TEST 8: seed file loads from disk
    // ========================================================================
    #[tokio::test]
    async fn test_load_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            r#"{ "supportDepartments": [
                  { "id": "1", "name": "Technical Support", "status": "online" } ] }"#,
        )
        .unwrap();
        let db = MockDb::load(&path).unwrap();
        assert_eq!(db.departments().await.len(), 1);
        assert!(db.dashboard_stats().await.is_err());
    }
}
