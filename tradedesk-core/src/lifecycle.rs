//! Ticket lifecycle controller.
//!
//! Owns the state one support view works with: departments, the ticket store,
//! and the message thread of the selected ticket. Every mutation is a single
//! backend round trip followed by a refetch; local state changes only after a
//! successful response, so a failed call leaves everything as it was.
//!
//! Sending a message is two independent writes (create message, then touch the
//! ticket). The touch is best-effort: if it fails the message still stands and
//! only the ticket's last activity is stale on the backend.

use std::sync::Arc;

use chrono::Utc;

use crate::api::DeskApi;
use crate::config::AgentConfig;
use crate::error::{DeskError, DeskResult};
use crate::filter::TicketFilter;
use crate::models::{
    new_id, DeliveryStatus, Department, Message, SenderRole, Ticket, TicketPatch, TicketStatus,
};
use crate::session::{Session, SessionContext};
use crate::store::TicketStore;
use crate::thread::MessageThread;
use crate::validation::{NewTicket, ValidationErrors};

/// Whether a lifecycle call actually changed anything on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
}

pub struct TicketController {
    api: Arc<dyn DeskApi>,
    session: Arc<SessionContext>,
    agent_name: String,
    departments: Vec<Department>,
    store: TicketStore,
    thread: MessageThread,
}

impl TicketController {
    pub fn new(api: Arc<dyn DeskApi>, session: Arc<SessionContext>, agent: &AgentConfig) -> Self {
        Self {
            api,
            session,
            agent_name: agent.display_name.clone(),
            departments: Vec::new(),
            store: TicketStore::new(),
            thread: MessageThread::new(),
        }
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    pub fn thread(&self) -> &MessageThread {
        &self.thread
    }

    pub fn selected_ticket(&self) -> Option<&Ticket> {
        self.thread.ticket_id().and_then(|id| self.store.get(id))
    }

    pub fn filtered(&self, filter: &TicketFilter) -> Vec<&Ticket> {
        self.store.filtered(filter)
    }

    pub fn department_name(&self, department_id: Option<&str>) -> &str {
        let Some(id) = department_id else {
            return "No Department";
        };
        self.departments
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.as_str())
            .unwrap_or("Unknown Department")
    }

    // ========================================================================
    // Loading
    // ========================================================================

    pub async fn load_departments(&mut self) -> DeskResult<&[Department]> {
        match self.api.list_departments().await {
            Ok(departments) => {
                self.departments = departments;
                Ok(&self.departments)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching departments");
                Err(e)
            }
        }
    }

    /// Refetch tickets: customers see their own, agents see every ticket.
    pub async fn refresh_tickets(&mut self) -> DeskResult<&[Ticket]> {
        let session = self.session.require()?;
        let owner = (!session.can_manage_tickets()).then_some(session.user_id.as_str());
        match self.api.list_tickets(owner).await {
            Ok(tickets) => {
                tracing::debug!(count = tickets.len(), "Loaded tickets");
                self.store.replace_all(tickets);
                Ok(self.store.all())
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching tickets");
                Err(e)
            }
        }
    }

    async fn refresh_after_write(&mut self, ticket_id: &str) {
        if let Err(e) = self.refresh_tickets().await {
            tracing::warn!(ticket_id, error = %e, "Write succeeded but ticket refresh failed");
        }
    }

    /// Select a ticket and load its full history.
    pub async fn select_ticket(&mut self, ticket_id: &str) -> DeskResult<&[Message]> {
        self.thread.select(ticket_id);
        self.thread.reload(self.api.as_ref()).await
    }

    // ========================================================================
    // Customer operations
    // ========================================================================

    /// Validate and submit a new ticket. Nothing is sent if validation fails.
    pub async fn create_ticket(&mut self, form: NewTicket) -> DeskResult<Ticket> {
        let session = self.session.require()?;

        if let Err(errors) = form.validate() {
            tracing::debug!(errors = %errors, "Ticket form rejected");
            return Err(errors.into());
        }
        let department_id = form.department_id.trim().to_string();
        if !self.departments.is_empty() && !self.departments.iter().any(|d| d.id == department_id) {
            return Err(ValidationErrors::single("department", "Unknown department").into());
        }

        let now = Utc::now();
        let ticket = Ticket {
            id: new_id(),
            user_id: session.user_id.clone(),
            department_id: Some(department_id),
            subject: form.subject.trim().to_string(),
            status: TicketStatus::Open,
            priority: form.priority,
            created_at: now,
            last_activity: now,
            assigned_agent: None,
            description: Some(form.description.trim().to_string()),
            attachments: form.attachments,
        };

        let created = match self.api.create_ticket(&ticket).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "Error creating ticket");
                return Err(e);
            }
        };
        tracing::info!(ticket_id = %created.id, priority = %created.priority, "Ticket created");

        if self.refresh_tickets().await.is_err() || self.store.get(&created.id).is_none() {
            self.store.upsert(created.clone());
        }
        Ok(created)
    }

    /// Send on the selected ticket as whoever is signed in.
    ///
    /// Empty or whitespace-only bodies and a missing selection are silent
    /// no-ops returning `Ok(None)`.
    pub async fn send_message(&mut self, body: &str) -> DeskResult<Option<Message>> {
        let sender = match self.session.current() {
            Some(s) if s.can_manage_tickets() => SenderRole::Agent,
            _ => SenderRole::User,
        };
        self.send_message_as(sender, body).await
    }

    pub async fn send_message_as(
        &mut self,
        sender: SenderRole,
        body: &str,
    ) -> DeskResult<Option<Message>> {
        let body = body.trim();
        let Some(ticket_id) = self.thread.ticket_id().map(String::from) else {
            return Ok(None);
        };
        if body.is_empty() {
            return Ok(None);
        }

        let session = self.session.require()?;
        let ticket = match self.store.get(&ticket_id) {
            Some(t) => t.clone(),
            None => self.api.get_ticket(&ticket_id).await?,
        };

        let message = self.compose(&session, &ticket, sender, body)?;
        let created = match self.api.create_message(&message).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(ticket_id = %ticket_id, error = %e, "Error sending message");
                return Err(e);
            }
        };
        self.thread.append(created.clone());

        let mut patch = TicketPatch::touch(created.timestamp);
        if sender == SenderRole::Agent {
            patch.assigned_agent = created.agent_name.clone();
        }
        match self.api.patch_ticket(&ticket_id, &patch).await {
            Ok(updated) => self.store.upsert(updated),
            Err(e) => {
                tracing::warn!(
                    ticket_id = %ticket_id,
                    error = %e,
                    "Message recorded but ticket activity update failed"
                );
                if !self.store.touch(&ticket_id, created.timestamp) {
                    let mut local = ticket;
                    local.touch(created.timestamp);
                    self.store.upsert(local);
                }
            }
        }

        // The local append stands if the refetch fails; reload logs the error.
        let _ = self.thread.reload(self.api.as_ref()).await;
        Ok(Some(created))
    }

    fn compose(
        &self,
        session: &Session,
        ticket: &Ticket,
        sender: SenderRole,
        body: &str,
    ) -> DeskResult<Message> {
        // A reply never predates the activity it follows.
        let timestamp = Utc::now().max(ticket.last_activity);

        let message = match sender {
            SenderRole::Agent => {
                if !session.can_manage_tickets() {
                    return Err(DeskError::Forbidden { action: "reply as an agent" });
                }
                let agent_name = if session.display_name.trim().is_empty() {
                    self.agent_name.clone()
                } else {
                    session.display_name.clone()
                };
                Message {
                    id: new_id(),
                    ticket_id: ticket.id.clone(),
                    user_id: ticket.user_id.clone(),
                    department_id: ticket.department_id.clone(),
                    sender,
                    agent_name: Some(agent_name),
                    body: body.to_string(),
                    timestamp,
                    status: DeliveryStatus::Delivered,
                }
            }
            SenderRole::User => {
                if ticket.user_id != session.user_id {
                    return Err(DeskError::Forbidden {
                        action: "post on another user's ticket",
                    });
                }
                if ticket.is_closed() {
                    return Err(DeskError::TicketClosed(ticket.id.clone()));
                }
                Message {
                    id: new_id(),
                    ticket_id: ticket.id.clone(),
                    user_id: session.user_id.clone(),
                    department_id: ticket.department_id.clone(),
                    sender,
                    agent_name: None,
                    body: body.to_string(),
                    timestamp,
                    status: DeliveryStatus::Sent,
                }
            }
        };
        Ok(message)
    }

    // ========================================================================
    // Agent operations
    // ========================================================================

    fn require_agent(&self, action: &'static str) -> DeskResult<Session> {
        let session = self.session.require()?;
        if !session.can_manage_tickets() {
            tracing::warn!(user_id = %session.user_id, action, "Rejected ticket management call");
            return Err(DeskError::Forbidden { action });
        }
        Ok(session)
    }

    /// Set a ticket's status. Setting the status it already has issues no write.
    pub async fn update_status(&mut self, ticket_id: &str, status: TicketStatus) -> DeskResult<Outcome> {
        self.require_agent("change ticket status")?;

        let outcome = if self.store.status_of(ticket_id) == Some(status) {
            tracing::debug!(ticket_id, status = %status, "Status unchanged, skipping update");
            Outcome::Unchanged
        } else {
            if let Err(e) = self.api.patch_ticket(ticket_id, &TicketPatch::status(status)).await {
                tracing::error!(ticket_id, error = %e, "Error updating ticket status");
                return Err(e);
            }
            tracing::info!(ticket_id, status = %status, "Ticket status updated");
            Outcome::Applied
        };

        self.refresh_after_write(ticket_id).await;
        Ok(outcome)
    }

    /// Assign a ticket to an agent. Last writer wins; there is no version check.
    pub async fn assign_ticket(&mut self, ticket_id: &str, agent_name: &str) -> DeskResult<Outcome> {
        self.require_agent("assign tickets")?;

        let agent_name = agent_name.trim();
        if agent_name.is_empty() {
            return Err(ValidationErrors::single("assignedAgent", "Agent name is required").into());
        }

        if let Err(e) = self.api.patch_ticket(ticket_id, &TicketPatch::assign(agent_name)).await {
            tracing::error!(ticket_id, error = %e, "Error assigning ticket");
            return Err(e);
        }
        tracing::info!(ticket_id, agent = agent_name, "Ticket assigned");

        self.refresh_after_write(ticket_id).await;
        Ok(Outcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpDeskClient;
    use crate::filter::Filter;
    use crate::models::{Attachment, TicketPriority, UserRole};
    use chrono::{DateTime, TimeZone};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn session(role: UserRole) -> Arc<SessionContext> {
        let ctx = Arc::new(SessionContext::in_memory());
        let (user_id, display_name) = match role {
            UserRole::Customer => ("1", "Jane Smith"),
            UserRole::Agent => ("100", "Admin Agent"),
        };
        ctx.begin(Session {
            token: format!("demo-token-{user_id}"),
            user_id: user_id.into(),
            display_name: display_name.into(),
            role,
        })
        .unwrap();
        ctx
    }

    fn controller(server: &MockServer, role: UserRole) -> TicketController {
        let session = session(role);
        let api = HttpDeskClient::with_base_url(server.uri(), session.clone()).unwrap();
        TicketController::new(Arc::new(api), session, &AgentConfig::default())
    }

    fn last_activity() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn ticket_json(status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "1",
            "userId": "1",
            "departmentId": "1",
            "subject": "Account Verification Issue",
            "status": status,
            "priority": "high",
            "createdAt": "2024-01-14T10:00:00Z",
            "lastActivity": last_activity().to_rfc3339()
        })
    }

    fn new_ticket_form() -> NewTicket {
        NewTicket {
            department_id: "1".into(),
            subject: "Login issue".into(),
            priority: TicketPriority::High,
            description: "I cannot log in today".into(),
            attachments: vec![Attachment::new("error.png", "image/png", 2048)],
        }
    }

    async fn mount_tickets(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/chatTickets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Echo the posted body back, like json-server does.
    fn echo() -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
        |req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            ResponseTemplate::new(201).set_body_json(body)
        }
    }

    // ------------------------------------------------------------------------
    // create_ticket
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_ticket_invalid_form_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        let mut form = new_ticket_form();
        form.description = "too short".into();

        match ctl.create_ticket(form).await {
            Err(DeskError::Validation(errors)) => assert!(errors.has_field("description")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_ticket_posts_open_ticket_and_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chatTickets"))
            .and(body_partial_json(serde_json::json!({
                "userId": "1",
                "subject": "Login issue",
                "status": "open",
                "priority": "high",
                "departmentId": "1"
            })))
            .respond_with(echo())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chatTickets"))
            .and(query_param("userId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        let created = ctl.create_ticket(new_ticket_form()).await.unwrap();

        assert_eq!(created.status, TicketStatus::Open);
        assert_eq!(created.priority, TicketPriority::High);
        assert_eq!(created.created_at, created.last_activity);
        assert_eq!(created.attachments.len(), 1);
        // Refresh returned nothing yet, so the created ticket is kept locally.
        assert!(ctl.store().get(&created.id).is_some());
    }

    #[tokio::test]
    async fn test_create_ticket_unknown_department_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supportDepartments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "1", "name": "Technical Support", "status": "online", "responseTime": "< 2 hours" }
            ])))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.load_departments().await.unwrap();
        let mut form = new_ticket_form();
        form.department_id = "kyc".into();
        match ctl.create_ticket(form).await {
            Err(DeskError::Validation(errors)) => {
                assert_eq!(errors.for_field("department"), Some("Unknown department"))
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    // ------------------------------------------------------------------------
    // send_message
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_send_blank_message_is_a_no_op() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("open")])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();

        assert!(ctl.send_message("").await.unwrap().is_none());
        assert!(ctl.send_message("   \n\t").await.unwrap().is_none());
        assert!(ctl.thread().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_selection_is_a_no_op() {
        let server = MockServer::start().await;
        let mut ctl = controller(&server, UserRole::Customer);
        assert!(ctl.send_message("Hello").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_customer_send_appends_and_touches_ticket() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("open")])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .and(query_param("ticketId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chatMessages"))
            .and(body_partial_json(serde_json::json!({
                "ticketId": "1", "userId": "1", "sender": "user", "message": "Hello", "status": "sent"
            })))
            .respond_with(echo())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/chatTickets/1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();

        let sent = ctl.send_message("  Hello  ").await.unwrap().expect("message sent");
        assert_eq!(sent.sender, SenderRole::User);
        assert_eq!(sent.body, "Hello");
        assert!(sent.timestamp >= last_activity());

        // The touch failed on the backend but the local ticket still advanced.
        assert_eq!(ctl.store().get("1").unwrap().last_activity, sent.timestamp);
        // The refetch after sending hit no mock, so the local append stands.
        assert_eq!(ctl.thread().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_leaves_thread_unchanged() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("open")])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();

        assert!(ctl.send_message("Hello").await.is_err());
        assert!(ctl.thread().is_empty());
        assert_eq!(ctl.store().get("1").unwrap().last_activity, last_activity());
    }

    #[tokio::test]
    async fn test_customer_cannot_post_on_closed_ticket() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("closed")])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();
        assert!(matches!(
            ctl.send_message("Hello?").await,
            Err(DeskError::TicketClosed(id)) if id == "1"
        ));
    }

    #[tokio::test]
    async fn test_agent_reply_sets_assignee() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("open")])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chatMessages"))
            .and(body_partial_json(serde_json::json!({
                "userId": "1", "sender": "agent", "agentName": "Admin Agent", "status": "delivered"
            })))
            .respond_with(echo())
            .expect(1)
            .mount(&server)
            .await;
        let mut assigned = ticket_json("open");
        assigned["assignedAgent"] = serde_json::json!("Admin Agent");
        Mock::given(method("PATCH"))
            .and(path("/chatTickets/1"))
            .and(body_partial_json(serde_json::json!({ "assignedAgent": "Admin Agent" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(assigned))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Agent);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();

        let sent = ctl.send_message("On it").await.unwrap().unwrap();
        assert_eq!(sent.author_label(), "Admin Agent");
        assert_eq!(
            ctl.store().get("1").unwrap().assigned_agent.as_deref(),
            Some("Admin Agent")
        );
    }

    #[tokio::test]
    async fn test_customer_cannot_reply_as_agent() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("open")])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();
        assert!(matches!(
            ctl.send_message_as(SenderRole::Agent, "hi").await,
            Err(DeskError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_reply_timestamp_clamped_to_last_activity() {
        let server = MockServer::start().await;
        let mut future = ticket_json("open");
        future["lastActivity"] = serde_json::json!("2100-01-01T00:00:00Z");
        mount_tickets(&server, serde_json::json!([future])).await;
        Mock::given(method("GET"))
            .and(path("/chatMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chatMessages"))
            .respond_with(echo())
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        ctl.select_ticket("1").await.unwrap();
        let sent = ctl.send_message("Hello").await.unwrap().unwrap();
        assert_eq!(sent.timestamp, Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap());
    }

    // ------------------------------------------------------------------------
    // update_status / assign_ticket
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_customer_cannot_change_status() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        assert!(matches!(
            ctl.update_status("1", TicketStatus::Closed).await,
            Err(DeskError::Forbidden { .. })
        ));
        assert!(matches!(
            ctl.assign_ticket("1", "John Doe").await,
            Err(DeskError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_status_then_repeat_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatTickets"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([ticket_json("open")])),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_tickets(&server, serde_json::json!([ticket_json("in-progress")])).await;
        Mock::given(method("PATCH"))
            .and(path("/chatTickets/1"))
            .and(body_partial_json(serde_json::json!({ "status": "in-progress" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket_json("in-progress")))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Agent);
        ctl.refresh_tickets().await.unwrap();
        assert_eq!(ctl.store().status_of("1"), Some(TicketStatus::Open));

        let first = ctl.update_status("1", TicketStatus::InProgress).await.unwrap();
        assert_eq!(first, Outcome::Applied);
        assert_eq!(ctl.store().status_of("1"), Some(TicketStatus::InProgress));

        let second = ctl.update_status("1", TicketStatus::InProgress).await.unwrap();
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(ctl.store().status_of("1"), Some(TicketStatus::InProgress));
    }

    #[tokio::test]
    async fn test_update_status_failure_keeps_state() {
        let server = MockServer::start().await;
        mount_tickets(&server, serde_json::json!([ticket_json("open")])).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Agent);
        ctl.refresh_tickets().await.unwrap();
        assert!(ctl.update_status("1", TicketStatus::Closed).await.is_err());
        assert_eq!(ctl.store().status_of("1"), Some(TicketStatus::Open));
    }

    #[tokio::test]
    async fn test_assign_ticket_patches_agent() {
        let server = MockServer::start().await;
        let mut assigned = ticket_json("open");
        assigned["assignedAgent"] = serde_json::json!("John Doe");
        mount_tickets(&server, serde_json::json!([assigned.clone()])).await;
        Mock::given(method("PATCH"))
            .and(path("/chatTickets/1"))
            .and(body_partial_json(serde_json::json!({ "assignedAgent": "John Doe" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(assigned))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Agent);
        assert_eq!(ctl.assign_ticket("1", " John Doe ").await.unwrap(), Outcome::Applied);
        assert_eq!(
            ctl.store().get("1").unwrap().assigned_agent.as_deref(),
            Some("John Doe")
        );
        assert!(matches!(
            ctl.assign_ticket("1", "  ").await,
            Err(DeskError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_tickets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatTickets"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([ticket_json("open")])),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chatTickets"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Customer);
        ctl.refresh_tickets().await.unwrap();
        assert!(ctl.refresh_tickets().await.is_err());
        assert_eq!(ctl.store().len(), 1);
        let open = ctl.filtered(&TicketFilter::new(Filter::Only(TicketStatus::Open), Filter::All));
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_department_name_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supportDepartments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "2", "name": "Account Management", "status": "offline", "responseTime": "< 1 hour" }
            ])))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, UserRole::Agent);
        ctl.load_departments().await.unwrap();
        assert_eq!(ctl.department_name(Some("2")), "Account Management");
        assert_eq!(ctl.department_name(Some("9")), "Unknown Department");
        assert_eq!(ctl.department_name(None), "No Department");
    }
}
