//! End-to-end support flow: the real backend on an ephemeral port, driven by the
//! core HTTP client and ticket controller.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tradedesk_core::config::AgentConfig;
use tradedesk_core::models::{
    SenderRole, TicketPriority, TicketStatus, Transaction, TransactionKind, TransactionQuery,
};
use tradedesk_core::validation::{IbForm, LoginForm, NewTicket, ProfileForm};
use tradedesk_core::{
    AuthService, DeskApi, DeskError, HttpDeskClient, Outcome, PortfolioService, SessionContext,
    TicketController,
};
use tradedesk_server::db::MockDb;
use tradedesk_server::http::serve;

struct Backend {
    url: String,
    shutdown: broadcast::Sender<()>,
}

impl Drop for Backend {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

fn fixture_db() -> MockDb {
    let seed = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join("db.json");
    MockDb::load(&seed).unwrap()
}

async fn spawn_backend() -> Backend {
    serve_db(fixture_db()).await
}

async fn serve_db(db: MockDb) -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(serve(listener, Arc::new(db), rx));
    Backend {
        url: format!("http://{addr}"),
        shutdown: tx,
    }
}

struct Desk {
    api: Arc<HttpDeskClient>,
    auth: AuthService,
    controller: TicketController,
    portfolio: PortfolioService,
}

async fn sign_in(backend: &Backend, email: &str, password: &str) -> Desk {
    let session = Arc::new(SessionContext::in_memory());
    let api = Arc::new(HttpDeskClient::with_base_url(&backend.url, session.clone()).unwrap());
    let auth = AuthService::new(api.clone(), session.clone());
    auth.login(&LoginForm {
        email: email.into(),
        password: password.into(),
    })
    .await
    .unwrap();
    let controller = TicketController::new(api.clone(), session.clone(), &AgentConfig::default());
    let portfolio = PortfolioService::new(api.clone(), session);
    Desk {
        api,
        auth,
        controller,
        portfolio,
    }
}

fn login_issue() -> NewTicket {
    NewTicket {
        department_id: "1".into(),
        subject: "Login issue".into(),
        priority: TicketPriority::High,
        description: "Cannot log in at all".into(),
        attachments: vec![],
    }
}

#[tokio::test]
async fn test_customer_opens_ticket_and_agent_works_it() {
    let backend = spawn_backend().await;

    // Customer opens a ticket and says hello.
    let mut jane = sign_in(&backend, "jane@example.com", "password123").await;
    jane.controller.load_departments().await.unwrap();
    assert_eq!(jane.controller.refresh_tickets().await.unwrap().len(), 2);

    let ticket = jane.controller.create_ticket(login_issue()).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.priority, TicketPriority::High);
    assert_eq!(jane.controller.store().len(), 3);

    let prior = ticket.last_activity;
    assert!(jane.controller.select_ticket(&ticket.id).await.unwrap().is_empty());
    let hello = jane.controller.send_message("Hello").await.unwrap().unwrap();
    assert_eq!(hello.sender, SenderRole::User);
    assert!(hello.timestamp >= prior);

    let thread = jane.controller.thread().messages();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].body, "Hello");

    let stored = jane.api.get_ticket(&ticket.id).await.unwrap();
    assert!(stored.last_activity >= hello.timestamp);

    // Customers cannot move tickets through the workflow.
    assert!(matches!(
        jane.controller.update_status(&ticket.id, TicketStatus::Closed).await,
        Err(DeskError::Forbidden { .. })
    ));

    // The agent sees every ticket and picks this one up.
    let mut agent = sign_in(&backend, "agent@tradedesk.example", "agentpass").await;
    assert_eq!(agent.controller.refresh_tickets().await.unwrap().len(), 4);

    let first = agent
        .controller
        .update_status(&ticket.id, TicketStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(first, Outcome::Applied);
    let again = agent
        .controller
        .update_status(&ticket.id, TicketStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(again, Outcome::Unchanged);
    assert_eq!(
        agent.controller.store().status_of(&ticket.id),
        Some(TicketStatus::InProgress)
    );

    agent.controller.select_ticket(&ticket.id).await.unwrap();
    let reply = agent
        .controller
        .send_message("Resetting your password now")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.sender, SenderRole::Agent);
    assert!(reply.timestamp >= hello.timestamp);
    assert_eq!(agent.controller.thread().len(), 2);
    assert_eq!(
        agent.controller.store().get(&ticket.id).unwrap().assigned_agent.as_deref(),
        Some("Admin Agent")
    );

    // Once closed, the customer can no longer post.
    agent
        .controller
        .update_status(&ticket.id, TicketStatus::Closed)
        .await
        .unwrap();
    jane.controller.refresh_tickets().await.unwrap();
    jane.controller.select_ticket(&ticket.id).await.unwrap();
    assert_eq!(jane.controller.thread().len(), 2);
    assert!(matches!(
        jane.controller.send_message("Still broken").await,
        Err(DeskError::TicketClosed(_))
    ));
}

#[tokio::test]
async fn test_customer_cannot_post_on_someone_elses_ticket() {
    let backend = spawn_backend().await;
    let mut jane = sign_in(&backend, "jane@example.com", "password123").await;

    // Ticket 3 belongs to another customer.
    jane.controller.select_ticket("3").await.unwrap();
    assert!(matches!(
        jane.controller.send_message("Hi").await,
        Err(DeskError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn test_wrong_password_is_rejected_by_live_backend() {
    let backend = spawn_backend().await;
    let session = Arc::new(SessionContext::in_memory());
    let api = Arc::new(HttpDeskClient::with_base_url(&backend.url, session.clone()).unwrap());
    let result = AuthService::new(api, session.clone())
        .login(&LoginForm {
            email: "jane@example.com".into(),
            password: "not-the-password".into(),
        })
        .await;
    assert!(matches!(result, Err(DeskError::InvalidCredentials)));
    assert!(session.current().is_none());
}

#[tokio::test]
async fn test_recent_transactions_survive_busier_customers() {
    let db = fixture_db();
    // Omar's six February deposits are all newer than anything Jane owns.
    for day in 1..=6 {
        db.insert_transaction(Transaction {
            id: String::new(),
            user_id: "2".into(),
            kind: TransactionKind::Deposit,
            amount: 100.0,
            currency: "EUR".into(),
            method: Some("crypto".into()),
            account_id: Some("3".into()),
            status: "Completed".into(),
            date: Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap(),
            from_account: None,
            to_account: None,
        })
        .await
        .unwrap();
    }
    let backend = serve_db(db).await;
    let jane = sign_in(&backend, "jane@example.com", "password123").await;

    let recent = jane
        .portfolio
        .transactions(&TransactionQuery::recent(5))
        .await
        .unwrap();
    let ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "2", "1"]);

    let overview = jane.portfolio.dashboard().await.unwrap();
    assert_eq!(overview.recent_transactions.len(), 3);
    assert!(overview.recent_transactions.iter().all(|t| t.user_id == "1"));
}

#[tokio::test]
async fn test_profile_and_ib_application_round_trip() {
    let backend = spawn_backend().await;
    let jane = sign_in(&backend, "jane@example.com", "password123").await;

    let form = ProfileForm {
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        email: "jane@example.com".into(),
        phone: "+44 20 7946 0958".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1988, 2, 3),
        address: "12 Harbour Road".into(),
        city: "Leeds".into(),
        country: "UK".into(),
        postal_code: "LS1 4AP".into(),
        avatar: None,
    };
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let saved = jane.auth.update_profile_on(&form, today).await.unwrap();
    assert_eq!(saved.display_name(), "Jane Doe");
    assert_eq!(jane.auth.profile().await.unwrap().postal_code.as_deref(), Some("LS1 4AP"));

    // Only Omar's seeded application exists so far.
    assert!(jane.portfolio.ib_requests().await.unwrap().is_empty());
    let submitted = jane
        .portfolio
        .submit_ib_request(&IbForm {
            company_name: "Smith Capital".into(),
            contact_person: "Jane Doe".into(),
            email: "ib@smith.example".into(),
            phone: "+44 20 7946 0958".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(submitted.is_under_review());

    let mine = jane.portfolio.ib_requests().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, submitted.id);
    assert_eq!(jane.api.list_ib_requests().await.unwrap().len(), 2);
}
