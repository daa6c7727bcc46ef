//! tradedesk-cli: terminal front end for the tradedesk support desk
//!
//! Talks to the desk backend through `tradedesk-core`. The login is remembered
//! in a session file between invocations.
//!
//! # Subcommands
//! - `login | signup | logout | whoami`: session
//! - `profile update`: personal details
//! - `departments`, `tickets [--status] [--department]`: browse support
//! - `ticket new|show|status|assign`: ticket lifecycle
//! - `messages <id>`, `send <id> <text…>`: conversation
//! - `accounts | deposit | transfer | transactions | kyc | dashboard`: portfolio
//! - `ib list|submit`: introducing-broker applications
//! - `status`: backend health

mod format;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use tradedesk_core::models::{
    Attachment, DepositMethod, KycDocumentType, NewAccount, TicketPriority, TicketStatus,
    TransactionQuery, User,
};
use tradedesk_core::validation::{
    screen_attachments, DepositForm, IbForm, KycUploadForm, LoginForm, NewTicket, ProfileForm,
    SignupForm, TransferForm,
};
use tradedesk_core::{
    AuthService, DeskApi, DeskConfig, DeskError, FileSessionStore, Filter, HttpDeskClient,
    Outcome, PortfolioService, SessionContext, TicketController, TicketFilter,
};

const DEFAULT_CONFIG: &str = "tradedesk.toml";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "tradedesk-cli", version, about = "Tradedesk support desk from the terminal")]
struct Cli {
    /// Config file; missing files fall back to defaults
    #[arg(long, env = "TRADEDESK_CONFIG", default_value = DEFAULT_CONFIG)]
    config: String,

    /// Backend URL (overrides `api.base_url`)
    #[arg(long, env = "TRADEDESK_BACKEND_URL")]
    server: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        email: String,
        #[arg(long, env = "TRADEDESK_PASSWORD")]
        password: String,
    },

    /// Register a new customer account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRADEDESK_PASSWORD")]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
        #[arg(long)]
        agree_to_terms: bool,
    },

    /// Forget the remembered session
    Logout,

    /// Show the signed-in profile
    Whoami,

    /// Edit personal details
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// List support departments
    Departments,

    /// List tickets (customers see their own, agents see all)
    Tickets {
        #[arg(long, default_value = "all")]
        status: Filter<TicketStatus>,
        #[arg(long, default_value = "all")]
        department: Filter<String>,
    },

    /// Create and manage a single ticket
    Ticket {
        #[command(subcommand)]
        command: TicketCommand,
    },

    /// Show a ticket's conversation, oldest first
    Messages { id: String },

    /// Post a message on a ticket
    Send {
        id: String,
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// List trading accounts
    Accounts {
        #[command(subcommand)]
        command: Option<AccountCommand>,
    },

    /// Request a deposit into one of your accounts
    Deposit {
        #[arg(long)]
        account: String,
        #[arg(long, default_value = "bank")]
        method: DepositMethod,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Move funds between your own accounts
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Transaction history, newest first
    Transactions {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Identity documents
    Kyc {
        #[command(subcommand)]
        command: KycCommand,
    },

    /// Introducing-broker applications
    Ib {
        #[command(subcommand)]
        command: IbCommand,
    },

    /// Balance, recent activity and open positions
    Dashboard,

    /// Show backend status
    Status,
}

#[derive(Debug, Subcommand)]
enum TicketCommand {
    /// Open a new ticket
    New {
        #[arg(long)]
        department: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "medium")]
        priority: TicketPriority,
        #[arg(long)]
        description: String,
        /// Files to describe on the ticket (repeatable, at most 5)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// Show one ticket
    Show { id: String },

    /// Change a ticket's status (agents only)
    Status { id: String, status: TicketStatus },

    /// Assign a ticket to an agent (agents only)
    Assign { id: String, agent: String },
}

#[derive(Debug, Subcommand)]
enum AccountCommand {
    /// Open a new trading account
    Open {
        #[arg(long, default_value = "Standard")]
        account_type: String,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long, default_value = "1:100")]
        leverage: String,
        #[arg(long)]
        initial_deposit: Option<f64>,
    },
}

#[derive(Debug, Subcommand)]
enum KycCommand {
    /// List submitted documents
    List,

    /// Submit a document for review
    Upload {
        #[arg(long = "type")]
        document_type: KycDocumentType,
        #[arg(long)]
        number: String,
        /// YYYY-MM-DD
        #[arg(long)]
        expiry: NaiveDate,
        file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    /// Change profile fields; anything not given keeps its saved value
    Update(ProfileArgs),
}

#[derive(Debug, clap::Args)]
struct ProfileArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    birth_date: Option<NaiveDate>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
    /// Image file, at most 5MB
    #[arg(long)]
    avatar: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum IbCommand {
    /// List your applications, newest first
    List,

    /// Apply to become an introducing broker
    Submit {
        #[arg(long)]
        company: String,
        #[arg(long)]
        contact: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        experience: String,
    },
}

// ============================================================================
// Context
// ============================================================================

struct App {
    config: DeskConfig,
    session: Arc<SessionContext>,
    api: Arc<HttpDeskClient>,
    json: bool,
}

impl App {
    fn init(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = DeskConfig::load_or_default(&cli.config)
            .with_context(|| format!("failed to load config from {}", cli.config))?;
        if let Some(server) = &cli.server {
            config.api.base_url = server.clone();
        }

        let store = FileSessionStore::new(config.session_path());
        let session = Arc::new(SessionContext::restore(Box::new(store))?);
        let api = Arc::new(HttpDeskClient::new(&config.api, session.clone())?);

        Ok(Self {
            config,
            session,
            api,
            json: cli.json,
        })
    }

    fn auth(&self) -> AuthService {
        AuthService::new(self.api.clone(), self.session.clone())
    }

    fn portfolio(&self) -> PortfolioService {
        PortfolioService::new(self.api.clone(), self.session.clone())
    }

    fn controller(&self) -> TicketController {
        TicketController::new(self.api.clone(), self.session.clone(), &self.config.agent)
    }

    /// Print `value` as JSON, or each text line otherwise.
    fn emit<T: Serialize>(&self, value: &T, lines: impl IntoIterator<Item = String>) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in lines {
                println!("{line}");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn do_login(app: &App, email: String, password: String) -> anyhow::Result<()> {
    let user = app.auth().login(&LoginForm { email, password }).await?;
    app.emit(&user, [format!("Signed in as {} <{}>", user.display_name(), user.email)])
}

async fn do_signup(app: &App, form: SignupForm) -> anyhow::Result<()> {
    let user = app.auth().signup(&form).await?;
    app.emit(&user, [format!("Welcome, {}. You are signed in.", user.display_name())])
}

async fn do_whoami(app: &App) -> anyhow::Result<()> {
    let user = app.auth().profile().await?;
    let role = app.session.require()?.role;
    app.emit(
        &user,
        [
            format!("{} <{}>", user.display_name(), user.email),
            format!("Role:     {:?}", role),
            format!("Verified: {}", if user.verified { "yes" } else { "no" }),
            format!("2FA:      {}", if user.two_factor_enabled { "on" } else { "off" }),
        ],
    )
}

/// Saved profile values overlaid with the ones given on the command line.
fn profile_form(user: &User, args: ProfileArgs, avatar: Option<Attachment>) -> ProfileForm {
    let saved = |v: &Option<String>| v.clone().unwrap_or_default();
    ProfileForm {
        first_name: args.first_name.unwrap_or_else(|| saved(&user.first_name)),
        last_name: args.last_name.unwrap_or_else(|| saved(&user.last_name)),
        email: args.email.unwrap_or_else(|| user.email.clone()),
        phone: args.phone.unwrap_or_else(|| saved(&user.phone)),
        date_of_birth: args.birth_date.or(user.date_of_birth),
        address: args.address.unwrap_or_else(|| saved(&user.address)),
        city: args.city.unwrap_or_else(|| saved(&user.city)),
        country: args.country.unwrap_or_else(|| saved(&user.country)),
        postal_code: args.postal_code.unwrap_or_else(|| saved(&user.postal_code)),
        avatar,
    }
}

async fn do_profile(app: &App, command: ProfileCommand) -> anyhow::Result<()> {
    let auth = app.auth();
    match command {
        ProfileCommand::Update(mut args) => {
            let avatar = match args.avatar.take() {
                Some(path) => {
                    let meta = std::fs::metadata(&path)
                        .with_context(|| format!("cannot read {}", path.display()))?;
                    let mime = mime_guess::from_path(&path).first_or_octet_stream();
                    Some(Attachment::new(file_name(&path), mime.essence_str(), meta.len()))
                }
                None => None,
            };
            let current = auth.profile().await?;
            let user = auth.update_profile(&profile_form(&current, args, avatar)).await?;
            app.emit(&user, [format!("Profile saved for {}", user.display_name())])
        }
    }
}

async fn do_departments(app: &App) -> anyhow::Result<()> {
    let mut ctl = app.controller();
    let departments = ctl.load_departments().await?.to_vec();
    app.emit(&departments, departments.iter().map(format::department_row))
}

async fn do_tickets(app: &App, filter: TicketFilter) -> anyhow::Result<()> {
    let mut ctl = app.controller();
    if let Err(e) = ctl.load_departments().await {
        tracing::warn!(error = %e, "Department names unavailable");
    }
    ctl.refresh_tickets().await?;

    let tickets: Vec<_> = ctl.filtered(&filter).into_iter().cloned().collect();
    if tickets.is_empty() && !app.json {
        eprintln!("No tickets match status={} department={}", filter.status, filter.department);
        return Ok(());
    }
    let lines: Vec<String> = tickets
        .iter()
        .map(|t| format::ticket_row(t, ctl.department_name(t.department_id.as_deref())))
        .collect();
    app.emit(&tickets, lines)
}

/// Describe local files as attachments and screen them like the web form does.
fn collect_attachments(paths: &[PathBuf]) -> anyhow::Result<Vec<Attachment>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = std::fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        files.push(Attachment::new(file_name(path), mime.essence_str(), meta.len()));
    }

    let batch = screen_attachments(0, files).map_err(|e| anyhow::anyhow!("{}", e.message))?;
    for (file, reason) in &batch.rejected {
        eprintln!("Skipping {}: {}", file.name, reason);
    }
    Ok(batch.accepted)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn do_ticket(app: &App, command: TicketCommand) -> anyhow::Result<()> {
    let mut ctl = app.controller();
    if let Err(e) = ctl.load_departments().await {
        tracing::warn!(error = %e, "Department names unavailable");
    }

    match command {
        TicketCommand::New {
            department,
            subject,
            priority,
            description,
            attachments,
        } => {
            let form = NewTicket {
                department_id: department,
                subject,
                priority,
                description,
                attachments: collect_attachments(&attachments)?,
            };
            let ticket = ctl.create_ticket(form).await?;
            app.emit(&ticket, [format!("Opened ticket #{} ({})", ticket.id, ticket.subject)])
        }
        TicketCommand::Show { id } => {
            let ticket = app.api.get_ticket(&id).await?;
            let department = ctl.department_name(ticket.department_id.as_deref()).to_string();
            app.emit(&ticket, [format::ticket_detail(&ticket, &department)])
        }
        TicketCommand::Status { id, status } => {
            ctl.refresh_tickets().await?;
            let outcome = ctl.update_status(&id, status).await?;
            let line = match outcome {
                Outcome::Applied => format!("Ticket #{id} is now {}", format::status_badge(status)),
                Outcome::Unchanged => format!("Ticket #{id} is already {}", format::status_badge(status)),
            };
            app.emit(&serde_json::json!({ "id": id, "status": status, "changed": outcome == Outcome::Applied }), [line])
        }
        TicketCommand::Assign { id, agent } => {
            ctl.assign_ticket(&id, &agent).await?;
            app.emit(
                &serde_json::json!({ "id": id, "assignedAgent": agent.trim() }),
                [format!("Ticket #{id} assigned to {}", agent.trim())],
            )
        }
    }
}

async fn do_messages(app: &App, id: &str) -> anyhow::Result<()> {
    let mut ctl = app.controller();
    let messages = ctl.select_ticket(id).await?.to_vec();
    if messages.is_empty() && !app.json {
        eprintln!("No messages on ticket #{id} yet");
        return Ok(());
    }
    app.emit(&messages, messages.iter().map(format::message_line))
}

async fn do_send(app: &App, id: &str, text: &str) -> anyhow::Result<()> {
    let mut ctl = app.controller();
    ctl.refresh_tickets().await?;
    ctl.select_ticket(id).await?;
    match ctl.send_message(text).await? {
        Some(message) => app.emit(&message, [format::message_line(&message)]),
        None => bail!("message is empty"),
    }
}

async fn do_accounts(app: &App, command: Option<AccountCommand>) -> anyhow::Result<()> {
    let portfolio = app.portfolio();
    match command {
        None => {
            let accounts = portfolio.accounts().await?;
            app.emit(&accounts, accounts.iter().map(format::account_row))
        }
        Some(AccountCommand::Open {
            account_type,
            currency,
            leverage,
            initial_deposit,
        }) => {
            let account = portfolio
                .create_account(NewAccount {
                    account_type,
                    currency,
                    leverage,
                    initial_deposit,
                })
                .await?;
            app.emit(
                &account,
                [format!("Opened account {} ({})", account.account_number, account.status)],
            )
        }
    }
}

async fn do_deposit(app: &App, form: DepositForm) -> anyhow::Result<()> {
    let method = form.method;
    let tx = app.portfolio().deposit(&form).await?;
    app.emit(
        &tx,
        [
            format::transaction_row(&tx),
            format!("Expected processing time: {}", method.processing_time()),
        ],
    )
}

async fn do_transfer(app: &App, form: TransferForm) -> anyhow::Result<()> {
    let tx = app.portfolio().transfer(&form).await?;
    app.emit(&tx, [format::transaction_row(&tx)])
}

async fn do_transactions(app: &App, limit: usize) -> anyhow::Result<()> {
    let txs = app.portfolio().transactions(&TransactionQuery::recent(limit)).await?;
    app.emit(&txs, txs.iter().map(format::transaction_row))
}

async fn do_kyc(app: &App, command: KycCommand) -> anyhow::Result<()> {
    let portfolio = app.portfolio();
    match command {
        KycCommand::List => {
            let docs = portfolio.kyc_documents().await?;
            app.emit(&docs, docs.iter().map(format::kyc_row))
        }
        KycCommand::Upload {
            document_type,
            number,
            expiry,
            file,
        } => {
            let meta = std::fs::metadata(&file).with_context(|| format!("cannot read {}", file.display()))?;
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            let form = KycUploadForm {
                document_type,
                document_number: number,
                expiry_date: Some(expiry),
                file: Some(Attachment::new(file_name(&file), mime.essence_str(), meta.len())),
            };
            let doc = portfolio.upload_kyc_document(&form).await?;
            app.emit(&doc, [format!("Submitted {} for review", doc.document_type)])
        }
    }
}

async fn do_ib(app: &App, command: IbCommand) -> anyhow::Result<()> {
    let portfolio = app.portfolio();
    match command {
        IbCommand::List => {
            let requests = portfolio.ib_requests().await?;
            app.emit(&requests, requests.iter().map(format::ib_row))
        }
        IbCommand::Submit {
            company,
            contact,
            email,
            phone,
            address,
            experience,
        } => {
            let form = IbForm {
                company_name: company,
                contact_person: contact,
                email,
                phone,
                address,
                experience,
            };
            let request = portfolio.submit_ib_request(&form).await?;
            app.emit(
                &request,
                [format!("Application for {} is {}", request.company_name, request.status)],
            )
        }
    }
}

async fn do_dashboard(app: &App) -> anyhow::Result<()> {
    let overview = app.portfolio().dashboard().await?;
    let stats = &overview.stats;
    let mut lines = vec![
        format!("Total balance:   {}", format::format_amount(stats.total_balance)),
        format!("Total profit:    {}", format::format_amount(stats.total_profit)),
        format!("Trades:          {}", stats.total_trades),
        format!("Active accounts: {}", stats.active_accounts),
        format!("Monthly growth:  {:.1}%", stats.monthly_growth),
        String::new(),
        "Recent transactions:".to_string(),
    ];
    lines.extend(overview.recent_transactions.iter().map(format::transaction_row));
    lines.push(String::new());
    lines.push("Open positions:".to_string());
    lines.extend(overview.positions.iter().map(|p| {
        format!("{:<8} {:<4} {:>6} @ {}", p.symbol, p.side, p.volume, p.open_price)
    }));
    app.emit(&overview, lines)
}

async fn do_status(app: &App) -> anyhow::Result<()> {
    match app.api.health().await {
        Ok(body) => app.emit(
            &body,
            [
                format!("Backend:  {}", app.api.base_url()),
                format!("Status:   {}", body["status"].as_str().unwrap_or("unknown")),
                format!("Version:  {}", body["version"].as_str().unwrap_or("?")),
            ],
        ),
        Err(e) => bail!("cannot reach {}: {}", app.api.base_url(), e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::init(&cli)?;

    match cli.command {
        Commands::Login { email, password } => do_login(&app, email, password).await,
        Commands::Signup {
            name,
            email,
            password,
            confirm_password,
            agree_to_terms,
        } => {
            let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
            let form = SignupForm {
                name,
                email,
                password,
                confirm_password,
                agree_to_terms,
            };
            do_signup(&app, form).await
        }
        Commands::Logout => {
            app.auth().logout()?;
            app.emit(&serde_json::json!({ "signedIn": false }), ["Signed out".to_string()])
        }
        Commands::Whoami => do_whoami(&app).await,
        Commands::Profile { command } => do_profile(&app, command).await,
        Commands::Departments => do_departments(&app).await,
        Commands::Tickets { status, department } => {
            do_tickets(&app, TicketFilter::new(status, department)).await
        }
        Commands::Ticket { command } => do_ticket(&app, command).await,
        Commands::Messages { id } => do_messages(&app, &id).await,
        Commands::Send { id, text } => do_send(&app, &id, &text.join(" ")).await,
        Commands::Accounts { command } => do_accounts(&app, command).await,
        Commands::Deposit {
            account,
            method,
            amount,
            currency,
        } => {
            let form = DepositForm {
                account_id: account,
                method,
                amount,
                currency,
            };
            do_deposit(&app, form).await
        }
        Commands::Transfer {
            from,
            to,
            amount,
            currency,
        } => {
            let form = TransferForm {
                from_account: from,
                to_account: to,
                amount,
                currency,
            };
            do_transfer(&app, form).await
        }
        Commands::Transactions { limit } => do_transactions(&app, limit).await,
        Commands::Kyc { command } => do_kyc(&app, command).await,
        Commands::Ib { command } => do_ib(&app, command).await,
        Commands::Dashboard => do_dashboard(&app).await,
        Commands::Status => do_status(&app).await,
    }
}

/// One line per field error, or the error itself.
fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<DeskError>() {
        Some(DeskError::Validation(errors)) => errors
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(DeskError::Unauthenticated) => {
            "not signed in (run `tradedesk-cli login <email>`)".to_string()
        }
        _ => format!("{err:#}"),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("tradedesk-cli: {}", describe(&e));
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
