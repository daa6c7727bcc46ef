pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod models;
pub mod portfolio;
pub mod session;
pub mod store;
pub mod thread;
pub mod validation;

pub use api::{DeskApi, HttpDeskClient};
pub use auth::AuthService;
pub use config::DeskConfig;
pub use error::{DeskError, DeskResult};
pub use filter::{Filter, TicketFilter};
pub use lifecycle::{Outcome, TicketController};
pub use portfolio::PortfolioService;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionContext, SessionStore};
pub use store::TicketStore;
pub use thread::MessageThread;
