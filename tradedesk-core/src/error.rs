use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Not permitted to {action}")]
    Forbidden { action: &'static str },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Ticket {0} is closed")]
    TicketClosed(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;
