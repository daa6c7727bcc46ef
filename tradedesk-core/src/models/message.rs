use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Agent,
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderRole::User => f.write_str("user"),
            SenderRole::Agent => f.write_str("agent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

/// A single chat entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub ticket_id: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub user_id: String,
    #[serde(
        default,
        deserialize_with = "super::opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub department_id: Option<String>,
    pub sender: SenderRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(rename = "message")]
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    /// Label shown above a chat bubble.
    pub fn author_label(&self) -> &str {
        match self.sender {
            SenderRole::User => "You",
            SenderRole::Agent => self.agent_name.as_deref().unwrap_or("Support Agent"),
        }
    }
}
