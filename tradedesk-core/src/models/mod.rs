mod account;
mod dashboard;
mod department;
mod ib;
mod kyc;
mod message;
mod ticket;
mod transaction;
mod user;

pub use account::{Account, NewAccount};
pub use dashboard::{DashboardOverview, DashboardStats, Position};
pub use department::{Department, DepartmentStatus};
pub use ib::{IbRequest, IB_UNDER_REVIEW};
pub use kyc::{KycDocument, KycDocumentType, KycStatus};
pub use message::{DeliveryStatus, Message, SenderRole};
pub use ticket::{Attachment, Ticket, TicketPatch, TicketPriority, TicketStatus};
pub use transaction::{DepositMethod, SortOrder, Transaction, TransactionKind, TransactionQuery};
pub use user::{ProfilePatch, User, UserRole};

use serde::{Deserialize, Deserializer};

/// Generates a time-ordered identifier for client-created records.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// json-server fixtures mix `"userId": 1` and `"userId": "1"`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// [`string_or_number`] for optional references such as `departmentId`.
pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Id(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| id.0))
}
