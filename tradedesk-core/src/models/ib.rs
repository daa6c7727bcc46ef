use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status every introducing-broker application starts in.
pub const IB_UNDER_REVIEW: &str = "Under Review";

/// An application to become an introducing broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbRequest {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub user_id: String,
    pub company_name: String,
    pub contact_person: String,
    pub status: String,
    pub submission_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
}

impl IbRequest {
    pub fn is_under_review(&self) -> bool {
        self.status == IB_UNDER_REVIEW
    }
}
