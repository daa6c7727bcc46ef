use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A trading account owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub user_id: String,
    pub account_number: String,
    pub account_type: String,
    #[serde(default)]
    pub balance: f64,
    pub currency: String,
    pub leverage: String,
    pub status: String,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub account_type: String,
    pub currency: String,
    pub leverage: String,
    #[serde(default)]
    pub initial_deposit: Option<f64>,
}

impl NewAccount {
    pub fn into_account(self, user_id: &str) -> Account {
        // Eight digits derived from the clock, like the platform's demo numbering.
        let account_number = format!("{:08}", Utc::now().timestamp_millis().rem_euclid(100_000_000));
        Account {
            id: super::new_id(),
            user_id: user_id.to_string(),
            account_number,
            account_type: self.account_type,
            balance: self.initial_deposit.unwrap_or(0.0),
            currency: self.currency,
            leverage: self.leverage,
            status: "Pending".to_string(),
        }
    }
}
