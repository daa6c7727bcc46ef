use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub status: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account: Option<String>,
}

/// Funding channel with its accepted amount range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositMethod {
    Bank,
    Usdt,
    Crypto,
}

impl DepositMethod {
    pub const ALL: [DepositMethod; 3] = [DepositMethod::Bank, DepositMethod::Usdt, DepositMethod::Crypto];

    pub fn label(&self) -> &'static str {
        match self {
            DepositMethod::Bank => "Bank Transfer",
            DepositMethod::Usdt => "USDT (Tether)",
            DepositMethod::Crypto => "Cryptocurrency",
        }
    }

    pub fn min_amount(&self) -> f64 {
        match self {
            DepositMethod::Bank => 100.0,
            DepositMethod::Usdt => 50.0,
            DepositMethod::Crypto => 25.0,
        }
    }

    pub fn max_amount(&self) -> f64 {
        match self {
            DepositMethod::Bank => 50_000.0,
            DepositMethod::Usdt | DepositMethod::Crypto => 100_000.0,
        }
    }

    pub fn processing_time(&self) -> &'static str {
        match self {
            DepositMethod::Bank => "1-3 business days",
            DepositMethod::Usdt => "10-30 minutes",
            DepositMethod::Crypto => "15-60 minutes",
        }
    }
}

impl fmt::Display for DepositMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DepositMethod::Bank => "bank",
            DepositMethod::Usdt => "usdt",
            DepositMethod::Crypto => "crypto",
        })
    }
}

impl FromStr for DepositMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank" => Ok(DepositMethod::Bank),
            "usdt" => Ok(DepositMethod::Usdt),
            "crypto" => Ok(DepositMethod::Crypto),
            other => Err(format!("unknown deposit method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// json-server style list parameters for `/transactions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "_sort", default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(rename = "_order", default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    #[serde(rename = "_limit", default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            user_id: None,
            sort: Some("date".to_string()),
            order: Some(SortOrder::Desc),
            limit: Some(limit),
        }
    }

    /// Narrow the listing to one owner before sorting and limiting.
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_maps_to_other() {
        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "id": 1, "userId": 1, "type": "Bonus", "amount": 10.0,
            "currency": "USD", "status": "Completed", "date": "2024-01-10T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(tx.kind, TransactionKind::Other);
        assert_eq!(tx.user_id, "1");
    }

    #[test]
    fn test_deposit_method_ranges() {
        assert_eq!(DepositMethod::Bank.min_amount(), 100.0);
        assert_eq!(DepositMethod::Bank.max_amount(), 50_000.0);
        assert_eq!(DepositMethod::Crypto.min_amount(), 25.0);
        assert_eq!("USDT".parse::<DepositMethod>().unwrap(), DepositMethod::Usdt);
    }

    #[test]
    fn test_recent_query_serializes_json_server_params() {
        let json = serde_json::to_value(TransactionQuery::recent(5)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "_sort": "date", "_order": "desc", "_limit": 5 })
        );
        let json = serde_json::to_value(TransactionQuery::recent(5).for_user("1")).unwrap();
        assert_eq!(json["userId"], "1");
    }
}
