use serde::{Deserialize, Serialize};

use super::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_balance: f64,
    pub total_profit: f64,
    pub total_trades: u64,
    pub active_accounts: u32,
    pub monthly_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    pub sr_no: u32,
    pub order_id: String,
    pub account: String,
    #[serde(rename = "type")]
    pub side: String,
    pub open_price: f64,
    pub symbol: String,
    pub volume: f64,
}

/// Everything the dashboard landing view needs, fetched in one go.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub stats: DashboardStats,
    pub recent_transactions: Vec<Transaction>,
    pub positions: Vec<Position>,
}
