//! Plain-text rendering for terminal output. Pure functions only.

use chrono::{DateTime, Utc};
use tradedesk_core::models::{
    Account, Department, IbRequest, KycDocument, Message, Ticket, TicketPriority, TicketStatus,
    Transaction,
};

const FILE_SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size with up to two decimals: `0 Bytes`, `1.5 KB`, `10 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < FILE_SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, FILE_SIZE_UNITS[unit])
}

/// `1234567.5` → `1,234,567.50`
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

pub fn status_badge(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Open => "OPEN",
        TicketStatus::InProgress => "IN PROGRESS",
        TicketStatus::Closed => "CLOSED",
    }
}

fn priority_marker(priority: TicketPriority) -> &'static str {
    match priority {
        TicketPriority::High => "!!!",
        TicketPriority::Medium => "!! ",
        TicketPriority::Low => "!  ",
    }
}

/// Cut to `max` characters, ending in `…` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn ticket_row(ticket: &Ticket, department: &str) -> String {
    let mut row = format!(
        "#{:<8} {:<11} {} {:<40} {:<20} {}",
        truncate(&ticket.id, 8),
        status_badge(ticket.status),
        priority_marker(ticket.priority),
        truncate(&ticket.subject, 40),
        truncate(department, 20),
        format_timestamp(&ticket.last_activity),
    );
    if let Some(agent) = &ticket.assigned_agent {
        row.push_str(&format!("  @{agent}"));
    }
    row
}

pub fn ticket_detail(ticket: &Ticket, department: &str) -> String {
    let mut out = format!(
        "Ticket #{}\nSubject:    {}\nStatus:     {}\nPriority:   {}\nDepartment: {}\nCreated:    {}\nActivity:   {}\n",
        ticket.id,
        ticket.subject,
        status_badge(ticket.status),
        ticket.priority,
        department,
        format_timestamp(&ticket.created_at),
        format_timestamp(&ticket.last_activity),
    );
    out.push_str(&format!(
        "Agent:      {}\n",
        ticket.assigned_agent.as_deref().unwrap_or("unassigned")
    ));
    if let Some(description) = &ticket.description {
        out.push_str(&format!("\n{description}\n"));
    }
    if !ticket.attachments.is_empty() {
        out.push_str("\nAttachments:\n");
        for a in &ticket.attachments {
            out.push_str(&format!("  {} ({}, {})\n", a.name, a.mime_type, format_file_size(a.size)));
        }
    }
    out
}

pub fn message_line(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        format_timestamp(&message.timestamp),
        message.author_label(),
        message.body
    )
}

pub fn department_row(department: &Department) -> String {
    let availability = if department.is_online() { "online" } else { "offline" };
    format!(
        "{:<4} {:<24} {:<8} {}",
        department.id, department.name, availability, department.response_time
    )
}

pub fn account_row(account: &Account) -> String {
    format!(
        "{:<10} {:<10} {:>14} {:<4} {:<6} {}",
        account.account_number,
        account.account_type,
        format_amount(account.balance),
        account.currency,
        account.leverage,
        account.status
    )
}

pub fn transaction_row(tx: &Transaction) -> String {
    format!(
        "{} {:<10} {:>12} {:<4} {}",
        format_timestamp(&tx.date),
        format!("{:?}", tx.kind),
        format_amount(tx.amount),
        tx.currency,
        tx.status
    )
}

pub fn kyc_row(doc: &KycDocument) -> String {
    let expiry = doc
        .expiry_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<18} {:<14} expires {:<10} {:?}",
        doc.document_type.to_string(),
        doc.document_number.as_deref().unwrap_or("-"),
        expiry,
        doc.status
    )
}

pub fn ib_row(request: &IbRequest) -> String {
    format!(
        "{:<24} {:<18} {:<12} submitted {}",
        truncate(&request.company_name, 24),
        truncate(&request.contact_person, 18),
        request.status,
        request.submission_date.format("%Y-%m-%d")
    )
}

// ============================================================================
// Tests
// ============================================================================
