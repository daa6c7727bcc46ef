//! Read-side ticket filtering over already-loaded collections.

use std::fmt;
use std::str::FromStr;

use crate::models::{Ticket, TicketStatus};

/// A per-field equality filter. `All` is spelled `all` on the command line
/// and in query strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr> FromStr for Filter<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Filter::All)
        } else {
            s.parse().map(Filter::Only)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("all"),
            Filter::Only(v) => v.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Filter<TicketStatus>,
    pub department: Filter<String>,
}

impl TicketFilter {
    pub fn new(status: Filter<TicketStatus>, department: Filter<String>) -> Self {
        Self { status, department }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        let department_match = match &self.department {
            Filter::All => true,
            Filter::Only(d) => ticket.department_id.as_deref() == Some(d.as_str()),
        };
        self.status.matches(&ticket.status) && department_match
    }
}

/// Tickets matching both filters, in source order.
pub fn filter_tickets<'a>(tickets: &'a [Ticket], filter: &TicketFilter) -> Vec<&'a Ticket> {
    tickets.iter().filter(|t| filter.matches(t)).collect()
}
