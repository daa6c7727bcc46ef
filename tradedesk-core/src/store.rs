//! In-memory ticket collection and its filtered views.

use chrono::{DateTime, Utc};

use crate::filter::{filter_tickets, TicketFilter};
use crate::models::{Ticket, TicketStatus};

#[derive(Debug, Clone, Default)]
pub struct TicketStore {
    tickets: Vec<Ticket>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection with a fresh fetch, keeping backend order.
    pub fn replace_all(&mut self, tickets: Vec<Ticket>) {
        self.tickets = tickets;
    }

    pub fn all(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TicketStatus> {
        self.get(id).map(|t| t.status)
    }

    /// Insert or replace a single ticket in place.
    pub fn upsert(&mut self, ticket: Ticket) {
        match self.tickets.iter_mut().find(|t| t.id == ticket.id) {
            Some(slot) => *slot = ticket,
            None => self.tickets.push(ticket),
        }
    }

    /// Advance a ticket's last activity locally. Returns false for unknown ids.
    pub fn touch(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        match self.tickets.iter_mut().find(|t| t.id == id) {
            Some(t) => {
                t.touch(at);
                true
            }
            None => false,
        }
    }

    pub fn filtered(&self, filter: &TicketFilter) -> Vec<&Ticket> {
        filter_tickets(&self.tickets, filter)
    }

    pub fn count_by_status(&self, status: TicketStatus) -> usize {
        self.tickets.iter().filter(|t| t.status == status).count()
    }
}
