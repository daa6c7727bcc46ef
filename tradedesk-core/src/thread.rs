//! Ordered message history for the selected ticket.

use chrono::{DateTime, Utc};

use crate::api::DeskApi;
use crate::error::DeskResult;
use crate::models::Message;

/// Stable ascending sort on timestamp; equal timestamps keep their input order.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.timestamp);
}

/// Fetch the full history of a ticket, oldest first. No paging.
pub async fn list_messages(api: &dyn DeskApi, ticket_id: &str) -> DeskResult<Vec<Message>> {
    let mut messages = api.list_messages(ticket_id).await?;
    sort_messages(&mut messages);
    Ok(messages)
}

#[derive(Debug, Clone, Default)]
pub struct MessageThread {
    ticket_id: Option<String>,
    messages: Vec<Message>,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket_id(&self) -> Option<&str> {
        self.ticket_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Point the thread at a ticket. Switching tickets drops the old history.
    pub fn select(&mut self, ticket_id: &str) {
        if self.ticket_id.as_deref() != Some(ticket_id) {
            self.ticket_id = Some(ticket_id.to_string());
            self.messages.clear();
        }
    }

    pub fn deselect(&mut self) {
        self.ticket_id = None;
        self.messages.clear();
    }

    /// Replace the history with a sorted copy of `messages`.
    pub fn replace(&mut self, mut messages: Vec<Message>) {
        sort_messages(&mut messages);
        self.messages = messages;
    }

    /// Insert a message after every message with an equal or earlier timestamp.
    pub fn append(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }
        let at = self.messages.partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(at, message);
    }

    /// Refetch the selected ticket's history. On failure the current history is kept.
    pub async fn reload(&mut self, api: &dyn DeskApi) -> DeskResult<&[Message]> {
        let Some(ticket_id) = self.ticket_id.clone() else {
            return Ok(&self.messages);
        };
        match list_messages(api, &ticket_id).await {
            Ok(messages) => {
                tracing::debug!(ticket_id = %ticket_id, count = messages.len(), "Loaded messages");
                self.messages = messages;
                Ok(&self.messages)
            }
            Err(e) => {
                tracing::error!(ticket_id = %ticket_id, error = %e, "Error fetching messages");
                Err(e)
            }
        }
    }
}
