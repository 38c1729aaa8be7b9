//! Bearer tickets for (possibly anonymous) path access.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Access type a ticket grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketType {
    Read,
    Write,
}

/// The subset of ticket information exposed to anonymous access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousTicket {
    pub id: i64,
    /// The ticket string itself.
    pub name: String,
    pub ticket_type: TicketType,
    /// Path the ticket grants access to.
    pub path: String,
    /// When the ticket stops working.
    pub expire_time: SystemTime,
}
