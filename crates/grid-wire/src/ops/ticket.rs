//! Ticket queries.

use crate::connection::{Connection, Wire};
use crate::error::GridError;
use crate::messages::{NameRequest, msg};
use crate::models::AnonymousTicket;

/// Resolve a ticket string into the information exposed to anonymous access.
pub async fn get_ticket_for_anonymous_access(
    conn: &mut Connection<impl Wire>,
    ticket: &str,
) -> Result<AnonymousTicket, GridError> {
    conn.request_typed(
        msg::GET_TICKET_FOR_ANONYMOUS_ACCESS,
        &NameRequest {
            name: ticket.to_owned(),
        },
    )
    .await
}
