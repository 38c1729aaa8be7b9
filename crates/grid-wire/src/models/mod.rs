//! Typed records returned by the server.

mod meta;
mod object;
mod principal;
mod ticket;

pub use meta::Meta;
pub use object::{Collection, DataObject, Replica, ReplicaStatus};
pub use principal::{Access, AccessLevel, User, UserType};
pub use ticket::{AnonymousTicket, TicketType};
