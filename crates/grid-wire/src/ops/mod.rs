//! Typed protocol operations: one function per wire message.
//!
//! These are thin request builders around [`Connection::request_typed`];
//! all semantics live on the server side.

mod access;
mod collection;
mod meta;
mod object;
mod ticket;

pub use access::{
    get_group, list_collection_access, list_data_object_access, list_group_users, list_groups,
    list_user_group_names, list_users,
};
pub use collection::{
    create_collection, delete_collection, get_collection, list_sub_collections, move_collection,
};
pub use meta::{
    add_collection_meta, add_data_object_meta, add_user_meta, delete_collection_meta,
    delete_data_object_meta, delete_user_meta, list_collection_meta, list_data_object_meta,
    list_user_meta, search_collections_by_meta, search_data_objects_master_replica_by_meta,
};
pub use object::{
    close_data_object, copy_data_object, create_data_object, delete_data_object,
    get_data_object_master_replica, list_data_objects_master_replica, move_data_object,
    open_data_object, read_data_object, replicate_data_object, seek_data_object,
    truncate_data_object, write_data_object,
};
pub use ticket::get_ticket_for_anonymous_access;

use crate::connection::{Connection, Wire};
use crate::error::GridError;
use crate::messages::msg;

/// Commit the server-side transaction so the next user of this connection
/// sees a fresh view. Issued by the pool on every return when configured.
pub async fn commit_transaction(conn: &mut Connection<impl Wire>) -> Result<(), GridError> {
    conn.request_unit(msg::COMMIT_TRANSACTION, &()).await
}
