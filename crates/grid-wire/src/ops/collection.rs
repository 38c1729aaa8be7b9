//! Collection operations.

use crate::connection::{Connection, Wire};
use crate::error::GridError;
use crate::messages::{CreateCollectionRequest, DeleteCollectionRequest, MoveRequest, PathRequest, msg};
use crate::models::Collection;

/// Fetch one collection record by absolute path.
pub async fn get_collection(
    conn: &mut Connection<impl Wire>,
    path: &str,
) -> Result<Collection, GridError> {
    conn.request_typed(msg::GET_COLLECTION, &PathRequest { path: path.to_owned() })
        .await
}

/// List the immediate sub-collections of a collection.
pub async fn list_sub_collections(
    conn: &mut Connection<impl Wire>,
    path: &str,
) -> Result<Vec<Collection>, GridError> {
    conn.request_typed(msg::LIST_SUB_COLLECTIONS, &PathRequest { path: path.to_owned() })
        .await
}

/// Create a collection; `recurse` also creates missing intermediates.
pub async fn create_collection(
    conn: &mut Connection<impl Wire>,
    path: &str,
    recurse: bool,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::CREATE_COLLECTION,
        &CreateCollectionRequest {
            path: path.to_owned(),
            recurse,
        },
    )
    .await
}

/// Delete a collection. Non-recursive deletes of non-empty collections fail
/// server-side; `force` skips the trash.
pub async fn delete_collection(
    conn: &mut Connection<impl Wire>,
    path: &str,
    recurse: bool,
    force: bool,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::DELETE_COLLECTION,
        &DeleteCollectionRequest {
            path: path.to_owned(),
            recurse,
            force,
        },
    )
    .await
}

/// Rename/move a collection, subtree included.
pub async fn move_collection(
    conn: &mut Connection<impl Wire>,
    src: &str,
    dest: &str,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::MOVE_COLLECTION,
        &MoveRequest {
            src: src.to_owned(),
            dest: dest.to_owned(),
        },
    )
    .await
}
