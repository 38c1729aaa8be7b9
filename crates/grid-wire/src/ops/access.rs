//! ACL, user and group queries.

use crate::connection::{Connection, Wire};
use crate::error::GridError;
use crate::messages::{InCollectionRequest, NameRequest, PathRequest, msg};
use crate::models::{Access, Collection, User};

/// List access grants on a collection.
pub async fn list_collection_access(
    conn: &mut Connection<impl Wire>,
    path: &str,
) -> Result<Vec<Access>, GridError> {
    conn.request_typed(msg::LIST_COLLECTION_ACCESS, &PathRequest { path: path.to_owned() })
        .await
}

/// List access grants on a data object, addressed through its collection.
pub async fn list_data_object_access(
    conn: &mut Connection<impl Wire>,
    collection: &Collection,
    name: &str,
) -> Result<Vec<Access>, GridError> {
    conn.request_typed(
        msg::LIST_DATA_OBJECT_ACCESS,
        &InCollectionRequest {
            collection_path: collection.path.clone(),
            name: name.to_owned(),
        },
    )
    .await
}

/// List every group in the zone.
pub async fn list_groups(conn: &mut Connection<impl Wire>) -> Result<Vec<User>, GridError> {
    conn.request_typed(msg::LIST_GROUPS, &()).await
}

/// List the members of one group.
pub async fn list_group_users(
    conn: &mut Connection<impl Wire>,
    group: &str,
) -> Result<Vec<User>, GridError> {
    conn.request_typed(msg::LIST_GROUP_USERS, &NameRequest { name: group.to_owned() })
        .await
}

/// List the names of the groups a user belongs to.
pub async fn list_user_group_names(
    conn: &mut Connection<impl Wire>,
    user: &str,
) -> Result<Vec<String>, GridError> {
    conn.request_typed(msg::LIST_USER_GROUP_NAMES, &NameRequest { name: user.to_owned() })
        .await
}

/// List every user in the zone.
pub async fn list_users(conn: &mut Connection<impl Wire>) -> Result<Vec<User>, GridError> {
    conn.request_typed(msg::LIST_USERS, &()).await
}

/// Fetch one group record by name.
pub async fn get_group(
    conn: &mut Connection<impl Wire>,
    group: &str,
) -> Result<User, GridError> {
    conn.request_typed(msg::GET_GROUP, &NameRequest { name: group.to_owned() })
        .await
}
