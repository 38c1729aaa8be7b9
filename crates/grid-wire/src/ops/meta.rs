//! Metadata triples on paths and users, plus metadata search.

use crate::connection::{Connection, Wire};
use crate::error::GridError;
use crate::messages::{
    InCollectionRequest, MetaMutationRequest, NameRequest, PathRequest, SearchByMetaRequest,
    UserMetaRequest, msg,
};
use crate::models::{Collection, DataObject, Meta};

/// List the metadata triples of a collection.
pub async fn list_collection_meta(
    conn: &mut Connection<impl Wire>,
    path: &str,
) -> Result<Vec<Meta>, GridError> {
    conn.request_typed(msg::LIST_COLLECTION_META, &PathRequest { path: path.to_owned() })
        .await
}

/// List the metadata triples of a data object, addressed through its
/// collection.
pub async fn list_data_object_meta(
    conn: &mut Connection<impl Wire>,
    collection: &Collection,
    name: &str,
) -> Result<Vec<Meta>, GridError> {
    conn.request_typed(
        msg::LIST_DATA_OBJECT_META,
        &InCollectionRequest {
            collection_path: collection.path.clone(),
            name: name.to_owned(),
        },
    )
    .await
}

/// Attach a metadata triple to a collection.
pub async fn add_collection_meta(
    conn: &mut Connection<impl Wire>,
    path: &str,
    meta: &Meta,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::ADD_COLLECTION_META,
        &MetaMutationRequest {
            path: path.to_owned(),
            meta: meta.clone(),
        },
    )
    .await
}

/// Remove a metadata triple from a collection.
pub async fn delete_collection_meta(
    conn: &mut Connection<impl Wire>,
    path: &str,
    meta: &Meta,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::DELETE_COLLECTION_META,
        &MetaMutationRequest {
            path: path.to_owned(),
            meta: meta.clone(),
        },
    )
    .await
}

/// Attach a metadata triple to a data object.
pub async fn add_data_object_meta(
    conn: &mut Connection<impl Wire>,
    path: &str,
    meta: &Meta,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::ADD_DATA_OBJECT_META,
        &MetaMutationRequest {
            path: path.to_owned(),
            meta: meta.clone(),
        },
    )
    .await
}

/// Remove a metadata triple from a data object.
pub async fn delete_data_object_meta(
    conn: &mut Connection<impl Wire>,
    path: &str,
    meta: &Meta,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::DELETE_DATA_OBJECT_META,
        &MetaMutationRequest {
            path: path.to_owned(),
            meta: meta.clone(),
        },
    )
    .await
}

/// Attach a metadata triple to a user.
pub async fn add_user_meta(
    conn: &mut Connection<impl Wire>,
    user: &str,
    meta: &Meta,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::ADD_USER_META,
        &UserMetaRequest {
            user: user.to_owned(),
            meta: meta.clone(),
        },
    )
    .await
}

/// Remove a metadata triple from a user, addressed by its catalog id.
pub async fn delete_user_meta(
    conn: &mut Connection<impl Wire>,
    user: &str,
    meta: &Meta,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::DELETE_USER_META,
        &UserMetaRequest {
            user: user.to_owned(),
            meta: meta.clone(),
        },
    )
    .await
}

/// List the metadata triples of a user.
pub async fn list_user_meta(
    conn: &mut Connection<impl Wire>,
    user: &str,
) -> Result<Vec<Meta>, GridError> {
    conn.request_typed(msg::LIST_USER_META, &NameRequest { name: user.to_owned() })
        .await
}

/// Find collections carrying a `(name, value)` metadata pair, zone-wide.
pub async fn search_collections_by_meta(
    conn: &mut Connection<impl Wire>,
    name: &str,
    value: &str,
) -> Result<Vec<Collection>, GridError> {
    conn.request_typed(
        msg::SEARCH_COLLECTIONS_BY_META,
        &SearchByMetaRequest {
            name: name.to_owned(),
            value: value.to_owned(),
        },
    )
    .await
}

/// Find data objects carrying a `(name, value)` metadata pair, master
/// replicas only.
pub async fn search_data_objects_master_replica_by_meta(
    conn: &mut Connection<impl Wire>,
    name: &str,
    value: &str,
) -> Result<Vec<DataObject>, GridError> {
    conn.request_typed(
        msg::SEARCH_DATA_OBJECTS_MASTER_REPLICA_BY_META,
        &SearchByMetaRequest {
            name: name.to_owned(),
            value: value.to_owned(),
        },
    )
    .await
}
