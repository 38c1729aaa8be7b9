//! Data-object operations, including the random-access open/read/write set
//! that the transfer engine and file handles drive.

use bytes::Bytes;

use crate::connection::{Connection, Wire};
use crate::error::GridError;
use crate::messages::{
    CloseDataObjectRequest, CopyRequest, CreateDataObjectRequest, DeleteDataObjectRequest,
    InCollectionRequest, MoveRequest, OpenDataObjectRequest, OpenReply, PathRequest,
    ReadDataObjectRequest, ReplicateDataObjectRequest, SeekDataObjectRequest, SeekReply,
    TruncateDataObjectRequest, Whence, WriteDataObjectRequest, msg,
};
use crate::models::{Collection, DataObject};

/// Fetch one data object by containing collection and name, master replica
/// only.
pub async fn get_data_object_master_replica(
    conn: &mut Connection<impl Wire>,
    collection: &Collection,
    name: &str,
) -> Result<DataObject, GridError> {
    conn.request_typed(
        msg::GET_DATA_OBJECT_MASTER_REPLICA,
        &InCollectionRequest {
            collection_path: collection.path.clone(),
            name: name.to_owned(),
        },
    )
    .await
}

/// List the data objects of a collection, master replicas only.
pub async fn list_data_objects_master_replica(
    conn: &mut Connection<impl Wire>,
    collection: &Collection,
) -> Result<Vec<DataObject>, GridError> {
    conn.request_typed(
        msg::LIST_DATA_OBJECTS_MASTER_REPLICA,
        &PathRequest {
            path: collection.path.clone(),
        },
    )
    .await
}

/// Create a data object and open it. Returns the server descriptor.
pub async fn create_data_object(
    conn: &mut Connection<impl Wire>,
    path: &str,
    resource: &str,
    mode: &str,
    force: bool,
) -> Result<i64, GridError> {
    let reply: OpenReply = conn
        .request_typed(
            msg::CREATE_DATA_OBJECT,
            &CreateDataObjectRequest {
                path: path.to_owned(),
                resource: resource.to_owned(),
                mode: mode.to_owned(),
                force,
            },
        )
        .await?;
    Ok(reply.handle)
}

/// Open an existing data object. Returns the server descriptor and the
/// initial offset (non-zero for append modes).
pub async fn open_data_object(
    conn: &mut Connection<impl Wire>,
    path: &str,
    resource: &str,
    mode: &str,
) -> Result<(i64, i64), GridError> {
    let reply: OpenReply = conn
        .request_typed(
            msg::OPEN_DATA_OBJECT,
            &OpenDataObjectRequest {
                path: path.to_owned(),
                resource: resource.to_owned(),
                mode: mode.to_owned(),
            },
        )
        .await?;
    Ok((reply.handle, reply.offset))
}

/// Read up to `length` bytes at the descriptor's current offset. The data
/// rides in the bulk-stream section; a short (or empty) result means EOF.
pub async fn read_data_object(
    conn: &mut Connection<impl Wire>,
    handle: i64,
    length: i64,
) -> Result<Bytes, GridError> {
    let body = serde_json::to_vec(&ReadDataObjectRequest { handle, length })
        .map_err(|e| GridError::InvalidArgument(format!("unencodable read request: {e}")))?;
    let envelope = conn.request(msg::READ_DATA_OBJECT, &body, &[]).await?;
    Ok(envelope.bs)
}

/// Write `data` at the descriptor's current offset.
pub async fn write_data_object(
    conn: &mut Connection<impl Wire>,
    handle: i64,
    data: &[u8],
) -> Result<(), GridError> {
    let body = serde_json::to_vec(&WriteDataObjectRequest { handle })
        .map_err(|e| GridError::InvalidArgument(format!("unencodable write request: {e}")))?;
    conn.request(msg::WRITE_DATA_OBJECT, &body, data)
        .await
        .map(drop)
}

/// Reposition the descriptor. Returns the resulting absolute offset.
pub async fn seek_data_object(
    conn: &mut Connection<impl Wire>,
    handle: i64,
    offset: i64,
    whence: Whence,
) -> Result<i64, GridError> {
    let reply: SeekReply = conn
        .request_typed(
            msg::SEEK_DATA_OBJECT,
            &SeekDataObjectRequest {
                handle,
                offset,
                whence,
            },
        )
        .await?;
    Ok(reply.offset)
}

/// Close the server descriptor.
pub async fn close_data_object(
    conn: &mut Connection<impl Wire>,
    handle: i64,
) -> Result<(), GridError> {
    conn.request_unit(msg::CLOSE_DATA_OBJECT, &CloseDataObjectRequest { handle })
        .await
}

/// Truncate an object (by path, not descriptor) to `size` bytes.
pub async fn truncate_data_object(
    conn: &mut Connection<impl Wire>,
    path: &str,
    size: i64,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::TRUNCATE_DATA_OBJECT,
        &TruncateDataObjectRequest {
            path: path.to_owned(),
            size,
        },
    )
    .await
}

/// Server-side copy; no bytes travel through the client.
pub async fn copy_data_object(
    conn: &mut Connection<impl Wire>,
    src: &str,
    dest: &str,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::COPY_DATA_OBJECT,
        &CopyRequest {
            src: src.to_owned(),
            dest: dest.to_owned(),
        },
    )
    .await
}

/// Request a replica on `resource`; `update` rolls stale replicas forward.
pub async fn replicate_data_object(
    conn: &mut Connection<impl Wire>,
    path: &str,
    resource: &str,
    update: bool,
    admin: bool,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::REPLICATE_DATA_OBJECT,
        &ReplicateDataObjectRequest {
            path: path.to_owned(),
            resource: resource.to_owned(),
            update,
            admin,
        },
    )
    .await
}

/// Rename/move a data object.
pub async fn move_data_object(
    conn: &mut Connection<impl Wire>,
    src: &str,
    dest: &str,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::MOVE_DATA_OBJECT,
        &MoveRequest {
            src: src.to_owned(),
            dest: dest.to_owned(),
        },
    )
    .await
}

/// Delete a data object; `force` skips the trash.
pub async fn delete_data_object(
    conn: &mut Connection<impl Wire>,
    path: &str,
    force: bool,
) -> Result<(), GridError> {
    conn.request_unit(
        msg::DELETE_DATA_OBJECT,
        &DeleteDataObjectRequest {
            path: path.to_owned(),
            force,
        },
    )
    .await
}
