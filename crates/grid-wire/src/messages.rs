//! Wire payload types for every message the SDK sends or receives.
//!
//! These structs cross the codec seam as serialized bodies. They are public
//! so that a test harness can implement the server side of the protocol.

use serde::{Deserialize, Serialize};

use crate::models::Meta;

/// Wire names of every message type.
pub mod msg {
    pub const STARTUP: &str = "Startup";
    pub const AUTHENTICATE: &str = "Authenticate";
    pub const DISCONNECT: &str = "Disconnect";
    pub const COMMIT_TRANSACTION: &str = "CommitTransaction";

    pub const GET_COLLECTION: &str = "GetCollection";
    pub const LIST_SUB_COLLECTIONS: &str = "ListSubCollections";
    pub const CREATE_COLLECTION: &str = "CreateCollection";
    pub const DELETE_COLLECTION: &str = "DeleteCollection";
    pub const MOVE_COLLECTION: &str = "MoveCollection";

    pub const GET_DATA_OBJECT_MASTER_REPLICA: &str = "GetDataObjectMasterReplica";
    pub const LIST_DATA_OBJECTS_MASTER_REPLICA: &str = "ListDataObjectsMasterReplica";
    pub const CREATE_DATA_OBJECT: &str = "CreateDataObject";
    pub const OPEN_DATA_OBJECT: &str = "OpenDataObject";
    pub const READ_DATA_OBJECT: &str = "ReadDataObject";
    pub const WRITE_DATA_OBJECT: &str = "WriteDataObject";
    pub const SEEK_DATA_OBJECT: &str = "SeekDataObject";
    pub const CLOSE_DATA_OBJECT: &str = "CloseDataObject";
    pub const TRUNCATE_DATA_OBJECT: &str = "TruncateDataObject";
    pub const COPY_DATA_OBJECT: &str = "CopyDataObject";
    pub const REPLICATE_DATA_OBJECT: &str = "ReplicateDataObject";
    pub const MOVE_DATA_OBJECT: &str = "MoveDataObject";
    pub const DELETE_DATA_OBJECT: &str = "DeleteDataObject";

    pub const LIST_COLLECTION_ACCESS: &str = "ListCollectionAccess";
    pub const LIST_DATA_OBJECT_ACCESS: &str = "ListDataObjectAccess";
    pub const LIST_COLLECTION_META: &str = "ListCollectionMeta";
    pub const LIST_DATA_OBJECT_META: &str = "ListDataObjectMeta";
    pub const ADD_COLLECTION_META: &str = "AddCollectionMeta";
    pub const DELETE_COLLECTION_META: &str = "DeleteCollectionMeta";
    pub const ADD_DATA_OBJECT_META: &str = "AddDataObjectMeta";
    pub const DELETE_DATA_OBJECT_META: &str = "DeleteDataObjectMeta";

    pub const LIST_GROUPS: &str = "ListGroups";
    pub const LIST_GROUP_USERS: &str = "ListGroupUsers";
    pub const LIST_USER_GROUP_NAMES: &str = "ListUserGroupNames";
    pub const LIST_USERS: &str = "ListUsers";
    pub const GET_GROUP: &str = "GetGroup";
    pub const ADD_USER_META: &str = "AddUserMeta";
    pub const DELETE_USER_META: &str = "DeleteUserMeta";
    pub const LIST_USER_META: &str = "ListUserMeta";

    pub const SEARCH_COLLECTIONS_BY_META: &str = "SearchCollectionsByMeta";
    pub const SEARCH_DATA_OBJECTS_MASTER_REPLICA_BY_META: &str =
        "SearchDataObjectsMasterReplicaByMeta";

    pub const GET_TICKET_FOR_ANONYMOUS_ACCESS: &str = "GetTicketForAnonymousAccess";
}

/// First message on a fresh connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupRequest {
    /// Application name reported to the server.
    pub application: String,
    pub proxy_user: String,
    pub client_user: String,
    pub zone: String,
    /// Client transport-negotiation policy; absent when negotiation is off.
    pub negotiation_policy: Option<String>,
}

/// Server reply to [`StartupRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupResponse {
    /// Transport the server settled on: `"plain"` or `"tls"`.
    pub negotiation_result: String,
}

/// Second message on a fresh connection; carries the ceremony secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Wire name of the auth scheme.
    pub scheme: String,
    pub secret: String,
}

/// Request addressing a single absolute path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

/// Request addressing an entry inside a known collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InCollectionRequest {
    pub collection_path: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    pub path: String,
    pub recurse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCollectionRequest {
    pub path: String,
    pub recurse: bool,
    /// Skip the trash and remove permanently.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDataObjectRequest {
    pub path: String,
    /// Skip the trash and remove permanently.
    pub force: bool,
}

/// Rename/move of either a collection or a data object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub src: String,
    pub dest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRequest {
    pub src: String,
    pub dest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDataObjectRequest {
    pub path: String,
    pub resource: String,
    pub mode: String,
    /// Overwrite an existing object instead of failing.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDataObjectRequest {
    pub path: String,
    pub resource: String,
    pub mode: String,
}

/// Reply to open/create: the server-side descriptor plus the initial offset
/// (non-zero when opening for append).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpenReply {
    pub handle: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadDataObjectRequest {
    pub handle: i64,
    pub length: i64,
}

/// Write request; the payload rides in the bulk-stream section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WriteDataObjectRequest {
    pub handle: i64,
}

/// Origin of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Whence {
    Start,
    Current,
    End,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeekDataObjectRequest {
    pub handle: i64,
    pub offset: i64,
    pub whence: Whence,
}

/// Reply to a seek: the resulting absolute offset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeekReply {
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CloseDataObjectRequest {
    pub handle: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncateDataObjectRequest {
    pub path: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateDataObjectRequest {
    pub path: String,
    /// Resource to place the new replica on.
    pub resource: String,
    /// Roll stale replicas forward instead of creating a new one.
    pub update: bool,
    /// Run with admin privilege.
    pub admin: bool,
}

/// Add/delete of one metadata triple on a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaMutationRequest {
    pub path: String,
    pub meta: Meta,
}

/// Request addressing a user or group by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// Add/delete/list of metadata on a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetaRequest {
    pub user: String,
    pub meta: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchByMetaRequest {
    pub name: String,
    pub value: String,
}
