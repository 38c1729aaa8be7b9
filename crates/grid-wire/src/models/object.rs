//! Collections, data objects and their replicas.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A server-side container, analogous to a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Catalog identifier; positive once the server has confirmed the
    /// collection exists.
    pub id: i64,
    /// Absolute path of the collection.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Owning user.
    pub owner: String,
    pub create_time: SystemTime,
    pub modify_time: SystemTime,
}

/// Health of a single replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaStatus {
    /// Up to date with the catalog.
    Good,
    /// Bytes exist but the catalog marks them stale.
    Stale,
}

/// One physical copy of a data object on a storage resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    /// Replica ordinal within its data object; `0` is the master replica.
    pub number: i32,
    /// Owning user of this replica.
    pub owner: String,
    /// Storage resource the replica lives on.
    pub resource: String,
    /// Content checksum, possibly empty.
    pub checksum: String,
    pub status: ReplicaStatus,
    pub create_time: SystemTime,
    pub modify_time: SystemTime,
}

/// A server-side file. Carries its replicas; callers that asked for the
/// master replica only get a single-element `replicas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    /// Catalog identifier; positive once confirmed by the server.
    pub id: i64,
    /// Catalog identifier of the containing collection.
    pub collection_id: i64,
    /// Absolute path of the object.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    pub replicas: Vec<Replica>,
}

impl DataObject {
    /// The canonical replica, if the server returned one.
    #[must_use]
    pub fn master_replica(&self) -> Option<&Replica> {
        self.replicas.first()
    }
}
