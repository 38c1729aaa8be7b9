//! Unified directory/file descriptors returned by the facade.

use std::time::SystemTime;

use grid_wire::models::{Collection, DataObject};

/// What an [`Entry`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// The raw server record behind an [`Entry`], carried for follow-up
/// protocol calls that address objects through their collection.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryInternal {
    Collection(Collection),
    Object(DataObject),
}

/// A resolved directory or file.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Server identifier; `0` until the server has confirmed the entry
    /// (freshly created, not yet stat'ed handles).
    pub id: i64,
    pub kind: EntryKind,
    /// Last path segment.
    pub name: String,
    /// Absolute, normalized path.
    pub path: String,
    pub owner: String,
    /// Size in bytes; zero for directories.
    pub size: i64,
    pub create_time: SystemTime,
    pub modify_time: SystemTime,
    /// Content checksum, possibly empty.
    pub checksum: String,
    /// Raw server record, absent on synthesized entries.
    pub internal: Option<EntryInternal>,
}

impl Entry {
    /// Whether the server has confirmed this entry.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.id > 0
    }

    pub(crate) fn from_collection(collection: Collection) -> Self {
        Self {
            id: collection.id,
            kind: EntryKind::Directory,
            name: collection.name.clone(),
            path: collection.path.clone(),
            owner: collection.owner.clone(),
            size: 0,
            create_time: collection.create_time,
            modify_time: collection.modify_time,
            checksum: String::new(),
            internal: Some(EntryInternal::Collection(collection)),
        }
    }

    /// Build a file entry from a data object. Returns `None` when the
    /// server sent an object without any replica to describe it.
    pub(crate) fn from_data_object(object: DataObject) -> Option<Self> {
        let replica = object.master_replica()?;
        Some(Self {
            id: object.id,
            kind: EntryKind::File,
            name: object.name.clone(),
            path: object.path.clone(),
            owner: replica.owner.clone(),
            size: object.size,
            create_time: replica.create_time,
            modify_time: replica.modify_time,
            checksum: replica.checksum.clone(),
            internal: Some(EntryInternal::Object(object)),
        })
    }

    /// The collection record carried by a directory entry.
    pub(crate) fn as_collection(&self) -> Option<&Collection> {
        match &self.internal {
            Some(EntryInternal::Collection(collection)) => Some(collection),
            _ => None,
        }
    }
}
