//! Users, groups and access grants.

use serde::{Deserialize, Serialize};

/// Catalog user classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    /// Ordinary user.
    RodsUser,
    /// Zone administrator.
    RodsAdmin,
    /// A group of users.
    RodsGroup,
    /// Group administrator.
    GroupAdmin,
}

/// A user or group as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Zone the user belongs to.
    pub zone: String,
    pub user_type: UserType,
}

/// Permission level of an access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessLevel {
    Null,
    Read,
    Write,
    Own,
}

/// One access grant on a collection or data object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    /// Path the grant applies to.
    pub path: String,
    pub user_name: String,
    pub user_zone: String,
    pub user_type: UserType,
    pub access_level: AccessLevel,
}
