//! Attribute-value-unit metadata triples.

use serde::{Deserialize, Serialize};

/// One metadata triple attached to a path or a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Catalog identifier of the triple; `0` for triples the client is about
    /// to create.
    pub avu_id: i64,
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
    /// Attribute units, often empty.
    pub units: String,
}

impl Meta {
    /// A new triple without a catalog identifier yet.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            avu_id: 0,
            name: name.into(),
            value: value.into(),
            units: units.into(),
        }
    }
}
