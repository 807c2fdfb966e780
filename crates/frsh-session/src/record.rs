//! The session record.

use frsh_store::validate_segment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::layout::{TTL_FIELD, USER_FIELD};

/// Caller-defined fields stored beside the base attributes.
pub type Attributes = Map<String, Value>;

/// A session as stored at `sessions/{id}`.
///
/// The body is `{"userId": .., "TTL": .., ...attributes}`. The id is the
/// record's key in the tree and is not part of the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(skip)]
    pub id: String,

    #[serde(rename = "userId")]
    pub user_id: String,

    /// Expiry timestamp in milliseconds since the epoch.
    #[serde(rename = "TTL")]
    pub ttl: i64,

    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Session {
    /// Build an unsaved session.
    ///
    /// Attributes named like base fields are dropped, as are values the tree
    /// cannot hold (`null`, and objects left empty once their nulls are gone).
    pub fn new(user_id: impl Into<String>, ttl: i64, attributes: Attributes) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.into(),
            ttl,
            attributes: prune_vacant(strip_reserved(attributes)),
        }
    }

    /// Decode a stored body read from `path`.
    pub fn from_value(id: impl Into<String>, value: Value, path: &str) -> Result<Self> {
        let mut session: Session =
            serde_json::from_value(value).map_err(|source| Error::Malformed {
                path: path.to_string(),
                source,
            })?;
        session.id = id.into();
        Ok(session)
    }

    /// Encode the body for storage.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|source| Error::Malformed {
            path: self.id.clone(),
            source,
        })
    }

    /// True once `now` is past the TTL.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.ttl
    }

    /// Milliseconds left before expiry, zero if already expired.
    pub fn remaining_at(&self, now: i64) -> i64 {
        (self.ttl - now).max(0)
    }
}

/// Remove keys that would shadow `userId` or `TTL`.
pub(crate) fn strip_reserved(mut attributes: Attributes) -> Attributes {
    attributes.remove(USER_FIELD);
    attributes.remove(TTL_FIELD);
    attributes
}

pub(crate) fn prune_vacant(attributes: Attributes) -> Attributes {
    attributes
        .into_iter()
        .filter_map(|(key, value)| prune(value).map(|value| (key, value)))
        .collect()
}

fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map = prune_vacant(map);
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

/// Every object key in the attribute tree becomes a node key, so it must be
/// a valid path segment.
pub(crate) fn check_attribute_keys(attributes: &Attributes) -> Result<()> {
    for (key, value) in attributes {
        validate_segment(key).map_err(|reason| {
            Error::InvalidArgument(format!("attribute key '{}': {}", key.escape_debug(), reason))
        })?;
        if let Value::Object(nested) = value {
            check_attribute_keys(nested)?;
        }
    }
    Ok(())
}
