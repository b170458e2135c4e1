//! Strongly-typed identifiers.
//!
//! Entity ids that are runtime-generated and globally unique (executions,
//! workflows) are UUID-backed, `Copy`, 16 bytes. Node ids are user-authored
//! strings, unique only within the definition that declares them — a
//! `NodeId` is never confused with an `ExecutionId` at compile time even
//! though both ultimately wrap a string-ish value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier type with the same surface as
/// `domain_key::define_uuid!`, minus the dependency on `domain-key`
/// (whose feature set pulls `sqlx-postgres`/`sqlx-sqlite` for a persistence
/// concern this crate treats as an opaque port).
macro_rules! define_uuid_id {
    ($name:ident) => {
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn v4() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            #[must_use]
            pub fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub fn get(self) -> Uuid {
                self.0
            }

            #[must_use]
            pub fn is_nil(self) -> bool {
                self.0.is_nil()
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            #[must_use]
            pub fn domain(&self) -> &'static str {
                stringify!($name)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = uuid::Error;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = uuid::Error;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::v4()
            }
        }
    };
}

define_uuid_id!(ExecutionId);
define_uuid_id!(WorkflowId);

/// A user-authored identifier, unique within the workflow definition that
/// declares it. Unlike `ExecutionId`/`WorkflowId` this is never generated
/// by the engine — it comes verbatim from the definition's JSON.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A connector type identifier, e.g. `"http-request"` or a registered
/// connector's own type string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorType(String);

impl ConnectorType {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self(type_name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectorType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for ConnectorType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_id_v4_is_not_nil() {
        assert!(!ExecutionId::v4().is_nil());
    }

    #[test]
    fn execution_id_nil_round_trips_to_zero_string() {
        let id = ExecutionId::nil();
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn distinct_id_types_do_not_compare() {
        fn accepts_execution(_id: ExecutionId) {}
        accepts_execution(ExecutionId::v4());
        // WorkflowId::v4() passed to accepts_execution would not compile.
    }

    #[test]
    fn node_id_serializes_as_plain_string() {
        let id = NodeId::new("fetch-user");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"fetch-user\"");
    }

    #[test]
    fn execution_id_serde_round_trip() {
        let id = ExecutionId::v4();
        let json = serde_json::to_string(&id).unwrap();
        let back: ExecutionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn node_id_parse_error_on_garbage_uuid() {
        assert!(ExecutionId::parse("not-a-uuid").is_err());
    }
}
