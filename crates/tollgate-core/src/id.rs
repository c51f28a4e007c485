//! Opaque identifiers for constraints and consumers.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Names one capacity-limited resource pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(String);

/// Names one requester of permits within a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Wrap a raw identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(ConstraintId);
string_id!(ConsumerId);

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ids_compare_by_value() {
        assert_eq!(ConstraintId::new("cluster-x"), ConstraintId::from("cluster-x"));
        assert_ne!(ConsumerId::new("c1"), ConsumerId::new("c2"));

        let mut seen = HashSet::new();
        seen.insert(ConsumerId::from("c1".to_string()));
        assert!(seen.contains(&ConsumerId::new("c1")));
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ConsumerId::new("step-7")).unwrap();
        assert_eq!(json, "\"step-7\"");
        let back: ConsumerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "step-7");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ConstraintId::new("deploys/prod").to_string(), "deploys/prod");
    }
}
