//! Assignment policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// How subjects are distributed to resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssignPolicy {
    /// Every subject gets the full resource list.
    #[serde(rename = "every", alias = "EVERY")]
    Every,
    /// Contiguous blocks of `floor(N/M)` subjects per resource, remainder spread one each.
    #[serde(rename = "equally", alias = "EQUALLY")]
    Equally,
    /// Subject `i` goes to resource `i % M`.
    #[default]
    #[serde(rename = "roundRobin", alias = "ROUND_ROBIN", alias = "round_robin")]
    RoundRobin,
}

impl AssignPolicy {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Every => "every",
            Self::Equally => "equally",
            Self::RoundRobin => "roundRobin",
        }
    }

    /// Returns true if each subject receives exactly one resource.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        !matches!(self, Self::Every)
    }
}

impl fmt::Display for AssignPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "every" => Ok(Self::Every),
            "equally" => Ok(Self::Equally),
            "roundrobin" => Ok(Self::RoundRobin),
            _ => Err(ValidationError::invalid_config(
                "assignType",
                format!("unknown assignment policy '{s}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&AssignPolicy::Every).unwrap(), "\"every\"");
        assert_eq!(serde_json::to_string(&AssignPolicy::Equally).unwrap(), "\"equally\"");
        assert_eq!(
            serde_json::to_string(&AssignPolicy::RoundRobin).unwrap(),
            "\"roundRobin\""
        );
    }

    #[test]
    fn test_deserialize_aliases() {
        let policy: AssignPolicy = serde_json::from_str("\"ROUND_ROBIN\"").unwrap();
        assert_eq!(policy, AssignPolicy::RoundRobin);
        let policy: AssignPolicy = serde_json::from_str("\"EQUALLY\"").unwrap();
        assert_eq!(policy, AssignPolicy::Equally);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("roundRobin".parse::<AssignPolicy>().unwrap(), AssignPolicy::RoundRobin);
        assert_eq!("ROUND_ROBIN".parse::<AssignPolicy>().unwrap(), AssignPolicy::RoundRobin);
        assert_eq!("Every".parse::<AssignPolicy>().unwrap(), AssignPolicy::Every);
        assert!("random".parse::<AssignPolicy>().is_err());
    }

    #[test]
    fn test_exclusive() {
        assert!(!AssignPolicy::Every.is_exclusive());
        assert!(AssignPolicy::Equally.is_exclusive());
        assert!(AssignPolicy::RoundRobin.is_exclusive());
    }
}
