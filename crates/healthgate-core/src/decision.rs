//! Access-request decisions and per-item sub-grants.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// The state of an access request's grant.
///
/// `Undefined` is the initial state. A patient review moves the request to
/// one of the reviewed states; a resend moves `NoAccess` or a lapsed
/// `OneTime` back to `Undefined`. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Undefined,
    Unlimited,
    NoAccess,
    OneTime,
    Custom,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Undefined => "UNDEFINED",
            Decision::Unlimited => "UNLIMITED",
            Decision::NoAccess => "NO_ACCESS",
            Decision::OneTime => "ONE_TIME",
            Decision::Custom => "CUSTOM",
        }
    }

    /// Parse a decision value arriving off the wire.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "UNDEFINED" => Ok(Decision::Undefined),
            "UNLIMITED" => Ok(Decision::Unlimited),
            "NO_ACCESS" => Ok(Decision::NoAccess),
            "ONE_TIME" => Ok(Decision::OneTime),
            "CUSTOM" => Ok(Decision::Custom),
            other => Err(CoreError::UnknownDecision(other.to_string())),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sub-grant scoping access to a single named data item.
///
/// Only meaningful when the enclosing request's decision is
/// [`Decision::Custom`]; stored as-is, item-level evaluation is not part of
/// the whole-record availability predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAccess {
    /// The named data item the sub-grant applies to.
    pub item: String,
    /// When the sub-grant was decided (Unix ms).
    pub time: i64,
    /// The per-item decision.
    pub decision: Decision,
    /// Start of the per-item window, if bounded.
    pub available_from: Option<i64>,
    /// End of the per-item window, if bounded.
    pub available_until: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parse_roundtrip() {
        for decision in [
            Decision::Undefined,
            Decision::Unlimited,
            Decision::NoAccess,
            Decision::OneTime,
            Decision::Custom,
        ] {
            assert_eq!(Decision::parse(decision.as_str()).unwrap(), decision);
        }
    }

    #[test]
    fn test_decision_parse_rejects_unknown() {
        assert!(Decision::parse("ONE_TIME ").is_err());
        assert!(Decision::parse("one_time").is_err());
        assert!(Decision::parse("").is_err());
    }

    #[test]
    fn test_decision_serde_wire_form() {
        let json = serde_json::to_string(&Decision::NoAccess).unwrap();
        assert_eq!(json, "\"NO_ACCESS\"");
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Decision::NoAccess);
    }
}
