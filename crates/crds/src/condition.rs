//! Status conditions
//!
//! A condition is a tri-state (`True` / `False` / `Unknown`) flag with a
//! reason code and a human-readable message. Resources expose their
//! conditions through [`HasConditions`], which provides the get/set helpers
//! used by reconcilers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type set by the allocation engine once addresses for the
/// current spec have been reconciled.
pub const IN_SYNCED: &str = "InSynced";

/// Reason emitted when the upstream VM network configuration changed.
pub const NETWORK_CONFIG_CHANGED_REASON: &str = "NetworkConfigChanged";

/// Tri-state condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A single status condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. "InSynced")
    #[serde(rename = "type")]
    pub type_: String,

    /// Current status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason for the last transition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable details
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Access to a resource's condition list.
///
/// Implementors only provide the two accessors; lookups and updates are
/// shared. A condition that is absent reads as `Unknown`.
pub trait HasConditions {
    /// Conditions currently recorded on the resource
    fn conditions(&self) -> &[Condition];

    /// Mutable condition list, creating the status block if needed
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    /// Returns the condition of the given type, if recorded
    fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions().iter().find(|c| c.type_ == type_)
    }

    /// Status of the given condition type, `Unknown` when unset
    fn condition_status(&self, type_: &str) -> ConditionStatus {
        self.condition(type_).map(|c| c.status).unwrap_or_default()
    }

    fn is_condition_true(&self, type_: &str) -> bool {
        self.condition_status(type_) == ConditionStatus::True
    }

    fn is_condition_false(&self, type_: &str) -> bool {
        self.condition_status(type_) == ConditionStatus::False
    }

    /// Sets status, reason and message of a condition.
    ///
    /// The transition time only moves when the status actually changes.
    fn set_condition(&mut self, type_: &str, status: ConditionStatus, reason: &str, message: &str) {
        let now = Utc::now();
        let conditions = self.conditions_mut();
        match conditions.iter_mut().find(|c| c.type_ == type_) {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = Some(now);
                }
                existing.status = status;
                existing.reason = reason.to_string();
                existing.message = message.to_string();
                existing.last_update_time = Some(now);
            }
            None => conditions.push(Condition {
                type_: type_.to_string(),
                status,
                reason: reason.to_string(),
                message: message.to_string(),
                last_update_time: Some(now),
                last_transition_time: Some(now),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Holder {
        conditions: Vec<Condition>,
    }

    impl HasConditions for Holder {
        fn conditions(&self) -> &[Condition] {
            &self.conditions
        }

        fn conditions_mut(&mut self) -> &mut Vec<Condition> {
            &mut self.conditions
        }
    }

    #[test]
    fn test_absent_condition_is_unknown() {
        let holder = Holder::default();
        assert_eq!(holder.condition_status(IN_SYNCED), ConditionStatus::Unknown);
        assert!(!holder.is_condition_true(IN_SYNCED));
        assert!(!holder.is_condition_false(IN_SYNCED));
    }

    #[test]
    fn test_set_condition_inserts_then_updates() {
        let mut holder = Holder::default();
        holder.set_condition(IN_SYNCED, ConditionStatus::True, "", "");
        assert!(holder.is_condition_true(IN_SYNCED));

        holder.set_condition(IN_SYNCED, ConditionStatus::False, NETWORK_CONFIG_CHANGED_REASON, "changed");
        assert_eq!(holder.conditions.len(), 1);
        let condition = holder.condition(IN_SYNCED).unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, NETWORK_CONFIG_CHANGED_REASON);
        assert_eq!(condition.message, "changed");
    }

    #[test]
    fn test_transition_time_only_moves_on_status_change() {
        let mut holder = Holder::default();
        holder.set_condition(IN_SYNCED, ConditionStatus::False, "a", "");
        let first = holder.condition(IN_SYNCED).unwrap().last_transition_time;

        holder.set_condition(IN_SYNCED, ConditionStatus::False, "b", "");
        assert_eq!(holder.condition(IN_SYNCED).unwrap().last_transition_time, first);
    }

    #[test]
    fn test_status_serializes_pascal_case() {
        let json = serde_json::to_value(ConditionStatus::False).unwrap();
        assert_eq!(json, serde_json::json!("False"));
    }
}
