//! Actor value types produced at the system boundary.
//!
//! Internal logic never branches on actor representation: every caller
//! (CLI, controllers, seeds) resolves its user into an `ActorRef` before
//! touching the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a request an actor stands on during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Requester,
    Reviewer,
}

impl Relationship {
    pub fn other(self) -> Self {
        match self {
            Self::Requester => Self::Reviewer,
            Self::Reviewer => Self::Requester,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Reviewer => "reviewer",
        }
    }
}

/// Normalized in-flight actor identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
}

impl ActorRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            role: String::new(),
            authority: String::new(),
        }
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            user_id: self.id.clone(),
            name: self.display_name.clone(),
            role: self.role.clone(),
            authority: self.authority.clone(),
        }
    }
}

/// Identity snapshot frozen into history entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
}

/// Immutable requester snapshot captured at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
}

/// One eligible coordinator, frozen at creation for audit stability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization_type: String,
}

/// The currently assigned reviewer.
///
/// Replaced wholesale on override — never field-merged, so no stale
/// role/authority from a prior reviewer can survive a reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerAssignment {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub auto_assigned: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignment_rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridden_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridden_by: Option<String>,
}

/// The party expected to act next during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveResponder {
    pub user_id: String,
    pub relationship: Relationship,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_other_flips_party() {
        assert_eq!(Relationship::Requester.other(), Relationship::Reviewer);
        assert_eq!(Relationship::Reviewer.other(), Relationship::Requester);
    }

    #[test]
    fn actor_ref_snapshot_carries_all_fields() {
        let actor = ActorRef {
            id: "user-7".to_string(),
            display_name: "Dana".to_string(),
            role: "coordinator".to_string(),
            authority: "district".to_string(),
        };
        let snapshot = actor.snapshot();
        assert_eq!(snapshot.user_id, "user-7");
        assert_eq!(snapshot.name, "Dana");
        assert_eq!(snapshot.role, "coordinator");
        assert_eq!(snapshot.authority, "district");
    }
}
