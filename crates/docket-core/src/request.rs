//! Request type: the aggregate root and unit of concurrency control.
//!
//! One JSON document per request; histories are embedded, append-only,
//! and never rewritten. The stored `status` field is read leniently
//! (legacy spellings normalize on deserialization) and always written
//! back canonical.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::actor::{
    ActiveResponder, ActorSnapshot, CoordinatorSnapshot, PartySnapshot, ReviewerAssignment,
};
use crate::state::{RequestAction, RequestStatus, normalize_status};

/// The event being requested. `location_id` feeds both the coverage
/// resolver and the permission check's location context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub event_date: String,
    pub start_time: String,
    pub end_time: String,
    pub location_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Time-bounded exclusive hold a coordinator takes on a request.
///
/// Advisory: expiry never interrupts the holder, it only stops blocking
/// future claimants. An expired lease is semantically absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLease {
    pub holder_id: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ClaimLease {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// One append-only status log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(deserialize_with = "lenient_status")]
    pub status: RequestStatus,
    pub actor: ActorSnapshot,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Decision vocabulary recorded in the decision log.
///
/// `confirm` records as `accept` and `decline` as `reject`: the synonym
/// pairs collapse at the recording boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Accept,
    Reject,
    Reschedule,
}

impl DecisionKind {
    pub fn from_action(action: RequestAction) -> Option<Self> {
        match action {
            RequestAction::Accept | RequestAction::Confirm => Some(Self::Accept),
            RequestAction::Reject | RequestAction::Decline => Some(Self::Reject),
            RequestAction::Reschedule => Some(Self::Reschedule),
            RequestAction::Cancel => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Reschedule => "reschedule",
        }
    }
}

/// One append-only decision log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub decision: DecisionKind,
    pub actor: ActorSnapshot,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// A pending reschedule counter-offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleProposal {
    pub proposed_date: String,
    pub proposed_start_time: String,
    pub proposed_end_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub proposed_at: DateTime<Utc>,
    pub proposed_by: String,
}

/// Every mutation kind a request document records as its most recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Accept,
    Reject,
    Confirm,
    Decline,
    Reschedule,
    Cancel,
    Update,
    Claim,
    Release,
    OverrideReviewer,
}

impl From<RequestAction> for OperationKind {
    fn from(action: RequestAction) -> Self {
        match action {
            RequestAction::Accept => Self::Accept,
            RequestAction::Reject => Self::Reject,
            RequestAction::Confirm => Self::Confirm,
            RequestAction::Decline => Self::Decline,
            RequestAction::Reschedule => Self::Reschedule,
            RequestAction::Cancel => Self::Cancel,
        }
    }
}

/// Most recent mutation, used to derive the active responder for
/// documents written before the responder field existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    pub action: OperationKind,
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Versioning across resubmissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLineage {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<String>,
}

impl Default for RequestLineage {
    fn default() -> Self {
        Self {
            number: 1,
            parent_request_id: None,
            supersedes: Vec::new(),
        }
    }
}

impl RequestLineage {
    /// Lineage block for a resubmission superseding `parent`.
    pub fn next_for(parent: &Request) -> Self {
        let mut supersedes = parent.lineage.supersedes.clone();
        supersedes.push(parent.id.clone());
        Self {
            number: parent.lineage.number + 1,
            parent_request_id: Some(parent.id.clone()),
            supersedes,
        }
    }
}

/// An event request: the aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    // ── Identity ──
    pub id: String,

    // ── Status ──
    #[serde(default = "default_status", deserialize_with = "lenient_status")]
    pub status: RequestStatus,

    // ── Event details ──
    pub event: EventDetails,

    // ── Parties ──
    pub requester: PartySnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<ReviewerAssignment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_coordinators: Vec<CoordinatorSnapshot>,

    // ── Claim lease ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimLease>,

    // ── Audit logs (append-only) ──
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<StatusEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decision_history: Vec<DecisionEntry>,

    // ── Negotiation ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_proposal: Option<RescheduleProposal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_responder: Option<ActiveResponder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<LastAction>,

    // ── Lineage & concurrency ──
    #[serde(default)]
    pub lineage: RequestLineage,
    #[serde(default)]
    pub version: u64,

    // ── Timestamps ──
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> RequestStatus {
    RequestStatus::PendingReview
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

fn lenient_status<'de, D>(deserializer: D) -> Result<RequestStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_status(&raw))
}

impl Request {
    /// The claim lease, viewed through lazy expiry: an expired lease is
    /// absent.
    pub fn active_claim(&self, now: DateTime<Utc>) -> Option<&ClaimLease> {
        self.claim.as_ref().filter(|lease| lease.is_active(now))
    }

    /// Whether `user_id` is in the frozen eligible-coordinator set.
    pub fn is_valid_coordinator(&self, user_id: &str) -> bool {
        self.valid_coordinators
            .iter()
            .any(|coordinator| coordinator.user_id == user_id)
    }

    /// Whether `user_id` is the currently assigned reviewer.
    pub fn is_assigned_reviewer(&self, user_id: &str) -> bool {
        self.reviewer
            .as_ref()
            .is_some_and(|reviewer| reviewer.user_id == user_id)
    }

    /// Whether `user_id` submitted this request.
    pub fn is_requester(&self, user_id: &str) -> bool {
        self.requester.user_id == user_id
    }

    /// The frozen snapshot for one eligible coordinator.
    pub fn coordinator_snapshot(&self, user_id: &str) -> Option<&CoordinatorSnapshot> {
        self.valid_coordinators
            .iter()
            .find(|coordinator| coordinator.user_id == user_id)
    }

    /// Append one status log entry. Entries are never rewritten.
    pub fn push_status_entry(
        &mut self,
        status: RequestStatus,
        actor: ActorSnapshot,
        note: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) {
        self.status_history.push(StatusEntry {
            status,
            actor,
            note: note.into(),
            timestamp,
        });
    }

    /// Append one decision log entry.
    pub fn push_decision_entry(
        &mut self,
        decision: DecisionKind,
        actor: ActorSnapshot,
        notes: impl Into<String>,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) {
        self.decision_history.push(DecisionEntry {
            decision,
            actor,
            notes: notes.into(),
            payload,
            timestamp,
        });
    }

    /// Record the most recent mutation and advance the concurrency
    /// stamp. Every committed mutation goes through here.
    pub fn commit_mutation(
        &mut self,
        operation: OperationKind,
        actor_id: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.last_action = Some(LastAction {
            action: operation,
            actor_id: actor_id.into(),
            timestamp: now,
        });
        self.version += 1;
        self.updated_at = now;
    }
}
