//! Request status machine: canonical states, actions, transition table.
//!
//! Pure table lookups. No I/O, no side effects. All legacy string
//! matching is confined to `normalize_status`; the transition logic
//! only ever sees the closed enum.

use serde::{Deserialize, Serialize};

/// Canonical request status vocabulary.
///
/// Legacy spellings (case variants, old two-step names) are folded onto
/// this enum by `normalize_status` at the read boundary and are never
/// written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingReview,
    ReviewRescheduled,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::PendingReview,
        RequestStatus::ReviewRescheduled,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
        RequestStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::ReviewRescheduled => "review_rescheduled",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Strict membership check for callers that must not accept drifted
    /// input. The lenient path is `normalize_status`.
    pub fn parse_strict(raw: &str) -> Result<Self, UnknownStatus> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown request status: {0}")]
pub struct UnknownStatus(pub String);

/// Actions a party may invoke against a request.
///
/// `accept`/`confirm` and `reject`/`decline` are synonym pairs: the
/// coordinator vocabulary and the stakeholder vocabulary for the same
/// transition. Both finalize directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Accept,
    Reject,
    Confirm,
    Decline,
    Reschedule,
    Cancel,
}

impl RequestAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::Reschedule => "reschedule",
            Self::Cancel => "cancel",
        }
    }

    /// Whether this action ends the reschedule negotiation (everything
    /// except another `reschedule` does).
    pub fn finalizes_negotiation(self) -> bool {
        !matches!(self, Self::Reschedule)
    }
}

impl std::fmt::Display for RequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestAction {
    type Err = UnknownAction;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "confirm" => Ok(Self::Confirm),
            "decline" => Ok(Self::Decline),
            "reschedule" => Ok(Self::Reschedule),
            "cancel" => Ok(Self::Cancel),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown request action: {0}")]
pub struct UnknownAction(pub String);

/// A `(status, action)` pair absent from the transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("action {action} is not valid in status {status}")]
pub struct TransitionError {
    pub status: RequestStatus,
    pub action: RequestAction,
}

/// Map legacy/stored status spellings onto the canonical enum.
///
/// Idempotent: canonical spellings map to themselves. Unrecognized
/// input falls back to `PendingReview` rather than failing — a lenient
/// read policy for surviving data drift. Callers that need hard
/// validation use `RequestStatus::parse_strict`.
pub fn normalize_status(raw: &str) -> RequestStatus {
    let folded: String = raw
        .trim()
        .chars()
        .map(|ch| match ch {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect();

    match folded.as_str() {
        "pending_review" | "pending" | "submitted" | "awaiting_review" | "new" => {
            RequestStatus::PendingReview
        }
        "review_rescheduled" | "rescheduled" | "reschedule_requested" | "reschedule_proposed" => {
            RequestStatus::ReviewRescheduled
        }
        // Retired two-step vocabulary: "accepted" was once a provisional
        // state awaiting stakeholder confirmation. Both steps now land on
        // the finalized state.
        "approved" | "accepted" | "confirmed" => RequestStatus::Approved,
        "rejected" | "declined" | "denied" => RequestStatus::Rejected,
        "cancelled" | "canceled" | "withdrawn" => RequestStatus::Cancelled,
        "completed" | "complete" | "done" => RequestStatus::Completed,
        _ => RequestStatus::PendingReview,
    }
}

/// Pure transition table lookup.
pub fn next_status(
    status: RequestStatus,
    action: RequestAction,
) -> Result<RequestStatus, TransitionError> {
    use RequestAction as A;
    use RequestStatus as S;

    let next = match (status, action) {
        (S::PendingReview | S::ReviewRescheduled, A::Accept | A::Confirm) => S::Approved,
        (S::PendingReview | S::ReviewRescheduled, A::Reject | A::Decline) => S::Rejected,
        (S::PendingReview | S::ReviewRescheduled, A::Reschedule) => S::ReviewRescheduled,
        // Acknowledging an approved request is a no-op transition.
        (S::Approved, A::Confirm) => S::Approved,
        (S::Approved, A::Reschedule) => S::ReviewRescheduled,
        (S::Approved, A::Cancel) => S::Cancelled,
        _ => return Err(TransitionError { status, action }),
    };
    Ok(next)
}

/// Actions with a defined transition from `status`, in table order.
pub fn available_actions(status: RequestStatus) -> &'static [RequestAction] {
    use RequestAction as A;
    match status {
        RequestStatus::PendingReview | RequestStatus::ReviewRescheduled => &[
            A::Accept,
            A::Reject,
            A::Confirm,
            A::Decline,
            A::Reschedule,
        ],
        RequestStatus::Approved => &[A::Confirm, A::Reschedule, A::Cancel],
        RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed => &[],
    }
}

/// Whether `status` admits no further transition.
pub fn is_terminal(status: RequestStatus) -> bool {
    matches!(
        status,
        RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed
    )
}

/// Whether the requester may still edit the submitted details.
pub fn can_edit(status: RequestStatus) -> bool {
    matches!(status, RequestStatus::PendingReview)
}

/// Whether the requester-facing withdrawal path is open.
///
/// Wider than the table's `cancel` column: withdrawal from
/// `PendingReview` goes through `cancel_request`, not `execute_action`.
pub fn can_cancel(status: RequestStatus) -> bool {
    matches!(
        status,
        RequestStatus::PendingReview | RequestStatus::Approved
    )
}
