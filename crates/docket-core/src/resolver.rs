//! Action resolver: which transitions an actor may invoke right now.
//!
//! An ordered check pipeline over one request document:
//! table legality, terminal short-circuit, relationship gate, claim
//! parity/exclusivity, external RBAC, turn gate. Pure — the caller
//! supplies the permission seam and the clock.
//!
//! The broadcast fairness rule lives in step 4: while a request is
//! unclaimed, every member of the frozen coordinator set resolves the
//! same action set as the assigned reviewer. Once a lease is active,
//! only the holder resolves reviewer-side actions.

use chrono::{DateTime, Utc};

use crate::actor::{ActorRef, Relationship};
use crate::error::DenialKind;
use crate::negotiation::current_responder;
use crate::permission::PermissionEngine;
use crate::request::Request;
use crate::state::{
    RequestAction, RequestStatus, TransitionError, available_actions, is_terminal, next_status,
};

pub const PERMISSION_RESOURCE: &str = "event_requests";
pub const REVIEWER_PERMISSION_ACTION: &str = "review";
pub const REQUESTER_PERMISSION_ACTION: &str = "respond";

/// What the resolver offers an actor: the table actions plus the
/// always-available read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCapability {
    View,
    Accept,
    Reject,
    Confirm,
    Decline,
    Reschedule,
    Cancel,
}

impl RequestCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::Reschedule => "reschedule",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for RequestCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed denial from `validate_action`. Never a raw string: the engine
/// maps each variant onto the surface taxonomy via `kind()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("actor {actor_id} is not a party to this request")]
    NotAParty { actor_id: String },

    #[error("request is claimed by {holder_id}")]
    ClaimHeld { holder_id: String },

    #[error("actor {actor_id} lacks permission {resource}:{action}")]
    PermissionDenied {
        actor_id: String,
        resource: String,
        action: String,
    },

    #[error("action {action} belongs to the other party")]
    WrongSide {
        actor_id: String,
        action: RequestAction,
    },

    #[error("it is not {actor_id}'s turn to act")]
    NotYourTurn { actor_id: String },
}

impl ResolveError {
    pub fn kind(&self) -> DenialKind {
        match self {
            Self::InvalidTransition(_) => DenialKind::InvalidTransition,
            Self::NotAParty { .. }
            | Self::ClaimHeld { .. }
            | Self::PermissionDenied { .. }
            | Self::WrongSide { .. }
            | Self::NotYourTurn { .. } => DenialKind::Forbidden,
        }
    }
}

/// Which seat the actor occupies for resolution purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seat {
    Requester,
    ReviewerSide,
}

fn seat_of(actor: &ActorRef, request: &Request, perms: &dyn PermissionEngine) -> Option<Seat> {
    if request.is_requester(&actor.id) {
        return Some(Seat::Requester);
    }
    if request.is_assigned_reviewer(&actor.id)
        || request.is_valid_coordinator(&actor.id)
        || perms.has_wildcard(&actor.id)
    {
        return Some(Seat::ReviewerSide);
    }
    None
}

/// Compute the full per-actor action list for display.
///
/// Unrelated actors, terminal requests, failed permission checks, and
/// lost turns all collapse to `[View]` — never an empty list, so a
/// caller can always render something.
pub fn available_actions_for(
    actor: &ActorRef,
    request: &Request,
    perms: &dyn PermissionEngine,
    now: DateTime<Utc>,
) -> Vec<RequestCapability> {
    let view_only = vec![RequestCapability::View];

    let base = available_actions(request.status);
    if is_terminal(request.status) || base.is_empty() {
        return view_only;
    }

    let Some(seat) = seat_of(actor, request, perms) else {
        return view_only;
    };

    // Claim exclusivity: an active lease narrows the reviewer side to
    // the holder. No lease means parity across the coordinator set.
    if seat == Seat::ReviewerSide
        && let Some(lease) = request.active_claim(now)
        && lease.holder_id != actor.id
    {
        return view_only;
    }

    if !permission_passes(actor, request, perms, seat) {
        return view_only;
    }

    let mut capabilities = vec![RequestCapability::View];
    let responder = current_responder(request, now);
    let turn_open = |relationship: Relationship| {
        responder
            .as_ref()
            .is_none_or(|r| r.relationship == relationship)
    };

    for action in base {
        let capability = match (seat, action) {
            (Seat::ReviewerSide, RequestAction::Accept) => Some(RequestCapability::Accept),
            (Seat::ReviewerSide, RequestAction::Reject) => Some(RequestCapability::Reject),
            (Seat::Requester, RequestAction::Confirm) => Some(RequestCapability::Confirm),
            (Seat::Requester, RequestAction::Decline) => Some(RequestCapability::Decline),
            (_, RequestAction::Reschedule) => Some(RequestCapability::Reschedule),
            // Cancellation of an approved request is requester-facing.
            (Seat::Requester, RequestAction::Cancel) => Some(RequestCapability::Cancel),
            _ => None,
        };
        let Some(capability) = capability else {
            continue;
        };

        let gated_ok = match capability {
            RequestCapability::Cancel => true,
            _ => match seat {
                Seat::Requester => turn_open(Relationship::Requester),
                Seat::ReviewerSide => turn_open(Relationship::Reviewer),
            },
        };
        if gated_ok && !capabilities.contains(&capability) {
            capabilities.push(capability);
        }
    }

    capabilities
}

/// Re-run the resolution pipeline for one specific action at mutation
/// time. A client-cached action list is never trusted; claim freshness
/// is re-checked against `now` so an expired lease cannot block others.
pub fn validate_action(
    actor: &ActorRef,
    action: RequestAction,
    request: &Request,
    perms: &dyn PermissionEngine,
    now: DateTime<Utc>,
) -> Result<(), ResolveError> {
    next_status(request.status, action)?;

    let seat = seat_of(actor, request, perms).ok_or_else(|| ResolveError::NotAParty {
        actor_id: actor.id.clone(),
    })?;

    // The synonym pairs collapse per seat: a requester saying `accept`
    // means `confirm`; a coordinator saying `confirm` on a pending
    // request means `accept`. An approved-request acknowledgment stays
    // requester-side only.
    match (seat, action) {
        (Seat::Requester, RequestAction::Accept | RequestAction::Confirm) => {}
        (Seat::Requester, RequestAction::Reject | RequestAction::Decline) => {}
        (Seat::Requester, RequestAction::Cancel) => {}
        (Seat::ReviewerSide, RequestAction::Accept | RequestAction::Confirm)
            if request.status != RequestStatus::Approved => {}
        (Seat::ReviewerSide, RequestAction::Reject | RequestAction::Decline)
            if request.status != RequestStatus::Approved => {}
        (_, RequestAction::Reschedule) => {}
        _ => {
            return Err(ResolveError::WrongSide {
                actor_id: actor.id.clone(),
                action,
            });
        }
    }

    if seat == Seat::ReviewerSide
        && let Some(lease) = request.active_claim(now)
        && lease.holder_id != actor.id
    {
        return Err(ResolveError::ClaimHeld {
            holder_id: lease.holder_id.clone(),
        });
    }

    if !permission_passes(actor, request, perms, seat) {
        let permission_action = match seat {
            Seat::Requester => REQUESTER_PERMISSION_ACTION,
            Seat::ReviewerSide => REVIEWER_PERMISSION_ACTION,
        };
        return Err(ResolveError::PermissionDenied {
            actor_id: actor.id.clone(),
            resource: PERMISSION_RESOURCE.to_string(),
            action: permission_action.to_string(),
        });
    }

    if action != RequestAction::Cancel
        && let Some(responder) = current_responder(request, now)
    {
        let required = match seat {
            Seat::Requester => Relationship::Requester,
            Seat::ReviewerSide => Relationship::Reviewer,
        };
        if responder.relationship != required {
            return Err(ResolveError::NotYourTurn {
                actor_id: actor.id.clone(),
            });
        }
    }

    Ok(())
}

fn permission_passes(
    actor: &ActorRef,
    request: &Request,
    perms: &dyn PermissionEngine,
    seat: Seat,
) -> bool {
    if perms.has_wildcard(&actor.id) {
        return true;
    }
    let permission_action = match seat {
        Seat::Requester => REQUESTER_PERMISSION_ACTION,
        Seat::ReviewerSide => REVIEWER_PERMISSION_ACTION,
    };
    perms.check_permission(
        &actor.id,
        PERMISSION_RESOURCE,
        permission_action,
        Some(&request.event.location_id),
    )
}
