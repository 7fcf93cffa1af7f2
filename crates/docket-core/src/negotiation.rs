//! Active-responder tracking for reschedule ping-pong.
//!
//! Exactly one party owns the turn while a request sits in a review
//! state. Every `reschedule` flips the turn; every finalizing action
//! clears it. Documents written before the responder field existed get
//! a derived value from the most recent mutation.

use chrono::{DateTime, Utc};

use crate::actor::{ActiveResponder, Relationship};
use crate::request::{OperationKind, Request};
use crate::state::RequestAction;

/// The user currently standing on the reviewer side: the active claim
/// holder when a lease exists, else the assigned reviewer.
pub fn reviewer_side_user(request: &Request, now: DateTime<Utc>) -> Option<(String, String)> {
    if let Some(lease) = request.active_claim(now) {
        let authority = request
            .coordinator_snapshot(&lease.holder_id)
            .map(|coordinator| coordinator.authority.clone())
            .unwrap_or_default();
        return Some((lease.holder_id.clone(), authority));
    }
    request
        .reviewer
        .as_ref()
        .map(|reviewer| (reviewer.user_id.clone(), reviewer.authority.clone()))
}

/// Build the responder value for one side of the request.
pub fn responder_for(
    request: &Request,
    relationship: Relationship,
    now: DateTime<Utc>,
) -> Option<ActiveResponder> {
    match relationship {
        Relationship::Requester => Some(ActiveResponder {
            user_id: request.requester.user_id.clone(),
            relationship: Relationship::Requester,
            authority: request.requester.authority.clone(),
        }),
        Relationship::Reviewer => {
            reviewer_side_user(request, now).map(|(user_id, authority)| ActiveResponder {
                user_id,
                relationship: Relationship::Reviewer,
                authority,
            })
        }
    }
}

/// The stored responder, or a derived one for legacy documents.
pub fn current_responder(request: &Request, now: DateTime<Utc>) -> Option<ActiveResponder> {
    if let Some(responder) = &request.active_responder {
        return Some(responder.clone());
    }
    if crate::state::is_terminal(request.status) {
        return None;
    }
    derive_responder(request, now)
}

/// Derivation chain for documents missing the responder field:
/// from `last_action.actor_id` (the other party becomes responder),
/// else from `reschedule_proposal.proposed_by` (the other party),
/// else default to the requester.
pub fn derive_responder(request: &Request, now: DateTime<Utc>) -> Option<ActiveResponder> {
    if let Some(last) = &request.last_action
        && is_party_operation(last.action)
    {
        let acted = relationship_of(request, &last.actor_id);
        return responder_for(request, acted.other(), now);
    }

    if let Some(proposal) = &request.reschedule_proposal {
        let proposed = relationship_of(request, &proposal.proposed_by);
        return responder_for(request, proposed.other(), now);
    }

    responder_for(request, Relationship::Requester, now)
}

/// The responder after `action` commits, given which party acted.
///
/// `reschedule` hands the turn to the other party; everything that
/// finalizes the negotiation clears it.
pub fn responder_after_action(
    request: &Request,
    action: RequestAction,
    actor_relationship: Relationship,
    now: DateTime<Utc>,
) -> Option<ActiveResponder> {
    if action.finalizes_negotiation() {
        return None;
    }
    responder_for(request, actor_relationship.other(), now)
}

fn relationship_of(request: &Request, user_id: &str) -> Relationship {
    if request.is_requester(user_id) {
        Relationship::Requester
    } else {
        Relationship::Reviewer
    }
}

/// Only party-invoked operations carry turn information; claim
/// bookkeeping does not move the turn.
fn is_party_operation(operation: OperationKind) -> bool {
    !matches!(
        operation,
        OperationKind::Claim | OperationKind::Release | OperationKind::OverrideReviewer
    )
}
