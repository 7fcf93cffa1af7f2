//! # docket-core
//!
//! Pure domain logic for event-request coordination:
//! - `RequestStatus`/`RequestAction` and the transition table (the
//!   status machine)
//! - `Request` (the aggregate root, with embedded append-only logs)
//! - the action resolver (per-actor capability computation)
//! - active-responder tracking for reschedule negotiation
//! - the permission seam consumed by the resolver
//!
//! No I/O. Persistence and lock discipline live in `docket-store`;
//! orchestration lives in `docket-engine`.

pub mod actor;
pub mod error;
pub mod negotiation;
pub mod permission;
pub mod request;
pub mod resolver;
pub mod state;

pub use actor::{
    ActiveResponder, ActorRef, ActorSnapshot, CoordinatorSnapshot, PartySnapshot, Relationship,
    ReviewerAssignment,
};
pub use error::DenialKind;
pub use negotiation::{
    current_responder, derive_responder, responder_after_action, responder_for, reviewer_side_user,
};
pub use permission::{GrantBook, PermissionEngine, PermissionGrant, ScopedGrant, WILDCARD};
pub use request::{
    ClaimLease, DecisionEntry, DecisionKind, EventDetails, LastAction, OperationKind, Request,
    RequestLineage, RescheduleProposal, StatusEntry,
};
pub use resolver::{
    PERMISSION_RESOURCE, REQUESTER_PERMISSION_ACTION, REVIEWER_PERMISSION_ACTION,
    RequestCapability, ResolveError, available_actions_for, validate_action,
};
pub use state::{
    RequestAction, RequestStatus, TransitionError, UnknownAction, UnknownStatus, available_actions,
    can_cancel, can_edit, is_terminal, next_status, normalize_status,
};
