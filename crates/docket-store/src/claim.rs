//! Claim manager: atomic lease primitives over the request store.
//!
//! Many eligible coordinators see a broadcast request; at most one of
//! them actively works it. The conditional check ("no live lease held
//! by someone else") and the lease write happen inside one lock scope —
//! never a read-then-write pair across two scopes, which is the race
//! this module exists to close.
//!
//! Expiry is lazy: a lapsed lease is scrubbed at the next claim or
//! release touch. There is no background sweeper.

use chrono::{DateTime, Duration, Utc};
use docket_core::{
    ActorSnapshot, ClaimLease, OperationKind, Request, ReviewerAssignment,
};
use std::path::Path;

use crate::journal::{RequestJournal, StoreMutationError};
use crate::memory::RequestStoreError;

/// Short window for active work.
pub const DEFAULT_ACTIVE_TTL_SECONDS: i64 = 900;
/// Longer window for a passive hold.
pub const DEFAULT_HOLD_TTL_SECONDS: i64 = 3600;
pub const MIN_CLAIM_TTL_SECONDS: i64 = 60;
pub const MAX_CLAIM_TTL_SECONDS: i64 = 86_400;

/// Which default TTL applies when none is given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimWindow {
    Active,
    Hold,
}

impl ClaimWindow {
    pub fn default_ttl_seconds(self) -> i64 {
        match self {
            Self::Active => DEFAULT_ACTIVE_TTL_SECONDS,
            Self::Hold => DEFAULT_HOLD_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimCommand {
    pub request_id: String,
    pub coordinator: ActorSnapshot,
    pub ttl_seconds: Option<i64>,
    pub window: ClaimWindow,
    pub now: DateTime<Utc>,
}

impl ClaimCommand {
    pub fn new(request_id: impl Into<String>, coordinator: ActorSnapshot) -> Self {
        Self {
            request_id: request_id.into(),
            coordinator,
            ttl_seconds: None,
            window: ClaimWindow::Active,
            now: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub request: Request,
    pub lease: ClaimLease,
    /// True when the caller already held the lease; the existing lease
    /// is returned unchanged, without an expiry extension.
    pub already_held: bool,
}

#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub request: Request,
    /// True when an active lease held by the caller was cleared.
    pub released: bool,
}

#[derive(Debug, Clone)]
pub struct OverrideOutcome {
    pub request: Request,
    pub previous: Option<ReviewerAssignment>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error(
        "ttl_seconds must be in range [{min}, {max}] (got {actual})",
        min = MIN_CLAIM_TTL_SECONDS,
        max = MAX_CLAIM_TTL_SECONDS
    )]
    InvalidTtl { actual: i64 },

    #[error("ttl_seconds overflowed timestamp range")]
    TtlOverflow,

    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("coordinator {coordinator_id} is not eligible for request {request_id}")]
    NotEligible {
        request_id: String,
        coordinator_id: String,
    },

    #[error("request {request_id} is claimed by {holder_id}")]
    HeldByAnother {
        request_id: String,
        holder_id: String,
    },

    #[error("request-store lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to acquire request-store lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error(transparent)]
    Store(#[from] RequestStoreError),
}

impl From<StoreMutationError<ClaimError>> for ClaimError {
    fn from(err: StoreMutationError<ClaimError>) -> Self {
        match err {
            StoreMutationError::Mutation(inner) => inner,
            StoreMutationError::LockBusy { lock_path } => Self::LockBusy { lock_path },
            StoreMutationError::LockIo { lock_path, message } => {
                Self::LockIo { lock_path, message }
            }
            StoreMutationError::Store(source) => Self::Store(source),
        }
    }
}

fn resolve_ttl(explicit: Option<i64>, window: ClaimWindow) -> Result<i64, ClaimError> {
    match explicit {
        Some(ttl) if !(MIN_CLAIM_TTL_SECONDS..=MAX_CLAIM_TTL_SECONDS).contains(&ttl) => {
            Err(ClaimError::InvalidTtl { actual: ttl })
        }
        Some(ttl) => Ok(ttl),
        None => Ok(window.default_ttl_seconds()),
    }
}

/// Atomically acquire (or idempotently re-acquire) the claim lease.
///
/// Succeeds only when the coordinator belongs to the frozen eligible
/// set (or is the assigned reviewer) and no live lease by someone else
/// exists. An expired lease is scrubbed and treated as absent.
pub fn claim_request(
    path: impl AsRef<Path>,
    command: ClaimCommand,
) -> Result<ClaimOutcome, ClaimError> {
    let ttl = resolve_ttl(command.ttl_seconds, command.window)?;
    let expires_at = command
        .now
        .checked_add_signed(Duration::seconds(ttl))
        .ok_or(ClaimError::TtlOverflow)?;

    let outcome = RequestJournal::new(path.as_ref()).mutate(|store| {
        let request = store
            .request_mut(&command.request_id)
            .ok_or_else(|| ClaimError::RequestNotFound(command.request_id.clone()))?;

        let coordinator_id = command.coordinator.user_id.as_str();
        if !request.is_valid_coordinator(coordinator_id)
            && !request.is_assigned_reviewer(coordinator_id)
        {
            return Err(ClaimError::NotEligible {
                request_id: request.id.clone(),
                coordinator_id: coordinator_id.to_string(),
            });
        }

        match request.active_claim(command.now).cloned() {
            Some(lease) if lease.holder_id == coordinator_id => {
                // Idempotent re-claim: the existing lease stands as is.
                return Ok((
                    ClaimOutcome {
                        request: request.clone(),
                        lease,
                        already_held: true,
                    },
                    false,
                ));
            }
            Some(lease) => {
                return Err(ClaimError::HeldByAnother {
                    request_id: request.id.clone(),
                    holder_id: lease.holder_id,
                });
            }
            None => {}
        }

        let lease = ClaimLease {
            holder_id: coordinator_id.to_string(),
            claimed_at: command.now,
            expires_at,
        };
        request.claim = Some(lease.clone());
        request.push_status_entry(
            request.status,
            command.coordinator.clone(),
            format!("claim acquired by {coordinator_id} (ttl {ttl}s)"),
            command.now,
        );
        request.commit_mutation(OperationKind::Claim, coordinator_id, command.now);

        Ok((
            ClaimOutcome {
                request: request.clone(),
                lease,
                already_held: false,
            },
            true,
        ))
    })?;

    Ok(outcome)
}

/// Clear the caller's lease.
///
/// Releasing an absent or expired lease is an idempotent success (the
/// expired lease is scrubbed); an active lease held by another actor is
/// rejected.
pub fn release_request(
    path: impl AsRef<Path>,
    request_id: &str,
    coordinator: &ActorSnapshot,
    now: DateTime<Utc>,
) -> Result<ReleaseOutcome, ClaimError> {
    let request_id = request_id.to_string();
    let outcome = RequestJournal::new(path.as_ref()).mutate(|store| {
        let request = store
            .request_mut(&request_id)
            .ok_or_else(|| ClaimError::RequestNotFound(request_id.clone()))?;

        let coordinator_id = coordinator.user_id.as_str();
        match request.active_claim(now).cloned() {
            Some(lease) if lease.holder_id != coordinator_id => Err(ClaimError::HeldByAnother {
                request_id: request.id.clone(),
                holder_id: lease.holder_id,
            }),
            Some(_) => {
                request.claim = None;
                request.push_status_entry(
                    request.status,
                    coordinator.clone(),
                    format!("claim released by {coordinator_id}"),
                    now,
                );
                request.commit_mutation(OperationKind::Release, coordinator_id, now);
                Ok((
                    ReleaseOutcome {
                        request: request.clone(),
                        released: true,
                    },
                    true,
                ))
            }
            None => {
                // Scrub a lapsed lease without claiming the release as
                // the caller's; the turn bookkeeping stays untouched.
                let scrubbed = request.claim.take().is_some();
                if scrubbed {
                    request.version += 1;
                    request.updated_at = now;
                }
                Ok((
                    ReleaseOutcome {
                        request: request.clone(),
                        released: false,
                    },
                    scrubbed,
                ))
            }
        }
    })?;

    Ok(outcome)
}

/// Administrative reassignment, bypassing claim state entirely.
///
/// The reviewer snapshot is replaced wholesale from the coordinator's
/// frozen snapshot — never field-merged, so nothing of the prior
/// reviewer survives in the new block. The prior reviewer's identity is
/// recorded in the status history.
pub fn override_reviewer(
    path: impl AsRef<Path>,
    request_id: &str,
    admin: &ActorSnapshot,
    new_coordinator_id: &str,
    now: DateTime<Utc>,
) -> Result<OverrideOutcome, ClaimError> {
    let request_id = request_id.to_string();
    let new_coordinator_id = new_coordinator_id.to_string();
    let outcome = RequestJournal::new(path.as_ref()).mutate(|store| {
        let request = store
            .request_mut(&request_id)
            .ok_or_else(|| ClaimError::RequestNotFound(request_id.clone()))?;

        let Some(snapshot) = request.coordinator_snapshot(&new_coordinator_id).cloned() else {
            return Err(ClaimError::NotEligible {
                request_id: request.id.clone(),
                coordinator_id: new_coordinator_id.clone(),
            });
        };

        let previous = request.reviewer.take();
        request.reviewer = Some(ReviewerAssignment {
            user_id: snapshot.user_id.clone(),
            name: snapshot.name.clone(),
            role: "coordinator".to_string(),
            authority: snapshot.authority.clone(),
            assigned_at: now,
            auto_assigned: false,
            assignment_rule: "admin_override".to_string(),
            overridden_at: Some(now),
            overridden_by: Some(admin.user_id.clone()),
        });

        let previous_label = previous
            .as_ref()
            .map(|reviewer| format!("{} ({})", reviewer.user_id, reviewer.name))
            .unwrap_or_else(|| "none".to_string());
        request.push_status_entry(
            request.status,
            admin.clone(),
            format!(
                "reviewer overridden: {previous_label} -> {} ({})",
                snapshot.user_id, snapshot.name
            ),
            now,
        );
        request.commit_mutation(OperationKind::OverrideReviewer, admin.user_id.clone(), now);

        Ok((
            OverrideOutcome {
                request: request.clone(),
                previous,
            },
            true,
        ))
    })?;

    Ok(outcome)
}
