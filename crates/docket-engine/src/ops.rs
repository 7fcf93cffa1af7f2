//! The operation surface: every request mutation and query the outer
//! layers invoke.
//!
//! `Engine` composes the collaborator seams (directory, coverage,
//! permissions, event sink) over one requests JSONL path. All mutations
//! run lock-scoped through `docket-store`; conflicts are the only
//! failures retried automatically, with a bounded budget from settings.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use docket_core::{
    DecisionKind, EventDetails, OperationKind, PERMISSION_RESOURCE, PermissionEngine,
    Relationship, Request, RequestAction, RequestCapability, RequestLineage, RequestStatus,
    RescheduleProposal, ReviewerAssignment, available_actions_for, can_cancel, can_edit,
    next_status, responder_after_action, responder_for, validate_action,
};
use docket_store::claim::{ClaimCommand, ClaimWindow};
use docket_store::{
    ClaimOutcome, OverrideOutcome, ReleaseOutcome, RequestEvent, RequestEventAction,
    RequestJournal, RequestStore,
};

use crate::collab::{CoverageResolver, Directory, EventDispatcher};
use crate::error::EngineError;
use crate::settings::EngineSettings;

/// Assignment rule recorded when coverage picks the reviewer.
pub const ASSIGNMENT_RULE_COVERAGE: &str = "coverage_first_eligible";
/// Assignment rule recorded on administrative override.
pub const ASSIGNMENT_RULE_OVERRIDE: &str = "admin_override";

const DELETE_PERMISSION_ACTION: &str = "delete";
const OVERRIDE_PERMISSION_ACTION: &str = "override";

/// Input for `create_request`.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub requester_id: String,
    pub title: String,
    pub event_date: String,
    pub start_time: String,
    pub end_time: String,
    pub location_id: String,
    pub notes: String,
    /// Set for a resubmission; the parent must be rejected.
    pub parent_request_id: Option<String>,
}

/// Input for `execute_action`.
#[derive(Debug, Clone)]
pub struct ExecuteAction {
    pub request_id: String,
    pub actor_id: String,
    pub action: RequestAction,
    pub notes: String,
    pub reschedule: Option<ReschedulePayload>,
    /// When set, the stored version must match or the action conflicts.
    pub expected_version: Option<u64>,
}

/// Proposed replacement schedule carried by a `reschedule` action.
#[derive(Debug, Clone)]
pub struct ReschedulePayload {
    pub proposed_date: String,
    pub proposed_start_time: String,
    pub proposed_end_time: String,
    pub notes: String,
}

/// Input for `update_request`. Absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub request_id: String,
    pub actor_id: String,
    pub title: Option<String>,
    pub event_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub notes: Option<String>,
    pub expected_version: Option<u64>,
}

/// Listing filter; all criteria are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub coordinator_id: Option<String>,
    pub requester_id: Option<String>,
}

/// Request operations over one JSONL-backed store.
pub struct Engine<D, C, P, E> {
    journal: RequestJournal,
    settings: EngineSettings,
    directory: D,
    coverage: C,
    permissions: P,
    dispatcher: E,
}

impl<D, C, P, E> Engine<D, C, P, E>
where
    D: Directory,
    C: CoverageResolver,
    P: PermissionEngine,
    E: EventDispatcher,
{
    pub fn new(
        requests_path: impl Into<PathBuf>,
        settings: EngineSettings,
        directory: D,
        coverage: C,
        permissions: P,
        dispatcher: E,
    ) -> Self {
        Self {
            journal: RequestJournal::new(requests_path),
            settings,
            directory,
            coverage,
            permissions,
            dispatcher,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Submit a new request.
    ///
    /// The eligible coordinator set is resolved from coverage and frozen
    /// into the document; the first eligible coordinator becomes the
    /// auto-assigned reviewer and the opening turn is theirs.
    pub fn create_request(
        &self,
        command: NewRequest,
        now: DateTime<Utc>,
    ) -> Result<Request, EngineError> {
        let requester = self
            .directory
            .user(&command.requester_id)
            .ok_or_else(|| EngineError::UserNotFound(command.requester_id.clone()))?;

        validate_title(&command.title)?;
        validate_date("event_date", &command.event_date)?;
        validate_time("start_time", &command.start_time)?;
        validate_time("end_time", &command.end_time)?;
        validate_time_order(&command.start_time, &command.end_time)?;
        if command.location_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "location_id must not be empty".to_string(),
            ));
        }

        let event = EventDetails {
            title: command.title.trim().to_string(),
            event_date: command.event_date.clone(),
            start_time: command.start_time.clone(),
            end_time: command.end_time.clone(),
            location_id: command.location_id.clone(),
            notes: command.notes.clone(),
        };

        let eligible = self.coverage.eligible_coordinators(&event);
        if eligible.is_empty() {
            return Err(EngineError::Validation(format!(
                "no eligible coordinators cover location {}",
                event.location_id
            )));
        }
        let assigned = eligible[0].clone();

        let created = self.with_conflict_retry(|| {
            self.mutate(|store| {
                let lineage = match &command.parent_request_id {
                    Some(parent_id) => {
                        let parent = store
                            .request(parent_id)
                            .ok_or_else(|| EngineError::RequestNotFound(parent_id.clone()))?;
                        if parent.status != RequestStatus::Rejected {
                            return Err(EngineError::Validation(format!(
                                "request {parent_id} is {} and cannot be resubmitted",
                                parent.status
                            )));
                        }
                        RequestLineage::next_for(parent)
                    }
                    None => RequestLineage::default(),
                };

                let mut request = Request {
                    id: store.next_request_id(),
                    status: RequestStatus::PendingReview,
                    event: event.clone(),
                    requester: docket_core::PartySnapshot {
                        user_id: command.requester_id.clone(),
                        name: requester.name.clone(),
                        role: requester.role.clone(),
                        authority: requester.authority.clone(),
                    },
                    reviewer: Some(ReviewerAssignment {
                        user_id: assigned.user_id.clone(),
                        name: assigned.name.clone(),
                        role: "coordinator".to_string(),
                        authority: assigned.authority.clone(),
                        assigned_at: now,
                        auto_assigned: true,
                        assignment_rule: ASSIGNMENT_RULE_COVERAGE.to_string(),
                        overridden_at: None,
                        overridden_by: None,
                    }),
                    valid_coordinators: eligible.clone(),
                    claim: None,
                    status_history: Vec::new(),
                    decision_history: Vec::new(),
                    reschedule_proposal: None,
                    active_responder: None,
                    last_action: None,
                    lineage,
                    version: 0,
                    created_at: now,
                    updated_at: now,
                };
                request.active_responder = responder_for(&request, Relationship::Reviewer, now);
                request.push_status_entry(
                    RequestStatus::PendingReview,
                    docket_core::ActorSnapshot {
                        user_id: command.requester_id.clone(),
                        name: requester.name.clone(),
                        role: requester.role.clone(),
                        authority: requester.authority.clone(),
                    },
                    "request submitted",
                    now,
                );
                request.commit_mutation(OperationKind::Create, command.requester_id.clone(), now);

                store.insert_request(request.clone())?;
                Ok((request, true))
            })
        })?;

        self.emit(RequestEvent::new(
            created.id.clone(),
            command.requester_id.clone(),
            now,
            RequestEventAction::CoordinatorAssigned {
                coordinator_id: assigned.user_id.clone(),
                previous_coordinator_id: None,
                assignment_rule: ASSIGNMENT_RULE_COVERAGE.to_string(),
            },
        ));
        tracing::info!(request_id = %created.id, reviewer = %assigned.user_id, "request created");
        Ok(created)
    }

    /// Execute one lifecycle action against a request.
    ///
    /// The full resolution pipeline re-runs at mutation time inside the
    /// lock scope; a client-cached action list is never trusted.
    pub fn execute_action(
        &self,
        command: ExecuteAction,
        now: DateTime<Utc>,
    ) -> Result<Request, EngineError> {
        if command.action == RequestAction::Cancel {
            return self.cancel_request(
                &command.request_id,
                &command.actor_id,
                &command.notes,
                command.expected_version,
                now,
            );
        }
        if command.action == RequestAction::Reschedule {
            let payload = command.reschedule.as_ref().ok_or_else(|| {
                EngineError::Validation(
                    "reschedule requires a proposed date and time range".to_string(),
                )
            })?;
            validate_date("proposed_date", &payload.proposed_date)?;
            validate_time("proposed_start_time", &payload.proposed_start_time)?;
            validate_time("proposed_end_time", &payload.proposed_end_time)?;
            validate_time_order(&payload.proposed_start_time, &payload.proposed_end_time)?;
        }

        let actor = self.directory.actor_ref(&command.actor_id);

        self.with_conflict_retry(|| {
            self.mutate(|store| {
                let request = store
                    .request_mut(&command.request_id)
                    .ok_or_else(|| EngineError::RequestNotFound(command.request_id.clone()))?;
                check_expected_version(request, command.expected_version)?;

                validate_action(&actor, command.action, request, &self.permissions, now)?;
                let next = next_status(request.status, command.action)
                    .map_err(docket_core::ResolveError::from)?;

                let actor_relationship = if request.is_requester(&actor.id) {
                    Relationship::Requester
                } else {
                    Relationship::Reviewer
                };

                let decision_payload = match (&command.reschedule, command.action) {
                    (Some(payload), RequestAction::Reschedule) => {
                        let proposal = RescheduleProposal {
                            proposed_date: payload.proposed_date.clone(),
                            proposed_start_time: payload.proposed_start_time.clone(),
                            proposed_end_time: payload.proposed_end_time.clone(),
                            notes: payload.notes.clone(),
                            proposed_at: now,
                            proposed_by: actor.id.clone(),
                        };
                        let value = serde_json::json!({
                            "proposed_date": proposal.proposed_date,
                            "proposed_start_time": proposal.proposed_start_time,
                            "proposed_end_time": proposal.proposed_end_time,
                        });
                        request.reschedule_proposal = Some(proposal);
                        value
                    }
                    _ => {
                        // Finalizing actions settle any open counter-offer.
                        request.reschedule_proposal = None;
                        serde_json::Value::Null
                    }
                };

                request.status = next;
                request.push_status_entry(next, actor.snapshot(), command.notes.clone(), now);
                if let Some(decision) = DecisionKind::from_action(command.action) {
                    request.push_decision_entry(
                        decision,
                        actor.snapshot(),
                        command.notes.clone(),
                        decision_payload,
                        now,
                    );
                }
                request.active_responder =
                    responder_after_action(request, command.action, actor_relationship, now);
                request.commit_mutation(command.action.into(), actor.id.clone(), now);

                Ok((request.clone(), true))
            })
        })
    }

    /// Cancel a pending or approved request. Requester-facing; an
    /// administrative wildcard may cancel on the requester's behalf.
    pub fn cancel_request(
        &self,
        request_id: &str,
        actor_id: &str,
        notes: &str,
        expected_version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Request, EngineError> {
        let actor = self.directory.actor_ref(actor_id);

        self.with_conflict_retry(|| {
            self.mutate(|store| {
                let request = store
                    .request_mut(request_id)
                    .ok_or_else(|| EngineError::RequestNotFound(request_id.to_string()))?;
                check_expected_version(request, expected_version)?;

                if !can_cancel(request.status) {
                    return Err(EngineError::InvalidTransition {
                        status: request.status,
                        action: RequestAction::Cancel,
                    });
                }
                if !request.is_requester(&actor.id) && !self.permissions.has_wildcard(&actor.id) {
                    return Err(EngineError::Forbidden(format!(
                        "only the requester may cancel request {request_id}"
                    )));
                }

                request.status = RequestStatus::Cancelled;
                request.reschedule_proposal = None;
                request.active_responder = None;
                request.push_status_entry(
                    RequestStatus::Cancelled,
                    actor.snapshot(),
                    if notes.is_empty() {
                        "request cancelled".to_string()
                    } else {
                        notes.to_string()
                    },
                    now,
                );
                request.commit_mutation(OperationKind::Cancel, actor.id.clone(), now);

                Ok((request.clone(), true))
            })
        })
    }

    /// Edit event details while the request is still pending review.
    pub fn update_request(
        &self,
        command: UpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<Request, EngineError> {
        if let Some(title) = &command.title {
            validate_title(title)?;
        }
        if let Some(date) = &command.event_date {
            validate_date("event_date", date)?;
        }
        if let Some(time) = &command.start_time {
            validate_time("start_time", time)?;
        }
        if let Some(time) = &command.end_time {
            validate_time("end_time", time)?;
        }

        let actor = self.directory.actor_ref(&command.actor_id);

        self.with_conflict_retry(|| {
            self.mutate(|store| {
                let request = store
                    .request_mut(&command.request_id)
                    .ok_or_else(|| EngineError::RequestNotFound(command.request_id.clone()))?;
                check_expected_version(request, command.expected_version)?;

                if !can_edit(request.status) {
                    return Err(EngineError::Validation(format!(
                        "request {} is {} and can no longer be edited",
                        request.id, request.status
                    )));
                }
                if !request.is_requester(&actor.id) && !self.permissions.has_wildcard(&actor.id) {
                    return Err(EngineError::Forbidden(format!(
                        "only the requester may edit request {}",
                        request.id
                    )));
                }

                if let Some(title) = &command.title {
                    request.event.title = title.trim().to_string();
                }
                if let Some(date) = &command.event_date {
                    request.event.event_date = date.clone();
                }
                if let Some(time) = &command.start_time {
                    request.event.start_time = time.clone();
                }
                if let Some(time) = &command.end_time {
                    request.event.end_time = time.clone();
                }
                if let Some(notes) = &command.notes {
                    request.event.notes = notes.clone();
                }
                validate_time_order(&request.event.start_time, &request.event.end_time)?;

                request.push_status_entry(
                    request.status,
                    actor.snapshot(),
                    "request details updated",
                    now,
                );
                request.commit_mutation(OperationKind::Update, actor.id.clone(), now);

                Ok((request.clone(), true))
            })
        })
    }

    /// Acquire (or idempotently re-acquire) the claim lease.
    pub fn claim(
        &self,
        request_id: &str,
        coordinator_id: &str,
        ttl_seconds: Option<i64>,
        window: ClaimWindow,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, EngineError> {
        let coordinator = self.directory.actor_ref(coordinator_id).snapshot();
        let ttl = ttl_seconds.or(Some(match window {
            ClaimWindow::Active => self.settings.active_ttl_seconds,
            ClaimWindow::Hold => self.settings.hold_ttl_seconds,
        }));

        let outcome = self.with_conflict_retry(|| {
            docket_store::claim_request(
                self.journal.path(),
                ClaimCommand {
                    request_id: request_id.to_string(),
                    coordinator: coordinator.clone(),
                    ttl_seconds: ttl,
                    window,
                    now,
                },
            )
            .map_err(EngineError::from)
        })?;

        if !outcome.already_held {
            self.emit(RequestEvent::new(
                request_id,
                coordinator_id,
                now,
                RequestEventAction::RequestClaimed {
                    holder_id: outcome.lease.holder_id.clone(),
                    expires_at: outcome.lease.expires_at,
                },
            ));
        }
        Ok(outcome)
    }

    /// Release the caller's lease.
    pub fn release(
        &self,
        request_id: &str,
        coordinator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, EngineError> {
        let coordinator = self.directory.actor_ref(coordinator_id).snapshot();
        let outcome = self.with_conflict_retry(|| {
            docket_store::release_request(self.journal.path(), request_id, &coordinator, now)
                .map_err(EngineError::from)
        })?;

        if outcome.released {
            self.emit(RequestEvent::new(
                request_id,
                coordinator_id,
                now,
                RequestEventAction::RequestReleased {
                    holder_id: coordinator_id.to_string(),
                },
            ));
        }
        Ok(outcome)
    }

    /// Administrative reviewer reassignment within the frozen eligible
    /// set. Requires the wildcard grant or `event_requests:override`.
    pub fn override_reviewer(
        &self,
        request_id: &str,
        admin_id: &str,
        new_coordinator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OverrideOutcome, EngineError> {
        if !self.permissions.has_wildcard(admin_id)
            && !self.permissions.check_permission(
                admin_id,
                PERMISSION_RESOURCE,
                OVERRIDE_PERMISSION_ACTION,
                None,
            )
        {
            return Err(EngineError::Forbidden(format!(
                "{admin_id} may not override reviewer assignments"
            )));
        }

        let admin = self.directory.actor_ref(admin_id).snapshot();
        let outcome = self.with_conflict_retry(|| {
            docket_store::override_reviewer(
                self.journal.path(),
                request_id,
                &admin,
                new_coordinator_id,
                now,
            )
            .map_err(EngineError::from)
        })?;

        self.emit(RequestEvent::new(
            request_id,
            admin_id,
            now,
            RequestEventAction::CoordinatorAssigned {
                coordinator_id: new_coordinator_id.to_string(),
                previous_coordinator_id: outcome
                    .previous
                    .as_ref()
                    .map(|reviewer| reviewer.user_id.clone()),
                assignment_rule: ASSIGNMENT_RULE_OVERRIDE.to_string(),
            },
        ));
        Ok(outcome)
    }

    /// Remove a settled request. Only rejected or cancelled documents
    /// may be deleted, and only with the `delete` grant.
    pub fn delete_request(&self, request_id: &str, actor_id: &str) -> Result<Request, EngineError> {
        let actor_id = actor_id.to_string();
        self.with_conflict_retry(|| {
            self.mutate(|store| {
                let request = store
                    .request(request_id)
                    .ok_or_else(|| EngineError::RequestNotFound(request_id.to_string()))?;

                if !matches!(
                    request.status,
                    RequestStatus::Rejected | RequestStatus::Cancelled
                ) {
                    return Err(EngineError::Validation(format!(
                        "request {} is {} and cannot be deleted",
                        request.id, request.status
                    )));
                }
                if !self.permissions.has_wildcard(&actor_id)
                    && !self.permissions.check_permission(
                        &actor_id,
                        PERMISSION_RESOURCE,
                        DELETE_PERMISSION_ACTION,
                        Some(&request.event.location_id),
                    )
                {
                    return Err(EngineError::Forbidden(format!(
                        "{actor_id} may not delete request {}",
                        request.id
                    )));
                }

                let removed = store
                    .remove_request(request_id)
                    .ok_or_else(|| EngineError::RequestNotFound(request_id.to_string()))?;
                Ok((removed, true))
            })
        })
    }

    /// Fetch one request.
    pub fn get_request(&self, request_id: &str) -> Result<Request, EngineError> {
        let store = self.load()?;
        store
            .request(request_id)
            .cloned()
            .ok_or_else(|| EngineError::RequestNotFound(request_id.to_string()))
    }

    /// The per-actor action list for display. Unknown actors resolve a
    /// bare reference and collapse to view-only.
    pub fn get_available_actions(
        &self,
        request_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RequestCapability>, EngineError> {
        let store = self.load()?;
        let request = store
            .request(request_id)
            .ok_or_else(|| EngineError::RequestNotFound(request_id.to_string()))?;
        let actor = self.directory.actor_ref(actor_id);
        Ok(available_actions_for(&actor, request, &self.permissions, now))
    }

    /// List requests, filtered, in deterministic id order.
    pub fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, EngineError> {
        let store = self.load()?;
        Ok(store
            .requests()
            .filter(|request| {
                filter
                    .status
                    .is_none_or(|status| request.status == status)
                    && filter.coordinator_id.as_deref().is_none_or(|id| {
                        request.is_valid_coordinator(id) || request.is_assigned_reviewer(id)
                    })
                    && filter
                        .requester_id
                        .as_deref()
                        .is_none_or(|id| request.is_requester(id))
            })
            .cloned()
            .collect())
    }

    fn load(&self) -> Result<RequestStore, EngineError> {
        RequestStore::load_jsonl(self.journal.path()).map_err(EngineError::from)
    }

    fn mutate<T>(
        &self,
        mutator: impl FnOnce(&mut RequestStore) -> Result<(T, bool), EngineError>,
    ) -> Result<T, EngineError> {
        self.journal.mutate(mutator).map_err(EngineError::from)
    }

    fn with_conflict_retry<T>(
        &self,
        mut operation: impl FnMut() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut attempt: u32 = 0;
        loop {
            match operation() {
                Err(err) if err.retryable() && attempt < self.settings.conflict_retry_limit => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "retrying after conflict");
                    std::thread::sleep(std::time::Duration::from_millis(25 * u64::from(attempt)));
                }
                other => return other,
            }
        }
    }

    /// Dispatch failures are logged and swallowed; the mutation that
    /// produced the event has already committed.
    fn emit(&self, event: RequestEvent) {
        if let Err(err) = self.dispatcher.dispatch(&event) {
            tracing::warn!(
                event_id = %event.event_id,
                request_id = %event.request_id,
                error = %err,
                "event dispatch failed"
            );
        }
    }
}

fn check_expected_version(request: &Request, expected: Option<u64>) -> Result<(), EngineError> {
    if let Some(expected) = expected
        && request.version != expected
    {
        return Err(EngineError::VersionMismatch {
            request_id: request.id.clone(),
            expected,
            actual: request.version,
        });
    }
    Ok(())
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{2}:\d{2}$").expect("time pattern compiles"))
}

fn validate_title(title: &str) -> Result<(), EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

fn validate_date(field: &str, value: &str) -> Result<(), EngineError> {
    if !date_pattern().is_match(value) || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err(EngineError::Validation(format!(
            "{field} must be a valid YYYY-MM-DD date (got {value:?})"
        )));
    }
    Ok(())
}

fn validate_time(field: &str, value: &str) -> Result<(), EngineError> {
    if !time_pattern().is_match(value) || NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        return Err(EngineError::Validation(format!(
            "{field} must be a valid HH:MM time (got {value:?})"
        )));
    }
    Ok(())
}

fn validate_time_order(start: &str, end: &str) -> Result<(), EngineError> {
    let parsed_start = NaiveTime::parse_from_str(start, "%H:%M");
    let parsed_end = NaiveTime::parse_from_str(end, "%H:%M");
    if let (Ok(parsed_start), Ok(parsed_end)) = (parsed_start, parsed_end)
        && parsed_end <= parsed_start
    {
        return Err(EngineError::Validation(format!(
            "end_time {end} must be after start_time {start}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{NullDispatcher, StaticCoverage, StaticDirectory, UserRecord};
    use chrono::TimeZone;
    use docket_core::{CoordinatorSnapshot, GrantBook};
    use docket_core::resolver::{REQUESTER_PERMISSION_ACTION, REVIEWER_PERMISSION_ACTION};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    type TestEngine = Engine<StaticDirectory, StaticCoverage, GrantBook, NullDispatcher>;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("fixed time")
    }

    fn temp_requests_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("docket-engine-{prefix}-{unique}"));
        std::fs::create_dir_all(&root).expect("temp dir should be created");
        root.join("requests.jsonl")
    }

    fn coordinator(id: &str, name: &str) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            user_id: id.to_string(),
            name: name.to_string(),
            authority: "district".to_string(),
            organization_type: "municipal".to_string(),
        }
    }

    fn engine(prefix: &str) -> TestEngine {
        let mut directory = StaticDirectory::new();
        directory.insert(
            "stake-1",
            UserRecord {
                name: "Sam".to_string(),
                role: "stakeholder".to_string(),
                authority: "local".to_string(),
            },
        );
        for (id, name) in [("coord-a", "Ada"), ("coord-b", "Ben")] {
            directory.insert(
                id,
                UserRecord {
                    name: name.to_string(),
                    role: "coordinator".to_string(),
                    authority: "district".to_string(),
                },
            );
        }
        directory.insert(
            "admin-1",
            UserRecord {
                name: "Avery".to_string(),
                role: "admin".to_string(),
                authority: "global".to_string(),
            },
        );

        let mut coverage = StaticCoverage::new();
        coverage.insert(
            "loc-north",
            vec![coordinator("coord-a", "Ada"), coordinator("coord-b", "Ben")],
        );

        let mut permissions = GrantBook::new();
        permissions.allow("stake-1", PERMISSION_RESOURCE, REQUESTER_PERMISSION_ACTION);
        permissions.allow("coord-a", PERMISSION_RESOURCE, REVIEWER_PERMISSION_ACTION);
        permissions.allow("coord-b", PERMISSION_RESOURCE, REVIEWER_PERMISSION_ACTION);
        permissions.allow_all("admin-1");

        Engine::new(
            temp_requests_path(prefix),
            EngineSettings::default(),
            directory,
            coverage,
            permissions,
            NullDispatcher,
        )
    }

    fn new_request() -> NewRequest {
        NewRequest {
            requester_id: "stake-1".to_string(),
            title: "Street fair".to_string(),
            event_date: "2026-04-10".to_string(),
            start_time: "10:00".to_string(),
            end_time: "16:00".to_string(),
            location_id: "loc-north".to_string(),
            notes: String::new(),
            parent_request_id: None,
        }
    }

    fn act(request_id: &str, actor_id: &str, action: RequestAction) -> ExecuteAction {
        ExecuteAction {
            request_id: request_id.to_string(),
            actor_id: actor_id.to_string(),
            action,
            notes: String::new(),
            reschedule: None,
            expected_version: None,
        }
    }

    #[test]
    fn create_assigns_first_eligible_coordinator_and_opens_reviewer_turn() {
        let engine = engine("create");
        let now = fixed_now();
        let request = engine.create_request(new_request(), now).expect("create succeeds");

        assert_eq!(request.id, "req-1");
        assert_eq!(request.status, RequestStatus::PendingReview);
        let reviewer = request.reviewer.as_ref().expect("reviewer assigned");
        assert_eq!(reviewer.user_id, "coord-a");
        assert!(reviewer.auto_assigned);
        assert_eq!(reviewer.assignment_rule, ASSIGNMENT_RULE_COVERAGE);
        assert_eq!(request.valid_coordinators.len(), 2);
        let responder = request.active_responder.as_ref().expect("turn is open");
        assert_eq!(responder.relationship, Relationship::Reviewer);
        assert_eq!(request.version, 1);
        assert_eq!(request.status_history.len(), 1);
    }

    #[test]
    fn create_rejects_uncovered_location_and_unknown_requester() {
        let engine = engine("create-invalid");
        let now = fixed_now();

        let mut command = new_request();
        command.location_id = "loc-nowhere".to_string();
        let err = engine.create_request(command, now).expect_err("no coverage");
        assert_eq!(err.kind(), "validation_error");

        let mut command = new_request();
        command.requester_id = "ghost-1".to_string();
        let err = engine.create_request(command, now).expect_err("unknown requester");
        assert_eq!(err.kind(), "user_not_found");

        let mut command = new_request();
        command.end_time = "09:00".to_string();
        let err = engine.create_request(command, now).expect_err("inverted range");
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn accept_finalizes_and_clears_the_turn() {
        let engine = engine("accept");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let request = engine
            .execute_action(act("req-1", "coord-a", RequestAction::Accept), now)
            .expect("accept succeeds");
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.active_responder.is_none());
        assert_eq!(
            request.decision_history.last().expect("decision logged").decision,
            DecisionKind::Accept
        );
    }

    #[test]
    fn any_eligible_coordinator_may_decide_an_unclaimed_request() {
        let engine = engine("broadcast");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        // coord-b is not the assigned reviewer but the request is
        // unclaimed broadcast state.
        let request = engine
            .execute_action(act("req-1", "coord-b", RequestAction::Reject), now)
            .expect("reject succeeds");
        assert_eq!(request.status, RequestStatus::Rejected);
    }

    #[test]
    fn reschedule_requires_payload_and_flips_the_turn() {
        let engine = engine("reschedule");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let err = engine
            .execute_action(act("req-1", "coord-a", RequestAction::Reschedule), now)
            .expect_err("missing payload");
        assert_eq!(err.kind(), "validation_error");

        let mut command = act("req-1", "coord-a", RequestAction::Reschedule);
        command.reschedule = Some(ReschedulePayload {
            proposed_date: "2026-04-12".to_string(),
            proposed_start_time: "11:00".to_string(),
            proposed_end_time: "15:00".to_string(),
            notes: "venue conflict".to_string(),
        });
        let request = engine
            .execute_action(command, now)
            .expect("reschedule succeeds");
        assert_eq!(request.status, RequestStatus::ReviewRescheduled);
        let proposal = request.reschedule_proposal.as_ref().expect("proposal stored");
        assert_eq!(proposal.proposed_by, "coord-a");
        let responder = request.active_responder.as_ref().expect("turn flipped");
        assert_eq!(responder.relationship, Relationship::Requester);
        assert_eq!(responder.user_id, "stake-1");
    }

    #[test]
    fn requester_confirm_settles_a_reschedule_and_clears_the_proposal() {
        let engine = engine("confirm");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let mut command = act("req-1", "coord-a", RequestAction::Reschedule);
        command.reschedule = Some(ReschedulePayload {
            proposed_date: "2026-04-12".to_string(),
            proposed_start_time: "11:00".to_string(),
            proposed_end_time: "15:00".to_string(),
            notes: String::new(),
        });
        engine.execute_action(command, now).expect("reschedule succeeds");

        let request = engine
            .execute_action(act("req-1", "stake-1", RequestAction::Confirm), now)
            .expect("confirm succeeds");
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.reschedule_proposal.is_none());
        assert!(request.active_responder.is_none());
        // Confirm records as accept in the decision log.
        assert_eq!(
            request.decision_history.last().expect("decision logged").decision,
            DecisionKind::Accept
        );
    }

    #[test]
    fn off_turn_action_is_rejected() {
        let engine = engine("off-turn");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let mut command = act("req-1", "stake-1", RequestAction::Reschedule);
        command.reschedule = Some(ReschedulePayload {
            proposed_date: "2026-04-12".to_string(),
            proposed_start_time: "11:00".to_string(),
            proposed_end_time: "15:00".to_string(),
            notes: String::new(),
        });
        let err = engine
            .execute_action(command, now)
            .expect_err("reviewer owns the opening turn");
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let engine = engine("version");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let mut command = act("req-1", "coord-a", RequestAction::Accept);
        command.expected_version = Some(0); // create committed version 1
        let err = engine.execute_action(command, now).expect_err("stale version");
        assert_eq!(err.kind(), "conflict");
        // The mismatch repeats identically on retry, so it is not
        // eligible for the automatic retry budget.
        assert!(!err.retryable());
        assert!(matches!(
            err,
            EngineError::VersionMismatch {
                expected: 0,
                actual: 1,
                ..
            }
        ));

        let mut command = act("req-1", "coord-a", RequestAction::Accept);
        command.expected_version = Some(1);
        engine
            .execute_action(command, now)
            .expect("matching version succeeds");
    }

    #[test]
    fn cancel_covers_pending_and_approved_but_not_terminal() {
        let engine = engine("cancel");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let err = engine
            .cancel_request("req-1", "coord-a", "", None, now)
            .expect_err("cancel is requester-facing");
        assert_eq!(err.kind(), "forbidden");

        let request = engine
            .cancel_request("req-1", "stake-1", "plans changed", None, now)
            .expect("requester cancels a pending request");
        assert_eq!(request.status, RequestStatus::Cancelled);
        assert!(request.active_responder.is_none());

        let err = engine
            .cancel_request("req-1", "stake-1", "", None, now)
            .expect_err("terminal request cannot cancel again");
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[test]
    fn update_is_requester_only_and_pending_only() {
        let engine = engine("update");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let command = UpdateRequest {
            request_id: "req-1".to_string(),
            actor_id: "stake-1".to_string(),
            title: Some("Street fair (amended)".to_string()),
            notes: Some("now with rain date".to_string()),
            ..UpdateRequest::default()
        };
        let request = engine.update_request(command, now).expect("update succeeds");
        assert_eq!(request.event.title, "Street fair (amended)");
        assert_eq!(
            request.status_history.last().expect("history appended").note,
            "request details updated"
        );

        let command = UpdateRequest {
            request_id: "req-1".to_string(),
            actor_id: "coord-a".to_string(),
            title: Some("hijacked".to_string()),
            ..UpdateRequest::default()
        };
        let err = engine.update_request(command, now).expect_err("reviewer may not edit");
        assert_eq!(err.kind(), "forbidden");

        engine
            .execute_action(act("req-1", "coord-a", RequestAction::Accept), now)
            .expect("accept succeeds");
        let command = UpdateRequest {
            request_id: "req-1".to_string(),
            actor_id: "stake-1".to_string(),
            title: Some("too late".to_string()),
            ..UpdateRequest::default()
        };
        let err = engine.update_request(command, now).expect_err("approved is frozen");
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn claim_narrows_actions_and_release_restores_them() {
        let engine = engine("claim");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let outcome = engine
            .claim("req-1", "coord-b", None, ClaimWindow::Active, now)
            .expect("claim succeeds");
        assert_eq!(outcome.lease.holder_id, "coord-b");
        assert_eq!(
            outcome.lease.expires_at,
            now + chrono::Duration::seconds(engine.settings().active_ttl_seconds)
        );

        let err = engine
            .execute_action(act("req-1", "coord-a", RequestAction::Accept), now)
            .expect_err("non-holder is blocked");
        assert_eq!(err.kind(), "forbidden");
        assert_eq!(
            engine
                .get_available_actions("req-1", "coord-a", now)
                .expect("actions resolve"),
            vec![RequestCapability::View]
        );

        engine.release("req-1", "coord-b", now).expect("release succeeds");
        engine
            .execute_action(act("req-1", "coord-a", RequestAction::Accept), now)
            .expect("released request is decidable again");
    }

    #[test]
    fn override_requires_grant_and_reassigns_within_frozen_set() {
        let engine = engine("override");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let err = engine
            .override_reviewer("req-1", "coord-b", "coord-b", now)
            .expect_err("coordinators may not self-assign by override");
        assert_eq!(err.kind(), "forbidden");

        let outcome = engine
            .override_reviewer("req-1", "admin-1", "coord-b", now)
            .expect("admin override succeeds");
        assert_eq!(outcome.previous.expect("previous recorded").user_id, "coord-a");
        let reviewer = outcome.request.reviewer.expect("reviewer assigned");
        assert_eq!(reviewer.user_id, "coord-b");
        assert_eq!(reviewer.assignment_rule, ASSIGNMENT_RULE_OVERRIDE);
    }

    #[test]
    fn delete_only_accepts_settled_requests_with_the_grant() {
        let engine = engine("delete");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let err = engine
            .delete_request("req-1", "admin-1")
            .expect_err("pending request cannot be deleted");
        assert_eq!(err.kind(), "validation_error");

        engine
            .execute_action(act("req-1", "coord-a", RequestAction::Reject), now)
            .expect("reject succeeds");

        let err = engine
            .delete_request("req-1", "stake-1")
            .expect_err("requester lacks the delete grant");
        assert_eq!(err.kind(), "forbidden");

        let removed = engine
            .delete_request("req-1", "admin-1")
            .expect("admin delete succeeds");
        assert_eq!(removed.id, "req-1");
        let err = engine.get_request("req-1").expect_err("request is gone");
        assert_eq!(err.kind(), "request_not_found");
    }

    #[test]
    fn resubmission_chains_lineage_from_a_rejected_parent() {
        let engine = engine("lineage");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");

        let mut command = new_request();
        command.parent_request_id = Some("req-1".to_string());
        let err = engine
            .create_request(command, now)
            .expect_err("parent must be rejected first");
        assert_eq!(err.kind(), "validation_error");

        engine
            .execute_action(act("req-1", "coord-a", RequestAction::Reject), now)
            .expect("reject succeeds");

        let mut command = new_request();
        command.parent_request_id = Some("req-1".to_string());
        let resubmitted = engine
            .create_request(command, now)
            .expect("resubmission succeeds");
        assert_eq!(resubmitted.id, "req-2");
        assert_eq!(resubmitted.lineage.number, 2);
        assert_eq!(resubmitted.lineage.parent_request_id.as_deref(), Some("req-1"));
        assert_eq!(resubmitted.lineage.supersedes, vec!["req-1".to_string()]);
    }

    #[test]
    fn list_requests_applies_conjunctive_filters() {
        let engine = engine("list");
        let now = fixed_now();
        engine.create_request(new_request(), now).expect("create succeeds");
        engine.create_request(new_request(), now).expect("second create succeeds");
        engine
            .execute_action(act("req-1", "coord-a", RequestAction::Accept), now)
            .expect("accept succeeds");

        let all = engine
            .list_requests(&RequestFilter::default())
            .expect("list succeeds");
        assert_eq!(all.len(), 2);

        let approved = engine
            .list_requests(&RequestFilter {
                status: Some(RequestStatus::Approved),
                ..RequestFilter::default()
            })
            .expect("list succeeds");
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, "req-1");

        let for_coordinator = engine
            .list_requests(&RequestFilter {
                coordinator_id: Some("coord-b".to_string()),
                ..RequestFilter::default()
            })
            .expect("list succeeds");
        assert_eq!(for_coordinator.len(), 2);

        let none = engine
            .list_requests(&RequestFilter {
                requester_id: Some("ghost-1".to_string()),
                ..RequestFilter::default()
            })
            .expect("list succeeds");
        assert!(none.is_empty());
    }
}
