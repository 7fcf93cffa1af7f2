//! Canonical in-memory representation of request state.
//!
//! The memory boundary for `docket-store`:
//! - load/store JSONL
//! - deterministic request queries
//! - no orchestration concerns (resolution and events live elsewhere)

use crate::journal::{JournalError, RequestJournal};
use chrono::{DateTime, Utc};
use docket_core::Request;
use std::collections::BTreeMap;
use std::path::Path;

/// Errors raised while loading or querying the request store.
#[derive(Debug, thiserror::Error)]
pub enum RequestStoreError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("request already exists: {0}")]
    RequestAlreadyExists(String),
}

/// Canonical in-memory state for request documents.
#[derive(Debug, Clone, Default)]
pub struct RequestStore {
    requests: BTreeMap<String, Request>,
}

impl RequestStore {
    /// Build a store from fully-materialized requests.
    ///
    /// Duplicate IDs resolve with deterministic last-write-wins
    /// semantics, matching append/overlay behavior in JSONL workflows.
    pub fn from_requests(requests: Vec<Request>) -> Self {
        let mut index = BTreeMap::new();
        for request in requests {
            let id = request.id.clone();
            index.insert(id, request);
        }
        Self { requests: index }
    }

    /// Load store state from a journal path. A missing file is an
    /// empty store; workspaces start with no requests.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, RequestStoreError> {
        let requests = RequestJournal::new(path.as_ref()).read()?;
        Ok(Self::from_requests(requests))
    }

    /// Persist store state to a journal path.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), RequestStoreError> {
        let requests: Vec<Request> = self.requests.values().cloned().collect();
        RequestJournal::new(path.as_ref()).write(&requests)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Lookup one request by ID.
    pub fn request(&self, id: &str) -> Option<&Request> {
        self.requests.get(id)
    }

    /// Lookup one request by ID (mutable).
    pub fn request_mut(&mut self, id: &str) -> Option<&mut Request> {
        self.requests.get_mut(id)
    }

    /// Insert a new request. Rejects an existing ID.
    pub fn insert_request(&mut self, request: Request) -> Result<(), RequestStoreError> {
        if self.requests.contains_key(&request.id) {
            return Err(RequestStoreError::RequestAlreadyExists(request.id));
        }
        self.requests.insert(request.id.clone(), request);
        Ok(())
    }

    /// Insert or replace a request by ID. Returns the previous value.
    pub fn upsert_request(&mut self, request: Request) -> Option<Request> {
        self.requests.insert(request.id.clone(), request)
    }

    /// Remove a request by ID.
    pub fn remove_request(&mut self, id: &str) -> Option<Request> {
        self.requests.remove(id)
    }

    /// Iterate all requests in deterministic ID order.
    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }

    /// Requests a coordinator can see: everything they are eligible
    /// for, assigned to, or currently holding.
    pub fn visible_to_coordinator(&self, coordinator_id: &str) -> Vec<&Request> {
        self.requests()
            .filter(|request| {
                request.is_valid_coordinator(coordinator_id)
                    || request.is_assigned_reviewer(coordinator_id)
                    || request
                        .claim
                        .as_ref()
                        .is_some_and(|lease| lease.holder_id == coordinator_id)
            })
            .collect()
    }

    /// Requests whose claim lease has lapsed as of `now`.
    pub fn stale_claims(&self, now: DateTime<Utc>) -> Vec<&Request> {
        self.requests()
            .filter(|request| {
                request.claim.is_some() && request.active_claim(now).is_none()
            })
            .collect()
    }

    /// Allocate the next `req-<n>` identifier.
    pub fn next_request_id(&self) -> String {
        let max = self
            .requests
            .keys()
            .filter_map(|id| id.strip_prefix("req-"))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("req-{}", max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_request, temp_store_path};
    use chrono::Duration;
    use docket_core::ClaimLease;

    #[test]
    fn duplicate_ids_use_last_write_wins() {
        let mut second = sample_request("req-1");
        second.event.title = "Replacement".to_string();
        let store = RequestStore::from_requests(vec![sample_request("req-1"), second]);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.request("req-1").expect("request exists").event.title,
            "Replacement"
        );
    }

    #[test]
    fn insert_request_rejects_existing_id() {
        let mut store = RequestStore::default();
        store
            .insert_request(sample_request("req-1"))
            .expect("first insert succeeds");
        let err = store
            .insert_request(sample_request("req-1"))
            .expect_err("duplicate insert errors");
        assert!(matches!(err, RequestStoreError::RequestAlreadyExists(id) if id == "req-1"));
    }

    #[test]
    fn load_jsonl_treats_missing_file_as_empty() {
        let path = temp_store_path("missing");
        let store = RequestStore::load_jsonl(&path).expect("missing file loads empty");
        assert!(store.is_empty());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let path = temp_store_path("roundtrip");
        let mut store = RequestStore::default();
        store
            .insert_request(sample_request("req-1"))
            .expect("insert succeeds");
        store.save_jsonl(&path).expect("store saves");

        let reloaded = RequestStore::load_jsonl(&path).expect("store reloads");
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.request("req-1").is_some());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn next_request_id_scans_numeric_suffixes() {
        let store = RequestStore::from_requests(vec![
            sample_request("req-2"),
            sample_request("req-11"),
            sample_request("custom-id"),
        ]);
        assert_eq!(store.next_request_id(), "req-12");
        assert_eq!(RequestStore::default().next_request_id(), "req-1");
    }

    #[test]
    fn visible_to_coordinator_covers_eligibility_assignment_and_hold() {
        let mut eligible = sample_request("req-1");
        eligible.reviewer = None;

        let mut held = sample_request("req-2");
        held.valid_coordinators.clear();
        held.reviewer = None;
        held.claim = Some(ClaimLease {
            holder_id: "coord-a".to_string(),
            claimed_at: held.created_at,
            expires_at: held.created_at + Duration::minutes(15),
        });

        let mut unrelated = sample_request("req-3");
        unrelated.valid_coordinators.clear();
        unrelated.reviewer = None;

        let store = RequestStore::from_requests(vec![eligible, held, unrelated]);
        let visible = store.visible_to_coordinator("coord-a");
        let ids: Vec<&str> = visible.iter().map(|request| request.id.as_str()).collect();
        assert_eq!(ids, vec!["req-1", "req-2"]);
    }
}
