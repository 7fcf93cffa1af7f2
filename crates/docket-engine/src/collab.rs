//! Collaborator seams the engine depends on.
//!
//! The engine never reaches into a user database or a notification
//! system directly; it talks to these traits. The shipped
//! implementations are file-backed tables (good enough for the CLI and
//! for tests) plus a JSONL event sink.

use docket_core::{ActorRef, CoordinatorSnapshot, EventDetails};
use docket_store::{EventError, RequestEvent, append_event_to_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One known user, as the directory stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authority: String,
}

/// User lookup. The engine resolves every incoming user id through
/// here before touching the core.
pub trait Directory {
    fn user(&self, user_id: &str) -> Option<UserRecord>;

    /// Resolve a user id into an in-flight actor identity. Unknown ids
    /// yield a bare reference; callers that require a known user check
    /// `user()` explicitly.
    fn actor_ref(&self, user_id: &str) -> ActorRef {
        match self.user(user_id) {
            Some(record) => ActorRef {
                id: user_id.to_string(),
                display_name: record.name,
                role: record.role,
                authority: record.authority,
            },
            None => ActorRef::new(user_id),
        }
    }
}

/// Which coordinators cover an event. The returned set is frozen into
/// the request at creation; later coverage changes never retroactively
/// widen or narrow an existing request.
pub trait CoverageResolver {
    fn eligible_coordinators(&self, event: &EventDetails) -> Vec<CoordinatorSnapshot>;
}

/// Outbound event sink. Dispatch failures never fail the mutation that
/// produced the event.
pub trait EventDispatcher {
    fn dispatch(&self, event: &RequestEvent) -> Result<(), EventError>;
}

/// Table-backed directory loaded from a JSON object keyed by user id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticDirectory {
    users: BTreeMap<String, UserRecord>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CollabLoadError> {
        load_json_table(path.as_ref())
    }

    pub fn insert(&mut self, user_id: impl Into<String>, record: UserRecord) {
        self.users.insert(user_id.into(), record);
    }
}

impl Directory for StaticDirectory {
    fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.get(user_id).cloned()
    }
}

/// Location-keyed coverage table: `location_id -> coordinators`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCoverage {
    locations: BTreeMap<String, Vec<CoordinatorSnapshot>>,
}

impl StaticCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CollabLoadError> {
        load_json_table(path.as_ref())
    }

    pub fn insert(&mut self, location_id: impl Into<String>, coordinators: Vec<CoordinatorSnapshot>) {
        self.locations.insert(location_id.into(), coordinators);
    }
}

impl CoverageResolver for StaticCoverage {
    fn eligible_coordinators(&self, event: &EventDetails) -> Vec<CoordinatorSnapshot> {
        self.locations
            .get(&event.location_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Appends every dispatched event to a JSONL log.
#[derive(Debug, Clone)]
pub struct JsonlDispatcher {
    path: PathBuf,
}

impl JsonlDispatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventDispatcher for JsonlDispatcher {
    fn dispatch(&self, event: &RequestEvent) -> Result<(), EventError> {
        append_event_to_path(&self.path, event)
    }
}

/// Drops every event. Used where no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

impl EventDispatcher for NullDispatcher {
    fn dispatch(&self, _event: &RequestEvent) -> Result<(), EventError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollabLoadError {
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("{path}: parse error: {message}")]
    Parse { path: String, message: String },
}

fn load_json_table<T>(path: &Path) -> Result<T, CollabLoadError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path).map_err(|e| CollabLoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| CollabLoadError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventDetails {
        EventDetails {
            title: "Street fair".to_string(),
            event_date: "2026-04-10".to_string(),
            start_time: "10:00".to_string(),
            end_time: "16:00".to_string(),
            location_id: "loc-north".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn directory_resolves_known_users_into_full_actor_refs() {
        let mut directory = StaticDirectory::new();
        directory.insert(
            "coord-a",
            UserRecord {
                name: "Ada".to_string(),
                role: "coordinator".to_string(),
                authority: "district".to_string(),
            },
        );

        let actor = directory.actor_ref("coord-a");
        assert_eq!(actor.display_name, "Ada");
        assert_eq!(actor.role, "coordinator");

        let unknown = directory.actor_ref("rando-9");
        assert_eq!(unknown.id, "rando-9");
        assert!(unknown.display_name.is_empty());
        assert!(directory.user("rando-9").is_none());
    }

    #[test]
    fn coverage_resolves_by_location() {
        let mut coverage = StaticCoverage::new();
        coverage.insert(
            "loc-north",
            vec![CoordinatorSnapshot {
                user_id: "coord-a".to_string(),
                name: "Ada".to_string(),
                authority: "district".to_string(),
                organization_type: "municipal".to_string(),
            }],
        );

        let eligible = coverage.eligible_coordinators(&event());
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].user_id, "coord-a");

        let mut other = event();
        other.location_id = "loc-south".to_string();
        assert!(coverage.eligible_coordinators(&other).is_empty());
    }

    #[test]
    fn missing_table_file_loads_empty() {
        let path = std::env::temp_dir().join("docket-collab-missing.json");
        let _ = std::fs::remove_file(&path);
        let directory = StaticDirectory::load_json(&path).expect("missing file loads empty");
        assert!(directory.user("anyone").is_none());
    }

    #[test]
    fn directory_json_roundtrip_is_transparent() {
        let payload = r#"{"coord-a":{"name":"Ada","role":"coordinator","authority":"district"}}"#;
        let directory: StaticDirectory =
            serde_json::from_str(payload).expect("directory parses");
        assert_eq!(
            directory.user("coord-a").expect("user exists").name,
            "Ada"
        );
    }
}
