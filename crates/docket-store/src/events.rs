//! Append-only request event log.
//!
//! `request.event.v1` is the minimal envelope emitted on successful
//! mutations (assignment, claim, release). Event ids are deterministic:
//! two writers emitting the same semantic event derive the same id, so
//! downstream consumers can dedupe. Delivery attempts carry their own
//! random `dispatch_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::Path;
use uuid::Uuid;

pub const REQUEST_EVENT_SCHEMA: &str = "request.event.v1";

fn default_request_event_schema() -> String {
    REQUEST_EVENT_SCHEMA.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RequestEventAction {
    CoordinatorAssigned {
        coordinator_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_coordinator_id: Option<String>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        assignment_rule: String,
    },
    RequestClaimed {
        holder_id: String,
        expires_at: DateTime<Utc>,
    },
    RequestReleased {
        holder_id: String,
    },
}

impl RequestEventAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CoordinatorAssigned { .. } => "coordinator_assigned",
            Self::RequestClaimed { .. } => "request_claimed",
            Self::RequestReleased { .. } => "request_released",
        }
    }

    fn subject(&self) -> &str {
        match self {
            Self::CoordinatorAssigned { coordinator_id, .. } => coordinator_id,
            Self::RequestClaimed { holder_id, .. } => holder_id,
            Self::RequestReleased { holder_id } => holder_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    #[serde(default = "default_request_event_schema")]
    pub schema: String,
    pub event_id: String,
    /// Unique per emission; distinguishes redeliveries of the same
    /// semantic event.
    pub dispatch_id: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub action: RequestEventAction,
}

impl RequestEvent {
    pub fn new(
        request_id: impl Into<String>,
        actor: impl Into<String>,
        occurred_at: DateTime<Utc>,
        action: RequestEventAction,
    ) -> Self {
        let request_id = request_id.into();
        let event_id = compute_event_id(&request_id, &action, occurred_at);
        Self {
            schema: REQUEST_EVENT_SCHEMA.to_string(),
            event_id,
            dispatch_id: Uuid::new_v4().to_string(),
            request_id,
            actor: actor.into(),
            occurred_at,
            action,
        }
    }
}

/// Deterministic event id: `ev1_` plus base32hex of the SHA-256 over
/// the semantic key fields.
pub fn compute_event_id(
    request_id: &str,
    action: &RequestEventAction,
    occurred_at: DateTime<Utc>,
) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        REQUEST_EVENT_SCHEMA,
        request_id,
        action.kind(),
        action.subject(),
        occurred_at.to_rfc3339(),
    );
    let hash = Sha256::digest(key.as_bytes());
    format!("ev1_{}", base32hex_lower_no_pad(&hash))
}

/// RFC 4648 base32hex encoding, lowercase, without padding.
fn base32hex_lower_no_pad(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";

    let mut result = String::new();
    let mut bits: u64 = 0;
    let mut num_bits: u32 = 0;

    for &byte in data {
        bits = (bits << 8) | (byte as u64);
        num_bits += 8;

        while num_bits >= 5 {
            num_bits -= 5;
            let idx = ((bits >> num_bits) & 0x1f) as usize;
            result.push(ALPHABET[idx] as char);
        }
    }

    if num_bits > 0 {
        let idx = ((bits << (5 - num_bits)) & 0x1f) as usize;
        result.push(ALPHABET[idx] as char);
    }

    result
}

pub fn read_events(reader: impl BufRead) -> Result<Vec<RequestEvent>, EventError> {
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| EventError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: RequestEvent = serde_json::from_str(trimmed)
            .map_err(|e| EventError::Parse(line_no + 1, e.to_string()))?;
        if event.schema != REQUEST_EVENT_SCHEMA {
            return Err(EventError::UnsupportedSchema(event.schema));
        }
        events.push(event);
    }
    Ok(events)
}

pub fn read_events_from_path(path: impl AsRef<Path>) -> Result<Vec<RequestEvent>, EventError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| EventError::Io(0, format!("{}: {e}", path.as_ref().display())))?;
    read_events(std::io::BufReader::new(file))
}

/// Append one event to the log. The log is append-only; existing lines
/// are never rewritten.
pub fn append_event_to_path(path: impl AsRef<Path>, event: &RequestEvent) -> Result<(), EventError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| EventError::Io(0, format!("{parent:?}: {e}")))?;
    }
    let line = serde_json::to_string(event).map_err(|e| EventError::Serialize(e.to_string()))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EventError::Io(0, format!("{}: {e}", path.display())))?;
    writeln!(file, "{line}").map_err(|e| EventError::Io(0, e.to_string()))?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("unsupported event schema: {0}")]
    UnsupportedSchema(String),
}
