//! # docket-store
//!
//! Persistence layer for request documents:
//! - `RequestJournal` (the JSONL file on disk, its lock file, and the
//!   lock-scoped mutation path)
//! - `RequestStore` (canonical in-memory state)
//! - claim lease primitives (acquire/release/override)
//! - the append-only request event log
//!
//! The store is the point of mutual exclusion: every conditional check
//! runs inside the lock scope that also writes the result back.
//!
//! ## Data model
//!
//! ```text
//! requests.jsonl (on disk, one line per request)  +  events.jsonl
//!     ↕  hydrate / flush (lock-scoped)
//! RequestStore (deterministic in-memory projection)
//! ```

pub mod claim;
pub mod events;
pub mod journal;
pub mod memory;

pub use claim::{
    ClaimCommand, ClaimError, ClaimOutcome, ClaimWindow, DEFAULT_ACTIVE_TTL_SECONDS,
    DEFAULT_HOLD_TTL_SECONDS, MAX_CLAIM_TTL_SECONDS, MIN_CLAIM_TTL_SECONDS, OverrideOutcome,
    ReleaseOutcome, claim_request, override_reviewer, release_request,
};
pub use events::{
    EventError, REQUEST_EVENT_SCHEMA, RequestEvent, RequestEventAction, append_event_to_path,
    compute_event_id, read_events, read_events_from_path,
};
pub use journal::{JournalError, RequestJournal, StoreMutationError};
pub use memory::{RequestStore, RequestStoreError};
