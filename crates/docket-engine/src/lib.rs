//! # docket-engine
//!
//! Orchestration over `docket-core` and `docket-store`:
//! - the `Engine` operation surface (create, act, claim, release,
//!   override, update, delete, list)
//! - collaborator seams: directory, coverage, permissions, event sink
//! - engine settings with revision-guarded updates
//! - the surface error taxonomy with stable kinds
//!
//! The engine owns no policy of its own: legality lives in the core's
//! resolver, mutual exclusion in the store's lock scope. This crate
//! wires them together, retries lost races, and emits events.

pub mod collab;
pub mod error;
pub mod ops;
pub mod settings;

pub use collab::{
    CollabLoadError, CoverageResolver, Directory, EventDispatcher, JsonlDispatcher,
    NullDispatcher, StaticCoverage, StaticDirectory, UserRecord,
};
pub use error::EngineError;
pub use ops::{
    ASSIGNMENT_RULE_COVERAGE, ASSIGNMENT_RULE_OVERRIDE, Engine, ExecuteAction, NewRequest,
    RequestFilter, ReschedulePayload, UpdateRequest,
};
pub use settings::{EngineSettings, SettingsError};
