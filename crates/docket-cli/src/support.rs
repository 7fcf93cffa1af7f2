use docket_core::{GrantBook, Request};
use docket_engine::{
    Engine, EngineError, EngineSettings, JsonlDispatcher, StaticCoverage, StaticDirectory,
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

pub const REQUESTS_FILE: &str = "requests.jsonl";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const SETTINGS_FILE: &str = "docket.toml";
pub const DIRECTORY_FILE: &str = "directory.json";
pub const GRANTS_FILE: &str = "grants.json";
pub const COVERAGE_FILE: &str = "coverage.json";

pub type CliEngine = Engine<StaticDirectory, StaticCoverage, GrantBook, JsonlDispatcher>;

/// Assemble the engine from the workspace directory: request store,
/// settings, and the three config tables. Missing files load as empty.
pub fn build_engine_or_exit(dir: &str) -> CliEngine {
    let root = PathBuf::from(dir);

    let settings = EngineSettings::load(root.join(SETTINGS_FILE)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    let directory = StaticDirectory::load_json(root.join(DIRECTORY_FILE)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    let coverage = StaticCoverage::load_json(root.join(COVERAGE_FILE)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    let permissions = load_grants_or_exit(&root.join(GRANTS_FILE));

    Engine::new(
        root.join(REQUESTS_FILE),
        settings,
        directory,
        coverage,
        permissions,
        JsonlDispatcher::new(root.join(EVENTS_FILE)),
    )
}

fn load_grants_or_exit(path: &Path) -> GrantBook {
    if !path.exists() {
        return GrantBook::new();
    }
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {}: {e}", path.display());
        std::process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error: failed to parse {}: {e}", path.display());
        std::process::exit(1);
    })
}

pub fn exit_engine_error(err: EngineError) -> ! {
    eprintln!("error[{}]: {err}", err.kind());
    std::process::exit(1);
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}

pub fn request_json(request: &Request) -> Value {
    serde_json::to_value(request).expect("request serialization")
}

/// One-line request summary used by list output.
pub fn request_line(request: &Request) -> String {
    let reviewer = request
        .reviewer
        .as_ref()
        .map(|reviewer| reviewer.user_id.as_str())
        .unwrap_or("-");
    let claim = request
        .claim
        .as_ref()
        .map(|lease| lease.holder_id.as_str())
        .unwrap_or("-");
    format!(
        "{}  {:<20} {:<10} {} {}-{}  reviewer={reviewer} claim={claim} v{}",
        request.id,
        request.status,
        request.requester.user_id,
        request.event.event_date,
        request.event.start_time,
        request.event.end_time,
        request.version,
    )
}

pub fn request_summary_json(request: &Request) -> Value {
    json!({
        "id": request.id,
        "status": request.status,
        "title": request.event.title,
        "eventDate": request.event.event_date,
        "startTime": request.event.start_time,
        "endTime": request.event.end_time,
        "locationId": request.event.location_id,
        "requester": request.requester.user_id,
        "reviewer": request.reviewer.as_ref().map(|reviewer| reviewer.user_id.clone()),
        "claimHolder": request.claim.as_ref().map(|lease| lease.holder_id.clone()),
        "version": request.version,
    })
}
