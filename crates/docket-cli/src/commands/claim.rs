use crate::support::{build_engine_or_exit, exit_engine_error, print_json};
use chrono::Utc;
use docket_store::claim::ClaimWindow;
use serde_json::json;

pub fn run_claim(dir: String, id: String, user: String, ttl: Option<i64>, hold: bool, json_output: bool) {
    let window = if hold {
        ClaimWindow::Hold
    } else {
        ClaimWindow::Active
    };

    let engine = build_engine_or_exit(&dir);
    let outcome = engine
        .claim(&id, &user, ttl, window, Utc::now())
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "claim",
            "requestId": id,
            "holder": outcome.lease.holder_id,
            "claimedAt": outcome.lease.claimed_at.to_rfc3339(),
            "expiresAt": outcome.lease.expires_at.to_rfc3339(),
            "alreadyHeld": outcome.already_held,
        }));
    } else {
        let note = if outcome.already_held {
            " (already held)"
        } else {
            ""
        };
        println!(
            "docket claim\n  Request: {id}\n  Holder: {}{note}\n  Expires: {}",
            outcome.lease.holder_id,
            outcome.lease.expires_at.to_rfc3339(),
        );
    }
}

pub fn run_release(dir: String, id: String, user: String, json_output: bool) {
    let engine = build_engine_or_exit(&dir);
    let outcome = engine
        .release(&id, &user, Utc::now())
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "release",
            "requestId": id,
            "user": user,
            "released": outcome.released,
        }));
    } else {
        let state = if outcome.released {
            "released"
        } else {
            "no active lease held"
        };
        println!("docket release\n  Request: {id}\n  Result: {state}");
    }
}

pub fn run_override(dir: String, id: String, user: String, coordinator: String, json_output: bool) {
    let engine = build_engine_or_exit(&dir);
    let outcome = engine
        .override_reviewer(&id, &user, &coordinator, Utc::now())
        .unwrap_or_else(|e| exit_engine_error(e));

    let previous = outcome
        .previous
        .as_ref()
        .map(|reviewer| reviewer.user_id.clone());
    if json_output {
        print_json(&json!({
            "action": "override",
            "requestId": id,
            "admin": user,
            "reviewer": coordinator,
            "previousReviewer": previous,
        }));
    } else {
        println!(
            "docket override\n  Request: {id}\n  Reviewer: {} -> {coordinator}\n  By: {user}",
            previous.unwrap_or_else(|| "-".to_string()),
        );
    }
}
