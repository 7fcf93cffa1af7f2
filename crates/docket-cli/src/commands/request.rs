use crate::cli::RequestCommands;
use crate::support::{
    build_engine_or_exit, exit_engine_error, print_json, request_json, request_line,
    request_summary_json,
};
use chrono::Utc;
use docket_core::{RequestAction, RequestStatus};
use docket_engine::{ExecuteAction, NewRequest, RequestFilter, ReschedulePayload, UpdateRequest};
use serde_json::json;

pub fn run(dir: String, command: RequestCommands) {
    match command {
        RequestCommands::Create {
            requester,
            title,
            date,
            start,
            end,
            location,
            notes,
            parent,
            json,
        } => run_create(
            dir, requester, title, date, start, end, location, notes, parent, json,
        ),

        RequestCommands::List {
            status,
            coordinator,
            requester,
            json,
        } => run_list(dir, status, coordinator, requester, json),

        RequestCommands::Show { id, json } => run_show(dir, id, json),

        RequestCommands::Actions { id, user, json } => run_actions(dir, id, user, json),

        RequestCommands::Act {
            id,
            user,
            action,
            notes,
            proposed_date,
            proposed_start,
            proposed_end,
            expected_version,
            json,
        } => run_act(
            dir,
            id,
            user,
            action,
            notes,
            proposed_date,
            proposed_start,
            proposed_end,
            expected_version,
            json,
        ),

        RequestCommands::Update {
            id,
            user,
            title,
            date,
            start,
            end,
            notes,
            expected_version,
            json,
        } => run_update(
            dir,
            id,
            user,
            title,
            date,
            start,
            end,
            notes,
            expected_version,
            json,
        ),

        RequestCommands::Delete { id, user, json } => run_delete(dir, id, user, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_create(
    dir: String,
    requester: String,
    title: String,
    date: String,
    start: String,
    end: String,
    location: String,
    notes: String,
    parent: Option<String>,
    json_output: bool,
) {
    let engine = build_engine_or_exit(&dir);
    let request = engine
        .create_request(
            NewRequest {
                requester_id: requester,
                title,
                event_date: date,
                start_time: start,
                end_time: end,
                location_id: location,
                notes,
                parent_request_id: parent,
            },
            Utc::now(),
        )
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "request.create",
            "request": request_json(&request),
        }));
    } else {
        let reviewer = request
            .reviewer
            .as_ref()
            .map(|reviewer| reviewer.user_id.clone())
            .unwrap_or_default();
        println!(
            "docket request create\n  Id: {}\n  Status: {}\n  Reviewer: {reviewer}\n  Coordinators: {}",
            request.id,
            request.status,
            request.valid_coordinators.len(),
        );
    }
}

fn run_list(
    dir: String,
    status: Option<String>,
    coordinator: Option<String>,
    requester: Option<String>,
    json_output: bool,
) {
    let status = status.map(|raw| {
        RequestStatus::parse_strict(&raw).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        })
    });

    let engine = build_engine_or_exit(&dir);
    let requests = engine
        .list_requests(&RequestFilter {
            status,
            coordinator_id: coordinator,
            requester_id: requester,
        })
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        let items: Vec<_> = requests.iter().map(request_summary_json).collect();
        print_json(&json!({
            "action": "request.list",
            "count": items.len(),
            "requests": items,
        }));
    } else {
        println!("docket request list ({})", requests.len());
        for request in &requests {
            println!("  {}", request_line(request));
        }
    }
}

fn run_show(dir: String, id: String, json_output: bool) {
    let engine = build_engine_or_exit(&dir);
    let request = engine
        .get_request(&id)
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "request.show",
            "request": request_json(&request),
        }));
    } else {
        println!(
            "docket request show\n  Id: {}\n  Status: {}\n  Title: {}\n  When: {} {}-{}\n  Location: {}\n  Requester: {} ({})",
            request.id,
            request.status,
            request.event.title,
            request.event.event_date,
            request.event.start_time,
            request.event.end_time,
            request.event.location_id,
            request.requester.user_id,
            request.requester.name,
        );
        if let Some(reviewer) = &request.reviewer {
            println!(
                "  Reviewer: {} ({}) [{}]",
                reviewer.user_id, reviewer.name, reviewer.assignment_rule
            );
        }
        if let Some(lease) = &request.claim {
            println!(
                "  Claim: {} until {}",
                lease.holder_id,
                lease.expires_at.to_rfc3339()
            );
        }
        if let Some(proposal) = &request.reschedule_proposal {
            println!(
                "  Proposed: {} {}-{} by {}",
                proposal.proposed_date,
                proposal.proposed_start_time,
                proposal.proposed_end_time,
                proposal.proposed_by,
            );
        }
        if let Some(responder) = &request.active_responder {
            println!(
                "  Awaiting: {} ({})",
                responder.user_id,
                responder.relationship.as_str()
            );
        }
        println!("  Version: {}", request.version);
    }
}

fn run_actions(dir: String, id: String, user: String, json_output: bool) {
    let engine = build_engine_or_exit(&dir);
    let capabilities = engine
        .get_available_actions(&id, &user, Utc::now())
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "request.actions",
            "requestId": id,
            "user": user,
            "actions": capabilities,
        }));
    } else {
        let names: Vec<&str> = capabilities
            .iter()
            .map(|capability| capability.as_str())
            .collect();
        println!(
            "docket request actions\n  Request: {id}\n  User: {user}\n  Actions: {}",
            names.join(", ")
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn run_act(
    dir: String,
    id: String,
    user: String,
    action: String,
    notes: String,
    proposed_date: Option<String>,
    proposed_start: Option<String>,
    proposed_end: Option<String>,
    expected_version: Option<u64>,
    json_output: bool,
) {
    let action: RequestAction = action.parse().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let reschedule = match (proposed_date, proposed_start, proposed_end) {
        (None, None, None) => None,
        (Some(date), Some(start), Some(end)) => Some(ReschedulePayload {
            proposed_date: date,
            proposed_start_time: start,
            proposed_end_time: end,
            notes: notes.clone(),
        }),
        _ => {
            eprintln!(
                "error: a reschedule needs --proposed-date, --proposed-start, and --proposed-end together"
            );
            std::process::exit(1);
        }
    };

    let engine = build_engine_or_exit(&dir);
    let request = engine
        .execute_action(
            ExecuteAction {
                request_id: id,
                actor_id: user.clone(),
                action,
                notes,
                reschedule,
                expected_version,
            },
            Utc::now(),
        )
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "request.act",
            "executed": action.as_str(),
            "user": user,
            "request": request_json(&request),
        }));
    } else {
        let awaiting = request
            .active_responder
            .as_ref()
            .map(|responder| responder.user_id.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "docket request act\n  Request: {}\n  Action: {} by {user}\n  Status: {}\n  Awaiting: {awaiting}\n  Version: {}",
            request.id,
            action.as_str(),
            request.status,
            request.version,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn run_update(
    dir: String,
    id: String,
    user: String,
    title: Option<String>,
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    notes: Option<String>,
    expected_version: Option<u64>,
    json_output: bool,
) {
    let engine = build_engine_or_exit(&dir);
    let request = engine
        .update_request(
            UpdateRequest {
                request_id: id,
                actor_id: user,
                title,
                event_date: date,
                start_time: start,
                end_time: end,
                notes,
                expected_version,
            },
            Utc::now(),
        )
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "request.update",
            "request": request_json(&request),
        }));
    } else {
        println!(
            "docket request update\n  Id: {}\n  Title: {}\n  When: {} {}-{}\n  Version: {}",
            request.id,
            request.event.title,
            request.event.event_date,
            request.event.start_time,
            request.event.end_time,
            request.version,
        );
    }
}

fn run_delete(dir: String, id: String, user: String, json_output: bool) {
    let engine = build_engine_or_exit(&dir);
    let removed = engine
        .delete_request(&id, &user)
        .unwrap_or_else(|e| exit_engine_error(e));

    if json_output {
        print_json(&json!({
            "action": "request.delete",
            "deleted": removed.id,
            "status": removed.status,
        }));
    } else {
        println!(
            "docket request delete\n  Deleted: {} [{}]",
            removed.id, removed.status
        );
    }
}
