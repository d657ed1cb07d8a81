use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::{AppState, API_VERSION};

#[derive(Serialize)]
struct UpstreamHealth {
    llm: &'static str,
    directory: &'static str,
}

/// `GET /health` (spec.md §4.12, §6): liveness plus a best-effort reachability
/// probe of the directory. The LLM client has no cheap ping of its own — a
/// chat-completion call is not "cheap" — so its status stays `"unknown"`
/// unless the directory probe already shows the process is otherwise healthy.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let directory_ok = state.directory.ping().await.is_ok();
    let upstreams = UpstreamHealth {
        llm: "unknown",
        directory: if directory_ok { "ok" } else { "unreachable" },
    };
    let status = if directory_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "upstreams": upstreams,
        "timestamp": Utc::now(),
        "api_version": API_VERSION,
    }))
}
