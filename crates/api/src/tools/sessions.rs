use std::sync::Arc;

use models::{Error, ToolResponse};
use serde_json::{json, Value};

use crate::tools::{ok, ok_with_message, parse_input};
use crate::App;

#[derive(serde::Deserialize)]
struct CreateInput {
    template_id: String,
    #[serde(default)]
    alias: Option<String>,
    group: String,
}

#[derive(serde::Deserialize)]
struct SessionInput {
    session_id: String,
    group: String,
}

#[derive(serde::Deserialize)]
struct GroupInput {
    group: String,
}

pub(crate) async fn create_session(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: CreateInput = parse_input(arguments)?;
    let output = app
        .sessions
        .create_session(&input.template_id, &input.group, input.alias.as_deref())
        .await?;
    ok_with_message(output, "Session created successfully")
}

pub(crate) async fn get_session_status(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: SessionInput = parse_input(arguments)?;
    let status = app
        .sessions
        .get_session_status(&input.session_id, &input.group)
        .await?;
    ok(status)
}

pub(crate) async fn list_active_sessions(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: GroupInput = parse_input(arguments)?;
    let sessions = app.sessions.list_active_sessions(&input.group).await?;
    ok(json!({
        "session_count": sessions.len(),
        "sessions": sessions,
    }))
}

pub(crate) async fn abort_session(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: SessionInput = parse_input(arguments)?;
    let session_id = app
        .sessions
        .abort_session(&input.session_id, &input.group)
        .await?;
    ok_with_message(
        json!({"session_id": session_id}),
        "Session terminated and all data deleted",
    )
}
