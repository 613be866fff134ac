use std::sync::Arc;

use models::{Envelope, Error, ErrorCode, ToolContent, ToolResponse};
use serde_json::Value;

use crate::auth::TOKEN_OPTIONAL_TOOLS;
use crate::{tools, App, RequestCredentials};

/// The closed set of tool names exposed by the RPC surface.
pub const TOOL_NAMES: &[&str] = &[
    "ping",
    "help",
    "list_templates",
    "get_template_details",
    "list_template_fragments",
    "get_fragment_details",
    "list_styles",
    "list_themes",
    "list_handlers",
    "create_document_session",
    "get_session_status",
    "list_active_sessions",
    "abort_document_session",
    "validate_parameters",
    "set_global_parameters",
    "add_fragment",
    "add_image_fragment",
    "add_plot_fragment",
    "remove_fragment",
    "list_session_fragments",
    "get_document",
    "render_graph",
    "get_image",
    "list_images",
];

/// Dispatch one tool call: resolve the caller's credential, inject the
/// acting group into the validated arguments, run the handler, and fold any
/// failure into the uniform error envelope.
pub async fn dispatch_tool_call(
    app: &Arc<App>,
    name: &str,
    arguments: Value,
    credentials: &RequestCredentials,
) -> ToolResponse {
    tracing::info!(tool = name, "tool invocation started");

    let Value::Object(mut arguments) = arguments else {
        return error_response(&Error::new(
            ErrorCode::InvalidArguments,
            "Tool arguments must be a JSON object",
        ));
    };

    if !TOOL_NAMES.contains(&name) {
        tracing::warn!(tool = name, "unknown tool requested");
        return error_response(
            &Error::new(
                ErrorCode::UnknownTool,
                format!("Tool '{name}' does not exist in this service."),
            )
            .with_recovery(format!(
                "Available tools: {}. Check for typos in the tool name.",
                TOOL_NAMES.join(", ")
            )),
        );
    }

    let require_token = !TOKEN_OPTIONAL_TOOLS.contains(&name);
    let acting_group = match app
        .gate
        .resolve_tool_call(&arguments, credentials, require_token)
    {
        Ok(group) => group,
        Err(err) => return error_response(&err),
    };

    // The verified group overwrites any caller-supplied one; handlers never
    // trust a group from the payload.
    match acting_group {
        Some(group) => {
            tracing::debug!(tool = name, group, "authenticated group injected");
            arguments.insert("group".to_string(), Value::String(group));
        }
        None => {
            arguments
                .entry("group".to_string())
                .or_insert_with(|| Value::String(models::DEFAULT_GROUP.to_string()));
        }
    }

    let result = run_handler(app, name, arguments).await;
    match result {
        Ok(response) => {
            tracing::info!(tool = name, "tool completed successfully");
            response
        }
        Err(err) => {
            tracing::warn!(tool = name, code = %err.code, error = %err.message, "tool failed");
            error_response(&err)
        }
    }
}

async fn run_handler(
    app: &Arc<App>,
    name: &str,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    match name {
        "ping" => tools::discovery::ping(),
        "help" => tools::discovery::help(),
        "list_templates" => tools::discovery::list_templates(app, arguments),
        "get_template_details" => tools::discovery::get_template_details(app, arguments),
        "list_template_fragments" => tools::discovery::list_template_fragments(app, arguments),
        "get_fragment_details" => tools::discovery::get_fragment_details(app, arguments),
        "list_styles" => tools::discovery::list_styles(app, arguments),
        "list_themes" => tools::plots::list_themes(),
        "list_handlers" => tools::plots::list_handlers(),
        "create_document_session" => tools::sessions::create_session(app, arguments).await,
        "get_session_status" => tools::sessions::get_session_status(app, arguments).await,
        "list_active_sessions" => tools::sessions::list_active_sessions(app, arguments).await,
        "abort_document_session" => tools::sessions::abort_session(app, arguments).await,
        "validate_parameters" => tools::validation::validate_parameters(app, arguments),
        "set_global_parameters" => tools::fragments::set_global_parameters(app, arguments).await,
        "add_fragment" => tools::fragments::add_fragment(app, arguments).await,
        "add_image_fragment" => tools::fragments::add_image_fragment(app, arguments).await,
        "add_plot_fragment" => tools::plots::add_plot_fragment(app, arguments).await,
        "remove_fragment" => tools::fragments::remove_fragment(app, arguments).await,
        "list_session_fragments" => tools::fragments::list_session_fragments(app, arguments).await,
        "get_document" => tools::rendering::get_document(app, arguments).await,
        "render_graph" => tools::plots::render_graph(app, arguments).await,
        "get_image" => tools::plots::get_image(app, arguments).await,
        "list_images" => tools::plots::list_images(app, arguments),
        _ => unreachable!("checked against TOOL_NAMES"),
    }
}

fn error_response(err: &Error) -> ToolResponse {
    vec![ToolContent::json(&Envelope::from(err))]
}
