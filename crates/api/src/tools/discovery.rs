use std::sync::Arc;

use models::{Error, ErrorCode, ToolResponse};
use serde_json::{json, Value};

use crate::tools::{ok, parse_input};
use crate::App;

pub(crate) fn ping() -> Result<ToolResponse, Error> {
    ok(json!({
        "service": "folio",
        "status": "ok",
        "timestamp": models::timestamp_now(),
    }))
}

pub(crate) fn help() -> Result<ToolResponse, Error> {
    let tools: Vec<Value> = crate::TOOL_NAMES
        .iter()
        .map(|name| json!({"name": name, "description": describe(name)}))
        .collect();
    ok(json!({"tools": tools}))
}

fn describe(tool: &str) -> &'static str {
    match tool {
        "ping" => "Health check; returns service name and timestamp",
        "help" => "List every tool with a one-line description",
        "list_templates" => "List available document templates",
        "get_template_details" => "Template metadata and global parameter schema",
        "list_template_fragments" => "Fragment types a template admits",
        "get_fragment_details" => "Parameter schema of one fragment type",
        "list_styles" => "List available styles",
        "list_themes" => "List chart themes",
        "list_handlers" => "List chart types and their handlers",
        "create_document_session" => "Start a new document session from a template",
        "get_session_status" => "Session summary: parameters set, fragment count",
        "list_active_sessions" => "Sessions belonging to your group",
        "abort_document_session" => "Delete a session and its aliases",
        "validate_parameters" => "Dry-run parameter validation against a schema",
        "set_global_parameters" => "Set (or replace) a session's global parameters",
        "add_fragment" => "Add a content fragment at a position",
        "add_image_fragment" => "Validate, download, and embed an image by URL",
        "add_plot_fragment" => "Embed a stored chart image into a session",
        "remove_fragment" => "Remove a fragment by instance GUID",
        "list_session_fragments" => "Fragments of a session in render order",
        "get_document" => "Render the session to HTML, PDF, or Markdown",
        "render_graph" => "Render a chart; optionally store the image",
        "get_image" => "Fetch a stored chart image by GUID or alias",
        "list_images" => "Stored chart images in your group",
        _ => "",
    }
}

#[derive(serde::Deserialize)]
struct ListInput {
    // Discovery is token-optional; listings span all groups.
    #[serde(default)]
    #[allow(dead_code)]
    group: Option<String>,
}

#[derive(serde::Deserialize)]
struct TemplateInput {
    template_id: String,
}

#[derive(serde::Deserialize)]
struct FragmentInput {
    fragment_id: String,
    #[serde(default)]
    template_id: Option<String>,
}

pub(crate) fn list_templates(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let _: ListInput = parse_input(arguments)?;
    let templates: Vec<Value> = app
        .registry
        .list_templates(None)
        .into_iter()
        .map(|t| {
            json!({
                "template_id": t.template_id,
                "name": t.name,
                "description": t.description,
                "group": t.group,
            })
        })
        .collect();
    ok(json!({"templates": templates}))
}

pub(crate) fn get_template_details(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: TemplateInput = parse_input(arguments)?;
    let entry = app
        .registry
        .find_template(&input.template_id, None)
        .ok_or_else(|| template_not_found(&input.template_id))?;

    ok(json!({
        "template_id": entry.def.template_id,
        "name": entry.def.name,
        "description": entry.def.description,
        "group": entry.def.group,
        "global_parameters": entry.def.global_parameters,
    }))
}

pub(crate) fn list_template_fragments(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: TemplateInput = parse_input(arguments)?;
    let entry = app
        .registry
        .find_template(&input.template_id, None)
        .ok_or_else(|| template_not_found(&input.template_id))?;

    let fragments: Vec<Value> = entry
        .def
        .fragments
        .iter()
        .map(|f| {
            json!({
                "fragment_id": f.fragment_id,
                "name": f.name,
                "description": f.description,
            })
        })
        .collect();
    ok(json!({
        "template_id": entry.def.template_id,
        "fragments": fragments,
    }))
}

pub(crate) fn get_fragment_details(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: FragmentInput = parse_input(arguments)?;

    // A template-declared fragment when template_id is given; a standalone
    // fragment otherwise.
    if let Some(template_id) = &input.template_id {
        let entry = app
            .registry
            .find_template(template_id, None)
            .ok_or_else(|| template_not_found(template_id))?;
        let fragment = entry.def.fragment(&input.fragment_id).ok_or_else(|| {
            fragment_not_found(&input.fragment_id)
        })?;
        return ok(json!({
            "fragment_id": fragment.fragment_id,
            "name": fragment.name,
            "description": fragment.description,
            "parameters": fragment.parameters,
        }));
    }

    let entry = app
        .registry
        .find_fragment(&input.fragment_id, None)
        .ok_or_else(|| fragment_not_found(&input.fragment_id))?;
    ok(json!({
        "fragment_id": entry.def.fragment_id,
        "name": entry.def.name,
        "description": entry.def.description,
        "group": entry.def.group,
        "parameters": entry.def.parameters,
    }))
}

pub(crate) fn list_styles(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let _: ListInput = parse_input(arguments)?;
    let styles: Vec<Value> = app
        .registry
        .list_styles(None)
        .into_iter()
        .map(|s| {
            json!({
                "style_id": s.style_id,
                "name": s.name,
                "description": s.description,
                "group": s.group,
                "default": s.default,
            })
        })
        .collect();
    ok(json!({"styles": styles}))
}

fn template_not_found(template_id: &str) -> Error {
    Error::new(
        ErrorCode::TemplateNotFound,
        format!("Template '{template_id}' not found"),
    )
}

fn fragment_not_found(fragment_id: &str) -> Error {
    Error::new(
        ErrorCode::FragmentNotFound,
        format!("Fragment '{fragment_id}' not found"),
    )
}
