use std::sync::Arc;

use models::{Error, ParameterMap, ToolResponse};
use serde_json::{json, Value};
use sessions::Position;

use crate::tools::{ok, ok_with_message, parse_input};
use crate::App;

#[derive(serde::Deserialize)]
struct SetGlobalsInput {
    session_id: String,
    parameters: ParameterMap,
    group: String,
}

#[derive(serde::Deserialize)]
struct AddFragmentInput {
    session_id: String,
    fragment_id: String,
    parameters: ParameterMap,
    #[serde(default = "default_position")]
    position: String,
    group: String,
}

#[derive(serde::Deserialize)]
struct AddImageInput {
    session_id: String,
    image_url: String,
    #[serde(default = "default_require_https")]
    require_https: bool,
    #[serde(default)]
    alt_text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    width: Option<String>,
    #[serde(default = "default_position")]
    position: String,
    group: String,
}

#[derive(serde::Deserialize)]
struct RemoveInput {
    session_id: String,
    fragment_instance_guid: String,
    group: String,
}

#[derive(serde::Deserialize)]
struct SessionInput {
    session_id: String,
    group: String,
}

fn default_position() -> String {
    "end".to_string()
}

fn default_require_https() -> bool {
    true
}

pub(crate) async fn set_global_parameters(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: SetGlobalsInput = parse_input(arguments)?;
    app.sessions
        .set_global_parameters(&input.session_id, &input.group, input.parameters)
        .await?;
    ok_with_message(
        json!({"session_id": input.session_id}),
        "Global parameters set successfully",
    )
}

pub(crate) async fn add_fragment(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: AddFragmentInput = parse_input(arguments)?;
    let position = Position::parse(&input.position)?;
    let output = app
        .sessions
        .add_fragment(
            &input.session_id,
            &input.group,
            &input.fragment_id,
            input.parameters,
            position,
        )
        .await?;
    ok_with_message(output, "Fragment added successfully")
}

/// Validate the URL out-of-band, download the bytes, and attach them to a
/// new image fragment as a data URI.
pub(crate) async fn add_image_fragment(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: AddImageInput = parse_input(arguments)?;
    let position = Position::parse(&input.position)?;

    let image = app
        .image_validator
        .validate_and_fetch(&input.image_url, input.require_https)
        .await?;

    let mut parameters = ParameterMap::new();
    parameters.insert("image_data".to_string(), Value::String(image.data_uri));
    if let Some(alt_text) = input.alt_text {
        parameters.insert("alt_text".to_string(), Value::String(alt_text));
    }
    if let Some(caption) = input.caption {
        parameters.insert("caption".to_string(), Value::String(caption));
    }
    if let Some(width) = input.width {
        parameters.insert("width".to_string(), Value::String(width));
    }

    let output = app
        .sessions
        .add_fragment(
            &input.session_id,
            &input.group,
            "image",
            parameters,
            position,
        )
        .await?;

    ok_with_message(
        json!({
            "session_id": output.session_id,
            "fragment_instance_guid": output.fragment_instance_guid,
            "position": output.position,
            "image_url": image.url,
            "content_type": image.content_type,
            "size": image.size,
        }),
        "Image validated and added successfully",
    )
}

pub(crate) async fn remove_fragment(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: RemoveInput = parse_input(arguments)?;
    app.sessions
        .remove_fragment(&input.session_id, &input.group, &input.fragment_instance_guid)
        .await?;
    ok_with_message(
        json!({
            "session_id": input.session_id,
            "fragment_instance_guid": input.fragment_instance_guid,
        }),
        "Fragment removed successfully",
    )
}

pub(crate) async fn list_session_fragments(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: SessionInput = parse_input(arguments)?;
    let listing = app
        .sessions
        .list_session_fragments(&input.session_id, &input.group)
        .await?;
    ok(listing)
}
