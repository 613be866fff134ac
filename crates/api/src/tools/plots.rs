use std::sync::Arc;

use base64::Engine as _;
use models::{Error, ErrorCode, ToolContent, ToolResponse};
use plot::GraphParams;
use serde_json::{json, Value};
use sessions::Position;

use crate::tools::{ok, ok_with_message, parse_input};
use crate::App;

#[derive(serde::Deserialize)]
struct RenderGraphInput {
    #[serde(flatten)]
    params: GraphParams,
    #[serde(default)]
    save: bool,
    #[serde(default)]
    alias: Option<String>,
    group: String,
}

#[derive(serde::Deserialize)]
struct ImageInput {
    identifier: String,
    group: String,
}

#[derive(serde::Deserialize)]
struct GroupInput {
    group: String,
}

#[derive(serde::Deserialize)]
struct AddPlotInput {
    session_id: String,
    identifier: String,
    #[serde(default)]
    alt_text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default = "default_position")]
    position: String,
    group: String,
}

fn default_position() -> String {
    "end".to_string()
}

pub(crate) fn list_themes() -> Result<ToolResponse, Error> {
    ok(json!({"themes": plot::theme_catalog()}))
}

pub(crate) fn list_handlers() -> Result<ToolResponse, Error> {
    ok(json!({"handlers": plot::handler_catalog()}))
}

/// Render a chart. The image is returned inline as a binary content part;
/// with `save=true` it is also persisted to plot storage under the caller's
/// group.
pub(crate) async fn render_graph(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: RenderGraphInput = parse_input_graph(arguments)?;

    let image = app.plot_renderer.render(&input.params)?;

    let saved = if input.save {
        let plots = plot_store(app)?;
        let guid = plots
            .save_image(
                image.bytes.clone(),
                &image.format,
                &input.group,
                input.alias.as_deref(),
            )
            .await?;
        Some(guid)
    } else {
        None
    };

    let mut response = ok(json!({
        "graph_type": input.params.graph_type,
        "format": image.format,
        "size": image.bytes.len(),
        "guid": saved,
        "alias": input.alias,
    }))?;
    response.push(ToolContent::Image {
        data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
        mime_type: image.content_type,
    });
    Ok(response)
}

/// Graph payloads get a more specific error code than other tools.
fn parse_input_graph(
    arguments: serde_json::Map<String, Value>,
) -> Result<RenderGraphInput, Error> {
    serde_json::from_value(Value::Object(arguments)).map_err(|err| {
        Error::new(ErrorCode::InvalidGraphParams, "Graph parameters failed validation.")
            .with_details(json!({"validation_error": err.to_string()}))
    })
}

pub(crate) async fn get_image(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: ImageInput = parse_input(arguments)?;
    let plots = plot_store(app)?;

    let found = plots
        .get_image(&input.identifier, &input.group)
        .await
        .map_err(hide_cross_group)?;
    let Some((bytes, format)) = found else {
        return Err(image_not_found(&input.identifier));
    };

    let mut response = ok(json!({
        "identifier": input.identifier,
        "format": format,
        "size": bytes.len(),
    }))?;
    response.push(ToolContent::Image {
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type: format!("image/{format}"),
    });
    Ok(response)
}

pub(crate) fn list_images(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: GroupInput = parse_input(arguments)?;
    let plots = plot_store(app)?;
    let images = plots.list_images(Some(&input.group));
    ok(json!({
        "image_count": images.len(),
        "images": images,
    }))
}

/// Embed a stored plot image into a session as an image fragment, using its
/// data URI.
pub(crate) async fn add_plot_fragment(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: AddPlotInput = parse_input(arguments)?;
    let position = Position::parse(&input.position)?;
    let plots = plot_store(app)?;

    let data_uri = plots
        .get_image_as_data_uri(&input.identifier, &input.group)
        .await
        .map_err(hide_cross_group)?
        .ok_or_else(|| image_not_found(&input.identifier))?;

    let mut parameters = models::ParameterMap::new();
    parameters.insert("image_data".to_string(), Value::String(data_uri));
    if let Some(alt_text) = input.alt_text {
        parameters.insert("alt_text".to_string(), Value::String(alt_text));
    }
    if let Some(caption) = input.caption {
        parameters.insert("caption".to_string(), Value::String(caption));
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
    ok_with_message(output, "Plot fragment added successfully")
}

fn plot_store(app: &Arc<App>) -> Result<&blobs::PlotStore, Error> {
    app.plots.as_ref().ok_or_else(|| {
        Error::new(
            ErrorCode::PlotStorageNotInitialized,
            "Plot storage is not initialised on this server",
        )
    })
}

/// Cross-group reads report the same code as a genuine miss so existence
/// cannot be probed across groups.
fn hide_cross_group(err: Error) -> Error {
    if err.code == ErrorCode::AccessDenied {
        image_not_found("requested image")
    } else {
        err
    }
}

fn image_not_found(identifier: &str) -> Error {
    Error::new(
        ErrorCode::ImageNotFound,
        format!("Image '{identifier}' not found"),
    )
}
