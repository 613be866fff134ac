use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use models::{Envelope, Error, ErrorCode, OutputFormat};
use serde_json::{json, Value};

use crate::{dispatch_tool_call, App, RequestCredentials};

/// Build the axum router for the REST surface.
pub fn build_router(app: Arc<App>) -> axum::Router {
    axum::Router::new()
        .route("/ping", get(ping))
        .route("/templates", get(list_templates))
        .route("/templates/{template_id}", get(get_template))
        .route(
            "/templates/{template_id}/fragments",
            get(list_template_fragments),
        )
        .route("/fragments/{fragment_id}", get(get_fragment))
        .route("/styles", get(list_styles))
        .route("/render/{session_id}", post(render_session))
        .route("/proxy/{proxy_guid}", get(get_proxy))
        .route("/images", get(list_stock_images))
        .route("/images/{*path}", get(get_stock_image))
        .route("/tools/call", post(tool_call))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .on_failure(tower_http::trace::DefaultOnFailure::new().level(tracing::Level::INFO)),
        )
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(app)
}

/// ApiError adapts the domain error into an HTTP response carrying the
/// uniform envelope, with a status derived from the error code.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.code);
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, error = %self.0.message, "request failed");
        }
        (status, Json(Envelope::from(&self.0))).into_response()
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    use ErrorCode::*;
    match code {
        AuthRequired | AuthFailed => StatusCode::UNAUTHORIZED,
        AccessDenied => StatusCode::FORBIDDEN,
        TemplateNotFound | FragmentNotFound | SessionNotFound | ImageNotFound | UnknownTool => {
            StatusCode::NOT_FOUND
        }
        RenderFailed | RenderError | UnexpectedError | PlotStorageNotInitialized => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Bearer and legacy auth headers, pulled off every request that needs them.
struct HttpCredentials(RequestCredentials);

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for HttpCredentials {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        let legacy = parts
            .headers
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        std::future::ready(Ok(HttpCredentials(RequestCredentials {
            bearer,
            legacy_group_token: legacy,
        })))
    }
}

fn success(data: Value) -> Json<Envelope> {
    Json(Envelope::success(data))
}

#[derive(serde::Deserialize, Default)]
struct GroupFilter {
    group: Option<String>,
}

async fn ping() -> Json<Envelope> {
    success(json!({
        "service": "folio",
        "status": "ok",
        "timestamp": models::timestamp_now(),
    }))
}

async fn list_templates(
    State(app): State<Arc<App>>,
    Query(filter): Query<GroupFilter>,
) -> Json<Envelope> {
    let templates: Vec<Value> = app
        .registry
        .list_templates(filter.group.as_deref())
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
    success(json!(templates))
}

async fn get_template(
    State(app): State<Arc<App>>,
    Path(template_id): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    let entry = app
        .registry
        .find_template(&template_id, None)
        .ok_or_else(|| {
            ApiError(Error::new(
                ErrorCode::TemplateNotFound,
                format!("Template '{template_id}' not found"),
            ))
        })?;
    Ok(success(json!({
        "template_id": entry.def.template_id,
        "name": entry.def.name,
        "description": entry.def.description,
        "group": entry.def.group,
        "global_parameters": entry.def.global_parameters,
    })))
}

async fn list_template_fragments(
    State(app): State<Arc<App>>,
    Path(template_id): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    let entry = app
        .registry
        .find_template(&template_id, None)
        .ok_or_else(|| {
            ApiError(Error::new(
                ErrorCode::TemplateNotFound,
                format!("Template '{template_id}' not found"),
            ))
        })?;
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
    Ok(success(json!(fragments)))
}

async fn get_fragment(
    State(app): State<Arc<App>>,
    Path(fragment_id): Path<String>,
) -> Result<Json<Envelope>, ApiError> {
    let entry = app
        .registry
        .find_fragment(&fragment_id, None)
        .ok_or_else(|| {
            ApiError(Error::new(
                ErrorCode::FragmentNotFound,
                format!("Fragment '{fragment_id}' not found"),
            ))
        })?;
    Ok(success(json!({
        "fragment_id": entry.def.fragment_id,
        "name": entry.def.name,
        "description": entry.def.description,
        "group": entry.def.group,
        "parameters": entry.def.parameters,
    })))
}

async fn list_styles(
    State(app): State<Arc<App>>,
    Query(filter): Query<GroupFilter>,
) -> Json<Envelope> {
    let styles: Vec<Value> = app
        .registry
        .list_styles(filter.group.as_deref())
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
    success(json!(styles))
}

#[derive(serde::Deserialize, Default)]
struct RenderBody {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    style_id: Option<String>,
    #[serde(default)]
    proxy: bool,
}

async fn render_session(
    State(app): State<Arc<App>>,
    Path(session_id): Path<String>,
    credentials: HttpCredentials,
    body: Option<Json<RenderBody>>,
) -> Result<Response, ApiError> {
    let group = app.gate.resolve_http(&credentials.0)?;
    let Json(body) = body.unwrap_or_default();

    let format = body.format.as_deref().unwrap_or("html");
    let format = OutputFormat::parse(format).ok_or_else(|| {
        ApiError(Error::new(
            ErrorCode::InvalidArguments,
            format!("Unsupported output format: {format}"),
        ))
    })?;

    let session = app.sessions.get_session(&session_id, &group).await?;
    app.sessions.validate_session_for_render(&session)?;

    let output = app
        .engine
        .render_document(&session, format, body.style_id.as_deref(), body.proxy)
        .await?;

    if let Some(proxy_guid) = &output.proxy_guid {
        // The download URL is published only when the deployment has a
        // public base URL; otherwise the response carries the GUID alone.
        let download_url = app
            .config
            .public_base_url
            .as_deref()
            .map(|base| format!("{}/proxy/{proxy_guid}", base.trim_end_matches('/')));
        return Ok(success(json!({
            "proxy_guid": proxy_guid,
            "download_url": download_url,
            "format": output.format,
        }))
        .into_response());
    }

    Ok((
        [(header::CONTENT_TYPE, output.format.content_type())],
        output.body.as_bytes().to_vec(),
    )
        .into_response())
}

async fn get_proxy(
    State(app): State<Arc<App>>,
    Path(proxy_guid): Path<String>,
    credentials: HttpCredentials,
) -> Result<Response, ApiError> {
    let group = app.gate.resolve_http(&credentials.0)?;

    let document = app.engine.get_proxy_document(&proxy_guid).await?;

    // Ownership is checked against stored metadata, never a URL parameter.
    // This endpoint alone discloses the owning group, for operator
    // diagnostics.
    if document.group != group {
        return Err(ApiError(Error::new(
            ErrorCode::AccessDenied,
            format!(
                "Access denied: document belongs to group '{}', token is for group '{group}'",
                document.group
            ),
        )));
    }

    Ok((
        [(header::CONTENT_TYPE, document.format.content_type())],
        document.content,
    )
        .into_response())
}

const STOCK_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

async fn list_stock_images(State(app): State<Arc<App>>) -> Result<Json<Envelope>, ApiError> {
    let Some(dir) = &app.config.stock_images_dir else {
        return Ok(success(json!([])));
    };
    let entries = std::fs::read_dir(dir).map_err(|err| {
        ApiError(Error::new(
            ErrorCode::UnexpectedError,
            format!("failed to list stock images: {err}"),
        ))
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let ext = name.rsplit('.').next().unwrap_or_default().to_lowercase();
            STOCK_IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(name)
        })
        .collect();
    names.sort();
    Ok(success(json!(names)))
}

async fn get_stock_image(
    State(app): State<Arc<App>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || {
        ApiError(Error::new(
            ErrorCode::ImageNotFound,
            format!("Image '{path}' not found"),
        ))
    };

    let Some(dir) = &app.config.stock_images_dir else {
        return Err(not_found());
    };

    // Refuse traversal outside the stock directory.
    if path.contains("..") || path.starts_with('/') || path.contains('\\') {
        return Err(ApiError(Error::new(
            ErrorCode::InvalidOperation,
            "Invalid image path",
        )));
    }

    let ext = path.rsplit('.').next().unwrap_or_default().to_lowercase();
    if !STOCK_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(not_found());
    }

    let bytes = std::fs::read(dir.join(&path)).map_err(|_| not_found())?;
    let content_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => unreachable!("extension checked above"),
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[derive(serde::Deserialize)]
struct ToolCallBody {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// The tool-call surface exposed over HTTP: same dispatcher, same envelope.
async fn tool_call(
    State(app): State<Arc<App>>,
    credentials: HttpCredentials,
    Json(body): Json<ToolCallBody>,
) -> Json<Value> {
    let arguments = if body.arguments.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        body.arguments
    };
    let response = dispatch_tool_call(&app, &body.name, arguments, &credentials.0).await;
    Json(serde_json::to_value(response).expect("tool response serializes"))
}
