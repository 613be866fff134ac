use std::sync::Arc;

use models::{Error, ErrorCode, OutputFormat, ToolResponse};
use serde_json::{json, Value};

use crate::tools::{ok, parse_input};
use crate::App;

#[derive(serde::Deserialize)]
struct GetDocumentInput {
    session_id: String,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    style_id: Option<String>,
    #[serde(default)]
    proxy: bool,
    group: String,
}

fn default_format() -> String {
    "html".to_string()
}

pub(crate) async fn get_document(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: GetDocumentInput = parse_input(arguments)?;

    let format = OutputFormat::parse(&input.format).ok_or_else(|| {
        Error::new(
            ErrorCode::InvalidArguments,
            format!("Unsupported output format: {}", input.format),
        )
        .with_recovery("Use one of: html, pdf, markdown")
    })?;

    let session = app
        .sessions
        .get_session(&input.session_id, &input.group)
        .await?;
    app.sessions.validate_session_for_render(&session)?;

    let output = app
        .engine
        .render_document(&session, format, input.style_id.as_deref(), input.proxy)
        .await?;

    if let Some(proxy_guid) = &output.proxy_guid {
        let download_url = app
            .config
            .public_base_url
            .as_deref()
            .map(|base| format!("{}/proxy/{proxy_guid}", base.trim_end_matches('/')));
        return ok(json!({
            "session_id": output.session_id,
            "format": output.format,
            "style_id": output.style_id,
            "proxy_guid": proxy_guid,
            "download_url": download_url,
        }));
    }

    ok(json!({
        "session_id": output.session_id,
        "format": output.format,
        "style_id": output.style_id,
        "content": output.body.transport_text(),
    }))
}
