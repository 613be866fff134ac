use std::sync::Arc;

use base64::Engine as _;
use blobs::BlobStore;
use models::{
    ArtefactType, BlobExtra, DocumentSession, Error, ErrorCode, OutputFormat, ParameterMap,
    ParameterSpec,
};
use registry::Registry;
use tabular::Alignment;

use crate::{apply_gfm_alignments, MarkdownEngine, PdfEngine};

const RENDER_LOCALE: &str = "en_US";

/// The rendered result of one `get_document` call.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub session_id: String,
    pub format: OutputFormat,
    pub style_id: String,
    pub body: RenderedBody,
    pub proxy_guid: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RenderedBody {
    Text(String),
    Binary(Vec<u8>),
}

impl RenderedBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RenderedBody::Text(text) => text.as_bytes(),
            RenderedBody::Binary(bytes) => bytes,
        }
    }

    /// Text-safe form for the transport envelope: binary bodies are base64.
    pub fn transport_text(&self) -> String {
        match self {
            RenderedBody::Text(text) => text.clone(),
            RenderedBody::Binary(bytes) => {
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
        }
    }
}

/// A proxy document fetched back out of the blob store. The group comes from
/// stored metadata, never from the caller.
#[derive(Debug, Clone)]
pub struct ProxyDocument {
    pub content: Vec<u8>,
    pub format: OutputFormat,
    pub group: String,
}

/// RenderingEngine composes a session's template, fragments and style into a
/// single HTML document and transcodes it to the requested format.
///
/// Every template shell and fragment inner source is registered with the
/// handlebars registry once at startup; the registries are immutable
/// afterwards, so rendering is lock-free.
pub struct RenderingEngine {
    registry: Arc<Registry>,
    blobs: Arc<BlobStore>,
    hb: handlebars::Handlebars<'static>,
    pdf: Arc<dyn PdfEngine>,
    markdown: Arc<dyn MarkdownEngine>,
}

impl RenderingEngine {
    pub fn new(
        registry: Arc<Registry>,
        blobs: Arc<BlobStore>,
        pdf: Arc<dyn PdfEngine>,
        markdown: Arc<dyn MarkdownEngine>,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut hb = handlebars::Handlebars::new();
        for entry in registry.template_entries() {
            let base = template_key(&entry.def.group, &entry.def.template_id);
            hb.register_template_string(&format!("{base}/shell"), &entry.shell_source)
                .with_context(|| format!("registering shell template {base}"))?;
            for (fragment_id, source) in &entry.fragment_sources {
                hb.register_template_string(&format!("{base}/fragments/{fragment_id}"), source)
                    .with_context(|| format!("registering fragment template {base}/{fragment_id}"))?;
            }
        }

        Ok(Self {
            registry,
            blobs,
            hb,
            pdf,
            markdown,
        })
    }

    /// Render `session` to `format`, applying `style_id` or the group's
    /// default style. With `proxy` set, the rendered bytes are persisted to
    /// the blob store under the session's group and the output carries the
    /// proxy GUID.
    pub async fn render_document(
        &self,
        session: &DocumentSession,
        format: OutputFormat,
        style_id: Option<&str>,
        proxy: bool,
    ) -> Result<RenderOutput, Error> {
        let style = self.resolve_style(&session.group, style_id)?;
        let style_id = style.def.style_id.clone();

        let (html, table_alignments) = self.render_html(session, &style.css)?;

        let body = match format {
            OutputFormat::Html => RenderedBody::Text(html),
            OutputFormat::Pdf => {
                let pdf = self.pdf.clone();
                let bytes = tokio::task::spawn_blocking(move || pdf.to_pdf(&html))
                    .await
                    .map_err(|err| {
                        Error::new(ErrorCode::UnexpectedError, format!("transcode task failed: {err}"))
                    })?
                    .map_err(transcoder_failed)?;
                RenderedBody::Binary(bytes)
            }
            OutputFormat::Markdown => {
                let markdown = self.markdown.to_markdown(&html).map_err(transcoder_failed)?;
                RenderedBody::Text(apply_gfm_alignments(&markdown, &table_alignments))
            }
        };

        let proxy_guid = if proxy {
            let mut extra = BlobExtra {
                artefact_type: Some(ArtefactType::Document),
                ..Default::default()
            };
            extra.rest.insert(
                "source_session".to_string(),
                serde_json::Value::String(session.session_id.clone()),
            );
            let guid = self
                .blobs
                .save(
                    body.as_bytes().to_vec(),
                    format.extension().to_string(),
                    session.group.clone(),
                    extra,
                )
                .await?;
            Some(guid)
        } else {
            None
        };

        tracing::info!(
            session_id = %session.session_id,
            %format,
            style_id,
            proxy,
            "document rendered"
        );
        Ok(RenderOutput {
            session_id: session.session_id.clone(),
            format,
            style_id,
            body,
            proxy_guid,
        })
    }

    /// Fetch a previously persisted proxy document. The owning group is read
    /// from stored metadata for the caller to check.
    pub async fn get_proxy_document(&self, proxy_guid: &str) -> Result<ProxyDocument, Error> {
        let not_found = || {
            Error::new(
                ErrorCode::ImageNotFound,
                format!("Proxy document '{proxy_guid}' not found"),
            )
        };

        let meta = self.blobs.metadata(proxy_guid).ok_or_else(not_found)?;
        if meta.artefact_type() != Some(ArtefactType::Document) {
            return Err(not_found());
        }
        let Some((content, _)) = self.blobs.get(proxy_guid.to_string(), None).await? else {
            return Err(not_found());
        };

        let format = OutputFormat::parse(&meta.format).ok_or_else(|| {
            Error::new(
                ErrorCode::UnexpectedError,
                format!("proxy document has unknown format '{}'", meta.format),
            )
        })?;

        Ok(ProxyDocument {
            content,
            format,
            group: meta.group,
        })
    }

    fn resolve_style(
        &self,
        group: &str,
        style_id: Option<&str>,
    ) -> Result<&registry::StyleEntry, Error> {
        let style = match style_id {
            Some(style_id) => self.registry.get_style(group, style_id),
            None => self.registry.default_style(group),
        };
        style.ok_or_else(|| {
            Error::new(
                ErrorCode::RenderFailed,
                match style_id {
                    Some(style_id) => format!("Style '{style_id}' not found"),
                    None => format!("No default style configured for group '{group}'"),
                },
            )
        })
    }

    /// Compose the HTML document: each fragment rendered against its stored
    /// parameters in order, then the shell rendered with the fragment bodies,
    /// merged global parameters, and style CSS.
    fn render_html(
        &self,
        session: &DocumentSession,
        css: &str,
    ) -> Result<(String, Vec<Option<Vec<Alignment>>>), Error> {
        let Some(template) = self
            .registry
            .get_template(&session.group, &session.template_id)
        else {
            return Err(Error::new(
                ErrorCode::TemplateNotFound,
                format!(
                    "Template '{}' not found in group '{}'",
                    session.template_id, session.group
                ),
            ));
        };
        let base = template_key(&session.group, &session.template_id);

        let mut fragments = Vec::with_capacity(session.fragments.len());
        let mut table_alignments = Vec::new();

        for instance in &session.fragments {
            let specs = template
                .def
                .fragment(&instance.fragment_id)
                .map(|f| f.parameters.as_slice())
                .unwrap_or_default();

            let data = if instance.fragment_id == "table" {
                let (data, alignments) = prepare_table(&instance.parameters)?;
                table_alignments.push(alignments);
                data
            } else {
                serde_json::Value::Object(with_defaults(specs, &instance.parameters))
            };

            let name = format!("{base}/fragments/{}", instance.fragment_id);
            let html = self.hb.render(&name, &data).map_err(|err| {
                Error::new(
                    ErrorCode::RenderFailed,
                    format!("rendering fragment '{}': {err}", instance.fragment_id),
                )
            })?;
            fragments.push(html);
        }

        let global = with_defaults(
            &template.def.global_parameters,
            session.global_parameters.as_ref().unwrap_or(&ParameterMap::new()),
        );

        let html = self
            .hb
            .render(
                &format!("{base}/shell"),
                &serde_json::json!({
                    "global_params": global,
                    "fragments": fragments,
                    "css": css,
                }),
            )
            .map_err(|err| {
                Error::new(ErrorCode::RenderFailed, format!("rendering document shell: {err}"))
            })?;

        Ok((html, table_alignments))
    }
}

fn template_key(group: &str, template_id: &str) -> String {
    format!("{group}/{template_id}")
}

fn transcoder_failed(err: anyhow::Error) -> Error {
    Error::new(ErrorCode::RenderFailed, "format transcoding failed")
        .with_details(serde_json::json!({"transcoder_error": format!("{err:#}")}))
}

/// Merge declared defaults into a parameter map for render time. Validation
/// never applies defaults; this is the one place they take effect.
fn with_defaults(specs: &[ParameterSpec], values: &ParameterMap) -> ParameterMap {
    let mut merged = values.clone();
    for spec in specs {
        if let Some(default) = &spec.default {
            merged
                .entry(spec.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
    merged
}

/// Sort and format a table fragment's rows, and shape the value map its
/// inner template renders against.
fn prepare_table(
    params: &ParameterMap,
) -> Result<(serde_json::Value, Option<Vec<Alignment>>), Error> {
    let spec = tabular::validate_table(params)?;

    let rows = match &spec.sort_by {
        Some(sort_by) => tabular::sort_table_rows(&spec.rows, sort_by, spec.has_header)?,
        None => spec.rows.clone(),
    };

    let (header, data_rows) = if spec.has_header {
        (rows.first().cloned(), &rows[1..])
    } else {
        (None, &rows[..])
    };

    let header: Option<Vec<String>> = header.map(|cells| {
        cells
            .iter()
            .map(|cell| tabular::format_number(cell, None, RENDER_LOCALE).unwrap_or_default())
            .collect()
    });

    let formatted: Vec<Vec<String>> = data_rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(col, cell)| {
                    let format = spec
                        .number_format
                        .as_ref()
                        .and_then(|formats| formats.get(&col))
                        .map(String::as_str);
                    tabular::format_number(cell, format, RENDER_LOCALE)
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let alignments = spec.column_alignments.clone();
    let alignment_names: Option<Vec<&'static str>> = alignments.as_ref().map(|list| {
        list.iter()
            .map(|a| match a {
                Alignment::Left => "left",
                Alignment::Center => "center",
                Alignment::Right => "right",
            })
            .collect()
    });

    let css_or_empty = |color: &Option<String>| {
        color
            .as_deref()
            .and_then(|c| tabular::css_color(c).ok())
            .unwrap_or_default()
    };

    let data = serde_json::json!({
        "title": spec.title,
        "header": header,
        "rows": formatted,
        "alignments": alignment_names,
        "width": spec.width,
        "border_style": spec.border_style,
        "zebra_stripe": spec.zebra_stripe,
        "compact": spec.compact,
        "header_color": css_or_empty(&spec.header_color),
        "stripe_color": css_or_empty(&spec.stripe_color),
        "highlight_rows": spec.highlight_rows,
        "highlight_columns": spec.highlight_columns,
    });

    Ok((data, alignments))
}
