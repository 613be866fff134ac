use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use api::{ApiConfig, App, AuthGate, ImageValidator, JwtVerifier};
use blobs::{BlobStore, PlotStore};
use registry::Registry;
use render::{MarkdownEngine, PdfEngine, RenderingEngine, TextMarkdown};
use sessions::{SessionManager, SessionStore};

pub const SECRET: &[u8] = b"folio-test-secret";

pub struct FakePdf;

impl PdfEngine for FakePdf {
    fn to_pdf(&self, html: &str) -> anyhow::Result<Vec<u8>> {
        let mut bytes = b"%PDF-1.7 ".to_vec();
        bytes.extend_from_slice(html.as_bytes());
        Ok(bytes)
    }
}

pub fn mint(groups: &[&str], expires_in: i64) -> String {
    #[derive(serde::Serialize)]
    struct Claims<'a> {
        groups: Vec<&'a str>,
        exp: i64,
    }
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &Claims {
            groups: groups.to_vec(),
            exp: chrono::Utc::now().timestamp() + expires_in,
        },
        &jsonwebtoken::EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_docs_root(root: &Path) {
    for group in ["finance", "alpha", "beta"] {
        write(
            &root.join(format!("templates/{group}/news_email/template.yaml")),
            &format!(
                r#"
template_id: news_email
group: {group}
name: News Email
description: Market news digest
global_parameters:
  - name: subject
    type: string
fragments:
  - fragment_id: news
    name: News Item
    parameters:
      - name: story_summary
        type: string
      - name: date
        type: string
        required: false
      - name: author
        type: string
        required: false
      - name: source
        type: string
        required: false
      - name: impact_rating
        type: string
        required: false
  - fragment_id: table
    name: Data Table
    parameters:
      - name: rows
        type: array
      - name: sort_by
        type: string
        required: false
      - name: has_header
        type: boolean
        required: false
      - name: number_format
        type: object
        required: false
      - name: column_alignments
        type: array
        required: false
  - fragment_id: image
    name: Image
    parameters:
      - name: image_data
        type: string
      - name: alt_text
        type: string
        required: false
      - name: caption
        type: string
        required: false
      - name: width
        type: string
        required: false
"#
            ),
        );
        write(
            &root.join(format!("templates/{group}/news_email/shell.html")),
            "<html><head><style>{{{css}}}</style></head><body><h1>{{global_params.subject}}</h1>{{#each fragments}}{{{this}}}{{/each}}</body></html>",
        );
        write(
            &root.join(format!("templates/{group}/news_email/fragments/news.html")),
            "<p>{{story_summary}} — {{author}} [{{impact_rating}}]</p>",
        );
        write(
            &root.join(format!("templates/{group}/news_email/fragments/table.html")),
            concat!(
                "<table>",
                "{{#if header}}<tr>{{#each header}}<th>{{this}}</th>{{/each}}</tr>{{/if}}",
                "{{#each rows}}<tr>{{#each this}}<td>{{this}}</td>{{/each}}</tr>{{/each}}",
                "</table>",
            ),
        );
        write(
            &root.join(format!("templates/{group}/news_email/fragments/image.html")),
            "<figure><img src=\"{{image_data}}\" alt=\"{{alt_text}}\"/><figcaption>{{caption}}</figcaption></figure>",
        );

        write(
            &root.join(format!("styles/{group}/bizdark/style.yaml")),
            &format!("style_id: bizdark\ngroup: {group}\nname: Biz Dark\ndefault: true\n"),
        );
        write(
            &root.join(format!("styles/{group}/bizdark/style.css")),
            "body { background: #10131a; }",
        );
    }
}

pub struct Fixture {
    // Keeps the fixture's on-disk state alive for the App's lifetime.
    _tmp: tempfile::TempDir,
    pub app: Arc<App>,
}

pub fn fixture() -> Fixture {
    fixture_with(|_| {})
}

pub fn fixture_with(mutate: impl FnOnce(&mut App)) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    write_docs_root(&tmp.path().join("docs"));

    let registry = Arc::new(Registry::load(&tmp.path().join("docs")).unwrap());
    let blobs = BlobStore::open(&tmp.path().join("storage"), Duration::from_secs(3600)).unwrap();
    let store = SessionStore::open(&tmp.path().join("sessions")).unwrap();
    let markdown: Arc<dyn MarkdownEngine> = Arc::new(TextMarkdown);
    let pdf: Arc<dyn PdfEngine> = Arc::new(FakePdf);

    let mut app = App {
        sessions: SessionManager::new(store, registry.clone()),
        engine: RenderingEngine::new(registry.clone(), blobs.clone(), pdf, markdown).unwrap(),
        plots: Some(PlotStore::new(blobs.clone())),
        plot_renderer: plot::PlotRenderer::new(Box::new(plot::SvgBackend)),
        gate: AuthGate::new(Some(Arc::new(JwtVerifier::new(SECRET)))),
        image_validator: ImageValidator::new(Some(Duration::from_secs(2)), None),
        config: ApiConfig {
            public_base_url: Some("http://docs.example.com".to_string()),
            stock_images_dir: None,
        },
        registry,
        blobs,
    };
    mutate(&mut app);

    Fixture {
        _tmp: tmp,
        app: Arc::new(app),
    }
}
