mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

/// Multi-tenant document composition and rendering service.
#[derive(Debug, Parser)]
#[command(name = "folio", version)]
struct Cli {
    #[clap(flatten)]
    log: logging::LogArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Serve the tool-call and REST surfaces.
    Serve(ServeArgs),
    /// Periodically prune the blob store down to a size budget.
    Housekeeper(HousekeeperArgs),
}

#[derive(Debug, clap::Args)]
struct CommonArgs {
    /// Root directory for persisted state (sessions/, storage/, docs/).
    #[arg(long, env = "FOLIO_DATA_ROOT", default_value = "./data")]
    data_root: PathBuf,

    /// Seconds after which a stale storage lock may be broken.
    #[arg(long, env = "FOLIO_LOCK_STALE_SECONDS", default_value_t = 3600)]
    lock_stale_seconds: u64,
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    #[clap(flatten)]
    common: CommonArgs,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8000")]
    listen: String,

    /// HS256 secret for bearer-token verification. Unset disables
    /// authentication and every request acts as group `public`.
    #[arg(long, env = "FOLIO_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Public base URL used to build proxy download links.
    #[arg(long, env = "FOLIO_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Directory of stock images served under /images.
    #[arg(long, env = "FOLIO_STOCK_IMAGES_DIR")]
    stock_images_dir: Option<PathBuf>,

    /// External HTML-to-PDF converter command, reading HTML on stdin and
    /// writing PDF to stdout.
    #[arg(long, env = "FOLIO_PDF_COMMAND", default_value = "weasyprint - -")]
    pdf_command: String,

    /// Outbound image validation timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    image_timeout_seconds: u64,
}

#[derive(Debug, clap::Args)]
struct HousekeeperArgs {
    #[clap(flatten)]
    common: CommonArgs,

    /// Prune the storage directory down to this many MiB.
    #[arg(long, env = "FOLIO_MAX_STORAGE_MB", default_value_t = 1024)]
    max_mb: u64,

    /// Minutes between prune cycles.
    #[arg(long, env = "FOLIO_HOUSEKEEPING_INTERVAL_MINS", default_value_t = 60)]
    interval_mins: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match cli.command {
        Command::Serve(args) => runtime.block_on(serve(args)),
        Command::Housekeeper(args) => runtime.block_on(housekeeper(args)),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let lock_stale = Duration::from_secs(args.common.lock_stale_seconds);

    let registry = Arc::new(registry::Registry::load(&args.common.data_root.join("docs"))?);
    let blobs = blobs::BlobStore::open(&args.common.data_root.join("storage"), lock_stale)?;
    let store = sessions::SessionStore::open(&args.common.data_root.join("sessions"))?;

    let pdf: Arc<dyn render::PdfEngine> = Arc::new(render::CommandPdf::new(&args.pdf_command)?);
    let markdown: Arc<dyn render::MarkdownEngine> = Arc::new(render::TextMarkdown);
    let engine = render::RenderingEngine::new(registry.clone(), blobs.clone(), pdf, markdown)?;

    let verifier: Option<Arc<dyn api::TokenVerifier>> = args
        .jwt_secret
        .as_deref()
        .map(|secret| Arc::new(api::JwtVerifier::new(secret.as_bytes())) as _);
    if verifier.is_none() {
        tracing::warn!("no JWT secret configured; serving unauthenticated as group 'public'");
    }

    let app = Arc::new(api::App {
        sessions: sessions::SessionManager::new(store, registry.clone()),
        engine,
        plots: Some(blobs::PlotStore::new(blobs.clone())),
        plot_renderer: plot::PlotRenderer::new(Box::new(plot::SvgBackend)),
        gate: api::AuthGate::new(verifier),
        image_validator: api::ImageValidator::new(
            Some(Duration::from_secs(args.image_timeout_seconds)),
            None,
        ),
        config: api::ApiConfig {
            public_base_url: args.public_base_url,
            stock_images_dir: args.stock_images_dir,
        },
        registry,
        blobs,
    });

    let router = api::http::build_router(app);
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    tracing::info!(listen = %args.listen, "folio serving");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn housekeeper(args: HousekeeperArgs) -> anyhow::Result<()> {
    let lock_stale = Duration::from_secs(args.common.lock_stale_seconds);
    let blobs = blobs::BlobStore::open(&args.common.data_root.join("storage"), lock_stale)?;
    let interval = Duration::from_secs(args.interval_mins.max(1) * 60);

    tracing::info!(max_mb = args.max_mb, ?interval, "housekeeper started");
    loop {
        match blobs.prune_size(args.max_mb, None).await {
            Ok(removed) => tracing::info!(removed, "housekeeper cycle completed"),
            Err(error) => tracing::warn!(?error, "housekeeper cycle failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
