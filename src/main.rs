mod config;
mod health;
mod http;
mod metrics;
mod model;
mod normalize;
mod source;
mod sync;
mod views;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::source::SourceProvider;
use crate::sync::{Coordinator, RefreshOutcome, RegistrySession, SyncSettings, Trigger};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "registry-sync", about = "Entry registry aggregation and sync engine")]
struct Cli {
    /// Path to the YAML configuration file.  Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the views over HTTP and keep them in sync with the source.
    Serve,
    /// Build once and write the static tree to `output.path`.
    Build,
    /// Fetch and normalize only; report every problem found.
    Validate,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared by the request handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<RegistrySession>,
    pub coordinator: Arc<Coordinator>,
    pub metrics: MetricsRegistry,
    /// Loaded once at startup from `webhook.secret_env`.
    pub webhook_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.source.github.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build reqwest client")
}

/// Wire a coordinator around the configured provider.
fn build_coordinator(
    config: &Config,
    settings: SyncSettings,
    metrics: &MetricsRegistry,
    shutdown: CancellationToken,
) -> Result<Arc<Coordinator>> {
    let provider = source::build_provider(config, build_http_client(config)?)?;
    let session = Arc::new(RegistrySession::new(
        provider.describe(),
        settings.tracked_ref.clone(),
    ));
    tracing::info!(
        source = %provider.describe(),
        tracked_ref = %settings.tracked_ref,
        "source provider initialised"
    );
    Ok(Arc::new(Coordinator::new(
        session,
        provider,
        settings,
        Arc::clone(&metrics.metrics),
        shutdown,
    )))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run_serve(config: Arc<Config>) -> Result<()> {
    let shutdown = CancellationToken::new();
    let metrics = MetricsRegistry::new();
    let settings = SyncSettings::from_config(&config);
    let coordinator = build_coordinator(&config, settings, &metrics, shutdown.clone())?;

    match coordinator.restore() {
        Ok(true) => {}
        Ok(false) => tracing::info!("no last-known-good view set to restore"),
        Err(e) => tracing::warn!(error = %e, "failed to restore last-known-good view set"),
    }

    let webhook_secret = config.webhook.secret();
    if webhook_secret.is_none() {
        tracing::warn!(
            secret_env = %config.webhook.secret_env,
            "webhook secret not set; signature verification disabled"
        );
    }

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        session: Arc::clone(coordinator.session()),
        coordinator: Arc::clone(&coordinator),
        metrics,
        webhook_secret,
    });

    // ---- Spawn services ----
    let poll_handle = if config.sync.poll_enabled {
        Some(tokio::spawn(sync::scheduler::run_poll_loop(
            Arc::clone(&coordinator),
            Duration::from_secs(config.sync.poll_interval),
            shutdown.clone(),
        )))
    } else {
        tracing::info!("polling disabled; refreshing once at startup");
        sync::scheduler::spawn_refresh(&coordinator, Trigger::Startup);
        None
    };

    let result = run_http_server(state, shutdown.clone()).await;

    // Stop the poll loop and cancel any in-flight fetch.
    shutdown.cancel();
    if let Some(handle) = poll_handle {
        let _ = handle.await;
    }
    result
}

async fn run_http_server(state: Arc<AppState>, shutdown: CancellationToken) -> Result<()> {
    let listen_addr: std::net::SocketAddr = state
        .config
        .server
        .listen
        .parse()
        .context("invalid server.listen address")?;

    let app = http::handler::create_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn run_build(config: Arc<Config>) -> Result<()> {
    let Some(output) = &config.output.path else {
        bail!("`build` needs output.path (or OUTPUT_DIR) to be set");
    };
    let metrics = MetricsRegistry::new();
    let settings = SyncSettings::from_config(&config);
    let coordinator = build_coordinator(&config, settings, &metrics, CancellationToken::new())?;

    match coordinator.refresh(Trigger::Manual, true).await {
        RefreshOutcome::Rebuilt {
            content_id,
            entries,
            errors,
        } => {
            tracing::info!(%content_id, entries, errors, output = %output, "static tree written");
            println!("built {entries} entries from {content_id} into {output} ({errors} rejected)");
            Ok(())
        }
        RefreshOutcome::Failed { error } => bail!("build failed: {error}"),
        other => bail!("unexpected build outcome: {other:?}"),
    }
}

async fn run_validate(config: Arc<Config>) -> Result<()> {
    let settings = SyncSettings::from_config(&config);
    let provider: Arc<dyn SourceProvider> =
        source::build_provider(&config, build_http_client(&config)?)?;

    let (content_id, files) = sync::coordinator::fetch_tree(provider, &settings).await?;
    let report = normalize::ingest(&files, &settings.policy);

    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for error in &report.errors {
        println!("error: {error}");
    }
    println!(
        "{content_id}: {} files, {} entries, {} errors, {} warnings",
        report.files_scanned,
        report.entries.len(),
        report.errors.len(),
        report.warnings.len()
    );

    if !report.errors.is_empty() {
        bail!("{} entry errors", report.errors.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // ---- Config ----
    let config = config::load_config(cli.config.as_deref())?;
    let config = Arc::new(config);

    tracing::info!(
        config_path = ?cli.config,
        command = ?cli.command,
        "starting registry-sync"
    );

    match cli.command {
        Command::Serve => run_serve(config).await?,
        Command::Build => run_build(config).await?,
        Command::Validate => run_validate(config).await?,
    }

    tracing::info!("registry-sync shut down cleanly");
    Ok(())
}
