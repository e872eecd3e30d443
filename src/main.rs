use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use memcached_exporter::catalog;
use memcached_exporter::client::{TextClient, Tls};
use memcached_exporter::collector::Collector;
use memcached_exporter::config::{self, Config};
use memcached_exporter::export::Server;

/// Prometheus exporter for memcached server statistics.
#[derive(Parser)]
#[command(name = "memcached-exporter", about)]
struct Cli {
    /// Path to the YAML configuration file. Defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides `log_level` from the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Comma-separated memcached addresses. Overrides `memcached.address`.
    #[arg(long)]
    memcached_address: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    /// Release version string.
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("memcached-exporter {}", version::full());
        return Ok(());
    }

    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(address) = cli.memcached_address {
        cfg.memcached.address = address;
    }
    if let Some(level) = cli.log_level {
        cfg.log_level = level;
    }
    cfg.validate()?;

    let filter = EnvFilter::try_new(&cfg.log_level)
        .with_context(|| format!("invalid log level: {}", cfg.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    catalog::validate().context("validating metric catalog")?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting memcached-exporter",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async { run(cfg).await })
}

async fn run(cfg: Config) -> Result<()> {
    let servers = config::resolve_addresses(&cfg.memcached.address)
        .context("resolving memcached addresses")?;

    if servers.is_empty() {
        tracing::warn!(address = %cfg.memcached.address, "no memcached servers to scrape");
    } else {
        tracing::info!(servers = ?servers, "scraping memcached servers");
    }

    let mut client = TextClient::new(cfg.memcached.timeout);
    if cfg.memcached.tls.enabled {
        let tls = Tls::from_config(&cfg.memcached.tls).context("configuring memcached TLS")?;
        client = client.with_tls(tls);
    }

    let collector = Collector::new(
        client,
        servers,
        cfg.memcached.slab_cas_accounting,
    );

    let server = Server::new(&cfg.web.listen_address, &cfg.web.telemetry_path, collector)?;
    server.start().await?;

    shutdown_signal().await?;

    server.stop().await?;

    tracing::info!("memcached-exporter stopped");

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for SIGINT")?;
            tracing::info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("waiting for SIGINT")?;
    tracing::info!("received SIGINT, shutting down");
    Ok(())
}
