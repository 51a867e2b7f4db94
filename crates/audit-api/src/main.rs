//! AutoAudit Server
//!
//! # Usage
//!
//! ```bash
//! audit-server --config config.toml
//! audit-server --bind 127.0.0.1:9000 --seed-dir ontology/ --snapshot data/graph.json
//! ```

use anyhow::Context;
use audit_api::{build_router, ApiState, AppConfig};
use audit_compliance::adapters::build_adapters;
use audit_compliance::frameworks::builtin_seed;
use audit_compliance::{ComplianceEngine, OntologySeed};
use audit_graph::InMemoryGraphStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "audit-server")]
#[command(version)]
#[command(about = "AutoAudit compliance scanning server", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "AUDIT_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Listen address
    #[arg(long, env = "AUDIT_BIND")]
    bind: Option<String>,

    /// Directory with regulations/rules/requirements/tests JSON
    #[arg(long, env = "AUDIT_SEED_DIR")]
    seed_dir: Option<PathBuf>,

    /// Graph snapshot file
    #[arg(long, env = "AUDIT_SNAPSHOT")]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if cli.seed_dir.is_some() {
        config.ontology.seed_dir = cli.seed_dir;
    }
    if cli.snapshot.is_some() {
        config.store.snapshot = cli.snapshot;
    }

    let store = Arc::new(match &config.store.snapshot {
        Some(path) => InMemoryGraphStore::load_snapshot(path)
            .with_context(|| format!("loading snapshot {}", path.display()))?,
        None => InMemoryGraphStore::new(),
    });

    let engine = Arc::new(ComplianceEngine::new(store.clone(), config.engine_config()));
    let seed = match &config.ontology.seed_dir {
        Some(dir) => OntologySeed::load_dir(dir)?,
        None => builtin_seed(),
    };
    let seeded = engine.seed(seed).await?;
    info!(
        "Ontology ready: {} requirements, {} tests ({} references skipped)",
        seeded.requirements, seeded.tests, seeded.skipped
    );

    for adapter in build_adapters(&config.adapters)? {
        engine.register_adapter(adapter);
    }

    let app = build_router(ApiState::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!("AutoAudit API listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(path) = &config.store.snapshot {
        store.save_snapshot(path)?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
