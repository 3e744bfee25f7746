#![forbid(unsafe_code)]

//! HTTP entry point: resolves configuration, opens the transcript database,
//! wires the YouTube and OpenAI clients into the service and serves the API.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tubescribe_tools::{
    api::{AppState, router},
    config::{ConfigOverrides, ServiceConfig, resolve_service_config},
    orchestrator::{Collaborators, ResolveSettings, TranscriptService},
    providers::{OEmbedMetadataProvider, OpenAiGenerator, YoutubeCaptionProvider, http_agent},
    store::TranscriptStore,
};

#[derive(Debug, Parser)]
#[command(name = "server", about = "Serve YouTube transcripts and summaries over HTTP")]
struct ServerArgs {
    /// SQLite database holding transcript records.
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// Address to listen on (IPv4 or IPv6).
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Dotenv file read before the process environment is consulted.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl ServerArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db_path.clone(),
            host: self.host.clone(),
            port: self.port,
            env_path: self.env_file.clone(),
        }
    }
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/TUBESCRIBE_HOST")
}

fn build_service(config: &ServiceConfig, store: TranscriptStore) -> TranscriptService {
    let agent = http_agent(config.provider_timeout);
    TranscriptService::new(
        Collaborators {
            metadata: Arc::new(OEmbedMetadataProvider::new(agent.clone())),
            captions: Arc::new(YoutubeCaptionProvider::new(agent.clone())),
            generator: Arc::new(OpenAiGenerator::new(agent, config.credentials.clone())),
            store: Arc::new(store),
        },
        ResolveSettings {
            caption_lang: config.caption_lang.clone(),
            limits: config.limits,
        },
    )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = ServerArgs::parse();
    let config = resolve_service_config(args.overrides()).context("resolving configuration")?;
    let host = parse_host_arg(&config.host)?;

    let store = TranscriptStore::open(&config.db_path)
        .await
        .context("initializing transcript store")?;
    let service = build_service(&config, store);
    let app = router(AppState {
        service: Arc::new(service),
    });

    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(
        %addr,
        db = %config.db_path.display(),
        model = %config.credentials.model,
        "transcript API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    // Not propagated: only graceful shutdown depends on it.
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
}
