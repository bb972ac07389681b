use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use punto_execution::{
    CardSource, Engine, JsonLinesSink, RecordSink, ShuffledShoe, SystemClock, TracingSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod routes;

use config::LiveTableConfig;
use routes::{router, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat baccarat round engine over HTTP")]
struct Args {
    /// Host interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 9123)]
    port: u16,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_engine(config: &LiveTableConfig) -> Result<Engine> {
    let cards: Arc<dyn CardSource> = match config.shoe_seed {
        Some(seed) => Arc::new(ShuffledShoe::seeded(config.decks, seed)),
        None => Arc::new(ShuffledShoe::new(config.decks)),
    };
    let sink: Arc<dyn RecordSink> = match &config.history_path {
        Some(path) => Arc::new(
            JsonLinesSink::open(path)
                .with_context(|| format!("failed to open history file {}", path.display()))?,
        ),
        None => Arc::new(TracingSink),
    };
    Engine::new(config.engine.clone(), Arc::new(SystemClock), cards, sink)
        .context("invalid engine configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = LiveTableConfig::from_env();
    let engine = build_engine(&config)?;
    let _ticker = engine.spawn_ticker(Duration::from_millis(config.tick_ms.max(1)));

    let app = router(AppState { engine });
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        betting_ms = config.engine.phases.betting_ms,
        tick_ms = config.tick_ms,
        "live table service listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
