use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use tunestream::catalog::trending::TrendingCache;
use tunestream::catalog::ytmusic::YtMusicClient;
use tunestream::config::RelayConfig;
use tunestream::logging::init_tracing;
use tunestream::media::ytdlp::YtDlpResolver;
use tunestream::relay::audio::AudioRelay;
use tunestream::server::handler::{AppServer, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Song search and YouTube audio relay server", long_about = None)]
struct Cli {
    /// JSON config file; fields left out keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding the config file.
    #[arg(short, long)]
    bind: Option<String>,
    /// yt-dlp executable, overriding the config file.
    #[arg(long)]
    ytdlp: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(ytdlp) = cli.ytdlp {
        config.ytdlp_path = ytdlp;
    }

    init_tracing(&config.log_filter);
    info!(?config, "starting tunestream");

    let resolver = YtDlpResolver::new(config.ytdlp_path.clone());
    if !resolver.is_available().await {
        warn!("audio relay will fail until {} is installed", config.ytdlp_path);
    }

    let state = AppState {
        relay: Arc::new(AudioRelay::new(Arc::new(resolver), &config)?),
        catalog: Arc::new(YtMusicClient::new()?),
        trending: Arc::new(TrendingCache::new(config.trending_ttl())),
    };

    let server = AppServer::start(state, &config.bind_addr).await?;
    info!("serving on {}", server.url_for("/api/audio"));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown();
    Ok(())
}
