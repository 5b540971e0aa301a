use std::path::PathBuf;

use clap::Parser;

use upstream_relay::config::loader::read_config;
use upstream_relay::config::{RelayConfig, TransportMode};
use upstream_relay::lifecycle::startup;
use upstream_relay::observability::init_logging;

/// Relay every request on the listen port to a fixed upstream.
#[derive(Parser, Debug)]
#[command(name = "upstream-relay", version)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport towards the upstream: http1 or http2.
    #[arg(long)]
    transport: Option<TransportMode>,

    /// Listen address, e.g. 0.0.0.0:24444.
    #[arg(long)]
    listen: Option<String>,

    /// Upstream URL, e.g. http://localhost:3111.
    #[arg(long)]
    upstream: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut RelayConfig) {
        if let Some(transport) = self.transport {
            config.upstream.transport = transport;
        }
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(upstream) = self.upstream {
            config.upstream.url = upstream;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);

    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upstream-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        transport = %config.upstream.transport,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
