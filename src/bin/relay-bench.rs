use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tokio::io::AsyncReadExt as _;

use upstream_relay::bench::{self, Sender, Target, TrafficPlan};
use upstream_relay::config::{LogFormat, ObservabilityConfig, TransportMode};
use upstream_relay::mock_upstream::{MARKER_HEADER, MARKER_VALUE};
use upstream_relay::observability::init_logging_with_targets;

#[derive(Parser, Debug)]
#[command(name = "relay-bench", about = "Traffic generator for the upstream relay")]
struct Args {
    /// Path to the relay binary.
    /// If not provided, it is assumed that the relay is already running.
    #[arg(long)]
    relay_path: Option<PathBuf>,
    /// Extra arguments passed to the spawned relay.
    #[arg(long = "relay-arg", allow_hyphen_values = true)]
    relay_args: Vec<String>,
    /// The port number the relay listens on.
    /// Either this or `unix_socket_path` must be provided.
    #[arg(long)]
    server_port: Option<u16>,
    /// The path to the Unix socket the relay listens on.
    /// Either this or `server_port` must be provided.
    #[arg(long)]
    unix_socket_path: Option<PathBuf>,
    #[arg(long)]
    concurrency: usize,
    #[arg(long)]
    iterations: usize,
    /// Use HTTP/1.1 instead of HTTP/2 towards the relay.
    #[arg(long, default_value = "false")]
    use_http1: bool,
    /// Request URI sent on every request.
    #[arg(long, default_value = "http://localhost/")]
    uri: String,
    /// Do not require the mock upstream's marker header on responses.
    #[arg(long, default_value = "false")]
    no_marker_check: bool,
    /// Prompt before sending traffic.
    #[arg(long, default_value = "false")]
    interactive: bool,
    /// Print the final report as JSON.
    #[arg(long, default_value = "false")]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let logging = ObservabilityConfig {
        log_format: LogFormat::Pretty,
        ..ObservabilityConfig::default()
    };
    if let Err(e) = init_logging_with_targets(&logging, &[env!("CARGO_CRATE_NAME")]) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")
        .and_then(|runtime| runtime.block_on(inner_main(args)));

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

async fn inner_main(args: Args) -> anyhow::Result<()> {
    let _relay = match &args.relay_path {
        Some(path) => Some(bench::spawn_relay(path, &args.relay_args).await?),
        None => {
            println!("Using the already running relay");
            None
        }
    };

    let target = Target::from_args(args.server_port, args.unix_socket_path.clone())?;
    let transport = if args.use_http1 {
        TransportMode::Http1
    } else {
        TransportMode::Http2
    };
    let io = target.connect().await.context("failed to connect to relay")?;
    let sender = Sender::handshake(io, transport).await?;

    if args.interactive {
        prompt().await?;
    }

    let plan = TrafficPlan {
        uri: args.uri.parse().context("invalid --uri")?,
        concurrency: args.concurrency,
        iterations: args.iterations,
        expected_header: (!args.no_marker_check).then(|| (MARKER_HEADER, MARKER_VALUE)),
        progress: true,
    };
    let report = bench::send_traffic(&sender, &plan).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "All done! {} requests, {} bytes in {:.3}s ({:.1} req/s)",
            report.requests, report.bytes, report.elapsed_secs, report.requests_per_sec
        );
    }

    Ok(())
}

async fn prompt() -> anyhow::Result<()> {
    println!("Press any key to start sending HTTP requests to the relay...");
    tokio::io::stdin().read_exact(&mut [0]).await?;
    Ok(())
}
