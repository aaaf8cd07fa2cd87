use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use shared::{BoxError, GameModeCatalog, LoggingObserver};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Local game ticks per second
    #[arg(long, default_value = "30")]
    tick_rate: u32,

    /// Milliseconds between heartbeats
    #[arg(long, default_value = "1000")]
    heartbeat_ms: u64,

    /// Round length of the timed mode, in ticks. Must match the server.
    #[arg(long, default_value = "300")]
    round_ticks: u32,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let config = ClientConfig {
        tick_duration: Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1))),
        heartbeat_interval: Duration::from_millis(args.heartbeat_ms.max(1)),
        fake_ping_ms: args.fake_ping,
        ..ClientConfig::default()
    };
    let catalog = GameModeCatalog::with_builtin_modes(args.round_ticks);

    let mut client = Client::new(&args.server, config, catalog).await?;
    client.add_observer(Box::new(LoggingObserver::new("client")));

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, disconnecting...");
        }
    }

    client.disconnect().await;

    Ok(())
}
