use clap::Parser;
use client::network::{Client, ClientConfig};
use log::{error, info};
use server::game::LifecyclePolicy;
use server::network::{Server, ServerConfig, ServerMessage};
use shared::{BoxError, GameModeCatalog, LoggingObserver};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(long, default_value = "16")]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    /// Milliseconds between resends of unconfirmed state
    #[arg(long, default_value = "250")]
    resend_ms: u64,

    /// Game mode the first game runs
    #[arg(long, default_value = "sandbox")]
    mode: String,

    /// Round length of the timed mode, in ticks
    #[arg(long, default_value = "300")]
    round_ticks: u32,

    /// Wait for a manual begin instead of starting once all clients are ready
    #[arg(long)]
    no_auto_begin: bool,

    /// Reset the game once all clients saw it stop
    #[arg(long)]
    auto_reset: bool,

    /// Also run a client in this process, connected over loopback
    #[arg(long)]
    host_client: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        tick_duration: Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1))),
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.timeout_secs),
        resend_interval: Duration::from_millis(args.resend_ms.max(1)),
        starting_mode: Some(args.mode.clone()),
        policy: LifecyclePolicy {
            auto_begin: !args.no_auto_begin,
            auto_reset: args.auto_reset,
        },
    };

    info!("Starting server on {}:{} running '{}'", args.host, args.port, args.mode);
    info!("Tick rate: {} Hz, max clients: {}", args.tick_rate, args.max_clients);

    let address = format!("{}:{}", args.host, args.port);
    let catalog = GameModeCatalog::with_builtin_modes(args.round_ticks);
    let mut server = Server::new(&address, config, catalog).await?;
    server.add_observer(Box::new(LoggingObserver::new("server")));

    if args.host_client {
        let server_addr = format!("127.0.0.1:{}", server.local_addr()?.port());
        let client_config = ClientConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            tick_duration: Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1))),
            ..ClientConfig::default()
        };
        let mut client = Client::new(
            &server_addr,
            client_config,
            GameModeCatalog::with_builtin_modes(args.round_ticks),
        )
        .await?;
        client.add_observer(Box::new(LoggingObserver::new("host client")));

        server = server.with_host_client(client.local_addr()?);
        info!("Running host client from {}", client.local_addr()?);

        tokio::spawn(async move {
            if let Err(e) = client.run().await {
                error!("Host client stopped: {}", e);
            }
        });
    }

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    // Let the sender task flush the final broadcasts.
    tokio::time::sleep(Duration::from_millis(100)).await;

    Ok(())
}
