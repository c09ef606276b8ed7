use clap::Parser;
use client::network::Client;
use log::info;
use shared::GameConfig;
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

    /// Player name shown to the server
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Stop after this many seconds (runs until interrupted when omitted)
    #[arg(short = 'd', long)]
    duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    let mut client =
        Client::new(&args.server, &args.name, args.fake_ping, GameConfig::default()).await?;

    client.run(args.duration.map(Duration::from_secs)).await?;

    Ok(())
}
