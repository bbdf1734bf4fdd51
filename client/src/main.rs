use clap::Parser;
use client::network::Client;
use client::pilot::{Autopilot, Idle, Pilot};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:4242")]
    server: String,

    /// Interval between input packets in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,

    /// Never fire the jetpack instead of flying the autopilot
    #[arg(long)]
    idle: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let pilot: Box<dyn Pilot + Send> = if args.idle {
        info!("Flying idle");
        Box::new(Idle)
    } else {
        Box::new(Autopilot)
    };

    let mut client =
        Client::connect(&args.server, pilot, Duration::from_millis(args.tick_ms.max(1))).await?;

    client.run().await?;

    Ok(())
}
