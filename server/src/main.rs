use clap::Parser;
use env_logger::Env;
use server::config::{MapSource, ServerConfig};
use server::network::{BoxError, Server};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative jetpack race server")]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 4242)]
    port: u16,

    /// Level file; a generated level is used when absent
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Seed of the generated level
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Tick interval in milliseconds
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Players needed to start a round
    #[arg(long, default_value_t = shared::MIN_PLAYERS)]
    min_players: usize,

    /// Seconds of client silence before its slot is released
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Start a new round this many seconds after one ends
    #[arg(long)]
    restart_after_secs: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            address: format!("{}:{}", self.host, self.port),
            map: match self.map {
                Some(path) => MapSource::File(path),
                None => MapSource::Generated { seed: self.seed },
            },
            tick_interval: Duration::from_millis(self.tick_ms),
            min_players: self.min_players,
            client_timeout: Duration::from_secs(self.timeout_secs),
            restart_after: self.restart_after_secs.map(Duration::from_secs),
            debug: self.debug,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BoxError> {
    let config = Args::parse().into_config();

    let default_filter = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let mut server = Server::bind(config).await?;
    server.run().await
}
