//! Print records pushed by devices in real time
//!
//! Point the device's server address at this host. Stop with Ctrl-C.

use anviz::{Config, Listener, LogSink};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anviz::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load("anviz.toml")?;
    let listener = Listener::from_config(&config.listener).await?;
    println!("Waiting for devices on {}...", listener.local_addr()?);

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Quit");
            token.cancel();
        }
    });

    let mut sink = LogSink::new();
    let stats = listener.run(&mut sink, shutdown).await?;

    println!(
        "✓ {} connections, {} records, {} rejected frames",
        stats.connections, stats.records, stats.rejected
    );
    Ok(())
}
