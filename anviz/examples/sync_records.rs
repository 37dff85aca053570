//! Sync attendance records into memory
//!
//! Reads `anviz.toml` (or `ANVIZ_DEVICE__*` variables). Pass `--all` to
//! download every record instead of only the new ones.

use anviz::{sync_records, Config, Device, MemorySink};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anviz::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load("anviz.toml")?;
    let force_all = std::env::args().any(|arg| arg == "--all");

    println!("Syncing from {}:{}...", config.device.addr, config.device.port);

    let mut device = Device::from_config(&config.device);
    let mut sink = MemorySink::new();

    let report = sync_records(&mut device, &mut sink, force_all, |current: u32, total: u32| {
        if current % 100 == 0 || current == total {
            println!("  {}/{}", current, total);
        }
    })
    .await?;

    println!("✓ {}", report);
    for (_, record) in sink.records().iter().take(10) {
        println!("  {}", record);
    }

    device.disconnect().await?;
    Ok(())
}
