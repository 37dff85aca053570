//! Device clock and network example
//!
//! `--set` syncs the device clock to local time; `--mac aa:bb:cc:dd:ee:ff`
//! writes a new hardware address into the network parameters.

use anviz::{Config, Device, MacAddress};

#[tokio::main]
async fn main() -> anviz::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::load("anviz.toml")?;
    let mut device = Device::from_config(&config.device);

    let info = device.get_information().await?;
    println!("Device: {}", info);
    println!("Serial: {}", device.get_serial_number().await?);
    println!("Network: {}", device.get_net_params().await?);
    println!("Counters: {}", device.get_record_info().await?);

    let before = device.get_datetime().await?;
    println!("Device clock: {}", before);

    // Sync the device clock to local time
    if std::env::args().any(|arg| arg == "--set") {
        let now = chrono::Local::now().naive_local();
        device.set_datetime(now).await?;
        println!("✓ Clock set to {}", device.get_datetime().await?);
    }

    let mut args = std::env::args().skip_while(|arg| arg != "--mac").skip(1);
    if let Some(text) = args.next() {
        let mac: MacAddress = text.parse()?;
        let mut params = device.get_net_params().await?;
        params.mac = mac;
        device.set_net_params(&params).await?;
        println!("✓ MAC set to {}", mac);
    }

    device.disconnect().await?;
    Ok(())
}
