//! Device control example

use std::time::Duration;
use tokio::time::sleep;
use zklink::Device;

#[tokio::main]
async fn main() -> zklink::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    let mut device = Device::new(ip, 4370);
    device.connect().await?;

    println!("Device connected!");

    // Show "Working..." on the terminal for a few seconds
    println!("Disabling device...");
    device.disable_device().await?;
    sleep(Duration::from_secs(3)).await;

    println!("Enabling device...");
    device.enable_device().await?;

    println!("Testing voice prompt...");
    device.test_voice(0).await?;

    println!("Done!");

    device.disconnect().await?;

    Ok(())
}
