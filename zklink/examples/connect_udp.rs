//! UDP connection example (for terminals that only speak datagrams)

use zklink::Device;

#[tokio::main]
async fn main() -> zklink::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    println!("Connecting to {} via UDP...", ip);

    let mut device = Device::new(ip, 4370).with_force_udp(true);

    device.connect().await?;
    println!("✓ Connected!");

    let info = device.get_device_info().await?;
    println!("✓ Device: {}", info);

    let users = device.get_users().await?;
    println!("✓ {} users on the terminal", users.len());

    device.disconnect().await?;
    println!("✓ Disconnected");

    Ok(())
}
