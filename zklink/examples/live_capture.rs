//! Live attendance capture example
//!
//! Registers for attendance events and polls until interrupted.

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

    device.start_live_capture(Duration::from_secs(1)).await?;
    println!("Waiting for punches (ctrl-c to quit)...");

    loop {
        match device.next_live_event().await? {
            Some(event) => {
                println!(
                    "{} user={} uid={} status={} punch={}",
                    event.timestamp, event.user_id, event.uid, event.status, event.punch
                );
            }
            None => sleep(Duration::from_millis(200)).await,
        }
    }
}
