//! Device control operations
//!
//! Stateless request/response exchanges with a small fixed payload and
//! an acknowledgement check. CMD_ACK_OK, CMD_ACK_DATA and the legacy
//! code 2007 all count as success.

use bytes::{BufMut, BytesMut};
use chrono::NaiveDateTime;
use tracing::{info, warn};

use zklink_core::Command;
use zklink_types::DeviceTime;

use crate::device::Device;
use crate::error::Result;

impl Device {
    /// Resume normal operation after [`disable_device`](Self::disable_device)
    pub async fn enable_device(&mut self) -> Result<()> {
        self.simple_command(Command::EnableDevice, &[]).await?;
        Ok(())
    }

    /// Put the device into the "working" state (keypad and sensor off)
    pub async fn disable_device(&mut self) -> Result<()> {
        self.simple_command(Command::DisableDevice, &[]).await?;
        Ok(())
    }

    /// Restart the device; the session ends with it
    pub async fn restart(&mut self) -> Result<()> {
        warn!("restarting device");
        self.simple_command(Command::Restart, &[]).await?;
        self.close_socket().await;
        Ok(())
    }

    /// Release the door lock for `seconds`
    pub async fn unlock(&mut self, seconds: u32) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32_le(seconds * 10);

        self.simple_command(Command::Unlock, &payload).await?;
        info!(seconds, "door unlocked");
        Ok(())
    }

    /// Query the door lock; true when the device acknowledges
    pub async fn get_lock_state(&mut self) -> Result<bool> {
        self.ensure_connected()?;
        let reply = self.send_command(Command::DoorStateRrq, &[], 1024).await?;
        Ok(reply.header.is_success())
    }

    /// Play one of the built-in voice prompts
    pub async fn test_voice(&mut self, index: u32) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32_le(index);

        self.simple_command(Command::TestVoice, &payload).await?;
        Ok(())
    }

    /// Set the device wall clock
    pub async fn set_time(&mut self, time: NaiveDateTime) -> Result<()> {
        let encoded = DeviceTime::from(time).encode();

        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32_le(encoded);

        self.simple_command(Command::SetTime, &payload).await?;
        info!(%time, "device time set");
        Ok(())
    }

    /// Rename the device (`~DeviceName` option)
    pub async fn set_device_name(&mut self, name: &str) -> Result<()> {
        self.write_option("~DeviceName", name).await?;
        info!(name, "device renamed");
        Ok(())
    }
}
