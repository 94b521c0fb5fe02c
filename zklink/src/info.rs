//! Device information and capacity queries

use tracing::debug;

use zklink_core::Command;
use zklink_types::{DeviceInfo, DeviceTime, MemoryInfo};

use crate::device::Device;
use crate::error::{Error, Result};

impl Device {
    /// Read one option string by key
    ///
    /// The device answers CMD_OPTIONS_RRQ with an ASCII `key=value\0`
    /// payload; the value runs from `=` to the first NUL.
    async fn read_option(&mut self, key: &str) -> Result<String> {
        self.ensure_connected()?;

        let mut payload = key.as_bytes().to_vec();
        payload.push(0);

        let reply = self.simple_command(Command::OptionsRrq, &payload).await?;

        let text = String::from_utf8_lossy(&reply.payload);
        let value = text
            .split_once('=')
            .map(|(_, v)| v)
            .unwrap_or("")
            .split('\0')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        debug!(key, value, "option read");
        Ok(value)
    }

    /// Write one option string (`key=value`)
    pub(crate) async fn write_option(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_connected()?;

        let mut payload = format!("{key}={value}").into_bytes();
        payload.push(0);

        self.simple_command(Command::OptionsWrq, &payload).await?;
        Ok(())
    }

    /// Firmware version string
    pub async fn get_firmware_version(&mut self) -> Result<String> {
        self.ensure_connected()?;
        let reply = self.simple_command(Command::GetVersion, &[]).await?;

        let end = reply
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(reply.payload.len());
        Ok(String::from_utf8_lossy(&reply.payload[..end]).trim().to_string())
    }

    /// Device serial number
    pub async fn get_serial_number(&mut self) -> Result<String> {
        self.read_option("~SerialNumber").await
    }

    /// Platform name
    pub async fn get_platform(&mut self) -> Result<String> {
        self.read_option("~Platform").await
    }

    /// User-assigned device name
    pub async fn get_device_name(&mut self) -> Result<String> {
        self.read_option("~DeviceName").await
    }

    /// MAC address
    pub async fn get_mac_address(&mut self) -> Result<String> {
        self.read_option("MAC").await
    }

    /// Face engine version (0 when the device has none)
    pub async fn get_face_version(&mut self) -> Result<u32> {
        let value = self.read_option("ZKFaceVersion").await?;
        Ok(value.parse().unwrap_or(0))
    }

    /// Fingerprint engine version (0 when unreported)
    pub async fn get_fp_version(&mut self) -> Result<u32> {
        let value = self.read_option("~ZKFPVersion").await?;
        Ok(value.parse().unwrap_or(0))
    }

    /// Device wall clock
    pub async fn get_device_time(&mut self) -> Result<DeviceTime> {
        self.ensure_connected()?;
        let reply = self.simple_command(Command::GetTime, &[]).await?;

        if reply.payload.len() < 4 {
            return Err(Error::Malformed("time reply shorter than 4 bytes".into()));
        }
        Ok(DeviceTime::from_le_bytes([
            reply.payload[0],
            reply.payload[1],
            reply.payload[2],
            reply.payload[3],
        ]))
    }

    /// Aggregate the identity getters into one bag
    pub async fn get_device_info(&mut self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            firmware_version: self.get_firmware_version().await?,
            serial_number: self.get_serial_number().await?,
            platform: self.get_platform().await?,
            device_name: self.get_device_name().await?,
            mac_address: self.get_mac_address().await?,
            face_version: self.get_face_version().await?,
            fp_version: self.get_fp_version().await?,
            device_time: self.get_device_time().await?,
        })
    }

    /// Storage counters from CMD_GET_FREE_SIZES
    pub async fn get_memory_info(&mut self) -> Result<MemoryInfo> {
        self.ensure_connected()?;

        let reply = self.send_command(Command::GetFreeSizes, &[], 1024).await?;
        if !reply.header.is_success() && reply.code() != Command::PrepareData as u16 {
            return Err(Error::UnexpectedReply {
                command: Command::GetFreeSizes.name(),
                code: reply.code(),
            });
        }

        MemoryInfo::parse(&reply.payload).ok_or_else(|| {
            Error::Malformed(format!(
                "free-sizes payload of {} bytes, need 80",
                reply.payload.len()
            ))
        })
    }

    /// Refresh the cached record counts used by the dataset reads
    pub async fn read_sizes(&mut self) -> Result<()> {
        let info = self.get_memory_info().await?;

        self.users = info.users;
        self.fingers = info.fingers;
        self.records = info.records;
        self.users_capacity = info.users_capacity;
        self.fingers_capacity = info.fingers_capacity;
        self.records_capacity = info.records_capacity;

        debug!(
            users = info.users,
            fingers = info.fingers,
            records = info.records,
            "sizes read"
        );
        Ok(())
    }
}
