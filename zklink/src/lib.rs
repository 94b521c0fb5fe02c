//! # zklink
//!
//! Client for the binary protocol spoken by a family of network-attached
//! biometric attendance terminals (fingerprint, face and card readers).
//!
//! A [`Device`] owns one session: it connects over TCP (falling back to
//! UDP), authenticates when the terminal has a communication password,
//! and exposes the device database — users, fingerprint templates, the
//! attendance log — plus device control and a pull-style live stream of
//! attendance events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use zklink::Device;
//!
//! #[tokio::main]
//! async fn main() -> zklink::Result<()> {
//!     let mut device = Device::new("192.168.1.201", 4370).with_password(0);
//!     device.connect().await?;
//!
//!     let info = device.get_device_info().await?;
//!     println!("{}", info);
//!
//!     for user in device.get_users().await? {
//!         println!("{} {}", user.user_id, user.name);
//!     }
//!
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! A session must not be shared between concurrent callers: the
//! session-id/reply-id pair makes interleaved commands unsafe, and bulk
//! reads hold the socket across many round trips. Wrap the `Device` in a
//! mutex at the boundary if callers need to take turns.

mod attendance;
mod bulk;
mod control;
mod device;
mod error;
mod fingers;
mod info;
mod live;
mod users;

pub use device::Device;
pub use error::{Error, Result};

// Re-exports
pub use zklink_core::{Command, Session};
pub use zklink_types::{
    Attendance, DeviceInfo, DeviceTime, FingerTemplate, MemoryInfo, Privilege, User,
};
