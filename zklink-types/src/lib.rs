//! Type definitions and record codecs for terminal data
//!
//! The device stores every dataset as packed little-endian records whose
//! layout is discovered at read time (`total_size / record_count`). This
//! crate holds the entity structs and the byte-level codecs; transfer of
//! the raw datasets is the client's concern.

pub mod attendance;
pub mod device_info;
pub mod error;
pub mod event;
pub mod finger;
pub mod memory;
pub mod time;
pub mod user;

mod strings;

pub use attendance::Attendance;
pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use event::LiveEvent;
pub use finger::FingerTemplate;
pub use memory::{FaceCapacity, MemoryInfo};
pub use time::DeviceTime;
pub use user::{Privilege, User, UserPacketSize};
