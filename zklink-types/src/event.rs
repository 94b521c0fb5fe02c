//! Live attendance event frames
//!
//! After CMD_REG_EVENT the device pushes variable-length frames on the
//! command socket. The layout is selected by the buffered length:
//!
//! | length | layout                                                |
//! |--------|-------------------------------------------------------|
//! | 10     | uid(16), status(8), punch(8), timehex(6)              |
//! | 12     | uid(32), status(8), punch(8), timehex(6)              |
//! | 14     | uid(16), status(8), punch(8), timehex(6), trailing(4) |
//! | 32     | uid[24], status(8), punch(8), timehex(6)              |
//! | 36     | as 32 + trailing(4)                                   |
//! | 37     | as 32 + trailing(5)                                   |
//! | ≥52    | as 32 + trailing(20+)                                 |

use crate::strings::cstr;
use crate::time::DeviceTime;

/// A parsed push event, not yet joined against the user list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    pub user_id: String,
    pub status: u8,
    pub punch: u8,
    pub timestamp: DeviceTime,
}

impl LiveEvent {
    /// Pick the event frame length for a buffer of `len` pending bytes
    ///
    /// `None` means no recognized frame is available; the caller leaves
    /// the buffer untouched.
    pub fn frame_len(len: usize) -> Option<usize> {
        match len {
            10 | 12 | 14 | 32 | 36 | 37 => Some(len),
            n if n >= 52 => Some(52),
            _ => None,
        }
    }

    /// Parse one frame of `frame_len`-selected size
    ///
    /// Returns `None` for frames carrying no user identifier.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let (user_id, status, punch, timehex) = match frame.len() {
            10 | 14 => {
                let uid = u16::from_le_bytes([frame[0], frame[1]]);
                (uid.to_string(), frame[2], frame[3], &frame[4..10])
            }
            12 => {
                let uid = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
                (uid.to_string(), frame[4], frame[5], &frame[6..12])
            }
            n if n == 32 || n == 36 || n == 37 || n >= 52 => {
                (cstr(&frame[..24]), frame[24], frame[25], &frame[26..32])
            }
            _ => return None,
        };

        if user_id.is_empty() {
            return None;
        }

        let mut hex = [0u8; 6];
        hex.copy_from_slice(timehex);

        Some(Self {
            user_id,
            status,
            punch,
            timestamp: DeviceTime::from_timehex(hex),
        })
    }
}
