//! Attendance log records
//!
//! The log comes back as packed records of 8, 16 or 40 bytes; the size
//! is discovered as `total_size / record_count`. Sizes other than 8 and
//! 16 are parsed with the 40-byte layout, stepping by the discovered
//! size.

use crate::error::{Error, Result};
use crate::strings::cstr;
use crate::time::DeviceTime;

/// One attendance punch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    /// User-visible identifier; numeric string when the record only
    /// carries a uid
    pub user_id: String,
    pub timestamp: DeviceTime,
    pub status: u8,
    pub punch: u8,
    /// Device-internal key, linked against the user list when possible
    pub uid: u32,
}

impl Attendance {
    /// Decode an 8-byte record: `uid(16) status(8) time(32) punch(8)`
    pub fn decode_8(record: &[u8]) -> Result<Self> {
        if record.len() < 8 {
            return Err(Error::RecordTooShort {
                expected: 8,
                actual: record.len(),
            });
        }

        let uid = u16::from_le_bytes([record[0], record[1]]);
        Ok(Self {
            user_id: uid.to_string(),
            timestamp: DeviceTime::from_le_bytes([record[3], record[4], record[5], record[6]]),
            status: record[2],
            punch: record[7],
            uid: uid as u32,
        })
    }

    /// Decode a 16-byte record:
    /// `user_id(32) time(32) status(8) punch(8) reserved(16) workcode(32)`
    pub fn decode_16(record: &[u8]) -> Result<Self> {
        if record.len() < 16 {
            return Err(Error::RecordTooShort {
                expected: 16,
                actual: record.len(),
            });
        }

        let user_id = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        Ok(Self {
            user_id: user_id.to_string(),
            timestamp: DeviceTime::from_le_bytes([record[4], record[5], record[6], record[7]]),
            status: record[8],
            punch: record[9],
            uid: user_id,
        })
    }

    /// Decode a 40-byte record:
    /// `uid(16) user_id[24] status(8) time(32) punch(8) space[8]`
    pub fn decode_40(record: &[u8]) -> Result<Self> {
        if record.len() < 40 {
            return Err(Error::RecordTooShort {
                expected: 40,
                actual: record.len(),
            });
        }

        let uid = u16::from_le_bytes([record[0], record[1]]);
        let user_id = cstr(&record[2..26]);
        Ok(Self {
            user_id: if user_id.is_empty() {
                uid.to_string()
            } else {
                user_id
            },
            timestamp: DeviceTime::from_le_bytes([record[27], record[28], record[29], record[30]]),
            status: record[26],
            punch: record[31],
            uid: uid as u32,
        })
    }
}
