//! User records
//!
//! The device stores users in one of two packed layouts; which one is in
//! play is discovered on the first read by dividing the dataset size by
//! the reported user count, and sticks for the life of the session.
//!
//! | field      | 28-byte off/len | 72-byte off/len |
//! |------------|-----------------|-----------------|
//! | uid        | 0, 2            | 0, 2            |
//! | privilege  | 2, 1            | 2, 1            |
//! | password   | 3, 5            | 3, 8            |
//! | name       | 8, 8            | 11, 24          |
//! | card       | 16, 4           | 35, 4           |
//! | group id   | 21, 1           | 39, 1           |
//! | user id    | 24, 4 (int)     | 48, 24 (str)    |

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::strings::{cstr, pad};

/// User privilege level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Privilege {
    #[default]
    Default = 0,
    Admin = 14,
}

impl Privilege {
    /// Map a raw byte; anything outside the two known levels collapses
    /// to the default level, as the device itself does on write
    pub fn from_byte(value: u8) -> Self {
        match value {
            14 => Self::Admin,
            _ => Self::Default,
        }
    }
}

/// Record layout in use on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPacketSize {
    /// 28-byte records (older firmware)
    Short,
    /// 72-byte records
    Long,
}

impl UserPacketSize {
    /// Record length in bytes
    pub fn len(self) -> usize {
        match self {
            Self::Short => 28,
            Self::Long => 72,
        }
    }

    /// Classify a discovered record length
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            28 => Some(Self::Short),
            72 => Some(Self::Long),
            _ => None,
        }
    }
}

/// A user record
///
/// `uid` is the device-internal 16-bit key; `user_id` is the
/// user-visible identifier (numeric string in the short layout). Both
/// are unique on the device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub uid: u16,
    pub privilege: Privilege,
    pub password: String,
    pub name: String,
    pub card: u32,
    pub group_id: String,
    pub user_id: String,
}

impl User {
    /// Decode one record of the given layout
    ///
    /// An empty name is replaced with `NN-<user_id>`.
    pub fn decode(record: &[u8], size: UserPacketSize) -> Result<Self> {
        if record.len() < size.len() {
            return Err(Error::RecordTooShort {
                expected: size.len(),
                actual: record.len(),
            });
        }

        let mut user = match size {
            UserPacketSize::Short => {
                let uid = u16::from_le_bytes([record[0], record[1]]);
                let user_id = u32::from_le_bytes([record[24], record[25], record[26], record[27]]);
                User {
                    uid,
                    privilege: Privilege::from_byte(record[2]),
                    password: cstr(&record[3..8]),
                    name: cstr(&record[8..16]),
                    card: u32::from_le_bytes([record[16], record[17], record[18], record[19]]),
                    group_id: record[21].to_string(),
                    user_id: user_id.to_string(),
                }
            }
            UserPacketSize::Long => User {
                uid: u16::from_le_bytes([record[0], record[1]]),
                privilege: Privilege::from_byte(record[2]),
                password: cstr(&record[3..11]),
                name: cstr(&record[11..35]),
                card: u32::from_le_bytes([record[35], record[36], record[37], record[38]]),
                group_id: record[39].to_string(),
                user_id: cstr(&record[48..72]),
            },
        };

        if user.name.is_empty() {
            user.name = format!("NN-{}", user.user_id);
        }

        Ok(user)
    }

    /// Encode for CMD_USER_WRQ in the given layout
    pub fn encode(&self, size: UserPacketSize) -> BytesMut {
        let group: u8 = self.group_id.parse().unwrap_or(0);
        let mut buf = BytesMut::with_capacity(size.len());

        match size {
            UserPacketSize::Short => {
                buf.put_u16_le(self.uid);
                buf.put_u8(self.privilege as u8);
                buf.put_slice(&pad(&self.password, 5));
                buf.put_slice(&pad(&self.name, 8));
                buf.put_u32_le(self.card);
                buf.put_u8(0);
                buf.put_u8(group);
                buf.put_u16_le(0); // timezone
                buf.put_u32_le(self.user_id.parse().unwrap_or(0));
            }
            UserPacketSize::Long => {
                buf.put_u16_le(self.uid);
                buf.put_u8(self.privilege as u8);
                buf.put_slice(&pad(&self.password, 8));
                buf.put_slice(&pad(&self.name, 24));
                buf.put_u32_le(self.card);
                buf.put_u8(group);
                buf.put_slice(&pad(&self.group_id, 7));
                buf.put_u8(0);
                buf.put_slice(&pad(&self.user_id, 24));
            }
        }

        debug_assert_eq!(buf.len(), size.len());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> User {
        User {
            uid: 42,
            privilege: Privilege::Admin,
            password: "1234".into(),
            name: "Alice".into(),
            card: 0xDEAD_BEEF,
            group_id: "1".into(),
            user_id: "42".into(),
        }
    }

    #[test]
    fn test_round_trip_short() {
        let user = sample();
        let encoded = user.encode(UserPacketSize::Short);
        assert_eq!(encoded.len(), 28);

        let decoded = User::decode(&encoded, UserPacketSize::Short).unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_round_trip_long() {
        let user = User {
            user_id: "badge-42".into(),
            ..sample()
        };
        let encoded = user.encode(UserPacketSize::Long);
        assert_eq!(encoded.len(), 72);

        let decoded = User::decode(&encoded, UserPacketSize::Long).unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_long_name_truncated_to_field() {
        let user = User {
            name: "a name well beyond eight bytes".into(),
            ..sample()
        };
        let decoded = User::decode(&user.encode(UserPacketSize::Short), UserPacketSize::Short).unwrap();
        assert_eq!(decoded.name, "a name w");
    }

    #[test]
    fn test_empty_name_becomes_placeholder() {
        let user = User {
            name: String::new(),
            ..sample()
        };
        let decoded = User::decode(&user.encode(UserPacketSize::Short), UserPacketSize::Short).unwrap();
        assert_eq!(decoded.name, "NN-42");
    }

    #[test]
    fn test_short_user_id_is_numeric() {
        let mut record = [0u8; 28];
        record[0] = 7;
        record[24..28].copy_from_slice(&90125u32.to_le_bytes());

        let user = User::decode(&record, UserPacketSize::Short).unwrap();
        assert_eq!(user.uid, 7);
        assert_eq!(user.user_id, "90125");
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let result = User::decode(&[0u8; 27], UserPacketSize::Short);
        assert!(matches!(result, Err(Error::RecordTooShort { .. })));
    }

    #[test]
    fn test_privilege_mapping() {
        assert_eq!(Privilege::from_byte(0), Privilege::Default);
        assert_eq!(Privilege::from_byte(14), Privilege::Admin);
        assert_eq!(Privilege::from_byte(3), Privilege::Default);
    }

    #[test]
    fn test_packet_size_discovery() {
        assert_eq!(UserPacketSize::from_len(28), Some(UserPacketSize::Short));
        assert_eq!(UserPacketSize::from_len(72), Some(UserPacketSize::Long));
        assert_eq!(UserPacketSize::from_len(30), None);
    }
}
