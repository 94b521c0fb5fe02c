//! Device wall-clock encoding
//!
//! The terminal packs a local timestamp into a single 32-bit integer
//! using fixed 31-day months and 12-month years:
//!
//! ```text
//! second = t % 60; t /= 60;
//! minute = t % 60; t /= 60;
//! hour   = t % 24; t /= 24;
//! day    = t % 31 + 1; t /= 31;
//! month  = t % 12 + 1; t /= 12;
//! year   = t + 2000;
//! ```
//!
//! The arithmetic is not a real calendar — "February 30" encodes and
//! decodes fine — and the device relies on getting identical bytes back,
//! so the decoded tuple is kept verbatim in [`DeviceTime`] and only
//! converted to a calendar type on request.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// A wall-clock tuple as the device understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DeviceTime {
    /// The device epoch, 2000-01-01T00:00:00 (encodes to 0)
    pub const EPOCH: DeviceTime = DeviceTime {
        year: 2000,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Decode the 32-bit device encoding
    pub fn decode(mut t: u32) -> Self {
        let second = (t % 60) as u8;
        t /= 60;
        let minute = (t % 60) as u8;
        t /= 60;
        let hour = (t % 24) as u8;
        t /= 24;
        let day = (t % 31) as u8 + 1;
        t /= 31;
        let month = (t % 12) as u8 + 1;
        t /= 12;
        let year = t as u16 + 2000;

        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Encode to the 32-bit device encoding (inverse of [`decode`](Self::decode))
    pub fn encode(&self) -> u32 {
        let days = (self.year % 100) as u32 * 12 * 31
            + (self.month as u32 - 1) * 31
            + self.day as u32
            - 1;
        days * 24 * 60 * 60
            + (self.hour as u32 * 60 + self.minute as u32) * 60
            + self.second as u32
    }

    /// Decode the 4 little-endian bytes used in records and replies
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self::decode(u32::from_le_bytes(bytes))
    }

    /// Parse a 6-byte live-event timestamp:
    /// `year-2000, month, day, hour, minute, second`
    ///
    /// Out-of-range components fall back to the device epoch.
    pub fn from_timehex(bytes: [u8; 6]) -> Self {
        let [year, month, day, hour, minute, second] = bytes;

        let candidate = Self {
            year: year as u16 + 2000,
            month,
            day,
            hour,
            minute,
            second,
        };

        if candidate.components_in_range() {
            candidate
        } else {
            Self::EPOCH
        }
    }

    /// Components within the encoding's own ranges (not calendar validity:
    /// February 30 passes)
    pub fn components_in_range(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }

    /// Convert to a calendar timestamp; `None` for tuples the device can
    /// express but the calendar cannot
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
    }
}

impl Default for DeviceTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl From<NaiveDateTime> for DeviceTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year() as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }
}

impl std::fmt::Display for DeviceTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_known_value() {
        let t = DeviceTime::decode(755_601_318);
        assert_eq!(
            t,
            DeviceTime {
                year: 2023,
                month: 7,
                day: 4,
                hour: 9,
                minute: 15,
                second: 18,
            }
        );
        assert_eq!(t.encode(), 755_601_318);
    }

    #[test]
    fn test_epoch_encodes_to_zero() {
        assert_eq!(DeviceTime::EPOCH.encode(), 0);
        assert_eq!(DeviceTime::decode(0), DeviceTime::EPOCH);
    }

    #[test]
    fn test_round_trip_in_range_tuples() {
        for &(y, mo, d, h, mi, s) in &[
            (2000u16, 1u8, 1u8, 0u8, 0u8, 0u8),
            (2024, 12, 31, 23, 59, 59),
            (2010, 6, 15, 12, 30, 45),
            // Not a calendar date, but the device encodes it anyway
            (2021, 2, 30, 8, 0, 0),
        ] {
            let t = DeviceTime {
                year: y,
                month: mo,
                day: d,
                hour: h,
                minute: mi,
                second: s,
            };
            assert_eq!(DeviceTime::decode(t.encode()), t);
        }
    }

    #[test]
    fn test_february_30_survives_but_is_not_calendar() {
        let t = DeviceTime {
            year: 2021,
            month: 2,
            day: 30,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert!(t.components_in_range());
        assert!(t.to_naive().is_none());
        assert_eq!(DeviceTime::decode(t.encode()), t);
    }

    #[test]
    fn test_timehex_valid() {
        let t = DeviceTime::from_timehex([23, 7, 4, 9, 15, 18]);
        assert_eq!(t.to_string(), "2023-07-04T09:15:18");
    }

    #[test]
    fn test_timehex_out_of_range_defaults_to_epoch() {
        assert_eq!(DeviceTime::from_timehex([23, 13, 4, 9, 15, 18]), DeviceTime::EPOCH);
        assert_eq!(DeviceTime::from_timehex([23, 0, 4, 9, 15, 18]), DeviceTime::EPOCH);
        assert_eq!(DeviceTime::from_timehex([23, 7, 32, 9, 15, 18]), DeviceTime::EPOCH);
        assert_eq!(DeviceTime::from_timehex([23, 7, 4, 24, 15, 18]), DeviceTime::EPOCH);
        assert_eq!(DeviceTime::from_timehex([23, 7, 4, 9, 60, 18]), DeviceTime::EPOCH);
        assert_eq!(DeviceTime::from_timehex([23, 7, 4, 9, 15, 60]), DeviceTime::EPOCH);
    }

    #[test]
    fn test_chrono_conversion() {
        let naive = NaiveDate::from_ymd_opt(2023, 7, 4)
            .unwrap()
            .and_hms_opt(9, 15, 18)
            .unwrap();
        let t = DeviceTime::from(naive);
        assert_eq!(t.encode(), 755_601_318);
        assert_eq!(t.to_naive(), Some(naive));
    }
}
